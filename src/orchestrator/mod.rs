//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量编译和单题预览，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量编译器
//! - 管理一批编译的生命周期（工作目录、附加文件、输出目录）
//! - 按顺序逐个编译试卷，`both` 模式先题目后答案
//! - 开始前给出单元总数，每个单元产出一个结果
//! - 输出全局统计信息
//!
//! ### `preview` - 单题预览
//! - 生成只含一道题的临时试卷，以混合模式编译
//! - 返回的输出文件在离开作用域时删除
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor / preview (处理 Vec<Sheet> / 单道题目)
//!     ↓
//! workflow::SheetFlow (处理单份试卷的一遍)
//!     ↓
//! models (渲染) / services (题库)
//!     ↓
//! infrastructure (基础设施：Compiler、暂存)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有工作目录
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做具体渲染

pub mod batch_processor;
pub mod preview;

// 重新导出主要类型
pub use batch_processor::{BatchReport, BatchRequest, CompileBatch, Orchestrator, UnitOutcome};
pub use preview::PreviewArtifact;
