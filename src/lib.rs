//! # probman
//!
//! 题库管理与试卷编译工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 模型与解析（Models / Parser）
//! - `models/` - 试卷、题目、模板、分值格式等领域类型
//! - `parser/` - 试卷描述文件解析器，逐行产出 `Sheet`
//!
//! ### ② 基础设施层（Infrastructure）
//! - `infrastructure/` - 唯一调用外部编译器和复制文件的地方
//! - `Compiler` - 两遍编译，以输出文件是否存在判断成败
//! - `StagedAttachments` - 暂存附件，离开作用域自动删除
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ProblemStore` - 题库的增删查
//! - `Checker` - 检查题目引用的附件
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一份试卷的一遍编译"的完整流程
//! - `SheetCtx` - 上下文封装（试卷名 + 模式 + 单元序号）
//! - `SheetFlow` - 流程编排（暂存 → 渲染 → 编译 → 复制）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量编译器，管理工作目录和进度
//! - `orchestrator/preview` - 单题预览
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{CompileMode, Problem, RenderMode, Sheet, Template};
pub use orchestrator::{BatchReport, BatchRequest, Orchestrator, PreviewArtifact, UnitOutcome};
pub use parser::{SpecFile, SpecParser};
pub use services::{Checker, ProblemStore};
pub use workflow::{SheetCtx, SheetFlow};
