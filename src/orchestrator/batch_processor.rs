//! 批量编译器 - 编排层
//!
//! ## 职责
//!
//! 把一批试卷编译为输出文件，是整个编译流程的入口。
//!
//! ## 核心功能
//!
//! 1. **工作目录**：每批创建一个临时目录，任何退出路径都会删除
//! 2. **附加文件**：每批只复制一次
//! 3. **顺序编译**：按试卷顺序逐个编译；`both` 模式先编译全部题目再编译全部答案
//! 4. **进度**：开始前即可得到单元总数（试卷数 × 遍数），每尝试一个单元推进一次
//! 5. **容错**：单个试卷失败只记录警告，继续下一份
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有工作目录的模块
//! - **向下委托**：单份试卷的编译委托给 `workflow::SheetFlow`

use std::path::{Path, PathBuf};
use std::pin::pin;

use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{stage_includes, Compiler};
use crate::models::{CompileMode, RenderMode, Sheet, Template};
use crate::services::ProblemStore;
use crate::utils::logging::{log_batch_start, print_final_stats};
use crate::workflow::{SheetCtx, SheetFlow};

/// 编排器
pub struct Orchestrator<'c> {
    config: &'c Config,
    compiler: Compiler,
}

/// 一批编译的输入
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub sheets: &'a [Sheet],
    /// 没有自带模板的试卷使用的模板
    pub template: &'a Template,
    pub mode: CompileMode,
    /// 除配置文件中的附加文件之外，本批额外需要的文件
    pub includes: &'a [PathBuf],
    /// 输出目录
    pub dest: &'a Path,
}

/// 一个编译单元（一份试卷的一遍）的结果
#[derive(Debug)]
pub struct UnitOutcome {
    /// 单元序号（从1开始）
    pub unit_index: usize,
    pub total_units: usize,
    pub sheet: String,
    pub mode: RenderMode,
    /// 成功时为输出目录中的文件路径
    pub result: AppResult<PathBuf>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }
}

/// 一批编译的汇总
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total_units: usize,
    pub outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(UnitOutcome::artifact)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

impl<'c> Orchestrator<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            compiler: Compiler::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub(crate) fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// 准备一批编译：创建工作目录、复制附加文件、创建输出目录
    ///
    /// 这些步骤失败会使整批失败。
    pub fn start_batch<'a>(
        &'a self,
        store: &'a ProblemStore,
        request: BatchRequest<'a>,
    ) -> Result<CompileBatch<'a>> {
        let workdir = tempfile::Builder::new()
            .prefix("probman-")
            .tempdir()
            .context("无法创建临时工作目录")?;
        info!("📁 创建工作目录 {}", workdir.path().display());

        let mut includes = self.config.includes.clone();
        includes.extend_from_slice(request.includes);
        stage_includes(workdir.path(), &includes).context("复制附加文件失败")?;

        std::fs::create_dir_all(request.dest)
            .with_context(|| format!("无法创建输出目录: {}", request.dest.display()))?;

        let total_units = request.sheets.len() * request.mode.passes().len();
        Ok(CompileBatch {
            config: self.config,
            compiler: &self.compiler,
            store,
            request,
            workdir,
            total_units,
        })
    }

    /// 编译整批试卷
    ///
    /// 每个单元完成（无论成败）后调用一次 `on_unit`。
    pub async fn compile_all<'a, F>(
        &'a self,
        store: &'a ProblemStore,
        request: BatchRequest<'a>,
        mut on_unit: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(&UnitOutcome),
    {
        let sheet_count = request.sheets.len();
        let mode = request.mode;
        let batch = self.start_batch(store, request)?;

        let mut report = BatchReport {
            total_units: batch.total_units(),
            outcomes: Vec::with_capacity(batch.total_units()),
        };
        log_batch_start(sheet_count, mode, report.total_units);

        let mut outcomes = pin!(batch.into_stream());
        while let Some(outcome) = outcomes.next().await {
            on_unit(&outcome);
            report.outcomes.push(outcome);
        }

        print_final_stats(&report);
        Ok(report)
    }
}

/// 一批已准备好的编译
///
/// 持有临时工作目录，丢弃时删除。
pub struct CompileBatch<'a> {
    config: &'a Config,
    compiler: &'a Compiler,
    store: &'a ProblemStore,
    request: BatchRequest<'a>,
    workdir: TempDir,
    total_units: usize,
}

impl<'a> CompileBatch<'a> {
    /// 单元总数 = 试卷数 × 遍数
    pub fn total_units(&self) -> usize {
        self.total_units
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// 按顺序逐个编译，每个单元产出一个结果
    pub fn into_stream(self) -> impl Stream<Item = UnitOutcome> + 'a {
        stream::unfold((self, 0usize), |(batch, next)| async move {
            if next >= batch.total_units {
                return None;
            }
            let outcome = batch.compile_unit(next).await;
            Some((outcome, (batch, next + 1)))
        })
    }

    async fn compile_unit(&self, index: usize) -> UnitOutcome {
        let per_pass = self.request.sheets.len();
        let mode = self.request.mode.passes()[index / per_pass];
        let sheet = &self.request.sheets[index % per_pass];
        let ctx = SheetCtx::new(&sheet.file_name, mode, index + 1, self.total_units);

        let result = self.compile_sheet(sheet, &ctx).await;
        match &result {
            Ok(path) => info!("{} ✅ 编译成功: {}", ctx, path.display()),
            Err(e) => warn!("{} ⚠️ 编译失败: {}", ctx, e),
        }

        UnitOutcome {
            unit_index: index + 1,
            total_units: self.total_units,
            sheet: sheet.file_name.clone(),
            mode,
            result,
        }
    }

    async fn compile_sheet(&self, sheet: &Sheet, ctx: &SheetCtx) -> AppResult<PathBuf> {
        let resolved = self.store.resolve_sheet(sheet)?;

        let own_template;
        let template = match &sheet.template {
            Some(text) => {
                own_template = Template::new(text.clone());
                &own_template
            }
            None => self.request.template,
        };

        SheetFlow::new(self.config, self.compiler)
            .run(
                self.workdir.path(),
                &resolved,
                template,
                ctx,
                Some(self.request.dest),
            )
            .await
    }
}
