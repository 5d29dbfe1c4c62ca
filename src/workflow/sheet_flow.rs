//! 试卷编译流程 - 流程层
//!
//! 核心职责：定义"一份试卷的一遍编译"的完整流程
//!
//! 流程顺序：
//! 1. 暂存附件
//! 2. 渲染源文件
//! 3. 调用编译器（两遍）
//! 4. 复制输出文件到目标目录
//! 5. 删除暂存附件（无论成败）

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{Compiler, StagedAttachments};
use crate::models::{RenderLayout, ResolvedSheet, Template};
use crate::workflow::sheet_ctx::SheetCtx;

/// 试卷编译流程
///
/// - 不持有工作目录，由编排层传入
/// - 不解析题目 ID，只处理已解析的试卷
pub struct SheetFlow<'a> {
    compiler: &'a Compiler,
    layout: RenderLayout,
}

impl<'a> SheetFlow<'a> {
    pub fn new(config: &Config, compiler: &'a Compiler) -> Self {
        Self {
            compiler,
            layout: RenderLayout::from(config),
        }
    }

    /// 执行一遍编译
    ///
    /// `dest` 为 `None` 时输出文件留在工作目录中。
    pub async fn run(
        &self,
        workdir: &Path,
        sheet: &ResolvedSheet<'_>,
        template: &Template,
        ctx: &SheetCtx,
        dest: Option<&Path>,
    ) -> AppResult<PathBuf> {
        let staged = StagedAttachments::stage(workdir, sheet)?;
        debug!("{} 暂存了 {} 个附件", ctx, staged.files().len());

        let source = sheet.render(template, ctx.mode, &self.layout)?;
        let source_path = workdir.join(ctx.source_name());
        tokio::fs::write(&source_path, source)
            .await
            .map_err(|e| AppError::io(source_path.display().to_string(), e))?;

        info!("{} 📝 正在编译...", ctx);
        let artifact = self.compiler.compile(workdir, &ctx.source_name()).await?;

        let published = match dest {
            Some(dir) => publish(&artifact, dir).await?,
            None => artifact,
        };

        drop(staged);
        Ok(published)
    }
}

/// 复制输出文件到目标目录
async fn publish(artifact: &Path, dest_dir: &Path) -> AppResult<PathBuf> {
    let name = artifact.file_name().unwrap_or_default();
    let target = dest_dir.join(name);
    tokio::fs::copy(artifact, &target)
        .await
        .map_err(|e| AppError::io(target.display().to_string(), e))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProblemEntry, RenderMode, Sheet};
    use crate::services::ProblemStore;
    use tempfile::TempDir;

    fn config() -> Config {
        Config {
            engine: "sh".to_string(),
            engine_args: vec![
                "-c".to_string(),
                r#"test -f fig.png && cp "$0" "${0%.tex}.pdf""#.to_string(),
            ],
            compile_timeout_secs: 10,
            ..Config::default()
        }
    }

    #[test]
    fn test_run_publishes_and_cleans_attachments() {
        let store_dir = TempDir::new().unwrap();
        let workdir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut store = ProblemStore::open(store_dir.path()).unwrap();
        store
            .new_problem("a", "Q", "S", &[("fig.png".to_string(), b"img".to_vec())])
            .unwrap();

        let mut sheet = Sheet::new("hw", None);
        sheet.problems.push(ProblemEntry::new("a", None));
        let resolved = store.resolve_sheet(&sheet).unwrap();

        let config = config();
        let compiler = Compiler::new(&config);
        let ctx = SheetCtx::new("hw", RenderMode::Solutions, 1, 1);
        let published = tokio_test::block_on(SheetFlow::new(&config, &compiler).run(
            workdir.path(),
            &resolved,
            &Template::new("$problems"),
            &ctx,
            Some(dest.path()),
        ))
        .unwrap();

        assert_eq!(published, dest.path().join("hw-solutions.pdf"));
        assert_eq!(std::fs::read_to_string(&published).unwrap(), "S");
        assert!(!workdir.path().join("fig.png").exists());
    }

    #[test]
    fn test_run_without_dest_keeps_artifact_in_workdir() {
        let store_dir = TempDir::new().unwrap();
        let workdir = TempDir::new().unwrap();
        let mut store = ProblemStore::open(store_dir.path()).unwrap();
        store
            .new_problem("a", "Q", "S", &[("fig.png".to_string(), b"img".to_vec())])
            .unwrap();

        let mut sheet = Sheet::new("one", None);
        sheet.problems.push(ProblemEntry::new("a", None));
        let resolved = store.resolve_sheet(&sheet).unwrap();

        let config = config();
        let compiler = Compiler::new(&config);
        let ctx = SheetCtx::new("one", RenderMode::Questions, 1, 1);
        let artifact = tokio_test::block_on(SheetFlow::new(&config, &compiler).run(
            workdir.path(),
            &resolved,
            &Template::new("$problems"),
            &ctx,
            None,
        ))
        .unwrap();

        assert_eq!(artifact, workdir.path().join("one.pdf"));
        assert!(artifact.is_file());
    }
}
