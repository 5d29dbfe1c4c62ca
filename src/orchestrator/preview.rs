//! 单题预览 - 编排层
//!
//! 把一道题目编译为混合模式的临时文件，供查看器打开。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::infrastructure::stage_includes;
use crate::models::{Metadata, ProblemEntry, RenderMode, Sheet, Template};
use crate::orchestrator::batch_processor::Orchestrator;
use crate::services::ProblemStore;
use crate::workflow::{SheetCtx, SheetFlow};

/// 预览生成的输出文件
///
/// 离开作用域时删除输出文件和它所在的临时目录，包括发生 panic 时。
#[derive(Debug)]
pub struct PreviewArtifact {
    path: PathBuf,
    _workdir: TempDir,
}

impl PreviewArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreviewArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("🗑️ 已删除预览文件 {}", self.path.display()),
            Err(e) => debug!("删除预览文件 {} 失败: {}", self.path.display(), e),
        }
    }
}

impl Orchestrator<'_> {
    /// 编译一道题目的预览
    ///
    /// 生成一份只含这道题的临时试卷（混合模式，不显示分值），
    /// 使用给定的模板和元数据。失败时直接返回错误。
    pub async fn preview(
        &self,
        store: &ProblemStore,
        problem_id: &str,
        template: &Template,
        metadata: Metadata,
        includes: &[PathBuf],
    ) -> Result<PreviewArtifact> {
        let workdir = tempfile::Builder::new()
            .prefix("probman-preview-")
            .tempdir()
            .context("无法创建临时工作目录")?;

        let mut all_includes = self.config().includes.clone();
        all_includes.extend_from_slice(includes);
        stage_includes(workdir.path(), &all_includes).context("复制附加文件失败")?;

        let mut sheet = Sheet::new(format!("preview-{}", problem_id), None);
        sheet.metadata = metadata;
        sheet.problems.push(ProblemEntry::new(problem_id, None));

        let resolved = store
            .resolve_sheet(&sheet)
            .with_context(|| format!("无法预览题目 {}", problem_id))?;
        let ctx = SheetCtx::new(&sheet.file_name, RenderMode::Mixed, 1, 1);

        let path = SheetFlow::new(self.config(), self.compiler())
            .run(workdir.path(), &resolved, template, &ctx, None)
            .await
            .with_context(|| format!("预览题目 {} 编译失败", problem_id))?;

        info!("👀 预览文件: {}", path.display());
        Ok(PreviewArtifact {
            path,
            _workdir: workdir,
        })
    }
}
