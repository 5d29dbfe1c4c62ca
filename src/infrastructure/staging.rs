//! 工作目录暂存 - 基础设施层
//!
//! 把附加文件和题目附件复制到编译工作目录。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppResult, StageError};
use crate::models::ResolvedSheet;

/// 附加文件在冲突信息中的占位名
const INCLUDE_OWNER: &str = "<include>";

/// 把附加文件复制到工作目录（按文件名平铺）
///
/// 两个不同路径的附加文件同名时报错；同一路径重复出现只复制一次。
pub fn stage_includes(workdir: &Path, includes: &[PathBuf]) -> Result<Vec<PathBuf>, StageError> {
    let mut staged: HashMap<String, &Path> = HashMap::new();
    let mut copied = Vec::new();

    for include in includes {
        let name = include
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StageError::io(
                    include,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "不是文件路径"),
                )
            })?;

        match staged.get(&name) {
            Some(existing) if *existing == include.as_path() => continue,
            Some(existing) => {
                return Err(StageError::AttachmentCollision {
                    name,
                    first: existing.display().to_string(),
                    second: include.display().to_string(),
                })
            }
            None => {}
        }

        let dest = workdir.join(&name);
        debug!("复制 {} 到 {}", include.display(), dest.display());
        fs::copy(include, &dest).map_err(|e| StageError::io(include, e))?;
        staged.insert(name, include.as_path());
        copied.push(dest);
    }

    Ok(copied)
}

/// 一份试卷暂存到工作目录的附件
///
/// 离开作用域时删除所有已复制的附件，无论编译成功与否。
#[derive(Debug)]
pub struct StagedAttachments {
    files: Vec<PathBuf>,
}

impl StagedAttachments {
    /// 复制试卷中所有题目的附件
    ///
    /// 同一道题重复出现时附件只复制一次；不同题目的附件同名，
    /// 或与工作目录中已有文件同名时报错，不会覆盖。
    pub fn stage(workdir: &Path, sheet: &ResolvedSheet<'_>) -> AppResult<Self> {
        let mut staged = Self { files: Vec::new() };
        let mut owners: HashMap<String, String> = HashMap::new();

        for (problem, _) in sheet.problems() {
            for attachment in problem.attachments()? {
                match owners.get(&attachment.name) {
                    Some(owner) if owner == problem.id() => continue,
                    Some(owner) => {
                        return Err(StageError::AttachmentCollision {
                            name: attachment.name,
                            first: owner.clone(),
                            second: problem.id().to_string(),
                        }
                        .into())
                    }
                    None => {}
                }

                let dest = workdir.join(&attachment.name);
                if dest.exists() {
                    return Err(StageError::AttachmentCollision {
                        name: attachment.name,
                        first: INCLUDE_OWNER.to_string(),
                        second: problem.id().to_string(),
                    }
                    .into());
                }

                fs::copy(&attachment.path, &dest).map_err(|e| StageError::io(&attachment.path, e))?;
                staged.files.push(dest);
                owners.insert(attachment.name, problem.id().to_string());
            }
        }

        debug!("已暂存 {} 个附件", staged.files.len());
        Ok(staged)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Drop for StagedAttachments {
    fn drop(&mut self) {
        for file in self.files.drain(..) {
            if let Err(e) = fs::remove_file(&file) {
                debug!("删除暂存附件 {} 失败: {}", file.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ProblemEntry, Sheet};
    use crate::services::ProblemStore;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProblemStore) {
        let dir = TempDir::new().unwrap();
        let mut store = ProblemStore::open(dir.path()).unwrap();
        let fig = |name: &str| vec![(name.to_string(), b"img".to_vec())];
        store.new_problem("a", "A", "SA", &fig("fig.png")).unwrap();
        store.new_problem("b", "B", "SB", &fig("fig.png")).unwrap();
        store.new_problem("c", "C", "SC", &fig("other.png")).unwrap();
        (dir, store)
    }

    fn sheet(ids: &[&str]) -> Sheet {
        let mut sheet = Sheet::new("hw", None);
        for id in ids {
            sheet.problems.push(ProblemEntry::new(*id, None));
        }
        sheet
    }

    #[test]
    fn test_attachments_removed_on_drop() {
        let (_store_dir, store) = store();
        let workdir = TempDir::new().unwrap();
        let sheet = sheet(&["a", "c", "a"]);
        let resolved = store.resolve_sheet(&sheet).unwrap();

        let staged = StagedAttachments::stage(workdir.path(), &resolved).unwrap();
        assert_eq!(staged.files().len(), 2);
        assert!(workdir.path().join("fig.png").is_file());
        assert!(workdir.path().join("other.png").is_file());

        drop(staged);
        assert!(!workdir.path().join("fig.png").exists());
        assert!(!workdir.path().join("other.png").exists());
    }

    #[test]
    fn test_collision_is_reported_and_cleaned_up() {
        let (_store_dir, store) = store();
        let workdir = TempDir::new().unwrap();
        let sheet = sheet(&["c", "a", "b"]);
        let resolved = store.resolve_sheet(&sheet).unwrap();

        let err = StagedAttachments::stage(workdir.path(), &resolved).unwrap_err();
        assert!(matches!(
            err,
            AppError::Stage(StageError::AttachmentCollision { ref name, .. }) if name == "fig.png"
        ));
        assert!(!workdir.path().join("other.png").exists());
        assert!(!workdir.path().join("fig.png").exists());
    }

    #[test]
    fn test_collision_with_include() {
        let (_store_dir, store) = store();
        let workdir = TempDir::new().unwrap();
        fs::write(workdir.path().join("fig.png"), "include").unwrap();
        let sheet = sheet(&["a"]);
        let resolved = store.resolve_sheet(&sheet).unwrap();

        assert!(StagedAttachments::stage(workdir.path(), &resolved).is_err());
        assert_eq!(fs::read_to_string(workdir.path().join("fig.png")).unwrap(), "include");
    }

    #[test]
    fn test_stage_includes_dedupes_and_detects_collisions() {
        let src = TempDir::new().unwrap();
        let workdir = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("x")).unwrap();
        fs::write(src.path().join("preamble.sty"), "p").unwrap();
        fs::write(src.path().join("x").join("preamble.sty"), "q").unwrap();

        let one = src.path().join("preamble.sty");
        let copied = stage_includes(workdir.path(), &[one.clone(), one.clone()]).unwrap();
        assert_eq!(copied, vec![workdir.path().join("preamble.sty")]);

        let other = src.path().join("x").join("preamble.sty");
        let err = stage_includes(TempDir::new().unwrap().path(), &[one, other]).unwrap_err();
        assert!(matches!(err, StageError::AttachmentCollision { .. }));
    }
}
