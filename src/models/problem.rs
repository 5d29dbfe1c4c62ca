use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const QUESTION_FILE: &str = "problem.tex";
pub const SOLUTION_FILE: &str = "solution.tex";
pub const ATTACHMENT_DIR: &str = "attach";

/// 题目附件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
}

/// 题库中的一道题
///
/// 只记录题目所在目录，题干和答案在需要时才从磁盘读取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    id: String,
    dir: PathBuf,
}

impl Problem {
    pub(crate) fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn question_path(&self) -> PathBuf {
        self.dir.join(QUESTION_FILE)
    }

    pub fn solution_path(&self) -> PathBuf {
        self.dir.join(SOLUTION_FILE)
    }

    pub fn attachment_dir(&self) -> PathBuf {
        self.dir.join(ATTACHMENT_DIR)
    }

    /// 读取题干
    pub fn get_question(&self) -> Result<String, StoreError> {
        self.read_text(self.question_path())
    }

    /// 读取答案
    pub fn get_solution(&self) -> Result<String, StoreError> {
        self.read_text(self.solution_path())
    }

    fn read_text(&self, path: PathBuf) -> Result<String, StoreError> {
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::MissingText {
                id: self.id.clone(),
                path,
            }),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// 列出所有附件，按文件名排序；没有附件目录时返回空列表
    pub fn attachments(&self) -> Result<Vec<Attachment>, StoreError> {
        let dir = self.attachment_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut attachments = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            if path.is_file() {
                attachments.push(Attachment {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path,
                });
            }
        }
        attachments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(attachments)
    }

    pub fn has_attachment(&self, name: &str) -> bool {
        !name.is_empty() && !name.contains("..") && self.attachment_dir().join(name).is_file()
    }
}
