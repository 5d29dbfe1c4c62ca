//! 题库 - 业务能力层
//!
//! 目录结构：`<root>/<id>/{problem.tex, solution.tex, attach/}`

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::problem::{ATTACHMENT_DIR, QUESTION_FILE, SOLUTION_FILE};
use crate::models::{Problem, ResolvedSheet, Sheet};

/// 基于目录的题库
///
/// 打开时扫描一次根目录；编译期间只读借用，
/// 增删题目需要可变借用，因此不会和正在进行的编译同时发生。
#[derive(Debug)]
pub struct ProblemStore {
    root: PathBuf,
    problems: BTreeMap<String, Problem>,
}

impl ProblemStore {
    /// 打开题库，根目录不存在时创建
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        let mut problems = BTreeMap::new();
        for entry in fs::read_dir(&root).map_err(|e| StoreError::io(&root, e))? {
            let entry = entry.map_err(|e| StoreError::io(&root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            if is_valid_id(&id) {
                problems.insert(id.clone(), Problem::new(id, path));
            }
        }

        debug!("题库 {} 中共有 {} 道题目", root.display(), problems.len());
        Ok(Self { root, problems })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.problems.contains_key(id)
    }

    /// 获取题目，不存在时返回 `NotFound`
    pub fn get_problem(&self, id: &str) -> Result<&Problem, StoreError> {
        self.problems
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// 按 ID 顺序列出所有题目
    pub fn list_problems(&self) -> impl Iterator<Item = &Problem> {
        self.problems.values()
    }

    /// 把试卷中的题目 ID 解析为本题库中的题目
    pub fn resolve_sheet<'a>(&'a self, sheet: &'a Sheet) -> Result<ResolvedSheet<'a>, StoreError> {
        sheet.resolve(|id| self.get_problem(id))
    }

    /// 新建题目
    ///
    /// `attachments` 为 (文件名, 内容) 列表。
    pub fn new_problem(
        &mut self,
        id: &str,
        question: &str,
        solution: &str,
        attachments: &[(String, Vec<u8>)],
    ) -> Result<&Problem, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        if let Some((name, _)) = attachments
            .iter()
            .find(|(name, _)| !is_valid_attachment_name(name))
        {
            return Err(StoreError::InvalidAttachmentName(name.clone()));
        }
        let dir = self.root.join(id);
        if self.contains(id) || dir.exists() {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        if let Err(e) = write_problem_files(&dir, question, solution, attachments) {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                debug!("清理未完成的题目目录 {} 失败: {}", dir.display(), cleanup);
            }
            return Err(e);
        }

        info!("✓ 新建题目 {} ({} 个附件)", id, attachments.len());
        let problem = self
            .problems
            .entry(id.to_string())
            .or_insert_with(|| Problem::new(id, dir));
        Ok(problem)
    }

    /// 覆盖题干
    pub fn update_question(&mut self, id: &str, text: &str) -> Result<(), StoreError> {
        let path = self.get_problem(id)?.question_path();
        write_file(&path, text.as_bytes())?;
        debug!("更新题目 {} 的题干", id);
        Ok(())
    }

    /// 覆盖答案
    pub fn update_solution(&mut self, id: &str, text: &str) -> Result<(), StoreError> {
        let path = self.get_problem(id)?.solution_path();
        write_file(&path, text.as_bytes())?;
        debug!("更新题目 {} 的答案", id);
        Ok(())
    }

    /// 删除题目及其所有文件
    pub fn remove_problem(&mut self, id: &str) -> Result<(), StoreError> {
        let problem = self
            .problems
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        fs::remove_dir_all(problem.dir()).map_err(|e| StoreError::io(problem.dir(), e))?;
        info!("🗑️ 已删除题目 {}", id);
        Ok(())
    }
}

fn write_problem_files(
    dir: &Path,
    question: &str,
    solution: &str,
    attachments: &[(String, Vec<u8>)],
) -> Result<(), StoreError> {
    write_file(&dir.join(QUESTION_FILE), question.as_bytes())?;
    write_file(&dir.join(SOLUTION_FILE), solution.as_bytes())?;

    if !attachments.is_empty() {
        let attach_dir = dir.join(ATTACHMENT_DIR);
        fs::create_dir_all(&attach_dir).map_err(|e| StoreError::io(&attach_dir, e))?;
        for (name, data) in attachments {
            write_file(&attach_dir.join(name), data)?;
        }
    }
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    fs::write(path, data).map_err(|e| StoreError::io(path, e))
}

/// 题目 ID 只允许字母、数字、`_`、`-`、`.`，且不能以 `.` 开头
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_valid_attachment_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
