//! 题目检查服务 - 业务能力层
//!
//! 扫描题干和答案中的 `\includegraphics{...}` 与 `\input{...}`，
//! 检查引用的文件是否存在于题目附件中。检查本身只读；
//! `apply_fixes` 修复其中能自动处理的问题。

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::Problem;
use crate::services::problem_store::ProblemStore;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\includegraphics(?:\[[^\]]*\])?\{(?P<figure>[^}]+)\}|\\input\{(?P<input>[^}]+)\}",
    )
    .expect("reference pattern is valid")
});

/// 被引用文件的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Figure,
    Input,
}

impl ReferenceKind {
    fn label(self) -> &'static str {
        match self {
            ReferenceKind::Figure => "图片",
            ReferenceKind::Input => "输入文件",
        }
    }
}

/// 检查发现的问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// 附件中找不到引用的文件
    MissingAttachment { reference: ReferenceKind, name: String },
    /// 附件存在，但正文引用时带了目录，需要改名
    NeedsRename {
        reference: ReferenceKind,
        required: String,
        available: String,
    },
    /// 路径中有未展开的 TeX 宏
    UnexpandedMacro { reference: ReferenceKind, name: String },
    /// 缺少题干文件
    MissingQuestion,
    /// 缺少答案文件
    MissingSolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemIssue {
    pub problem_id: String,
    #[serde(flatten)]
    pub kind: IssueKind,
    pub description: String,
}

/// 题目检查服务
pub struct Checker<'a> {
    store: &'a ProblemStore,
}

impl<'a> Checker<'a> {
    pub fn new(store: &'a ProblemStore) -> Self {
        Self { store }
    }

    /// 检查题库中的全部题目
    pub fn check_all(&self) -> Result<Vec<ProblemIssue>, StoreError> {
        let mut issues = Vec::new();
        for problem in self.store.list_problems() {
            issues.extend(self.check_problem(problem)?);
        }
        Ok(issues)
    }

    /// 检查指定 ID 的题目
    pub fn check_ids(&self, ids: &[String]) -> Result<Vec<ProblemIssue>, StoreError> {
        let mut issues = Vec::new();
        for id in ids {
            issues.extend(self.check_problem(self.store.get_problem(id)?)?);
        }
        Ok(issues)
    }

    /// 检查一道题目的题干和答案
    pub fn check_problem(&self, problem: &Problem) -> Result<Vec<ProblemIssue>, StoreError> {
        let mut issues = Vec::new();

        match problem.get_question() {
            Ok(text) => self.check_text(problem, &text, &mut issues),
            Err(StoreError::MissingText { .. }) => issues.push(ProblemIssue {
                problem_id: problem.id().to_string(),
                kind: IssueKind::MissingQuestion,
                description: format!("题目 {} 缺少题干文件", problem.id()),
            }),
            Err(e) => return Err(e),
        }

        match problem.get_solution() {
            Ok(text) => self.check_text(problem, &text, &mut issues),
            Err(StoreError::MissingText { .. }) => issues.push(ProblemIssue {
                problem_id: problem.id().to_string(),
                kind: IssueKind::MissingSolution,
                description: format!("题目 {} 缺少答案文件", problem.id()),
            }),
            Err(e) => return Err(e),
        }

        Ok(issues)
    }

    fn check_text(&self, problem: &Problem, text: &str, issues: &mut Vec<ProblemIssue>) {
        for caps in REFERENCE.captures_iter(text) {
            let (reference, name) = match (caps.name("figure"), caps.name("input")) {
                (Some(m), _) => (ReferenceKind::Figure, m.as_str().trim()),
                (None, Some(m)) => (ReferenceKind::Input, m.as_str().trim()),
                (None, None) => continue,
            };
            debug!("题目 {} 引用了{} {}", problem.id(), reference.label(), name);

            if let Some(issue) = check_reference(problem, reference, name) {
                issues.push(issue);
            }
        }
    }
}

fn check_reference(problem: &Problem, reference: ReferenceKind, name: &str) -> Option<ProblemIssue> {
    if attachment_matches(problem, name) {
        return None;
    }

    let id = problem.id();
    let basename = name.rsplit('/').next().unwrap_or(name);
    let first = name.split('/').next().unwrap_or(name);

    let (kind, description) = if basename != name && attachment_matches(problem, basename) {
        (
            IssueKind::NeedsRename {
                reference,
                required: name.to_string(),
                available: basename.to_string(),
            },
            format!(
                "题目 {} 有附件 \"{}\"，但正文引用的是 \"{}\"",
                id, basename, name
            ),
        )
    } else if first.starts_with('\\') {
        (
            IssueKind::UnexpandedMacro {
                reference,
                name: name.to_string(),
            },
            format!(
                "题目 {} 引用的{} \"{}\" 含有未展开的 TeX 宏",
                id,
                reference.label(),
                name
            ),
        )
    } else {
        (
            IssueKind::MissingAttachment {
                reference,
                name: name.to_string(),
            },
            format!(
                "题目 {} 引用的{} \"{}\" 不在附件中",
                id,
                reference.label(),
                name
            ),
        )
    };

    Some(ProblemIssue {
        problem_id: id.to_string(),
        kind,
        description,
    })
}

/// 修复检查发现的问题，返回无法自动修复的问题
///
/// - `NeedsRename`：把题干和答案中的引用改为实际存在的附件名
/// - `MissingQuestion` / `MissingSolution`：写入空文件
pub fn apply_fixes(
    store: &mut ProblemStore,
    issues: &[ProblemIssue],
) -> Result<Vec<ProblemIssue>, StoreError> {
    let mut unfixed = Vec::new();
    for issue in issues {
        let id = issue.problem_id.as_str();
        match &issue.kind {
            IssueKind::NeedsRename {
                required,
                available,
                ..
            } => {
                replace_in_texts(store, id, required, available)?;
                info!("🔧 题目 {}: \"{}\" 改为 \"{}\"", id, required, available);
            }
            IssueKind::MissingQuestion => {
                store.update_question(id, "")?;
                info!("🔧 题目 {}: 创建空的题干文件", id);
            }
            IssueKind::MissingSolution => {
                store.update_solution(id, "")?;
                info!("🔧 题目 {}: 创建空的答案文件", id);
            }
            IssueKind::MissingAttachment { .. } | IssueKind::UnexpandedMacro { .. } => {
                unfixed.push(issue.clone())
            }
        }
    }
    Ok(unfixed)
}

fn replace_in_texts(
    store: &mut ProblemStore,
    id: &str,
    from: &str,
    to: &str,
) -> Result<(), StoreError> {
    let problem = store.get_problem(id)?.clone();

    match problem.get_question() {
        Ok(text) if text.contains(from) => store.update_question(id, &text.replace(from, to))?,
        Ok(_) | Err(StoreError::MissingText { .. }) => {}
        Err(e) => return Err(e),
    }
    match problem.get_solution() {
        Ok(text) if text.contains(from) => store.update_solution(id, &text.replace(from, to))?,
        Ok(_) | Err(StoreError::MissingText { .. }) => {}
        Err(e) => return Err(e),
    }
    Ok(())
}

/// TeX 允许省略扩展名，因此 `fig` 也能匹配附件 `fig.png`
fn attachment_matches(problem: &Problem, name: &str) -> bool {
    if problem.has_attachment(name) {
        return true;
    }
    problem
        .attachments()
        .map(|attachments| {
            attachments.iter().any(|a| {
                std::path::Path::new(&a.name)
                    .file_stem()
                    .is_some_and(|stem| stem == name)
            })
        })
        .unwrap_or(false)
}
