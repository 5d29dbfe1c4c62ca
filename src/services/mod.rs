pub mod checker;
pub mod problem_store;

pub use checker::{apply_fixes, Checker, IssueKind, ProblemIssue, ReferenceKind};
pub use problem_store::ProblemStore;
