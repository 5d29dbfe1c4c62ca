pub mod formatter;
pub mod metadata;
pub mod mode;
pub mod problem;
pub mod sheet;
pub mod template;

pub use formatter::{Formatter, Formatters, Mark, MARK_FORMATTER};
pub use metadata::Metadata;
pub use mode::{CompileMode, RenderMode};
pub use problem::{Attachment, Problem};
pub use sheet::{ProblemEntry, RenderLayout, ResolvedSheet, Sheet};
pub use template::{Template, PROBLEMS_FIELD};
