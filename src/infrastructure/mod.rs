pub mod compiler;
pub mod staging;

pub use compiler::{Compiler, PassOutput};
pub use staging::{stage_includes, StagedAttachments};
