pub mod spec_parser;
pub mod special_keys;

pub use spec_parser::{parse_problem_entry, SpecFile, SpecParser};
pub use special_keys::{handler_for, KeyHandler};
