//! Test specification parsing
//!
//! Turns raw test text (typed into a field or loaded from a file) into
//! structured argument rows the execution service understands.

mod file;
mod literal;

pub use file::{load_test_file, parse_test_file, TestFile};
pub use literal::{parse_field, parse_field_partial, parse_line, FieldParse, TestCase};
