//! Schema validation, literal casting, and output type matching.

mod error;
mod input;
mod matcher;
mod output;
mod schema;

pub use error::{Error, ErrorKind, PathSegment, Result, WrapPath};
pub use input::cast_input_default;
pub use matcher::check_output_type;
pub use output::cast_constant;
pub use schema::{InputSchema, OutputType, TypeSchema};
