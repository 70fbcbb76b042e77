//! Core value and type model for trellis pipelines.
//!
//! This crate defines the dynamically-typed configuration tree ([`Value`]),
//! the scalar and column type tokens, compound type expressions, and the YAML
//! ingestion boundary. Validation and casting against schemas live in
//! `trellis-schema`; resource graphs live in `trellis-graph`.

mod compound;
mod error;
mod types;
mod value;
mod yaml;

pub use compound::{CompoundType, MemberType};
pub use error::TypeError;
pub use types::{ColumnType, ResourceKind, ValueType};
pub use value::Value;
pub use yaml::from_yaml_str;
