//! Validated schema representations.
//!
//! An [`InputSchema`] describes what a function input may look like: the
//! shape of the value ([`TypeSchema`]) plus per-position options (optional,
//! default, element-count bounds). An [`OutputType`] describes what a
//! resource produces; it carries no options and no compound alternatives.

use std::fmt;

use indexmap::IndexMap;
use trellis_types::{ColumnType, CompoundType, Value, ValueType};

/// A type shape plus position options, produced by
/// [`InputSchema::validate`](crate::input) from a raw declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSchema {
    pub type_schema: TypeSchema,
    pub optional: bool,
    pub default: Option<Value>,
    pub min_count: Option<i64>,
    pub max_count: Option<i64>,
}

impl InputSchema {
    /// A schema with no options set.
    pub fn bare(type_schema: TypeSchema) -> Self {
        InputSchema {
            type_schema,
            optional: false,
            default: None,
            min_count: None,
            max_count: None,
        }
    }
}

/// The shape part of an input schema.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSchema {
    /// A scalar or column compound, e.g. `FLOAT|INT` or `INT_COLUMN`.
    Compound(CompoundType),
    /// A homogeneous list; the element schema may carry its own options.
    List(Box<InputSchema>),
    /// A map with a fixed set of literal keys.
    FixedMap(IndexMap<Value, InputSchema>),
    /// A map whose keys all satisfy one compound and whose values all
    /// satisfy one schema.
    GenericMap {
        key: CompoundType,
        value: Box<InputSchema>,
    },
}

impl fmt::Display for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSchema::Compound(ct) => write!(f, "{ct}"),
            TypeSchema::List(element) => write!(f, "[{}]", element.type_schema),
            TypeSchema::FixedMap(entries) => {
                write!(f, "{{")?;
                for (i, (key, schema)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {}", schema.type_schema)?;
                }
                write!(f, "}}")
            }
            TypeSchema::GenericMap { key, value } => {
                write!(f, "{{{key}: {}}}", value.type_schema)
            }
        }
    }
}

/// A validated output type declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputType {
    Value(ValueType),
    Column(ColumnType),
    List(Box<OutputType>),
    FixedMap(IndexMap<Value, OutputType>),
    GenericMap {
        key: ValueType,
        value: Box<OutputType>,
    },
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Value(vt) => write!(f, "{vt}"),
            OutputType::Column(ct) => write!(f, "{ct}"),
            OutputType::List(element) => write!(f, "[{element}]"),
            OutputType::FixedMap(entries) => {
                write!(f, "{{")?;
                for (i, (key, out)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {out}")?;
                }
                write!(f, "}}")
            }
            OutputType::GenericMap { key, value } => write!(f, "{{{key}: {value}}}"),
        }
    }
}
