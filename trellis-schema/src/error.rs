//! Path-carrying validation errors.
//!
//! Every failure records where in the configuration tree it occurred, as a
//! chain of map keys and list indices. Callers wrap errors as they unwind so
//! the rendered message reads like `transform.input.cols[1]: cannot cast ...`.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;
use trellis_types::TypeError;

pub type Result<T> = std::result::Result<T, Box<Error>>;

/// One step in the location of a validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Field(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Field(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

impl From<&trellis_types::Value> for PathSegment {
    fn from(key: &trellis_types::Value) -> Self {
        PathSegment::Field(key.path_segment())
    }
}

/// A validation failure, located by its path in the configuration tree and
/// optionally by the resource being validated.
#[derive(Debug)]
pub struct Error {
    resource: Option<String>,
    path: Vec<PathSegment>,
    kind: ErrorKind,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Box<Self> {
        Box::new(Error {
            resource: None,
            path: Vec::new(),
            kind,
        })
    }

    /// Prepends a path segment; used while unwinding out of a recursion.
    pub fn wrap(mut self: Box<Self>, segment: impl Into<PathSegment>) -> Box<Self> {
        self.path.insert(0, segment.into());
        self
    }

    /// Attaches the identity of the resource under validation, e.g.
    /// `pipeline.yaml: aggregate: class_boundaries`. The first identity
    /// attached is kept; outer callers do not overwrite it.
    pub fn wrap_resource(mut self: Box<Self>, identity: impl Into<String>) -> Box<Self> {
        if self.resource.is_none() {
            self.resource = Some(identity.into());
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    fn rendered_path(&self) -> Option<String> {
        if self.path.is_empty() {
            return None;
        }
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(i) => {
                    out.push_str(&format!("[{i}]"));
                }
            }
        }
        Some(out)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(resource) = &self.resource {
            write!(f, "{resource}: ")?;
        }
        if let Some(path) = self.rendered_path() {
            write!(f, "{path}: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.help()
    }
}

impl From<TypeError> for Box<Error> {
    fn from(err: TypeError) -> Self {
        Error::new(ErrorKind::Type(err))
    }
}

/// Adds path wrapping directly on `Result`, so recursion sites read
/// `cast(...).wrap_path(key)?`.
pub trait WrapPath {
    fn wrap_path(self, segment: impl Into<PathSegment>) -> Self;
}

impl<T> WrapPath for Result<T> {
    fn wrap_path(self, segment: impl Into<PathSegment>) -> Self {
        self.map_err(|err| err.wrap(segment))
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ErrorKind {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeError),

    #[error("invalid input schema: {value}")]
    #[diagnostic(
        code(trellis::schema::invalid_input_type),
        help("a type schema is a type string, a one-element list, or a non-empty map")
    )]
    InvalidInputType { value: String },

    #[error("invalid output type: {value}")]
    #[diagnostic(code(trellis::schema::invalid_output_type))]
    InvalidOutputType { value: String },

    #[error("column types are not allowed here: \"{token}\"")]
    #[diagnostic(code(trellis::schema::column_type_in_output))]
    ColumnTypeInOutputType { token: String },

    #[error("compound types are not allowed here: \"{token}\"")]
    #[diagnostic(code(trellis::schema::compound_type_in_output))]
    CompoundTypeInOutputType { token: String },

    #[error("a type list must contain exactly one element")]
    #[diagnostic(code(trellis::schema::type_list_length))]
    TypeListLength,

    #[error("a type map must contain at least one entry")]
    #[diagnostic(code(trellis::schema::type_map_zero_length))]
    TypeMapZeroLength,

    #[error("a generic type map must contain exactly one entry")]
    #[diagnostic(code(trellis::schema::generic_type_map_length))]
    GenericTypeMapLength,

    #[error("map keys cannot start with \"_\": \"{key}\"")]
    #[diagnostic(code(trellis::schema::underscore_key))]
    UserKeysCannotStartWithUnderscore { key: String },

    #[error("option keys and user keys cannot be mixed in the same map")]
    #[diagnostic(code(trellis::schema::mixed_options_and_user_keys))]
    MixedOptionsAndUserKeys,

    #[error("unknown option: \"{key}\"")]
    #[diagnostic(
        code(trellis::schema::unknown_option),
        help("valid options are _type, _optional, _default, _min_count, and _max_count")
    )]
    UnknownOptionKey { key: String },

    #[error("cannot be null")]
    #[diagnostic(code(trellis::schema::cannot_be_null))]
    CannotBeNull,

    #[error("{value} is not a {expected}")]
    #[diagnostic(code(trellis::schema::invalid_primitive))]
    InvalidPrimitiveType { value: String, expected: String },

    #[error("{value} must be greater than or equal to {limit}")]
    #[diagnostic(code(trellis::schema::below_limit))]
    MustBeGreaterThanOrEqualTo { value: String, limit: String },

    #[error("\"{key}\" is only allowed on list and generic map schemas")]
    #[diagnostic(code(trellis::schema::option_on_non_iterable))]
    OptionOnNonIterable { key: String },

    #[error("_min_count cannot be greater than _max_count")]
    #[diagnostic(code(trellis::schema::min_greater_than_max))]
    MinCountGreaterThanMaxCount,

    #[error("must be defined")]
    #[diagnostic(code(trellis::schema::must_be_defined))]
    MustBeDefined,

    #[error("unsupported literal {value} for type {schema}")]
    #[diagnostic(code(trellis::schema::unsupported_literal))]
    UnsupportedLiteralType { value: String, schema: String },

    #[error("map key {key} is not allowed here")]
    #[diagnostic(code(trellis::schema::unsupported_map_key))]
    UnsupportedLiteralMapKey { key: String },

    #[error("output type {output} does not satisfy {schema}")]
    #[diagnostic(code(trellis::schema::unsupported_output_type))]
    UnsupportedOutputType { output: String, schema: String },

    #[error("{kind} must contain at least {min} elements")]
    #[diagnostic(code(trellis::schema::too_few_elements))]
    TooFewElements { kind: &'static str, min: i64 },

    #[error("{kind} must contain at most {max} elements")]
    #[diagnostic(code(trellis::schema::too_many_elements))]
    TooManyElements { kind: &'static str, max: i64 },

    #[error("undefined resource \"{name}\" (expected {allowed})")]
    #[diagnostic(code(trellis::graph::undefined_resource))]
    UndefinedResource { name: String, allowed: String },

    #[error("resource \"{name}\" is a {actual}, but only {allowed} may be referenced here")]
    #[diagnostic(code(trellis::graph::wrong_resource_kind))]
    WrongResourceKind {
        name: String,
        actual: String,
        allowed: String,
    },

    #[error("duplicate resource name: \"{name}\"")]
    #[diagnostic(code(trellis::graph::duplicate_resource_name))]
    DuplicateResourceName { name: String },

    #[error("undefined {kind}: \"{name}\"")]
    #[diagnostic(code(trellis::graph::undefined_function))]
    UndefinedFunction { kind: &'static str, name: String },

    #[error("internal error: {detail}")]
    #[diagnostic(code(trellis::internal))]
    Internal { detail: String },
}
