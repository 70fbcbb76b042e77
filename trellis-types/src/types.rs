//! Scalar and column type tokens, plus the resource taxonomy.

use std::fmt;

use crate::Value;

/// A scalar literal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Int,
    Float,
    String,
    Bool,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "INT",
            ValueType::Float => "FLOAT",
            ValueType::String => "STRING",
            ValueType::Bool => "BOOL",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "INT" => Some(ValueType::Int),
            "FLOAT" => Some(ValueType::Float),
            "STRING" => Some(ValueType::String),
            "BOOL" => Some(ValueType::Bool),
            _ => None,
        }
    }

    /// The scalar type of a literal leaf, if it is one.
    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::String(_) => Some(ValueType::String),
            Value::Bool(_) => Some(ValueType::Bool),
            _ => None,
        }
    }

    /// Exact match, plus the single permitted widening: INT literals are
    /// accepted where FLOAT is expected.
    pub fn cast_value(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ValueType::Int, Value::Int(n)) => Some(Value::Int(*n)),
            (ValueType::Float, Value::Float(x)) => Some(Value::Float(*x)),
            (ValueType::Float, Value::Int(n)) => Some(Value::Float(*n as f64)),
            (ValueType::String, Value::String(s)) => Some(Value::String(s.clone())),
            (ValueType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column type produced by a column-valued resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    IntColumn,
    FloatColumn,
    StringColumn,
    IntListColumn,
    FloatListColumn,
    StringListColumn,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::IntColumn => "INT_COLUMN",
            ColumnType::FloatColumn => "FLOAT_COLUMN",
            ColumnType::StringColumn => "STRING_COLUMN",
            ColumnType::IntListColumn => "INT_LIST_COLUMN",
            ColumnType::FloatListColumn => "FLOAT_LIST_COLUMN",
            ColumnType::StringListColumn => "STRING_LIST_COLUMN",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "INT_COLUMN" => Some(ColumnType::IntColumn),
            "FLOAT_COLUMN" => Some(ColumnType::FloatColumn),
            "STRING_COLUMN" => Some(ColumnType::StringColumn),
            "INT_LIST_COLUMN" => Some(ColumnType::IntListColumn),
            "FLOAT_LIST_COLUMN" => Some(ColumnType::FloatListColumn),
            "STRING_LIST_COLUMN" => Some(ColumnType::StringListColumn),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight resource kinds a pipeline may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    PythonPackage,
    RawColumn,
    Constant,
    Aggregate,
    TransformedColumn,
    Model,
    TrainingDataset,
    Api,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::PythonPackage => "python_package",
            ResourceKind::RawColumn => "raw_column",
            ResourceKind::Constant => "constant",
            ResourceKind::Aggregate => "aggregate",
            ResourceKind::TransformedColumn => "transformed_column",
            ResourceKind::Model => "model",
            ResourceKind::TrainingDataset => "training_dataset",
            ResourceKind::Api => "api",
        }
    }

    /// Directory under the storage root where artifacts of this kind live.
    pub fn dir(&self) -> &'static str {
        match self {
            ResourceKind::PythonPackage => "python_packages",
            ResourceKind::RawColumn => "raw_columns",
            ResourceKind::Constant => "constants",
            ResourceKind::Aggregate => "aggregates",
            ResourceKind::TransformedColumn => "transformed_columns",
            ResourceKind::Model => "models",
            ResourceKind::TrainingDataset => "training_datasets",
            ResourceKind::Api => "apis",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_round_trip() {
        for vt in [ValueType::Int, ValueType::Float, ValueType::String, ValueType::Bool] {
            assert_eq!(ValueType::parse(vt.as_str()), Some(vt));
        }
        assert_eq!(ValueType::parse("INT_COLUMN"), None);
    }

    #[test]
    fn test_cast_widens_int_to_float_only() {
        assert_eq!(
            ValueType::Float.cast_value(&Value::Int(2)),
            Some(Value::Float(2.0))
        );
        assert_eq!(ValueType::Int.cast_value(&Value::Float(2.0)), None);
        assert_eq!(ValueType::String.cast_value(&Value::Int(2)), None);
        assert_eq!(ValueType::Bool.cast_value(&Value::Null), None);
    }

    #[test]
    fn test_column_type_round_trip() {
        for ct in [
            ColumnType::IntColumn,
            ColumnType::FloatColumn,
            ColumnType::StringColumn,
            ColumnType::IntListColumn,
            ColumnType::FloatListColumn,
            ColumnType::StringListColumn,
        ] {
            assert_eq!(ColumnType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ColumnType::parse("FLOAT"), None);
    }
}
