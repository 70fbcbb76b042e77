//! The untyped configuration tree.
//!
//! Every pipeline declaration arrives as a [`Value`]: a closed union over the
//! node kinds an external parser can produce. All validation and casting in
//! the sibling crates pattern-matches this union exhaustively instead of
//! downcasting a dynamic type.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

/// A dynamically-typed configuration tree node.
///
/// Map keys may be any scalar (not only strings), so `Value` itself is the
/// key type; equality and hashing are defined below to make that possible.
/// `Ref` is a symbolic reference to another declared resource (`@name` in the
/// source syntax); only the reference resolver interprets it.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Ref(String),
}

impl Value {
    /// Returns true for bool/int/float/string leaves.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Short name of the node kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Ref(_) => "reference",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Rendering used when a map key becomes an error-path segment: strings
    /// appear bare, everything else as its display form.
    pub fn path_segment(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::List(items) => items.hash(state),
            Value::Map(entries) => {
                // Order-independent, to stay consistent with IndexMap equality.
                let mut combined: u64 = 0;
                for entry in entries {
                    let mut hasher = DefaultHasher::new();
                    entry.hash(&mut hasher);
                    combined = combined.wrapping_add(hasher.finish());
                }
                state.write_u64(combined);
                entries.len().hash(state);
            }
            Value::Ref(name) => name.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, val)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {val}")?;
                }
                write!(f, "}}")
            }
            Value::Ref(name) => write!(f, "@{name}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_int_keys_are_distinct() {
        let mut map = IndexMap::new();
        map.insert(Value::Int(2), Value::from("int"));
        map.insert(Value::Float(2.0), Value::from("float"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::Int(2)), Some(&Value::from("int")));
        assert_eq!(map.get(&Value::Float(2.0)), Some(&Value::from("float")));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let mut a = IndexMap::new();
        a.insert(Value::from("x"), Value::Int(1));
        a.insert(Value::from("y"), Value::Int(2));
        let mut b = IndexMap::new();
        b.insert(Value::from("y"), Value::Int(2));
        b.insert(Value::from("x"), Value::Int(1));
        assert_eq!(Value::Map(a), Value::Map(b));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::from("test").to_string(), "\"test\"");
        assert_eq!(Value::Ref("col".to_string()).to_string(), "@col");
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
    }

    #[test]
    fn test_path_segment_strips_quotes() {
        assert_eq!(Value::from("mean").path_segment(), "mean");
        assert_eq!(Value::Int(2).path_segment(), "2");
    }
}
