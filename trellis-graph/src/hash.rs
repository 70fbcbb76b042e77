//! Content hashing.
//!
//! Resource IDs are SHA-256 hex digests over canonical renderings of the
//! inputs that determine a resource's output. The canonical rendering tags
//! every leaf with its type and length-prefixes strings, so distinct values
//! can never collide textually (`1` vs `1.0` vs `"1"`), and sorts map entries
//! so insertion order never leaks into an ID.

use sha2::{Digest, Sha256};
use trellis_types::Value;

pub fn bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn string(s: &str) -> String {
    bytes(s.as_bytes())
}

pub fn value(v: &Value) -> String {
    string(&canonical(v))
}

/// Hashes the concatenation of several already-computed IDs.
pub fn combine<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for part in parts {
        joined.push_str(part);
    }
    string(&joined)
}

fn canonical(v: &Value) -> String {
    match v {
        Value::Null => "n".to_string(),
        Value::Bool(b) => format!("b:{b}"),
        Value::Int(n) => format!("i:{n}"),
        Value::Float(x) => format!("f:{x:?}"),
        Value::String(s) => format!("s:{}:{}", s.len(), s),
        Value::Ref(name) => format!("r:{}:{}", name.len(), name),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(canonical).collect();
            format!("l:[{}]", rendered.join(","))
        }
        Value::Map(entries) => {
            let mut rendered: Vec<String> = entries
                .iter()
                .map(|(k, val)| format!("{}={}", canonical(k), canonical(val)))
                .collect();
            rendered.sort();
            format!("m:{{{}}}", rendered.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn test_distinct_leaf_types_hash_differently() {
        assert_ne!(value(&Value::Int(1)), value(&Value::Float(1.0)));
        assert_ne!(value(&Value::Int(1)), value(&Value::from("1")));
        assert_ne!(value(&Value::from("true")), value(&Value::Bool(true)));
        assert_ne!(value(&Value::from("col")), value(&Value::Ref("col".into())));
    }

    #[test]
    fn test_string_lengths_prevent_joining_ambiguity() {
        let a = Value::List(vec![Value::from("ab"), Value::from("c")]);
        let b = Value::List(vec![Value::from("a"), Value::from("bc")]);
        assert_ne!(value(&a), value(&b));
    }

    #[test]
    fn test_map_hash_ignores_insertion_order() {
        let mut x = IndexMap::new();
        x.insert(Value::from("a"), Value::Int(1));
        x.insert(Value::from("b"), Value::Int(2));
        let mut y = IndexMap::new();
        y.insert(Value::from("b"), Value::Int(2));
        y.insert(Value::from("a"), Value::Int(1));
        assert_eq!(value(&Value::Map(x)), value(&Value::Map(y)));
    }

    #[test]
    fn test_digest_is_stable() {
        // pinned so IDs stay comparable across releases
        assert_eq!(
            string("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
