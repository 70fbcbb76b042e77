//! YAML ingestion into the [`Value`] tree.

use indexmap::IndexMap;

use crate::error::TypeError;
use crate::Value;

/// Parses a YAML document into a [`Value`] tree.
///
/// Strings of the form `@name` become [`Value::Ref`] nodes; any other string
/// starting with `@` is rejected rather than silently treated as a literal.
pub fn from_yaml_str(src: &str) -> Result<Value, TypeError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(src)?;
    convert(doc)
}

fn convert(node: serde_yaml::Value) -> Result<Value, TypeError> {
    match node {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(x) = n.as_f64() {
                Ok(Value::Float(x))
            } else {
                Err(TypeError::UnsupportedNode {
                    kind: format!("number {n}"),
                })
            }
        }
        serde_yaml::Value::String(s) => convert_string(s),
        serde_yaml::Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(convert(item)?);
            }
            Ok(Value::List(out))
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut out = IndexMap::with_capacity(mapping.len());
            for (key, val) in mapping {
                out.insert(convert(key)?, convert(val)?);
            }
            Ok(Value::Map(out))
        }
        serde_yaml::Value::Tagged(tagged) => Err(TypeError::UnsupportedNode {
            kind: format!("tagged node {}", tagged.tag),
        }),
    }
}

fn convert_string(s: String) -> Result<Value, TypeError> {
    match s.strip_prefix('@') {
        None => Ok(Value::String(s)),
        Some(rest) => {
            if !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                Ok(Value::Ref(rest.to_string()))
            } else {
                Err(TypeError::MalformedReference {
                    raw: rest.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_and_collections() {
        let v = from_yaml_str("{a: 1, b: 2.5, c: [true, test, null]}").unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map.get(&Value::from("a")), Some(&Value::Int(1)));
        assert_eq!(map.get(&Value::from("b")), Some(&Value::Float(2.5)));
        assert_eq!(
            map.get(&Value::from("c")),
            Some(&Value::List(vec![
                Value::Bool(true),
                Value::from("test"),
                Value::Null
            ]))
        );
    }

    #[test]
    fn test_non_string_map_keys() {
        let v = from_yaml_str("{1: a, 2.5: b}").unwrap();
        let map = v.as_map().unwrap();
        assert!(map.contains_key(&Value::Int(1)));
        assert!(map.contains_key(&Value::Float(2.5)));
    }

    #[test]
    fn test_reference_strings() {
        assert_eq!(
            from_yaml_str("\"@class\"").unwrap(),
            Value::Ref("class".to_string())
        );
        assert!(matches!(
            from_yaml_str("\"@bad name\""),
            Err(TypeError::MalformedReference { .. })
        ));
        assert!(matches!(
            from_yaml_str("\"@\""),
            Err(TypeError::MalformedReference { .. })
        ));
    }
}
