//! Input schema validation and default-value casting.
//!
//! A raw schema declaration is one of:
//!   * a type string: `"FLOAT|INT"`,
//!   * a one-element list: `["STRING"]`,
//!   * a map of fixed keys to schemas: `{mean: FLOAT, count: INT}`,
//!   * a generic map with a single compound key: `{STRING: FLOAT}`,
//!   * an option map: `{_type: ..., _optional: true, _default: ..., _min_count: 1, _max_count: 3}`.
//!
//! Option maps and user maps never mix; option keys never take explicit null.

use indexmap::IndexMap;
use trellis_types::{CompoundType, Value};

use crate::error::{Error, ErrorKind, Result, WrapPath};
use crate::schema::{InputSchema, TypeSchema};

const TYPE_KEY: &str = "_type";
const OPTIONAL_KEY: &str = "_optional";
const DEFAULT_KEY: &str = "_default";
const MIN_COUNT_KEY: &str = "_min_count";
const MAX_COUNT_KEY: &str = "_max_count";

const OPTION_KEYS: [&str; 5] = [
    TYPE_KEY,
    OPTIONAL_KEY,
    DEFAULT_KEY,
    MIN_COUNT_KEY,
    MAX_COUNT_KEY,
];

impl InputSchema {
    /// Enforces the element-count options against an actual length.
    pub fn check_bounds(&self, len: usize, kind: &'static str) -> Result<()> {
        if let Some(min) = self.min_count {
            if (len as i64) < min {
                return Err(Error::new(ErrorKind::TooFewElements { kind, min }));
            }
        }
        if let Some(max) = self.max_count {
            if (len as i64) > max {
                return Err(Error::new(ErrorKind::TooManyElements { kind, max }));
            }
        }
        Ok(())
    }

    /// Validates a raw schema declaration.
    pub fn validate(raw: &Value) -> Result<InputSchema> {
        match raw {
            Value::String(s) => {
                let compound = CompoundType::parse(s)?;
                Ok(InputSchema::bare(TypeSchema::Compound(compound)))
            }
            Value::List(items) => {
                if items.len() != 1 {
                    return Err(Error::new(ErrorKind::TypeListLength));
                }
                let element = InputSchema::validate(&items[0]).wrap_path(0usize)?;
                Ok(InputSchema::bare(TypeSchema::List(Box::new(element))))
            }
            Value::Map(entries) => validate_map(entries),
            other => Err(Error::new(ErrorKind::InvalidInputType {
                value: other.to_string(),
            })),
        }
    }
}

fn validate_map(entries: &IndexMap<Value, Value>) -> Result<InputSchema> {
    if entries.is_empty() {
        return Err(Error::new(ErrorKind::TypeMapZeroLength));
    }

    let all_string_keys = entries.keys().all(|k| matches!(k, Value::String(_)));
    if all_string_keys {
        let option_keys = entries
            .keys()
            .filter(|k| k.as_str().is_some_and(|s| s.starts_with('_')))
            .count();
        if option_keys > 0 {
            if option_keys < entries.len() {
                return Err(Error::new(ErrorKind::MixedOptionsAndUserKeys));
            }
            return validate_option_map(entries);
        }
    }
    validate_type_map(entries)
}

/// A map made entirely of `_`-prefixed option keys.
fn validate_option_map(entries: &IndexMap<Value, Value>) -> Result<InputSchema> {
    for (key, val) in entries {
        let name = key.as_str().unwrap_or_default();
        if !OPTION_KEYS.contains(&name) {
            return Err(Error::new(ErrorKind::UnknownOptionKey {
                key: name.to_string(),
            }));
        }
        if matches!(val, Value::Null) {
            return Err(Error::new(ErrorKind::CannotBeNull).wrap(name.to_string()));
        }
    }

    let type_value = entries
        .get(&Value::from(TYPE_KEY))
        .ok_or_else(|| Error::new(ErrorKind::MustBeDefined).wrap(TYPE_KEY))?;
    let mut schema = InputSchema::validate(type_value).wrap_path(TYPE_KEY)?;

    if let Some(optional) = entries.get(&Value::from(OPTIONAL_KEY)) {
        match optional {
            Value::Bool(b) => schema.optional = *b,
            other => {
                return Err(Error::new(ErrorKind::InvalidPrimitiveType {
                    value: other.to_string(),
                    expected: "bool".to_string(),
                })
                .wrap(OPTIONAL_KEY));
            }
        }
    }

    schema.min_count = read_count(entries, MIN_COUNT_KEY)?;
    schema.max_count = read_count(entries, MAX_COUNT_KEY)?;
    if schema.min_count.is_some() || schema.max_count.is_some() {
        if !matches!(
            schema.type_schema,
            TypeSchema::List(_) | TypeSchema::GenericMap { .. }
        ) {
            let key = if schema.min_count.is_some() {
                MIN_COUNT_KEY
            } else {
                MAX_COUNT_KEY
            };
            return Err(Error::new(ErrorKind::OptionOnNonIterable {
                key: key.to_string(),
            }));
        }
        if let (Some(min), Some(max)) = (schema.min_count, schema.max_count) {
            if min > max {
                return Err(Error::new(ErrorKind::MinCountGreaterThanMaxCount));
            }
        }
    }

    if let Some(default) = entries.get(&Value::from(DEFAULT_KEY)) {
        schema.optional = true;
        let casted = cast_input_default(default, &schema).wrap_path(DEFAULT_KEY)?;
        schema.default = Some(casted);
    }

    Ok(schema)
}

fn read_count(entries: &IndexMap<Value, Value>, key: &'static str) -> Result<Option<i64>> {
    match entries.get(&Value::from(key)) {
        None => Ok(None),
        Some(Value::Int(n)) => {
            if *n < 0 {
                return Err(Error::new(ErrorKind::MustBeGreaterThanOrEqualTo {
                    value: n.to_string(),
                    limit: "0".to_string(),
                })
                .wrap(key));
            }
            Ok(Some(*n))
        }
        Some(other) => Err(Error::new(ErrorKind::InvalidPrimitiveType {
            value: other.to_string(),
            expected: "int".to_string(),
        })
        .wrap(key)),
    }
}

/// A map of user keys: generic if its single key is a type expression,
/// otherwise a fixed map of scalar keys.
fn validate_type_map(entries: &IndexMap<Value, Value>) -> Result<InputSchema> {
    let compound_key = entries
        .keys()
        .find_map(|k| k.as_str().and_then(|s| CompoundType::parse(s).ok()));

    if let Some(key_type) = compound_key {
        if entries.len() != 1 {
            return Err(Error::new(ErrorKind::GenericTypeMapLength));
        }
        let (raw_key, raw_value) = entries.iter().next().ok_or_else(|| {
            Error::new(ErrorKind::Internal {
                detail: "empty generic type map".to_string(),
            })
        })?;
        let value = InputSchema::validate(raw_value).wrap_path(raw_key)?;
        return Ok(InputSchema::bare(TypeSchema::GenericMap {
            key: key_type,
            value: Box::new(value),
        }));
    }

    let mut fixed = IndexMap::with_capacity(entries.len());
    for (key, raw_value) in entries {
        if !key.is_scalar() {
            return Err(Error::new(ErrorKind::InvalidPrimitiveType {
                value: key.to_string(),
                expected: "scalar map key".to_string(),
            }));
        }
        if key.as_str().is_some_and(|s| s.starts_with('_')) {
            return Err(Error::new(ErrorKind::UserKeysCannotStartWithUnderscore {
                key: key.path_segment(),
            }));
        }
        let value = InputSchema::validate(raw_value).wrap_path(key)?;
        fixed.insert(key.clone(), value);
    }
    Ok(InputSchema::bare(TypeSchema::FixedMap(fixed)))
}

/// Casts a literal against a schema, filling defaults for nulls and missing
/// fixed-map keys. References are not literals and are always rejected here.
pub fn cast_input_default(value: &Value, schema: &InputSchema) -> Result<Value> {
    if matches!(value, Value::Null) {
        if schema.optional {
            return Ok(schema.default.clone().unwrap_or(Value::Null));
        }
        return Err(Error::new(ErrorKind::MustBeDefined));
    }

    match &schema.type_schema {
        TypeSchema::Compound(compound) => {
            compound.cast_value(value).ok_or_else(|| {
                Error::new(ErrorKind::UnsupportedLiteralType {
                    value: value.to_string(),
                    schema: compound.to_string(),
                })
            })
        }
        TypeSchema::List(element) => {
            let items = value.as_list().ok_or_else(|| unsupported(value, schema))?;
            schema.check_bounds(items.len(), "list")?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(cast_input_default(item, element).wrap_path(i)?);
            }
            Ok(Value::List(out))
        }
        TypeSchema::GenericMap {
            key: key_type,
            value: value_schema,
        } => {
            let entries = value.as_map().ok_or_else(|| unsupported(value, schema))?;
            schema.check_bounds(entries.len(), "map")?;
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, val) in entries {
                let casted_key = key_type.cast_value(key).ok_or_else(|| {
                    Error::new(ErrorKind::UnsupportedLiteralType {
                        value: key.to_string(),
                        schema: key_type.to_string(),
                    })
                })?;
                let casted_value = cast_input_default(val, value_schema).wrap_path(key)?;
                out.insert(casted_key, casted_value);
            }
            Ok(Value::Map(out))
        }
        TypeSchema::FixedMap(key_schemas) => {
            let entries = value.as_map().ok_or_else(|| unsupported(value, schema))?;
            for key in entries.keys() {
                if !key_schemas.contains_key(key) {
                    return Err(Error::new(ErrorKind::UnsupportedLiteralMapKey {
                        key: key.to_string(),
                    }));
                }
            }
            let mut out = IndexMap::with_capacity(key_schemas.len());
            for (key, key_schema) in key_schemas {
                let val = entries.get(key).unwrap_or(&Value::Null);
                out.insert(key.clone(), cast_input_default(val, key_schema).wrap_path(key)?);
            }
            Ok(Value::Map(out))
        }
    }
}

fn unsupported(value: &Value, schema: &InputSchema) -> Box<Error> {
    Error::new(ErrorKind::UnsupportedLiteralType {
        value: value.to_string(),
        schema: schema.type_schema.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::from_yaml_str;

    fn yaml(src: &str) -> Value {
        from_yaml_str(src).unwrap()
    }

    fn validate(src: &str) -> Result<InputSchema> {
        InputSchema::validate(&yaml(src))
    }

    fn cast(value_src: &str, schema_src: &str) -> Result<Value> {
        let schema = validate(schema_src).unwrap();
        cast_input_default(&yaml(value_src), &schema)
    }

    #[test]
    fn test_validate_type_strings() {
        assert!(validate("INT").is_ok());
        assert!(validate("FLOAT|INT").is_ok());
        assert!(validate("INT_COLUMN|FLOAT_COLUMN").is_ok());
        assert!(validate("STRING_COLUMN|INT_LIST_COLUMN").is_ok());
        assert!(validate("NUMBER").is_err());
        assert!(validate("INT|INT").is_err());
        assert!(validate("INT|FLOAT_COLUMN").is_err());
    }

    #[test]
    fn test_validate_lists() {
        assert!(validate("[INT]").is_ok());
        assert!(validate("[{_type: STRING, _optional: true}]").is_ok());
        assert!(validate("[INT, FLOAT]").is_err());
        assert!(validate("[]").is_err());
    }

    #[test]
    fn test_validate_maps() {
        let fixed = validate("{mean: FLOAT, count: INT}").unwrap();
        assert!(matches!(fixed.type_schema, TypeSchema::FixedMap(_)));

        let generic = validate("{STRING: FLOAT|INT}").unwrap();
        assert!(matches!(generic.type_schema, TypeSchema::GenericMap { .. }));

        // non-string scalar keys make a fixed map
        let numeric = validate("{1: FLOAT, 2: FLOAT}").unwrap();
        assert!(matches!(numeric.type_schema, TypeSchema::FixedMap(_)));

        assert!(matches!(
            *validate("{}").unwrap_err().kind(),
            ErrorKind::TypeMapZeroLength
        ));
        assert!(matches!(
            *validate("{INT: FLOAT, FLOAT: FLOAT}").unwrap_err().kind(),
            ErrorKind::GenericTypeMapLength
        ));
        assert!(matches!(
            *validate("{_hidden: FLOAT, 2: FLOAT}").unwrap_err().kind(),
            ErrorKind::UserKeysCannotStartWithUnderscore { .. }
        ));
    }

    #[test]
    fn test_option_map_rules() {
        let schema = validate("{_type: [INT], _min_count: 1, _max_count: 3}").unwrap();
        assert_eq!(schema.min_count, Some(1));
        assert_eq!(schema.max_count, Some(3));
        assert!(!schema.optional);

        assert!(matches!(
            *validate("{_optional: true}").unwrap_err().kind(),
            ErrorKind::MustBeDefined
        ));
        assert!(matches!(
            *validate("{_type: INT, mean: FLOAT}").unwrap_err().kind(),
            ErrorKind::MixedOptionsAndUserKeys
        ));
        assert!(matches!(
            *validate("{_type: INT, _unknown: 1}").unwrap_err().kind(),
            ErrorKind::UnknownOptionKey { .. }
        ));
        assert!(matches!(
            *validate("{_type: INT, _default: null}").unwrap_err().kind(),
            ErrorKind::CannotBeNull
        ));
        assert!(matches!(
            *validate("{_type: INT, _optional: null}").unwrap_err().kind(),
            ErrorKind::CannotBeNull
        ));
        assert!(matches!(
            *validate("{_type: INT, _optional: 1}").unwrap_err().kind(),
            ErrorKind::InvalidPrimitiveType { .. }
        ));
    }

    #[test]
    fn test_count_options() {
        assert!(matches!(
            *validate("{_type: INT, _min_count: 1}").unwrap_err().kind(),
            ErrorKind::OptionOnNonIterable { .. }
        ));
        assert!(matches!(
            *validate("{_type: [INT], _min_count: -1}").unwrap_err().kind(),
            ErrorKind::MustBeGreaterThanOrEqualTo { .. }
        ));
        assert!(matches!(
            *validate("{_type: [INT], _min_count: 1.5}").unwrap_err().kind(),
            ErrorKind::InvalidPrimitiveType { .. }
        ));
        assert!(matches!(
            *validate("{_type: [INT], _min_count: 3, _max_count: 2}")
                .unwrap_err()
                .kind(),
            ErrorKind::MinCountGreaterThanMaxCount
        ));
        assert!(validate("{STRING: {_type: [INT], _max_count: 2}}").is_ok());

        let exact = "{_type: [STRING], _min_count: 2, _max_count: 2";
        assert!(validate(&format!("{exact}, _default: [a, b]}}")).is_ok());
        assert!(validate(&format!("{exact}, _default: [a]}}")).is_err());
        assert!(validate(&format!("{exact}, _default: [a, b, c]}}")).is_err());
    }

    #[test]
    fn test_default_implies_optional_and_is_cast() {
        let schema = validate("{_type: FLOAT, _default: 2}").unwrap();
        assert!(schema.optional);
        assert_eq!(schema.default, Some(Value::Float(2.0)));

        let schema = validate("{_type: FLOAT|INT, _default: 2}").unwrap();
        assert_eq!(schema.default, Some(Value::Int(2)));

        let err = validate("{_type: INT, _default: test}").unwrap_err();
        assert!(err.to_string().starts_with("_default"));

        // re-validating the same declaration is stable
        assert_eq!(
            validate("{_type: INT, _default: 2}").unwrap(),
            validate("{_type: INT, _default: 2}").unwrap()
        );
    }

    #[test]
    fn test_cast_scalars() {
        assert_eq!(cast("2", "FLOAT").unwrap(), Value::Float(2.0));
        assert_eq!(cast("2", "FLOAT|INT").unwrap(), Value::Int(2));
        assert!(cast("2.0", "INT").is_err());
        assert!(cast("test", "BOOL").is_err());
        assert!(cast("2", "INT_COLUMN").is_err());
    }

    #[test]
    fn test_cast_null_against_optional() {
        assert!(matches!(
            *cast("null", "INT").unwrap_err().kind(),
            ErrorKind::MustBeDefined
        ));
        assert_eq!(
            cast("null", "{_type: INT, _optional: true}").unwrap(),
            Value::Null
        );
        assert_eq!(
            cast("null", "{_type: INT, _default: 7}").unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_cast_lists() {
        assert_eq!(
            cast("[1.0, 2]", "[FLOAT|INT]").unwrap(),
            Value::List(vec![Value::Float(1.0), Value::Int(2)])
        );
        assert_eq!(
            cast("[1, 2]", "[FLOAT]").unwrap(),
            Value::List(vec![Value::Float(1.0), Value::Float(2.0)])
        );
        let err = cast("[1, test]", "[INT]").unwrap_err();
        assert!(err.to_string().starts_with("[1]"));
        assert!(matches!(
            *cast("[1]", "{_type: [INT], _min_count: 2}").unwrap_err().kind(),
            ErrorKind::TooFewElements { .. }
        ));
        assert!(matches!(
            *cast("[1, 2, 3]", "{_type: [INT], _max_count: 2}")
                .unwrap_err()
                .kind(),
            ErrorKind::TooManyElements { .. }
        ));
    }

    #[test]
    fn test_cast_generic_maps() {
        let casted = cast("{a: 1, b: 2}", "{STRING: FLOAT}").unwrap();
        let map = casted.as_map().unwrap();
        assert_eq!(map.get(&Value::from("a")), Some(&Value::Float(1.0)));
        assert_eq!(map.get(&Value::from("b")), Some(&Value::Float(2.0)));

        // key errors are not path-wrapped; value errors are
        let err = cast("{1: 1.0}", "{STRING: FLOAT}").unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::UnsupportedLiteralType { .. }));
        assert!(err.path().is_empty());

        let err = cast("{a: test}", "{STRING: FLOAT}").unwrap_err();
        assert!(err.to_string().starts_with("a:"));
    }

    #[test]
    fn test_cast_fixed_maps_fill_missing_keys() {
        let schema_src = "{testA: {a: {_type: INT, _optional: true}, d: {_type: INT, _default: 2}}}";
        let casted = cast("{testA: {}}", schema_src).unwrap();
        let outer = casted.as_map().unwrap();
        let inner = outer.get(&Value::from("testA")).unwrap().as_map().unwrap();
        assert_eq!(inner.get(&Value::from("a")), Some(&Value::Null));
        assert_eq!(inner.get(&Value::from("d")), Some(&Value::Int(2)));

        let err = cast("{testA: {}, extra: 1}", schema_src).unwrap_err();
        assert!(matches!(
            *err.kind(),
            ErrorKind::UnsupportedLiteralMapKey { .. }
        ));

        let err = cast("{}", "{mean: FLOAT}").unwrap_err();
        assert!(err.to_string().starts_with("mean:"));
    }

    #[test]
    fn test_cast_is_idempotent() {
        let schema = validate("{mean: {_type: FLOAT, _default: 0.5}, tags: {_type: [STRING], _optional: true}}").unwrap();
        let once = cast_input_default(&yaml("{mean: 1, tags: null}"), &schema).unwrap();
        let twice = cast_input_default(&once, &schema).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_refs_are_not_literals() {
        assert!(matches!(
            *cast("\"@col\"", "INT").unwrap_err().kind(),
            ErrorKind::UnsupportedLiteralType { .. }
        ));
    }
}
