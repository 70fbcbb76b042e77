//! Output type validation and constant casting.
//!
//! Output type declarations are stricter than input schemas: no options, no
//! compound alternatives, and no column types. Column output types exist in
//! the model ([`OutputType::Column`]) because column-producing resources
//! advertise them, but they are constructed by the graph builder rather than
//! declared by users.

use indexmap::IndexMap;
use trellis_types::{CompoundType, Value};

use crate::error::{Error, ErrorKind, Result, WrapPath};
use crate::schema::OutputType;

impl OutputType {
    /// Validates a raw output type declaration.
    pub fn validate(raw: &Value) -> Result<OutputType> {
        match raw {
            Value::String(s) => validate_token(s),
            Value::List(items) => {
                if items.len() != 1 {
                    return Err(Error::new(ErrorKind::TypeListLength));
                }
                let element = OutputType::validate(&items[0]).wrap_path(0usize)?;
                Ok(OutputType::List(Box::new(element)))
            }
            Value::Map(entries) => validate_map(entries),
            other => Err(Error::new(ErrorKind::InvalidOutputType {
                value: other.to_string(),
            })),
        }
    }
}

fn validate_token(token: &str) -> Result<OutputType> {
    let compound = CompoundType::parse(token)?;
    match compound.as_single_value_type() {
        Some(vt) => Ok(OutputType::Value(vt)),
        None => {
            if compound.members().len() == 1 {
                Err(Error::new(ErrorKind::ColumnTypeInOutputType {
                    token: token.to_string(),
                }))
            } else {
                Err(Error::new(ErrorKind::CompoundTypeInOutputType {
                    token: token.to_string(),
                }))
            }
        }
    }
}

fn validate_map(entries: &IndexMap<Value, Value>) -> Result<OutputType> {
    if entries.is_empty() {
        return Err(Error::new(ErrorKind::TypeMapZeroLength));
    }

    let has_type_key = entries
        .keys()
        .any(|k| k.as_str().is_some_and(|s| CompoundType::parse(s).is_ok()));
    if has_type_key {
        if entries.len() != 1 {
            return Err(Error::new(ErrorKind::GenericTypeMapLength));
        }
        let (raw_key, raw_value) = entries.iter().next().ok_or_else(|| {
            Error::new(ErrorKind::Internal {
                detail: "empty generic output map".to_string(),
            })
        })?;
        let key_token = raw_key.as_str().unwrap_or_default();
        let key = match validate_token(key_token)? {
            OutputType::Value(vt) => vt,
            _ => {
                return Err(Error::new(ErrorKind::Internal {
                    detail: format!("non-scalar generic key \"{key_token}\""),
                }));
            }
        };
        let value = OutputType::validate(raw_value).wrap_path(raw_key)?;
        return Ok(OutputType::GenericMap {
            key,
            value: Box::new(value),
        });
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
        let value = OutputType::validate(raw_value).wrap_path(key)?;
        fixed.insert(key.clone(), value);
    }
    Ok(OutputType::FixedMap(fixed))
}

/// Casts a constant's declared value against its output type. Constants are
/// always concrete: nulls and missing fixed-map keys are errors.
pub fn cast_constant(value: &Value, output_type: &OutputType) -> Result<Value> {
    if matches!(value, Value::Null) {
        return Err(Error::new(ErrorKind::MustBeDefined));
    }

    match output_type {
        OutputType::Value(vt) => vt.cast_value(value).ok_or_else(|| {
            Error::new(ErrorKind::UnsupportedLiteralType {
                value: value.to_string(),
                schema: output_type.to_string(),
            })
        }),
        OutputType::Column(_) => Err(Error::new(ErrorKind::UnsupportedLiteralType {
            value: value.to_string(),
            schema: output_type.to_string(),
        })),
        OutputType::List(element) => {
            let items = value.as_list().ok_or_else(|| unsupported(value, output_type))?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(cast_constant(item, element).wrap_path(i)?);
            }
            Ok(Value::List(out))
        }
        OutputType::GenericMap {
            key: key_type,
            value: value_type,
        } => {
            let entries = value.as_map().ok_or_else(|| unsupported(value, output_type))?;
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, val) in entries {
                let casted_key = key_type.cast_value(key).ok_or_else(|| {
                    Error::new(ErrorKind::UnsupportedLiteralType {
                        value: key.to_string(),
                        schema: key_type.to_string(),
                    })
                })?;
                out.insert(casted_key, cast_constant(val, value_type).wrap_path(key)?);
            }
            Ok(Value::Map(out))
        }
        OutputType::FixedMap(key_types) => {
            let entries = value.as_map().ok_or_else(|| unsupported(value, output_type))?;
            for key in entries.keys() {
                if !key_types.contains_key(key) {
                    return Err(Error::new(ErrorKind::UnsupportedLiteralMapKey {
                        key: key.to_string(),
                    }));
                }
            }
            let mut out = IndexMap::with_capacity(key_types.len());
            for (key, key_type) in key_types {
                let val = entries
                    .get(key)
                    .ok_or_else(|| Error::new(ErrorKind::MustBeDefined).wrap(key))?;
                out.insert(key.clone(), cast_constant(val, key_type).wrap_path(key)?);
            }
            Ok(Value::Map(out))
        }
    }
}

fn unsupported(value: &Value, output_type: &OutputType) -> Box<Error> {
    Error::new(ErrorKind::UnsupportedLiteralType {
        value: value.to_string(),
        schema: output_type.to_string(),
    })
}
