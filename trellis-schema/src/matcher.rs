//! Structural matching of advertised output types against input schemas.
//!
//! Where literal casting inspects concrete values, the matcher compares two
//! type declarations: the output type a referenced resource advertises and
//! the schema the consuming position requires. Matching is strict at leaves
//! (no INT-to-FLOAT promotion, since no literal exists to widen).

use indexmap::IndexMap;
use trellis_types::{Value, ValueType};

use crate::error::{Error, ErrorKind, Result, WrapPath};
use crate::schema::{InputSchema, OutputType, TypeSchema};

/// Checks that `output` satisfies `schema`.
pub fn check_output_type(output: &OutputType, schema: &InputSchema) -> Result<()> {
    match &schema.type_schema {
        TypeSchema::Compound(compound) => match output {
            OutputType::Value(vt) => {
                if compound.supports_value_type(*vt) {
                    Ok(())
                } else {
                    Err(mismatch(output, schema))
                }
            }
            OutputType::Column(ct) => {
                if compound.supports_column_type(*ct) {
                    Ok(())
                } else {
                    Err(mismatch(output, schema))
                }
            }
            _ => Err(mismatch(output, schema)),
        },
        TypeSchema::List(element) => match output {
            OutputType::List(out_element) => {
                check_output_type(out_element, element).wrap_path(0usize)
            }
            _ => Err(mismatch(output, schema)),
        },
        TypeSchema::GenericMap {
            key: key_type,
            value: value_schema,
        } => match output {
            OutputType::GenericMap {
                key: out_key,
                value: out_value,
            } => {
                if !key_type.supports_value_type(*out_key) {
                    return Err(mismatch(output, schema));
                }
                check_output_type(out_value, value_schema)
            }
            OutputType::FixedMap(out_entries) => {
                schema.check_bounds(out_entries.len(), "map")?;
                for (key, out_value) in out_entries {
                    if key_type.cast_value(key).is_none() {
                        return Err(Error::new(ErrorKind::UnsupportedLiteralType {
                            value: key.to_string(),
                            schema: key_type.to_string(),
                        }));
                    }
                    check_output_type(out_value, value_schema).wrap_path(key)?;
                }
                Ok(())
            }
            _ => Err(mismatch(output, schema)),
        },
        TypeSchema::FixedMap(key_schemas) => match output {
            OutputType::FixedMap(out_entries) => {
                check_fixed_against_fixed(out_entries, key_schemas)
            }
            OutputType::GenericMap {
                key: out_key,
                value: out_value,
            } => {
                // A generic output can stand in for a fixed schema when every
                // schema key fits the generic key type.
                for (key, key_schema) in key_schemas {
                    if !key_fits(key, *out_key) {
                        return Err(Error::new(ErrorKind::UnsupportedLiteralType {
                            value: key.to_string(),
                            schema: out_key.to_string(),
                        }));
                    }
                    check_output_type(out_value, key_schema).wrap_path(key)?;
                }
                Ok(())
            }
            _ => Err(mismatch(output, schema)),
        },
    }
}

fn check_fixed_against_fixed(
    out_entries: &IndexMap<Value, OutputType>,
    key_schemas: &IndexMap<Value, InputSchema>,
) -> Result<()> {
    for key in out_entries.keys() {
        if !key_schemas.contains_key(key) {
            return Err(Error::new(ErrorKind::UnsupportedLiteralMapKey {
                key: key.to_string(),
            }));
        }
    }
    for (key, key_schema) in key_schemas {
        match out_entries.get(key) {
            Some(out_value) => check_output_type(out_value, key_schema).wrap_path(key)?,
            None => {
                if !key_schema.optional {
                    return Err(Error::new(ErrorKind::MustBeDefined).wrap(key));
                }
            }
        }
    }
    Ok(())
}

fn key_fits(key: &Value, key_type: ValueType) -> bool {
    match ValueType::of_value(key) {
        Some(vt) => vt == key_type || (vt == ValueType::Int && key_type == ValueType::Float),
        None => false,
    }
}

fn mismatch(output: &OutputType, schema: &InputSchema) -> Box<Error> {
    Error::new(ErrorKind::UnsupportedOutputType {
        output: output.to_string(),
        schema: schema.type_schema.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::from_yaml_str;

    fn schema(src: &str) -> InputSchema {
        InputSchema::validate(&from_yaml_str(src).unwrap()).unwrap()
    }

    fn output(src: &str) -> OutputType {
        OutputType::validate(&from_yaml_str(src).unwrap()).unwrap()
    }

    #[test]
    fn test_scalar_membership_is_strict() {
        assert!(check_output_type(&output("INT"), &schema("FLOAT|INT")).is_ok());
        // no promotion between advertised types
        assert!(check_output_type(&output("INT"), &schema("FLOAT")).is_err());
        assert!(check_output_type(&output("STRING"), &schema("FLOAT|INT")).is_err());
    }

    #[test]
    fn test_column_membership() {
        let out = OutputType::Column(trellis_types::ColumnType::IntColumn);
        assert!(check_output_type(&out, &schema("INT_COLUMN|FLOAT_COLUMN")).is_ok());
        assert!(check_output_type(&out, &schema("STRING_COLUMN")).is_err());
        assert!(check_output_type(&out, &schema("INT")).is_err());
    }

    #[test]
    fn test_lists() {
        assert!(check_output_type(&output("[INT]"), &schema("[FLOAT|INT]")).is_ok());
        let err = check_output_type(&output("[STRING]"), &schema("[INT]")).unwrap_err();
        assert!(err.to_string().starts_with("[0]"));
        assert!(check_output_type(&output("INT"), &schema("[INT]")).is_err());
    }

    #[test]
    fn test_generic_against_generic() {
        assert!(check_output_type(&output("{STRING: INT}"), &schema("{STRING: FLOAT|INT}")).is_ok());
        assert!(check_output_type(&output("{INT: INT}"), &schema("{STRING: INT}")).is_err());
    }

    #[test]
    fn test_fixed_output_against_generic_schema() {
        let s = schema("{STRING: FLOAT|INT}");
        assert!(check_output_type(&output("{mean: FLOAT, count: INT}"), &s).is_ok());
        assert!(check_output_type(&output("{1: FLOAT}"), &s).is_err());

        let bounded = schema("{_type: {STRING: INT}, _min_count: 2}");
        assert!(check_output_type(&output("{a: INT}"), &bounded).is_err());
        assert!(check_output_type(&output("{a: INT, b: INT}"), &bounded).is_ok());
    }

    #[test]
    fn test_generic_output_against_fixed_schema() {
        let s = schema("{mean: FLOAT, count: FLOAT}");
        assert!(check_output_type(&output("{STRING: FLOAT}"), &s).is_ok());
        // schema keys must fit the generic key type
        let numeric = schema("{1: FLOAT}");
        assert!(check_output_type(&output("{STRING: FLOAT}"), &numeric).is_err());
        assert!(check_output_type(&output("{INT: FLOAT}"), &numeric).is_ok());
    }

    #[test]
    fn test_fixed_against_fixed() {
        let s = schema("{mean: FLOAT, tags: {_type: [STRING], _optional: true}}");
        assert!(check_output_type(&output("{mean: FLOAT}"), &s).is_ok());
        let err = check_output_type(&output("{tags: [STRING]}"), &s).unwrap_err();
        assert!(err.to_string().starts_with("mean:"));
        assert!(matches!(
            *check_output_type(&output("{mean: FLOAT, extra: INT}"), &s)
                .unwrap_err()
                .kind(),
            ErrorKind::UnsupportedLiteralMapKey { .. }
        ));
    }
}
