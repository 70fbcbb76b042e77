//! Runtime input casting.
//!
//! The deploy-time counterpart of default casting: the input tree may now
//! contain references to already-built resources. A reference to a constant
//! is checked by recursing on the constant's literal value; a reference to a
//! column producer is checked structurally against its advertised output
//! type. References survive casting unchanged so that resolution can later
//! substitute content IDs.

use indexmap::IndexMap;
use trellis_schema::{
    check_output_type, Error, ErrorKind, InputSchema, OutputType, Result, TypeSchema, WrapPath,
};
use trellis_types::{ResourceKind, Value};

use crate::resolve::ResourceTable;
use crate::resource::Resource;

/// Casts a runtime input against a schema. A missing schema accepts
/// anything.
pub fn cast_runtime(
    value: &Value,
    schema: Option<&InputSchema>,
    allowed: &[ResourceKind],
    table: &ResourceTable,
) -> Result<Value> {
    let Some(schema) = schema else {
        return Ok(value.clone());
    };

    if let Value::Ref(name) = value {
        check_reference(name, schema, allowed, table)?;
        return Ok(value.clone());
    }

    if matches!(value, Value::Null) {
        if schema.optional {
            return Ok(Value::Null);
        }
        return Err(Error::new(ErrorKind::MustBeDefined));
    }

    match &schema.type_schema {
        TypeSchema::Compound(compound) => compound.cast_value(value).ok_or_else(|| {
            Error::new(ErrorKind::UnsupportedLiteralType {
                value: value.to_string(),
                schema: compound.to_string(),
            })
        }),
        TypeSchema::List(element) => {
            let items = value.as_list().ok_or_else(|| unsupported(value, schema))?;
            schema.check_bounds(items.len(), "list")?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(cast_runtime(item, Some(element), allowed, table).wrap_path(i)?);
            }
            Ok(Value::List(out))
        }
        TypeSchema::GenericMap {
            key: key_type,
            value: value_schema,
        } => {
            let entries = value.as_map().ok_or_else(|| unsupported(value, schema))?;
            schema.check_bounds(entries.len(), "map")?;
            let key_schema = InputSchema::bare(TypeSchema::Compound(key_type.clone()));
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, val) in entries {
                // keys recurse like values so a reference can key the map
                let casted_key = cast_runtime(key, Some(&key_schema), allowed, table)?;
                let casted_value =
                    cast_runtime(val, Some(value_schema), allowed, table).wrap_path(key)?;
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
            let mut out = IndexMap::with_capacity(entries.len());
            for (key, key_schema) in key_schemas {
                match entries.get(key) {
                    Some(val) => {
                        let casted =
                            cast_runtime(val, Some(key_schema), allowed, table).wrap_path(key)?;
                        out.insert(key.clone(), casted);
                    }
                    None => {
                        if !key_schema.optional {
                            return Err(Error::new(ErrorKind::MustBeDefined).wrap(key));
                        }
                    }
                }
            }
            Ok(Value::Map(out))
        }
    }
}

fn check_reference(
    name: &str,
    schema: &InputSchema,
    allowed: &[ResourceKind],
    table: &ResourceTable,
) -> Result<()> {
    let resource = table.lookup(name, allowed)?;
    match resource {
        Resource::Constant(constant) => cast_runtime(&constant.value, Some(schema), allowed, table)
            .wrap_path("value")
            .map_err(|err| err.wrap_resource(resource.identify()))
            .map(|_| ()),
        Resource::RawColumn(column) => {
            check_output_type(&OutputType::Column(column.column_type), schema)
                .wrap_path("type")
                .map_err(|err| err.wrap_resource(resource.identify()))
        }
        Resource::Aggregate(aggregate) => check_output_type(&aggregate.output_type, schema)
            .wrap_path("output_type")
            .map_err(|err| err.wrap_resource(resource.identify())),
        Resource::TransformedColumn(column) => {
            check_output_type(&OutputType::Column(column.column_type), schema)
                .wrap_path("type")
                .map_err(|err| err.wrap_resource(resource.identify()))
        }
        _ => Err(Error::new(ErrorKind::Internal {
            detail: format!(
                "reference \"{name}\" resolved to a {} inside an input tree",
                resource.kind()
            ),
        })),
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
    use crate::resource::{Constant, RawColumn, ResourceIds, ResourceMeta, Tags};
    use trellis_types::{from_yaml_str, ColumnType, ValueType};

    fn meta(name: &str) -> ResourceMeta {
        ResourceMeta {
            name: name.to_string(),
            index: 0,
            file_path: "pipeline.yaml".to_string(),
            embedded_in: None,
        }
    }

    fn ids(seed: &str) -> ResourceIds {
        ResourceIds {
            id: format!("{seed}-id"),
            id_with_tags: format!("{seed}-idwt"),
        }
    }

    fn schema(src: &str) -> InputSchema {
        InputSchema::validate(&from_yaml_str(src).unwrap()).unwrap()
    }

    fn cast_literal(value_src: &str, schema_src: &str) -> Result<Value> {
        let table = ResourceTable::default();
        cast_runtime(
            &from_yaml_str(value_src).unwrap(),
            Some(&schema(schema_src)),
            &[],
            &table,
        )
    }

    #[test]
    fn test_missing_schema_is_passthrough() {
        let table = ResourceTable::default();
        let tree = from_yaml_str("{anything: [1, \"@whatever\"]}").unwrap();
        assert_eq!(cast_runtime(&tree, None, &[], &table).unwrap(), tree);
    }

    #[test]
    fn test_literal_recursion_matches_default_casting() {
        assert_eq!(cast_literal("2", "FLOAT").unwrap(), Value::Float(2.0));
        assert_eq!(
            cast_literal("[1.0, 2]", "[FLOAT|INT]").unwrap(),
            Value::List(vec![Value::Float(1.0), Value::Int(2)])
        );
        assert!(cast_literal("2.2", "INT").is_err());
    }

    #[test]
    fn test_null_does_not_inject_default() {
        // the executor fills defaults; the builder only checks optionality
        assert_eq!(
            cast_literal("null", "{_type: INT, _default: 7}").unwrap(),
            Value::Null
        );
        assert!(matches!(
            *cast_literal("null", "INT").unwrap_err().kind(),
            ErrorKind::MustBeDefined
        ));
    }

    #[test]
    fn test_missing_fixed_keys() {
        let err = cast_literal("{}", "{col: INT}").unwrap_err();
        assert_eq!(err.to_string(), "col: must be defined");
        // optional keys are omitted rather than defaulted
        let casted =
            cast_literal("{}", "{col: {_type: INT, _optional: true}}").unwrap();
        assert_eq!(casted, Value::Map(IndexMap::new()));
    }

    #[test]
    fn test_constant_reference_recurses_on_value() {
        let c = Constant {
            meta: meta("class_count"),
            ids: ids("c"),
            output_type: OutputType::Value(ValueType::Int),
            value: Value::Int(3),
            tags: Tags::default(),
            key: String::new(),
        };
        let mut table = ResourceTable::default();
        table.insert(Resource::Constant(&c));

        let tree = from_yaml_str("\"@class_count\"").unwrap();
        let casted = cast_runtime(
            &tree,
            Some(&schema("INT")),
            &[ResourceKind::Constant],
            &table,
        )
        .unwrap();
        assert_eq!(casted, tree);

        let err = cast_runtime(
            &tree,
            Some(&schema("STRING")),
            &[ResourceKind::Constant],
            &table,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("pipeline.yaml: constant: class_count: value:"));
    }

    #[test]
    fn test_generic_map_key_reference() {
        let c = Constant {
            meta: meta("class_count"),
            ids: ids("c"),
            output_type: OutputType::Value(ValueType::Int),
            value: Value::Int(3),
            tags: Tags::default(),
            key: String::new(),
        };
        let mut table = ResourceTable::default();
        table.insert(Resource::Constant(&c));

        let tree = from_yaml_str("{\"@class_count\": 1.5}").unwrap();
        let casted = cast_runtime(
            &tree,
            Some(&schema("{INT: FLOAT}")),
            &[ResourceKind::Constant],
            &table,
        )
        .unwrap();
        assert_eq!(casted, tree);

        // constant holds an INT, so it cannot key a STRING-keyed map
        let err = cast_runtime(
            &tree,
            Some(&schema("{STRING: FLOAT}")),
            &[ResourceKind::Constant],
            &table,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("pipeline.yaml: constant: class_count:"));
    }

    #[test]
    fn test_column_reference_checks_advertised_type() {
        let col = RawColumn {
            meta: meta("sepal_length"),
            ids: ids("r"),
            column_type: ColumnType::FloatColumn,
            required: true,
            tags: Tags::default(),
            metadata_key: String::new(),
        };
        let mut table = ResourceTable::default();
        table.insert(Resource::RawColumn(&col));

        let tree = from_yaml_str("\"@sepal_length\"").unwrap();
        assert!(cast_runtime(
            &tree,
            Some(&schema("INT_COLUMN|FLOAT_COLUMN")),
            &[ResourceKind::RawColumn],
            &table,
        )
        .is_ok());

        let err = cast_runtime(
            &tree,
            Some(&schema("STRING_COLUMN")),
            &[ResourceKind::RawColumn],
            &table,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("pipeline.yaml: raw_column: sepal_length: type:"));
    }
}
