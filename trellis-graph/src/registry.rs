//! Aggregator and transformer registry.
//!
//! Aggregators reduce columns to literal values; transformers produce new
//! columns. Each carries an optional input schema (a missing schema means the
//! function accepts anything and validation is deferred to execution) and an
//! advertised output. Registry entries have content IDs of their own so that
//! resources depending on them rehash when a function's definition changes.

use indexmap::IndexMap;
use trellis_schema::{Error, ErrorKind, InputSchema, OutputType, Result};
use trellis_types::{from_yaml_str, ColumnType};

use crate::hash;

#[derive(Debug, Clone)]
pub struct Aggregator {
    pub name: String,
    pub id: String,
    pub id_with_tags: String,
    pub input_schema: Option<InputSchema>,
    pub output_type: OutputType,
}

#[derive(Debug, Clone)]
pub struct Transformer {
    pub name: String,
    pub id: String,
    pub id_with_tags: String,
    pub input_schema: Option<InputSchema>,
    pub output_type: ColumnType,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    aggregators: IndexMap<String, Aggregator>,
    transformers: IndexMap<String, Transformer>,
}

impl Registry {
    /// The built-in function set.
    pub fn builtin() -> Result<Registry> {
        let mut registry = Registry::default();

        registry.add_aggregator("mean", Some("INT_COLUMN|FLOAT_COLUMN"), "FLOAT")?;
        registry.add_aggregator("sum", Some("INT_COLUMN|FLOAT_COLUMN"), "FLOAT")?;
        registry.add_aggregator("count_distinct", Some("STRING_COLUMN|INT_COLUMN"), "INT")?;
        registry.add_aggregator(
            "bucket_boundaries",
            Some(
                "{col: INT_COLUMN|FLOAT_COLUMN, num_buckets: {_type: INT, _default: 10}}",
            ),
            "[FLOAT]",
        )?;

        registry.add_transformer(
            "normalize",
            Some("{col: INT_COLUMN|FLOAT_COLUMN, mean: INT|FLOAT, stddev: INT|FLOAT}"),
            ColumnType::FloatColumn,
        )?;
        registry.add_transformer(
            "bucketize",
            Some("{col: INT_COLUMN|FLOAT_COLUMN, bucket_boundaries: [FLOAT|INT]}"),
            ColumnType::IntColumn,
        )?;
        registry.add_transformer(
            "index_string",
            Some("{col: STRING_COLUMN, index: {_type: [STRING], _optional: true}}"),
            ColumnType::IntColumn,
        )?;

        Ok(registry)
    }

    pub fn add_aggregator(
        &mut self,
        name: &str,
        input_schema: Option<&str>,
        output_type: &str,
    ) -> Result<()> {
        let input_schema = parse_schema(input_schema)?;
        let output_type = OutputType::validate(&from_yaml_str(output_type)?)?;
        let id = function_id("aggregator", name, &input_schema, &output_type.to_string());
        self.aggregators.insert(
            name.to_string(),
            Aggregator {
                name: name.to_string(),
                id_with_tags: id.clone(),
                id,
                input_schema,
                output_type,
            },
        );
        Ok(())
    }

    pub fn add_transformer(
        &mut self,
        name: &str,
        input_schema: Option<&str>,
        output_type: ColumnType,
    ) -> Result<()> {
        let input_schema = parse_schema(input_schema)?;
        let id = function_id("transformer", name, &input_schema, output_type.as_str());
        self.transformers.insert(
            name.to_string(),
            Transformer {
                name: name.to_string(),
                id_with_tags: id.clone(),
                id,
                input_schema,
                output_type,
            },
        );
        Ok(())
    }

    pub fn aggregator(&self, name: &str) -> Result<&Aggregator> {
        self.aggregators.get(name).ok_or_else(|| {
            Error::new(ErrorKind::UndefinedFunction {
                kind: "aggregator",
                name: name.to_string(),
            })
        })
    }

    pub fn transformer(&self, name: &str) -> Result<&Transformer> {
        self.transformers.get(name).ok_or_else(|| {
            Error::new(ErrorKind::UndefinedFunction {
                kind: "transformer",
                name: name.to_string(),
            })
        })
    }
}

fn parse_schema(src: Option<&str>) -> Result<Option<InputSchema>> {
    match src {
        None => Ok(None),
        Some(src) => Ok(Some(InputSchema::validate(&from_yaml_str(src)?)?)),
    }
}

fn function_id(
    kind: &str,
    name: &str,
    input_schema: &Option<InputSchema>,
    output: &str,
) -> String {
    let schema = match input_schema {
        Some(schema) => schema.type_schema.to_string(),
        None => "*".to_string(),
    };
    hash::string(&format!("{kind}:{name}:{schema}:{output}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = Registry::builtin().unwrap();
        assert!(registry.aggregator("mean").is_ok());
        assert!(registry.transformer("bucketize").is_ok());
        assert!(matches!(
            *registry.aggregator("median").unwrap_err().kind(),
            ErrorKind::UndefinedFunction { kind: "aggregator", .. }
        ));
    }

    #[test]
    fn test_default_is_baked_into_schema() {
        let registry = Registry::builtin().unwrap();
        let agg = registry.aggregator("bucket_boundaries").unwrap();
        let schema = agg.input_schema.as_ref().unwrap();
        let trellis_schema::TypeSchema::FixedMap(keys) = &schema.type_schema else {
            panic!("expected fixed map schema");
        };
        let num_buckets = &keys[&trellis_types::Value::from("num_buckets")];
        assert!(num_buckets.optional);
        assert_eq!(num_buckets.default, Some(trellis_types::Value::Int(10)));
    }

    #[test]
    fn test_function_ids_differ_by_definition() {
        let registry = Registry::builtin().unwrap();
        let mean = registry.aggregator("mean").unwrap();
        let sum = registry.aggregator("sum").unwrap();
        assert_ne!(mean.id, sum.id);
    }
}
