//! Pipeline configuration parsing.
//!
//! Turns the untyped document tree into per-kind declaration lists, checking
//! only document structure here: required fields, field types, unknown keys,
//! and duplicate resource names. Schema validation, casting, and reference
//! resolution happen later, during [`Context::build`](crate::Context::build).

use std::collections::HashSet;

use indexmap::IndexMap;
use trellis_schema::{Error, ErrorKind, Result, WrapPath};
use trellis_types::{ColumnType, ResourceKind, Value};

use crate::resource::Tags;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub app_name: String,
    pub file_path: String,
    pub python_packages: Vec<PythonPackageDecl>,
    pub constants: Vec<ConstantDecl>,
    pub raw_columns: Vec<RawColumnDecl>,
    pub aggregates: Vec<AggregateDecl>,
    pub transformed_columns: Vec<TransformedColumnDecl>,
    pub models: Vec<ModelDecl>,
    pub apis: Vec<ApiDecl>,
}

#[derive(Debug, Clone)]
pub struct PythonPackageDecl {
    pub name: String,
    pub index: usize,
    pub requirement: String,
}

#[derive(Debug, Clone)]
pub struct ConstantDecl {
    pub name: String,
    pub index: usize,
    pub output_type: Value,
    pub value: Value,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct RawColumnDecl {
    pub name: String,
    pub index: usize,
    pub column_type: ColumnType,
    pub required: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct AggregateDecl {
    pub name: String,
    pub index: usize,
    pub aggregator: String,
    pub input: Value,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct TransformedColumnDecl {
    pub name: String,
    pub index: usize,
    pub transformer: String,
    pub input: Value,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct ModelDecl {
    pub name: String,
    pub index: usize,
    pub input: Value,
    pub target_column: String,
    pub prediction_key: String,
    pub tags: Tags,
}

#[derive(Debug, Clone)]
pub struct ApiDecl {
    pub name: String,
    pub index: usize,
    pub model_name: String,
    pub tags: Tags,
}

const NAME_KEY: &str = "name";
const TAGS_KEY: &str = "tags";

impl PipelineConfig {
    /// Parses a pipeline document. `file_path` is only used in error
    /// identities.
    pub fn from_value(doc: &Value, file_path: &str) -> Result<PipelineConfig> {
        let root = expect_map(doc)?;
        check_known_keys(
            root,
            &[
                "name",
                "python_packages",
                "constants",
                "raw_columns",
                "aggregates",
                "transformed_columns",
                "models",
                "apis",
            ],
        )?;

        let app_name = required_string(root, NAME_KEY)?;
        let mut config = PipelineConfig {
            app_name,
            file_path: file_path.to_string(),
            python_packages: Vec::new(),
            constants: Vec::new(),
            raw_columns: Vec::new(),
            aggregates: Vec::new(),
            transformed_columns: Vec::new(),
            models: Vec::new(),
            apis: Vec::new(),
        };

        for (i, item) in section(root, "python_packages")?.iter().enumerate() {
            config
                .python_packages
                .push(parse_python_package(item, i).wrap_path(i).wrap_path("python_packages")?);
        }
        for (i, item) in section(root, "constants")?.iter().enumerate() {
            config
                .constants
                .push(parse_constant(item, i).wrap_path(i).wrap_path("constants")?);
        }
        for (i, item) in section(root, "raw_columns")?.iter().enumerate() {
            config
                .raw_columns
                .push(parse_raw_column(item, i).wrap_path(i).wrap_path("raw_columns")?);
        }
        for (i, item) in section(root, "aggregates")?.iter().enumerate() {
            config
                .aggregates
                .push(parse_aggregate(item, i).wrap_path(i).wrap_path("aggregates")?);
        }
        for (i, item) in section(root, "transformed_columns")?.iter().enumerate() {
            config.transformed_columns.push(
                parse_transformed_column(item, i)
                    .wrap_path(i)
                    .wrap_path("transformed_columns")?,
            );
        }
        for (i, item) in section(root, "models")?.iter().enumerate() {
            config
                .models
                .push(parse_model(item, i).wrap_path(i).wrap_path("models")?);
        }
        for (i, item) in section(root, "apis")?.iter().enumerate() {
            config
                .apis
                .push(parse_api(item, i).wrap_path(i).wrap_path("apis")?);
        }

        config.check_unique_names()?;
        Ok(config)
    }

    /// Resource names share one namespace across kinds, so a reference is
    /// never ambiguous.
    fn check_unique_names(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let all = self
            .named_declarations()
            .into_iter()
            .map(|(name, _)| name);
        for name in all {
            if !seen.insert(name) {
                return Err(Error::new(ErrorKind::DuplicateResourceName {
                    name: name.to_string(),
                }));
            }
        }
        Ok(())
    }

    fn named_declarations(&self) -> Vec<(&str, ResourceKind)> {
        let mut out: Vec<(&str, ResourceKind)> = Vec::new();
        out.extend(
            self.python_packages
                .iter()
                .map(|d| (d.name.as_str(), ResourceKind::PythonPackage)),
        );
        out.extend(
            self.constants
                .iter()
                .map(|d| (d.name.as_str(), ResourceKind::Constant)),
        );
        out.extend(
            self.raw_columns
                .iter()
                .map(|d| (d.name.as_str(), ResourceKind::RawColumn)),
        );
        out.extend(
            self.aggregates
                .iter()
                .map(|d| (d.name.as_str(), ResourceKind::Aggregate)),
        );
        out.extend(
            self.transformed_columns
                .iter()
                .map(|d| (d.name.as_str(), ResourceKind::TransformedColumn)),
        );
        out.extend(
            self.models
                .iter()
                .map(|d| (d.name.as_str(), ResourceKind::Model)),
        );
        out.extend(self.apis.iter().map(|d| (d.name.as_str(), ResourceKind::Api)));
        out
    }
}

fn parse_python_package(item: &Value, index: usize) -> Result<PythonPackageDecl> {
    // a bare requirement string, e.g. "scikit-learn==0.21.2"
    let requirement = match item {
        Value::String(s) if !s.is_empty() => s.clone(),
        other => {
            return Err(Error::new(ErrorKind::InvalidPrimitiveType {
                value: other.to_string(),
                expected: "requirement string".to_string(),
            }));
        }
    };
    let name = requirement
        .split(['=', '<', '>', '~', '!'])
        .next()
        .unwrap_or(&requirement)
        .trim()
        .to_string();
    Ok(PythonPackageDecl {
        name,
        index,
        requirement,
    })
}

fn parse_constant(item: &Value, index: usize) -> Result<ConstantDecl> {
    let map = expect_map(item)?;
    check_known_keys(map, &[NAME_KEY, "type", "value", TAGS_KEY])?;
    Ok(ConstantDecl {
        name: required_string(map, NAME_KEY)?,
        index,
        output_type: required(map, "type")?.clone(),
        value: required(map, "value")?.clone(),
        tags: tags(map)?,
    })
}

fn parse_raw_column(item: &Value, index: usize) -> Result<RawColumnDecl> {
    let map = expect_map(item)?;
    check_known_keys(map, &[NAME_KEY, "type", "required", TAGS_KEY])?;
    let token = required_string(map, "type")?;
    let column_type = ColumnType::parse(&token).ok_or_else(|| {
        Error::new(ErrorKind::Type(trellis_types::TypeError::UnknownType {
            token: token.clone(),
        }))
        .wrap("type")
    })?;
    Ok(RawColumnDecl {
        name: required_string(map, NAME_KEY)?,
        index,
        column_type,
        required: optional_bool(map, "required", false)?,
        tags: tags(map)?,
    })
}

fn parse_aggregate(item: &Value, index: usize) -> Result<AggregateDecl> {
    let map = expect_map(item)?;
    check_known_keys(map, &[NAME_KEY, "aggregator", "input", TAGS_KEY])?;
    Ok(AggregateDecl {
        name: required_string(map, NAME_KEY)?,
        index,
        aggregator: required_string(map, "aggregator")?,
        input: required(map, "input")?.clone(),
        tags: tags(map)?,
    })
}

fn parse_transformed_column(item: &Value, index: usize) -> Result<TransformedColumnDecl> {
    let map = expect_map(item)?;
    check_known_keys(map, &[NAME_KEY, "transformer", "input", TAGS_KEY])?;
    Ok(TransformedColumnDecl {
        name: required_string(map, NAME_KEY)?,
        index,
        transformer: required_string(map, "transformer")?,
        input: required(map, "input")?.clone(),
        tags: tags(map)?,
    })
}

fn parse_model(item: &Value, index: usize) -> Result<ModelDecl> {
    let map = expect_map(item)?;
    check_known_keys(
        map,
        &[NAME_KEY, "input", "target_column", "prediction_key", TAGS_KEY],
    )?;
    Ok(ModelDecl {
        name: required_string(map, NAME_KEY)?,
        index,
        input: required(map, "input")?.clone(),
        target_column: reference_name(map, "target_column")?,
        prediction_key: optional_string(map, "prediction_key", "")?,
        tags: tags(map)?,
    })
}

fn parse_api(item: &Value, index: usize) -> Result<ApiDecl> {
    let map = expect_map(item)?;
    check_known_keys(map, &[NAME_KEY, "model", TAGS_KEY])?;
    Ok(ApiDecl {
        name: required_string(map, NAME_KEY)?,
        index,
        model_name: reference_name(map, "model")?,
        tags: tags(map)?,
    })
}

fn expect_map(value: &Value) -> Result<&IndexMap<Value, Value>> {
    value.as_map().ok_or_else(|| {
        Error::new(ErrorKind::InvalidPrimitiveType {
            value: value.to_string(),
            expected: "map".to_string(),
        })
    })
}

fn check_known_keys(map: &IndexMap<Value, Value>, known: &[&str]) -> Result<()> {
    for key in map.keys() {
        let valid = key
            .as_str()
            .is_some_and(|s| known.contains(&s));
        if !valid {
            return Err(Error::new(ErrorKind::UnsupportedLiteralMapKey {
                key: key.to_string(),
            }));
        }
    }
    Ok(())
}

fn required<'a>(map: &'a IndexMap<Value, Value>, key: &'static str) -> Result<&'a Value> {
    match map.get(&Value::from(key)) {
        Some(Value::Null) | None => Err(Error::new(ErrorKind::MustBeDefined).wrap(key)),
        Some(value) => Ok(value),
    }
}

fn required_string(map: &IndexMap<Value, Value>, key: &'static str) -> Result<String> {
    match required(map, key)? {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(Error::new(ErrorKind::InvalidPrimitiveType {
            value: other.to_string(),
            expected: "non-empty string".to_string(),
        })
        .wrap(key)),
    }
}

/// A field naming another resource: either a `@ref` or a bare name.
fn reference_name(map: &IndexMap<Value, Value>, key: &'static str) -> Result<String> {
    match required(map, key)? {
        Value::Ref(name) => Ok(name.clone()),
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(Error::new(ErrorKind::InvalidPrimitiveType {
            value: other.to_string(),
            expected: "resource reference".to_string(),
        })
        .wrap(key)),
    }
}

fn optional_bool(map: &IndexMap<Value, Value>, key: &'static str, default: bool) -> Result<bool> {
    match map.get(&Value::from(key)) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::new(ErrorKind::InvalidPrimitiveType {
            value: other.to_string(),
            expected: "bool".to_string(),
        })
        .wrap(key)),
    }
}

fn optional_string(
    map: &IndexMap<Value, Value>,
    key: &'static str,
    default: &str,
) -> Result<String> {
    match map.get(&Value::from(key)) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::new(ErrorKind::InvalidPrimitiveType {
            value: other.to_string(),
            expected: "string".to_string(),
        })
        .wrap(key)),
    }
}

fn tags(map: &IndexMap<Value, Value>) -> Result<Tags> {
    let mut out = Tags::default();
    let Some(raw) = map.get(&Value::from(TAGS_KEY)) else {
        return Ok(out);
    };
    let entries = expect_map(raw).wrap_path(TAGS_KEY)?;
    for (key, value) in entries {
        let Some(name) = key.as_str() else {
            return Err(Error::new(ErrorKind::InvalidPrimitiveType {
                value: key.to_string(),
                expected: "string tag key".to_string(),
            })
            .wrap(TAGS_KEY));
        };
        out.entries.insert(name.to_string(), value.clone());
    }
    Ok(out)
}

fn section<'a>(root: &'a IndexMap<Value, Value>, key: &'static str) -> Result<&'a [Value]> {
    match root.get(&Value::from(key)) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::List(items)) => Ok(items),
        Some(other) => Err(Error::new(ErrorKind::InvalidPrimitiveType {
            value: other.to_string(),
            expected: "list".to_string(),
        })
        .wrap(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::from_yaml_str;

    fn parse(src: &str) -> Result<PipelineConfig> {
        PipelineConfig::from_value(&from_yaml_str(src).unwrap(), "pipeline.yaml")
    }

    #[test]
    fn test_minimal_pipeline() {
        let config = parse("{name: iris}").unwrap();
        assert_eq!(config.app_name, "iris");
        assert!(config.constants.is_empty());
    }

    #[test]
    fn test_full_sections() {
        let config = parse(
            "
name: iris
python_packages: [scikit-learn==0.21.2]
constants:
  - {name: class_count, type: INT, value: 3}
raw_columns:
  - {name: sepal_length, type: FLOAT_COLUMN, required: true}
aggregates:
  - {name: sepal_mean, aggregator: mean, input: \"@sepal_length\"}
transformed_columns:
  - {name: sepal_norm, transformer: normalize, input: {col: \"@sepal_length\", mean: \"@sepal_mean\", stddev: 1.0}}
models:
  - {name: dnn, target_column: \"@sepal_norm\", input: {cols: [\"@sepal_norm\"]}}
apis:
  - {name: classifier, model: \"@dnn\"}
",
        )
        .unwrap();
        assert_eq!(config.python_packages[0].name, "scikit-learn");
        assert_eq!(config.raw_columns[0].column_type, ColumnType::FloatColumn);
        assert!(config.raw_columns[0].required);
        assert_eq!(config.models[0].target_column, "sepal_norm");
        assert_eq!(config.apis[0].model_name, "dnn");
    }

    #[test]
    fn test_errors_carry_section_paths() {
        let err = parse("{name: iris, constants: [{name: c}]}").unwrap_err();
        assert_eq!(err.to_string(), "constants[0].type: must be defined");

        let err = parse("{name: iris, raw_columns: [{name: c, type: FLOAT}]}").unwrap_err();
        assert!(err.to_string().starts_with("raw_columns[0].type:"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(parse("{name: iris, extra: 1}").is_err());
        assert!(parse("{name: iris, apis: [{name: a, model: m, extra: 1}]}").is_err());
    }

    #[test]
    fn test_duplicate_names_across_kinds() {
        let err = parse(
            "{name: iris, constants: [{name: x, type: INT, value: 1}], raw_columns: [{name: x, type: INT_COLUMN}]}",
        )
        .unwrap_err();
        assert!(matches!(
            *err.kind(),
            ErrorKind::DuplicateResourceName { .. }
        ));
    }
}
