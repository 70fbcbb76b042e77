//! Context construction.
//!
//! A [`Context`] is the full resource graph for one deployment. It is built
//! in dependency order (packages, raw columns, constants, aggregates,
//! transformed columns, models, APIs), so every reference a resource may
//! legally make points at something already built. Once built, a context is
//! never mutated.

use indexmap::IndexMap;
use tracing::debug;
use trellis_schema::{cast_constant, OutputType, Result, WrapPath};
use trellis_types::{ResourceKind, Value};

use crate::cast::cast_runtime;
use crate::config::PipelineConfig;
use crate::hash;
use crate::registry::Registry;
use crate::resolve::{resolve_refs, ResourceTable};
use crate::resource::{
    artifact_key, metadata_key, Aggregate, Api, Constant, Model, PythonPackage, RawColumn,
    Resource, ResourceIds, ResourceMeta, Tags, TrainingDataset, TransformedColumn,
};

const AGGREGATE_INPUT_KINDS: &[ResourceKind] = &[ResourceKind::Constant, ResourceKind::RawColumn];
const TRANSFORM_INPUT_KINDS: &[ResourceKind] = &[
    ResourceKind::Constant,
    ResourceKind::RawColumn,
    ResourceKind::Aggregate,
];
const MODEL_INPUT_KINDS: &[ResourceKind] = &[
    ResourceKind::Constant,
    ResourceKind::RawColumn,
    ResourceKind::Aggregate,
    ResourceKind::TransformedColumn,
];
const TARGET_COLUMN_KINDS: &[ResourceKind] =
    &[ResourceKind::RawColumn, ResourceKind::TransformedColumn];

#[derive(Debug, Clone)]
pub struct Context {
    pub app_name: String,
    pub id: String,
    pub key: String,
    pub root: String,
    pub python_packages: IndexMap<String, PythonPackage>,
    pub constants: IndexMap<String, Constant>,
    pub raw_columns: IndexMap<String, RawColumn>,
    pub aggregates: IndexMap<String, Aggregate>,
    pub transformed_columns: IndexMap<String, TransformedColumn>,
    pub models: IndexMap<String, Model>,
    pub training_datasets: IndexMap<String, TrainingDataset>,
    pub apis: IndexMap<String, Api>,
}

impl Context {
    pub fn build(config: &PipelineConfig, registry: &Registry, root: &str) -> Result<Context> {
        let python_packages = build_python_packages(config, root);
        let raw_columns = build_raw_columns(config, root);
        let constants = build_constants(config, root)?;

        let aggregates = {
            let mut table = ResourceTable::for_config(config);
            insert_all(&mut table, constants.values().map(Resource::Constant));
            insert_all(&mut table, raw_columns.values().map(Resource::RawColumn));
            build_aggregates(config, registry, root, &table)?
        };

        let transformed_columns = {
            let mut table = ResourceTable::for_config(config);
            insert_all(&mut table, constants.values().map(Resource::Constant));
            insert_all(&mut table, raw_columns.values().map(Resource::RawColumn));
            insert_all(&mut table, aggregates.values().map(Resource::Aggregate));
            build_transformed_columns(config, registry, root, &table)?
        };

        let models = {
            let mut table = ResourceTable::for_config(config);
            insert_all(&mut table, constants.values().map(Resource::Constant));
            insert_all(&mut table, raw_columns.values().map(Resource::RawColumn));
            insert_all(&mut table, aggregates.values().map(Resource::Aggregate));
            insert_all(
                &mut table,
                transformed_columns.values().map(Resource::TransformedColumn),
            );
            build_models(config, root, &table)?
        };

        let training_datasets: IndexMap<String, TrainingDataset> = models
            .values()
            .map(|m| (m.dataset.meta.name.clone(), m.dataset.clone()))
            .collect();

        let apis = {
            let mut table = ResourceTable::for_config(config);
            insert_all(&mut table, models.values().map(Resource::Model));
            build_apis(config, root, &table)?
        };

        let mut context = Context {
            app_name: config.app_name.clone(),
            id: String::new(),
            key: String::new(),
            root: root.to_string(),
            python_packages,
            constants,
            raw_columns,
            aggregates,
            transformed_columns,
            models,
            training_datasets,
            apis,
        };

        let mut all_ids: Vec<&str> = context.resources().map(|r| r.id()).collect();
        all_ids.sort_unstable();
        all_ids.dedup();
        context.id = hash::combine(all_ids);
        context.key = format!("{root}/contexts/{}.msgpack", context.id);
        debug!(
            app = %context.app_name,
            id = %context.id,
            resources = context.resources().count(),
            "built context"
        );
        Ok(context)
    }

    /// All resources, in build order.
    pub fn resources(&self) -> impl Iterator<Item = Resource<'_>> {
        let packages = self.python_packages.values().map(Resource::PythonPackage);
        let raw = self.raw_columns.values().map(Resource::RawColumn);
        let constants = self.constants.values().map(Resource::Constant);
        let aggregates = self.aggregates.values().map(Resource::Aggregate);
        let transformed = self
            .transformed_columns
            .values()
            .map(Resource::TransformedColumn);
        let models = self.models.values().map(Resource::Model);
        let datasets = self.training_datasets.values().map(Resource::TrainingDataset);
        let apis = self.apis.values().map(Resource::Api);
        packages
            .chain(raw)
            .chain(constants)
            .chain(aggregates)
            .chain(transformed)
            .chain(models)
            .chain(datasets)
            .chain(apis)
    }

    pub fn get(&self, name: &str) -> Option<Resource<'_>> {
        self.resources().find(|r| r.name() == name)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Resource<'_>> {
        self.resources().find(|r| r.id() == id)
    }
}

fn insert_all<'a>(table: &mut ResourceTable<'a>, resources: impl Iterator<Item = Resource<'a>>) {
    for resource in resources {
        table.insert(resource);
    }
}

fn meta_for(config: &PipelineConfig, name: &str, index: usize) -> ResourceMeta {
    ResourceMeta {
        name: name.to_string(),
        index,
        file_path: config.file_path.clone(),
        embedded_in: None,
    }
}

fn ids_for(id: String, tags: &Tags) -> ResourceIds {
    let id_with_tags = if tags.is_empty() {
        id.clone()
    } else {
        hash::combine([id.as_str(), tags.id().as_str()])
    };
    ResourceIds { id, id_with_tags }
}

fn build_python_packages(config: &PipelineConfig, root: &str) -> IndexMap<String, PythonPackage> {
    let mut out = IndexMap::new();
    for decl in &config.python_packages {
        let id = hash::string(&format!("python_package:{}", decl.requirement));
        debug!(name = %decl.name, %id, "built python package");
        out.insert(
            decl.name.clone(),
            PythonPackage {
                meta: meta_for(config, &decl.name, decl.index),
                package_key: artifact_key(root, ResourceKind::PythonPackage, &id),
                ids: ResourceIds {
                    id_with_tags: id.clone(),
                    id,
                },
                requirement: decl.requirement.clone(),
            },
        );
    }
    out
}

fn build_raw_columns(config: &PipelineConfig, root: &str) -> IndexMap<String, RawColumn> {
    let mut out = IndexMap::new();
    for decl in &config.raw_columns {
        let id = hash::string(&format!(
            "raw_column:{}:{}:{}",
            decl.name, decl.column_type, decl.required
        ));
        let ids = ids_for(id, &decl.tags);
        debug!(name = %decl.name, id = %ids.id, "built raw column");
        out.insert(
            decl.name.clone(),
            RawColumn {
                meta: meta_for(config, &decl.name, decl.index),
                metadata_key: metadata_key(root, ResourceKind::RawColumn, &ids.id),
                ids,
                column_type: decl.column_type,
                required: decl.required,
                tags: decl.tags.clone(),
            },
        );
    }
    out
}

fn build_constants(config: &PipelineConfig, root: &str) -> Result<IndexMap<String, Constant>> {
    let mut out = IndexMap::new();
    for decl in &config.constants {
        let meta = meta_for(config, &decl.name, decl.index);
        let identify = meta.identify(ResourceKind::Constant);

        let output_type = OutputType::validate(&decl.output_type)
            .wrap_path("type")
            .map_err(|err| err.wrap_resource(identify.clone()))?;
        let value = cast_constant(&decl.value, &output_type)
            .wrap_path("value")
            .map_err(|err| err.wrap_resource(identify))?;

        let id = hash::combine([
            "constant",
            &output_type.to_string(),
            &hash::value(&value),
        ]);
        let ids = ids_for(id, &decl.tags);
        debug!(name = %decl.name, id = %ids.id, "built constant");
        out.insert(
            decl.name.clone(),
            Constant {
                meta,
                key: artifact_key(root, ResourceKind::Constant, &ids.id),
                ids,
                output_type,
                value,
                tags: decl.tags.clone(),
            },
        );
    }
    Ok(out)
}

/// Casts an input tree against a function schema, then resolves its
/// references into the two hashable trees.
fn process_input(
    input: &Value,
    schema: Option<&trellis_schema::InputSchema>,
    allowed: &[ResourceKind],
    table: &ResourceTable,
) -> Result<(Value, String, String)> {
    let casted = cast_runtime(input, schema, allowed, table).wrap_path("input")?;
    let (by_id, by_idwt) = resolve_refs(&casted, allowed, table).wrap_path("input")?;
    Ok((casted, hash::value(&by_id), hash::value(&by_idwt)))
}

fn build_aggregates(
    config: &PipelineConfig,
    registry: &Registry,
    root: &str,
    table: &ResourceTable,
) -> Result<IndexMap<String, Aggregate>> {
    let mut out = IndexMap::new();
    for decl in &config.aggregates {
        let meta = meta_for(config, &decl.name, decl.index);
        let identify = meta.identify(ResourceKind::Aggregate);

        let aggregator = registry
            .aggregator(&decl.aggregator)
            .wrap_path("aggregator")
            .map_err(|err| err.wrap_resource(identify.clone()))?;
        let (input, input_id, input_idwt) = process_input(
            &decl.input,
            aggregator.input_schema.as_ref(),
            AGGREGATE_INPUT_KINDS,
            table,
        )
        .map_err(|err| err.wrap_resource(identify))?;

        let id = hash::combine(["aggregate", &input_id, &aggregator.id]);
        let id_with_tags = if decl.tags.is_empty() {
            hash::combine(["aggregate", &input_idwt, &aggregator.id_with_tags])
        } else {
            hash::combine([
                "aggregate",
                input_idwt.as_str(),
                aggregator.id_with_tags.as_str(),
                decl.tags.id().as_str(),
            ])
        };
        debug!(name = %decl.name, %id, "built aggregate");
        out.insert(
            decl.name.clone(),
            Aggregate {
                meta,
                key: artifact_key(root, ResourceKind::Aggregate, &id),
                metadata_key: metadata_key(root, ResourceKind::Aggregate, &id),
                ids: ResourceIds { id, id_with_tags },
                aggregator: aggregator.name.clone(),
                input,
                output_type: aggregator.output_type.clone(),
                tags: decl.tags.clone(),
            },
        );
    }
    Ok(out)
}

fn build_transformed_columns(
    config: &PipelineConfig,
    registry: &Registry,
    root: &str,
    table: &ResourceTable,
) -> Result<IndexMap<String, TransformedColumn>> {
    let mut out = IndexMap::new();
    for decl in &config.transformed_columns {
        let meta = meta_for(config, &decl.name, decl.index);
        let identify = meta.identify(ResourceKind::TransformedColumn);

        let transformer = registry
            .transformer(&decl.transformer)
            .wrap_path("transformer")
            .map_err(|err| err.wrap_resource(identify.clone()))?;
        let (input, input_id, input_idwt) = process_input(
            &decl.input,
            transformer.input_schema.as_ref(),
            TRANSFORM_INPUT_KINDS,
            table,
        )
        .map_err(|err| err.wrap_resource(identify))?;

        let id = hash::combine(["transformed_column", &input_id, &transformer.id]);
        let id_with_tags = if decl.tags.is_empty() {
            hash::combine(["transformed_column", &input_idwt, &transformer.id_with_tags])
        } else {
            hash::combine([
                "transformed_column",
                input_idwt.as_str(),
                transformer.id_with_tags.as_str(),
                decl.tags.id().as_str(),
            ])
        };
        debug!(name = %decl.name, %id, "built transformed column");
        out.insert(
            decl.name.clone(),
            TransformedColumn {
                meta,
                metadata_key: metadata_key(root, ResourceKind::TransformedColumn, &id),
                ids: ResourceIds { id, id_with_tags },
                transformer: transformer.name.clone(),
                input,
                column_type: transformer.output_type,
                tags: decl.tags.clone(),
            },
        );
    }
    Ok(out)
}

fn build_models(
    config: &PipelineConfig,
    root: &str,
    table: &ResourceTable,
) -> Result<IndexMap<String, Model>> {
    let mut out = IndexMap::new();
    for decl in &config.models {
        let meta = meta_for(config, &decl.name, decl.index);
        let identify = meta.identify(ResourceKind::Model);

        // model inputs carry no schema; references are still validated
        let (input, input_id, input_idwt) =
            process_input(&decl.input, None, MODEL_INPUT_KINDS, table)
                .map_err(|err| err.wrap_resource(identify.clone()))?;
        let target = table
            .lookup(&decl.target_column, TARGET_COLUMN_KINDS)
            .wrap_path("target_column")
            .map_err(|err| err.wrap_resource(identify))?;

        let id = hash::combine([
            "model",
            input_id.as_str(),
            target.ids().id.as_str(),
            decl.prediction_key.as_str(),
        ]);
        let id_with_tags = if decl.tags.is_empty() {
            hash::combine([
                "model",
                input_idwt.as_str(),
                target.ids().id_with_tags.as_str(),
                decl.prediction_key.as_str(),
            ])
        } else {
            hash::combine([
                "model",
                input_idwt.as_str(),
                target.ids().id_with_tags.as_str(),
                decl.prediction_key.as_str(),
                decl.tags.id().as_str(),
            ])
        };

        let dataset_name = format!("{}_training", decl.name);
        let dataset_id = hash::combine(["training_dataset", &id]);
        let dataset_idwt = hash::combine(["training_dataset", &id_with_tags]);
        let dataset = TrainingDataset {
            meta: ResourceMeta {
                name: dataset_name,
                index: decl.index,
                file_path: config.file_path.clone(),
                embedded_in: Some(decl.name.clone()),
            },
            train_key: format!(
                "{root}/{}/{dataset_id}_train.msgpack",
                ResourceKind::TrainingDataset.dir()
            ),
            eval_key: format!(
                "{root}/{}/{dataset_id}_eval.msgpack",
                ResourceKind::TrainingDataset.dir()
            ),
            metadata_key: metadata_key(root, ResourceKind::TrainingDataset, &dataset_id),
            ids: ResourceIds {
                id: dataset_id,
                id_with_tags: dataset_idwt,
            },
            model_name: decl.name.clone(),
        };

        debug!(name = %decl.name, %id, "built model");
        out.insert(
            decl.name.clone(),
            Model {
                meta: meta_for(config, &decl.name, decl.index),
                key: artifact_key(root, ResourceKind::Model, &id),
                metadata_key: metadata_key(root, ResourceKind::Model, &id),
                ids: ResourceIds { id, id_with_tags },
                input,
                target_column: decl.target_column.clone(),
                prediction_key: decl.prediction_key.clone(),
                tags: decl.tags.clone(),
                dataset,
            },
        );
    }
    Ok(out)
}

fn build_apis(
    config: &PipelineConfig,
    root: &str,
    table: &ResourceTable,
) -> Result<IndexMap<String, Api>> {
    let mut out = IndexMap::new();
    for decl in &config.apis {
        let meta = meta_for(config, &decl.name, decl.index);
        let identify = meta.identify(ResourceKind::Api);

        let model = table
            .lookup(&decl.model_name, &[ResourceKind::Model])
            .wrap_path("model")
            .map_err(|err| err.wrap_resource(identify))?;

        let id = hash::combine(["api", &decl.name, &model.ids().id]);
        let id_with_tags = if decl.tags.is_empty() {
            hash::combine(["api", &decl.name, &model.ids().id_with_tags])
        } else {
            hash::combine([
                "api",
                decl.name.as_str(),
                model.ids().id_with_tags.as_str(),
                decl.tags.id().as_str(),
            ])
        };
        debug!(name = %decl.name, %id, "built api");
        out.insert(
            decl.name.clone(),
            Api {
                meta,
                metadata_key: metadata_key(root, ResourceKind::Api, &id),
                ids: ResourceIds { id, id_with_tags },
                model_name: decl.model_name.clone(),
                tags: decl.tags.clone(),
            },
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_schema::ErrorKind;
    use trellis_types::from_yaml_str;

    fn build(src: &str) -> Result<Context> {
        let doc = from_yaml_str(src).unwrap();
        let config = PipelineConfig::from_value(&doc, "pipeline.yaml")?;
        Context::build(&config, &Registry::builtin()?, "apps/iris")
    }

    const PIPELINE: &str = "
name: iris
python_packages: [scikit-learn==0.21.2]
constants:
  - {name: bucket_count, type: INT, value: 5}
raw_columns:
  - {name: sepal_length, type: FLOAT_COLUMN, required: true}
  - {name: class, type: STRING_COLUMN}
aggregates:
  - {name: sepal_boundaries, aggregator: bucket_boundaries, input: {col: \"@sepal_length\", num_buckets: \"@bucket_count\"}}
transformed_columns:
  - {name: sepal_bucket, transformer: bucketize, input: {col: \"@sepal_length\", bucket_boundaries: \"@sepal_boundaries\"}}
  - {name: class_index, transformer: index_string, input: {col: \"@class\"}}
models:
  - {name: dnn, target_column: \"@class_index\", input: {cols: [\"@sepal_bucket\"]}}
apis:
  - {name: classifier, model: \"@dnn\"}
";

    #[test]
    fn test_build_full_pipeline() {
        let context = build(PIPELINE).unwrap();
        assert_eq!(context.app_name, "iris");
        assert_eq!(context.resources().count(), 10);
        assert!(context.get("sepal_boundaries").is_some());
        assert!(context.get("dnn_training").is_some());
        assert!(context.key.starts_with("apps/iris/contexts/"));
    }

    #[test]
    fn test_ids_are_deterministic() {
        let a = build(PIPELINE).unwrap();
        let b = build(PIPELINE).unwrap();
        assert_eq!(a.id, b.id);
        for (x, y) in a.resources().zip(b.resources()) {
            assert_eq!(x.ids(), y.ids());
        }
    }

    #[test]
    fn test_tag_change_only_affects_id_with_tags() {
        let tagged = PIPELINE.replace(
            "{name: sepal_length, type: FLOAT_COLUMN, required: true}",
            "{name: sepal_length, type: FLOAT_COLUMN, required: true, tags: {owner: ml}}",
        );
        let a = build(PIPELINE).unwrap();
        let b = build(&tagged).unwrap();
        let col_a = &a.raw_columns["sepal_length"];
        let col_b = &b.raw_columns["sepal_length"];
        assert_eq!(col_a.ids.id, col_b.ids.id);
        assert_ne!(col_a.ids.id_with_tags, col_b.ids.id_with_tags);
        // downstream primary IDs are untouched as well
        assert_eq!(
            a.transformed_columns["sepal_bucket"].ids.id,
            b.transformed_columns["sepal_bucket"].ids.id
        );
        assert_ne!(
            a.transformed_columns["sepal_bucket"].ids.id_with_tags,
            b.transformed_columns["sepal_bucket"].ids.id_with_tags
        );
    }

    #[test]
    fn test_input_change_changes_downstream_ids() {
        let changed = PIPELINE.replace("num_buckets: \"@bucket_count\"", "num_buckets: 7");
        let a = build(PIPELINE).unwrap();
        let b = build(&changed).unwrap();
        assert_ne!(
            a.aggregates["sepal_boundaries"].ids.id,
            b.aggregates["sepal_boundaries"].ids.id
        );
        assert_eq!(
            a.raw_columns["sepal_length"].ids.id,
            b.raw_columns["sepal_length"].ids.id
        );
    }

    #[test]
    fn test_aggregate_cannot_reference_transformed_column() {
        let src = "
name: iris
raw_columns:
  - {name: sepal_length, type: FLOAT_COLUMN}
transformed_columns:
  - {name: sepal_norm, transformer: normalize, input: {col: \"@sepal_length\", mean: 0.0, stddev: 1.0}}
aggregates:
  - {name: bad, aggregator: mean, input: \"@sepal_norm\"}
";
        let err = build(src).unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::WrongResourceKind { .. }));
        assert!(err.to_string().contains("transformed_column"));
        assert!(err
            .to_string()
            .starts_with("pipeline.yaml: aggregate: bad: input:"));
    }

    #[test]
    fn test_map_key_references_count_toward_identity_and_deps() {
        // threshold is referenced only in key position
        let src = PIPELINE
            .replace(
                "  - {name: bucket_count, type: INT, value: 5}",
                "  - {name: bucket_count, type: INT, value: 5}\n  - {name: threshold, type: INT, value: 5}",
            )
            .replace(
                "input: {cols: [\"@sepal_bucket\"]}",
                "input: {\"@threshold\": 1, cols: [\"@sepal_bucket\"]}",
            );
        let context = build(&src).unwrap();
        let deps = crate::dependencies::direct_dependencies(
            context.get("dnn").unwrap(),
            &context,
        );
        assert!(deps.contains(&context.constants["threshold"].ids.id));

        // editing the keyed constant invalidates the model
        let edited = src.replace(
            "{name: threshold, type: INT, value: 5}",
            "{name: threshold, type: INT, value: 7}",
        );
        let b = build(&edited).unwrap();
        assert_ne!(context.models["dnn"].ids.id, b.models["dnn"].ids.id);
    }

    #[test]
    fn test_map_key_references_are_validated() {
        let src = PIPELINE.replace(
            "input: {cols: [\"@sepal_bucket\"]}",
            "input: {\"@nonexistent\": 1, cols: [\"@sepal_bucket\"]}",
        );
        let err = build(&src).unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::UndefinedResource { .. }));
        assert!(err.to_string().starts_with("pipeline.yaml: model: dnn: input"));

        // a declared name of a disallowed kind in key position
        let src = PIPELINE.replace(
            "input: {cols: [\"@sepal_bucket\"]}",
            "input: {\"@scikit-learn\": 1, cols: [\"@sepal_bucket\"]}",
        );
        let err = build(&src).unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::WrongResourceKind { .. }));
        assert!(err.to_string().contains("python_package"));
    }

    #[test]
    fn test_type_mismatch_names_producer() {
        let src = "
name: iris
raw_columns:
  - {name: class, type: STRING_COLUMN}
aggregates:
  - {name: class_mean, aggregator: mean, input: \"@class\"}
";
        let err = build(src).unwrap_err();
        assert!(matches!(
            *err.kind(),
            ErrorKind::UnsupportedOutputType { .. }
        ));
    }

    #[test]
    fn test_target_column_must_be_a_column() {
        let src = "
name: iris
constants:
  - {name: k, type: INT, value: 1}
raw_columns:
  - {name: sepal_length, type: FLOAT_COLUMN}
models:
  - {name: dnn, target_column: \"@k\", input: {cols: [\"@sepal_length\"]}}
";
        let err = build(src).unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::WrongResourceKind { .. }));
    }

    #[test]
    fn test_undefined_aggregator() {
        let src = "
name: iris
raw_columns:
  - {name: sepal_length, type: FLOAT_COLUMN}
aggregates:
  - {name: x, aggregator: median, input: \"@sepal_length\"}
";
        let err = build(src).unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::UndefinedFunction { .. }));
    }
}
