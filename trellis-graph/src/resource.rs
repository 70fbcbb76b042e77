//! Materialized pipeline resources.
//!
//! Each resource carries the declaration metadata it came from, its pair of
//! content IDs, and the casted values the builder computed for it. The `id`
//! covers everything that determines the resource's output; `id_with_tags`
//! additionally covers its tags, so retagging invalidates caches keyed by
//! `id_with_tags` without invalidating the computation itself.

use indexmap::IndexMap;
use trellis_types::{ColumnType, ResourceKind, Value};

use crate::hash;

/// Where a resource was declared. `embedded_in` names the resource whose
/// declaration generated this one; top-level declarations leave it unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeta {
    pub name: String,
    pub index: usize,
    pub file_path: String,
    pub embedded_in: Option<String>,
}

impl ResourceMeta {
    /// Identity string used as the prefix of validation errors, e.g.
    /// `pipeline.yaml: aggregate: class_boundaries`.
    pub fn identify(&self, kind: ResourceKind) -> String {
        match &self.embedded_in {
            Some(parent) => format!("{}: {} ({}): {}", self.file_path, kind, parent, self.name),
            None => format!("{}: {}: {}", self.file_path, kind, self.name),
        }
    }
}

/// The content-ID pair every resource carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIds {
    pub id: String,
    pub id_with_tags: String,
}

/// Free-form user tags. Tags never affect a resource's `id`, only its
/// `id_with_tags`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags {
    pub entries: IndexMap<String, Value>,
}

impl Tags {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn id(&self) -> String {
        let map = self
            .entries
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect();
        hash::value(&Value::Map(map))
    }
}

#[derive(Debug, Clone)]
pub struct PythonPackage {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    /// The requirement line, e.g. `scikit-learn==0.21.2`.
    pub requirement: String,
    pub package_key: String,
}

#[derive(Debug, Clone)]
pub struct Constant {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub output_type: trellis_schema::OutputType,
    pub value: Value,
    pub tags: Tags,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct RawColumn {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub column_type: ColumnType,
    pub required: bool,
    pub tags: Tags,
    pub metadata_key: String,
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub aggregator: String,
    /// Input after schema casting; may still contain `Ref` nodes.
    pub input: Value,
    pub output_type: trellis_schema::OutputType,
    pub tags: Tags,
    pub key: String,
    pub metadata_key: String,
}

#[derive(Debug, Clone)]
pub struct TransformedColumn {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub transformer: String,
    pub input: Value,
    pub column_type: ColumnType,
    pub tags: Tags,
    pub metadata_key: String,
}

#[derive(Debug, Clone)]
pub struct TrainingDataset {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub model_name: String,
    pub train_key: String,
    pub eval_key: String,
    pub metadata_key: String,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub input: Value,
    pub target_column: String,
    pub prediction_key: String,
    pub tags: Tags,
    pub dataset: TrainingDataset,
    pub key: String,
    pub metadata_key: String,
}

#[derive(Debug, Clone)]
pub struct Api {
    pub meta: ResourceMeta,
    pub ids: ResourceIds,
    pub model_name: String,
    pub tags: Tags,
    pub metadata_key: String,
}

/// A borrowed view over any resource, for kind-agnostic traversal.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    PythonPackage(&'a PythonPackage),
    Constant(&'a Constant),
    RawColumn(&'a RawColumn),
    Aggregate(&'a Aggregate),
    TransformedColumn(&'a TransformedColumn),
    Model(&'a Model),
    TrainingDataset(&'a TrainingDataset),
    Api(&'a Api),
}

impl<'a> Resource<'a> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::PythonPackage(_) => ResourceKind::PythonPackage,
            Resource::Constant(_) => ResourceKind::Constant,
            Resource::RawColumn(_) => ResourceKind::RawColumn,
            Resource::Aggregate(_) => ResourceKind::Aggregate,
            Resource::TransformedColumn(_) => ResourceKind::TransformedColumn,
            Resource::Model(_) => ResourceKind::Model,
            Resource::TrainingDataset(_) => ResourceKind::TrainingDataset,
            Resource::Api(_) => ResourceKind::Api,
        }
    }

    pub fn meta(&self) -> &'a ResourceMeta {
        match self {
            Resource::PythonPackage(r) => &r.meta,
            Resource::Constant(r) => &r.meta,
            Resource::RawColumn(r) => &r.meta,
            Resource::Aggregate(r) => &r.meta,
            Resource::TransformedColumn(r) => &r.meta,
            Resource::Model(r) => &r.meta,
            Resource::TrainingDataset(r) => &r.meta,
            Resource::Api(r) => &r.meta,
        }
    }

    pub fn ids(&self) -> &'a ResourceIds {
        match self {
            Resource::PythonPackage(r) => &r.ids,
            Resource::Constant(r) => &r.ids,
            Resource::RawColumn(r) => &r.ids,
            Resource::Aggregate(r) => &r.ids,
            Resource::TransformedColumn(r) => &r.ids,
            Resource::Model(r) => &r.ids,
            Resource::TrainingDataset(r) => &r.ids,
            Resource::Api(r) => &r.ids,
        }
    }

    pub fn name(&self) -> &'a str {
        &self.meta().name
    }

    pub fn id(&self) -> &'a str {
        &self.ids().id
    }

    pub fn identify(&self) -> String {
        self.meta().identify(self.kind())
    }
}

/// Storage key of a resource's serialized artifact.
pub fn artifact_key(root: &str, kind: ResourceKind, id: &str) -> String {
    format!("{root}/{}/{id}.msgpack", kind.dir())
}

/// Storage key of a resource's metadata document.
pub fn metadata_key(root: &str, kind: ResourceKind, id: &str) -> String {
    format!("{root}/{}/{id}_metadata.json", kind.dir())
}
