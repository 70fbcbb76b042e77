//! Resource graph construction for trellis pipelines.
//!
//! Parses a pipeline document into declarations, builds every resource in
//! dependency order with schema casting and reference resolution, and
//! assigns each resource its pair of deterministic content IDs.

mod cast;
mod config;
mod context;
mod dependencies;
pub mod hash;
mod registry;
mod resolve;
mod resource;

pub use cast::cast_runtime;
pub use config::{
    AggregateDecl, ApiDecl, ConstantDecl, ModelDecl, PipelineConfig, PythonPackageDecl,
    RawColumnDecl, TransformedColumnDecl,
};
pub use context::Context;
pub use dependencies::{all_dependencies, direct_dependencies};
pub use registry::{Aggregator, Registry, Transformer};
pub use resolve::{collect_ref_names, resolve_refs, ResourceTable};
pub use resource::{
    artifact_key, metadata_key, Aggregate, Api, Constant, Model, PythonPackage, RawColumn,
    Resource, ResourceIds, ResourceMeta, Tags, TrainingDataset, TransformedColumn,
};
