//! Dependency extraction over a built context.
//!
//! Dependency sets are derived on demand from declared inputs rather than
//! stored on resources, so they can never drift from the inputs they
//! describe. Python packages are implicit dependencies of every resource
//! that executes user code in the shared environment.

use std::collections::BTreeSet;

use trellis_types::ResourceKind;

use crate::context::Context;
use crate::resolve::collect_ref_names;
use crate::resource::Resource;

/// IDs a resource directly requires before it can be computed.
pub fn direct_dependencies(resource: Resource<'_>, context: &Context) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    match resource {
        Resource::PythonPackage(_) | Resource::Constant(_) => {}
        Resource::RawColumn(_) => {
            add_python_packages(&mut deps, context);
        }
        Resource::Aggregate(aggregate) => {
            add_python_packages(&mut deps, context);
            add_input_refs(&mut deps, &aggregate.input, context);
        }
        Resource::TransformedColumn(column) => {
            add_python_packages(&mut deps, context);
            add_input_refs(&mut deps, &column.input, context);
        }
        Resource::TrainingDataset(dataset) => {
            add_python_packages(&mut deps, context);
            if let Some(model) = context.models.get(&dataset.model_name) {
                add_column_refs(&mut deps, model, context);
            }
        }
        Resource::Model(model) => {
            add_python_packages(&mut deps, context);
            add_input_refs(&mut deps, &model.input, context);
            if let Some(target) = context.get(&model.target_column) {
                deps.insert(target.id().to_string());
            }
            deps.insert(model.dataset.ids.id.clone());
        }
        Resource::Api(api) => {
            if let Some(model) = context.models.get(&api.model_name) {
                deps.insert(model.ids.id.clone());
            }
        }
    }
    deps
}

/// The transitive closure of [`direct_dependencies`]. A visited set keeps
/// the walk linear in the number of edges.
pub fn all_dependencies(resource: Resource<'_>, context: &Context) -> BTreeSet<String> {
    let mut all = BTreeSet::new();
    let mut pending: Vec<String> = direct_dependencies(resource, context).into_iter().collect();
    while let Some(id) = pending.pop() {
        if !all.insert(id.clone()) {
            continue;
        }
        if let Some(dep) = context.get_by_id(&id) {
            for next in direct_dependencies(dep, context) {
                if !all.contains(&next) {
                    pending.push(next);
                }
            }
        }
    }
    all
}

fn add_python_packages(deps: &mut BTreeSet<String>, context: &Context) {
    for package in context.python_packages.values() {
        deps.insert(package.ids.id.clone());
    }
}

fn add_input_refs(deps: &mut BTreeSet<String>, input: &trellis_types::Value, context: &Context) {
    let mut names = Vec::new();
    collect_ref_names(input, &mut names);
    for name in names {
        if let Some(resource) = context.get(&name) {
            deps.insert(resource.id().to_string());
        }
    }
}

/// The column resources a model's training dataset reads: every column
/// referenced by the model's input, plus the target column.
fn add_column_refs(deps: &mut BTreeSet<String>, model: &crate::resource::Model, context: &Context) {
    let mut names = Vec::new();
    collect_ref_names(&model.input, &mut names);
    names.push(model.target_column.clone());
    for name in names {
        if let Some(resource) = context.get(&name) {
            if matches!(
                resource.kind(),
                ResourceKind::RawColumn | ResourceKind::TransformedColumn
            ) {
                deps.insert(resource.id().to_string());
            }
        }
    }
}
