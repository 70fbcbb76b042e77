//! Resource reference resolution.

use indexmap::IndexMap;
use trellis_schema::{Error, ErrorKind, Result, WrapPath};
use trellis_types::{ResourceKind, Value};

use crate::config::PipelineConfig;
use crate::resource::Resource;

/// Name lookup over every resource built so far, plus the kind of every
/// declared name. One shared namespace; per-call kind restrictions decide
/// what a given position may reference. The declared index lets a reference
/// to a resource of a disallowed kind report the kind mismatch even when
/// that resource is built in a later phase.
#[derive(Debug, Default)]
pub struct ResourceTable<'a> {
    by_name: IndexMap<&'a str, Resource<'a>>,
    declared: IndexMap<&'a str, ResourceKind>,
}

impl<'a> ResourceTable<'a> {
    /// An empty table seeded with the declared names of `config`.
    pub fn for_config(config: &'a PipelineConfig) -> ResourceTable<'a> {
        let mut table = ResourceTable::default();
        for decl in &config.python_packages {
            table.declared.insert(&decl.name, ResourceKind::PythonPackage);
        }
        for decl in &config.constants {
            table.declared.insert(&decl.name, ResourceKind::Constant);
        }
        for decl in &config.raw_columns {
            table.declared.insert(&decl.name, ResourceKind::RawColumn);
        }
        for decl in &config.aggregates {
            table.declared.insert(&decl.name, ResourceKind::Aggregate);
        }
        for decl in &config.transformed_columns {
            table
                .declared
                .insert(&decl.name, ResourceKind::TransformedColumn);
        }
        for decl in &config.models {
            table.declared.insert(&decl.name, ResourceKind::Model);
        }
        for decl in &config.apis {
            table.declared.insert(&decl.name, ResourceKind::Api);
        }
        table
    }

    pub fn insert(&mut self, resource: Resource<'a>) {
        self.by_name.insert(resource.name(), resource);
    }

    pub fn get(&self, name: &str) -> Option<Resource<'a>> {
        self.by_name.get(name).copied()
    }

    /// Looks up a reference, enforcing the allowed upstream kinds.
    pub fn lookup(&self, name: &str, allowed: &[ResourceKind]) -> Result<Resource<'a>> {
        if let Some(resource) = self.get(name) {
            if allowed.contains(&resource.kind()) {
                return Ok(resource);
            }
            return Err(wrong_kind(name, resource.kind(), allowed));
        }
        if let Some(kind) = self.declared.get(name) {
            return Err(wrong_kind(name, *kind, allowed));
        }
        Err(Error::new(ErrorKind::UndefinedResource {
            name: name.to_string(),
            allowed: render_kinds(allowed),
        }))
    }
}

fn wrong_kind(name: &str, actual: ResourceKind, allowed: &[ResourceKind]) -> Box<Error> {
    Error::new(ErrorKind::WrongResourceKind {
        name: name.to_string(),
        actual: actual.to_string(),
        allowed: render_kinds(allowed),
    })
}

pub fn render_kinds(kinds: &[ResourceKind]) -> String {
    match kinds {
        [] => "nothing".to_string(),
        [only] => only.to_string(),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(|k| k.as_str()).collect();
            format!("{} or {last}", init.join(", "))
        }
    }
}

/// Replaces every reference in `value` with the referenced resource's
/// content IDs, producing two parallel trees: one substituting `id`, one
/// substituting `id_with_tags`. Everything else is structurally preserved.
pub fn resolve_refs(
    value: &Value,
    allowed: &[ResourceKind],
    table: &ResourceTable,
) -> Result<(Value, Value)> {
    match value {
        Value::Ref(name) => {
            let resource = table.lookup(name, allowed)?;
            let ids = resource.ids();
            Ok((
                Value::String(ids.id.clone()),
                Value::String(ids.id_with_tags.clone()),
            ))
        }
        Value::List(items) => {
            let mut by_id = Vec::with_capacity(items.len());
            let mut by_idwt = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let (a, b) = resolve_refs(item, allowed, table).wrap_path(i)?;
                by_id.push(a);
                by_idwt.push(b);
            }
            Ok((Value::List(by_id), Value::List(by_idwt)))
        }
        Value::Map(entries) => {
            let mut by_id = IndexMap::with_capacity(entries.len());
            let mut by_idwt = IndexMap::with_capacity(entries.len());
            for (key, val) in entries {
                // keys can hold references too
                let (key_a, key_b) = resolve_refs(key, allowed, table)?;
                let (a, b) = resolve_refs(val, allowed, table).wrap_path(key)?;
                by_id.insert(key_a, a);
                by_idwt.insert(key_b, b);
            }
            Ok((Value::Map(by_id), Value::Map(by_idwt)))
        }
        other => Ok((other.clone(), other.clone())),
    }
}

/// Collects the names of every reference in a tree, in traversal order.
pub fn collect_ref_names(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Ref(name) => {
            if !out.iter().any(|existing| existing == name) {
                out.push(name.clone());
            }
        }
        Value::List(items) => {
            for item in items {
                collect_ref_names(item, out);
            }
        }
        Value::Map(entries) => {
            for (key, val) in entries {
                collect_ref_names(key, out);
                collect_ref_names(val, out);
            }
        }
        _ => {}
    }
}
