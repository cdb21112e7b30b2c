//! Hit materialization strategies.

use std::collections::HashMap;
use std::mem::discriminant;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::engine::SearchHit;
use crate::error::{IndexerResult, QueryError};
use crate::mapping::{MappingRegistry, ModelMapper};
use crate::model::{IndexableObject, ModelType};
use crate::store::PrimaryStore;

/// A materialized hit, tagged with its position in the hit list.
pub(crate) type Materialized = (usize, Box<dyn IndexableObject>);

/// Turns search hits into host instances.
///
/// Results keep hit order. A transformer may drop hits; the position tag lets
/// the caller keep scores and sort values aligned.
#[async_trait]
pub(crate) trait ResultTransformer: Send + Sync {
    async fn transform(&self, hits: &[SearchHit]) -> IndexerResult<Vec<Materialized>>;
}

fn mapper_for_hit(registry: &MappingRegistry, hit: &SearchHit) -> IndexerResult<Arc<ModelMapper>> {
    let model_type = registry
        .lookup_type(&hit.doc_type)
        .ok_or_else(|| QueryError::UnknownDocumentType {
            doc_type: hit.doc_type.clone(),
        })?;
    Ok(registry.get_mapper_for(model_type)?)
}

/// Copies top-level source fields onto a fresh instance by name.
///
/// A field is assigned when the fresh instance holds a value of the same JSON
/// kind, or null. Structured values are merged key by key so template
/// defaults survive for child fields the document lacks. Flattened embedded
/// keys and anything else unknown are skipped. A hit that still cannot be
/// rebuilt is dropped with a warning.
pub(crate) struct DirectTransformer<'a> {
    registry: &'a MappingRegistry,
}

impl<'a> DirectTransformer<'a> {
    pub(crate) fn new(registry: &'a MappingRegistry) -> Self {
        Self { registry }
    }
}

pub(crate) fn assign_by_name(template: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (name, value) in source {
        match (template.get_mut(name), value) {
            (Some(Value::Object(existing)), Value::Object(sub)) => assign_by_name(existing, sub),
            (Some(existing), _)
                if existing.is_null() || discriminant(&*existing) == discriminant(value) =>
            {
                *existing = value.clone();
            }
            _ => {}
        }
    }
}

#[async_trait]
impl ResultTransformer for DirectTransformer<'_> {
    async fn transform(&self, hits: &[SearchHit]) -> IndexerResult<Vec<Materialized>> {
        let mut out = Vec::with_capacity(hits.len());
        for (position, hit) in hits.iter().enumerate() {
            let mapper = mapper_for_hit(self.registry, hit)?;
            let model_type = mapper.model_type();
            let mut template = match model_type.descriptor().template() {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            assign_by_name(&mut template, &hit.source);
            match model_type.instantiate(Value::Object(template)) {
                Ok(object) => out.push((position, object)),
                Err(e) => warn!(
                    type_name = %mapper.type_name(),
                    id = %hit.id,
                    error = %e,
                    "Cannot assign hit directly, dropping it"
                ),
            }
        }
        Ok(out)
    }
}

/// Rebuilds instances through their [`ModelMapper`].
pub(crate) struct MapperTransformer<'a> {
    registry: &'a MappingRegistry,
}

impl<'a> MapperTransformer<'a> {
    pub(crate) fn new(registry: &'a MappingRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ResultTransformer for MapperTransformer<'_> {
    async fn transform(&self, hits: &[SearchHit]) -> IndexerResult<Vec<Materialized>> {
        hits.iter()
            .enumerate()
            .map(|(position, hit)| -> IndexerResult<Materialized> {
                let mapper = mapper_for_hit(self.registry, hit)?;
                Ok((position, mapper.instantiate(&hit.source)?))
            })
            .collect()
    }
}

/// Loads the canonical rows for the hits from the primary store.
pub(crate) struct HydratingTransformer<'a> {
    registry: &'a MappingRegistry,
    store: &'a dyn PrimaryStore,
    fail_on_missing_objects: bool,
}

impl<'a> HydratingTransformer<'a> {
    pub(crate) fn new(
        registry: &'a MappingRegistry,
        store: &'a dyn PrimaryStore,
        fail_on_missing_objects: bool,
    ) -> Self {
        Self {
            registry,
            store,
            fail_on_missing_objects,
        }
    }
}

struct TypeGroup {
    model_type: ModelType,
    mapper: Arc<ModelMapper>,
    ids: Vec<String>,
}

#[async_trait]
impl ResultTransformer for HydratingTransformer<'_> {
    async fn transform(&self, hits: &[SearchHit]) -> IndexerResult<Vec<Materialized>> {
        let mut groups: Vec<TypeGroup> = Vec::new();
        for hit in hits {
            let mapper = mapper_for_hit(self.registry, hit)?;
            let model_type = mapper.model_type();
            match groups.iter_mut().find(|g| g.model_type == model_type) {
                Some(group) => group.ids.push(hit.id.clone()),
                None => groups.push(TypeGroup {
                    model_type,
                    mapper,
                    ids: vec![hit.id.clone()],
                }),
            }
        }

        let mut loaded: HashMap<(String, String), Box<dyn IndexableObject>> = HashMap::new();
        for group in &groups {
            let rows = self.store.load_by_ids(group.model_type, &group.ids).await?;
            for row in rows {
                let id = group.mapper.document_id(row.as_ref())?;
                loaded.insert((group.mapper.document_type().to_string(), id), row);
            }
        }

        let mut out = Vec::with_capacity(hits.len());
        let mut missing = Vec::new();
        for (position, hit) in hits.iter().enumerate() {
            match loaded.remove(&(hit.doc_type.clone(), hit.id.clone())) {
                Some(object) => out.push((position, object)),
                None => missing.push(format!("{}/{}", hit.doc_type, hit.id)),
            }
        }

        if !missing.is_empty() {
            if self.fail_on_missing_objects {
                return Err(QueryError::MissingObjects { missing }.into());
            }
            warn!(
                missing = missing.len(),
                ids = %missing.join(", "),
                "Indexed objects missing from the primary store, reindex required"
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_assign_by_name_matches_kinds() {
        let mut template = json!({"id": 0, "title": "", "tags": [], "note": null})
            .as_object()
            .cloned()
            .unwrap();
        let source = json!({
            "id": 7,
            "title": 12,
            "tags": ["a"],
            "note": "x",
            "author.name": "ann"
        })
        .as_object()
        .cloned()
        .unwrap();

        assign_by_name(&mut template, &source);
        assert_eq!(template["id"], 7);
        assert_eq!(template["title"], "");
        assert_eq!(template["tags"], json!(["a"]));
        assert_eq!(template["note"], "x");
        assert!(!template.contains_key("author.name"));
    }

    #[test]
    fn test_assign_by_name_merges_objects() {
        let mut template = json!({"owner": {"name": "", "secret": ""}})
            .as_object()
            .cloned()
            .unwrap();
        let source = json!({"owner": {"name": "ann", "extra": 1}})
            .as_object()
            .cloned()
            .unwrap();

        assign_by_name(&mut template, &source);
        assert_eq!(template["owner"], json!({"name": "ann", "secret": ""}));
    }
}
