//! Inline application of index events.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::engine::{DocumentKey, IndexEngine, SchemaStatus};
use crate::error::IndexerResult;
use crate::mapping::{MappingRegistry, ModelMapper};
use crate::model::IndexableObject;

use super::delivery::IndexEventHandler;
use super::event::{IndexEvent, IndexOperation};

/// Serializes and writes (or deletes) documents inline.
///
/// Every other delivery strategy ends up here. The schema of a type is
/// ensured before its first write; concurrent first writes may both
/// submit it, which the engine tolerates.
#[derive(Debug, Clone)]
pub struct SynchronousHandler {
    registry: Arc<MappingRegistry>,
    engine: Arc<dyn IndexEngine>,
    ensured: Arc<Mutex<HashSet<TypeId>>>,
}

impl SynchronousHandler {
    /// Creates a handler writing to `engine`.
    pub fn new(registry: Arc<MappingRegistry>, engine: Arc<dyn IndexEngine>) -> Self {
        Self {
            registry,
            engine,
            ensured: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The engine written to.
    pub fn engine(&self) -> &Arc<dyn IndexEngine> {
        &self.engine
    }

    /// Submits the schema of `mapper`'s type unless already done.
    pub async fn ensure_schema(&self, mapper: &ModelMapper) -> IndexerResult<()> {
        let type_id = mapper.model_type().type_id();
        if self.ensured.lock().contains(&type_id) {
            return Ok(());
        }

        let status = self
            .engine
            .create_schema(
                mapper.index_name(),
                mapper.document_type(),
                &mapper.build_schema(),
                mapper.build_settings().as_ref(),
            )
            .await?;
        match status {
            SchemaStatus::Created => info!(
                index = %mapper.index_name(),
                doc_type = %mapper.document_type(),
                "Created index schema"
            ),
            SchemaStatus::AlreadyExists => debug!(
                index = %mapper.index_name(),
                doc_type = %mapper.document_type(),
                "Index schema already exists"
            ),
        }

        self.ensured.lock().insert(type_id);
        Ok(())
    }

    /// Forgets which schemas were ensured.
    pub fn reset_schemas(&self) {
        self.ensured.lock().clear();
    }

    /// Upserts the document of `object`.
    pub async fn write(&self, object: &dyn IndexableObject) -> IndexerResult<()> {
        let (mapper, key) = self.resolve(object).await?;
        let document = mapper.serialize(object)?;
        debug!(key = %key, "Writing document");
        self.engine.put_document(&key, document).await?;
        Ok(())
    }

    /// Deletes the document of `object`. Returns false if there was none.
    pub async fn remove(&self, object: &dyn IndexableObject) -> IndexerResult<bool> {
        let (_, key) = self.resolve(object).await?;
        debug!(key = %key, "Deleting document");
        Ok(self.engine.delete_document(&key).await?)
    }

    async fn resolve(&self, object: &dyn IndexableObject) -> IndexerResult<(Arc<ModelMapper>, DocumentKey)> {
        let mapper = self.registry.get_mapper_for(object.model_type())?;
        self.ensure_schema(&mapper).await?;
        let id = mapper.document_id(object)?;
        let key = DocumentKey::new(mapper.index_name(), mapper.document_type(), id);
        Ok((mapper, key))
    }
}

#[async_trait]
impl IndexEventHandler for SynchronousHandler {
    async fn handle(&self, event: IndexEvent) -> IndexerResult<()> {
        match event.operation {
            IndexOperation::Index => self.write(event.object.as_ref()).await,
            IndexOperation::Delete => self.remove(event.object.as_ref()).await.map(|_| ()),
        }
    }
}
