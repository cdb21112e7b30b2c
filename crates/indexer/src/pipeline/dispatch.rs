//! Routing of lifecycle notifications to the active delivery strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::engine::IndexEngine;
use crate::error::{IndexerResult, PipelineError};
use crate::mapping::MappingRegistry;
use crate::model::IndexableObject;

use super::batch::BatchQueues;
use super::broker::{BrokerHandler, BrokerTransport};
use super::delivery::{DeliveryMode, IndexEventHandler};
use super::event::{IndexEvent, IndexOperation};
use super::local::LocalHandler;
use super::sync::SynchronousHandler;

/// Counts from one [`IndexEventPipeline::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    /// Documents written.
    pub indexed: usize,
    /// Documents deleted (or already absent).
    pub deleted: usize,
    /// Events that failed.
    pub failed: usize,
}

/// Turns lifecycle notifications into index events and delivers them.
#[derive(Debug)]
pub struct IndexEventPipeline {
    registry: Arc<MappingRegistry>,
    writer: SynchronousHandler,
    local: LocalHandler,
    broker: Option<BrokerHandler>,
    mode: RwLock<DeliveryMode>,
    batch_blocking: AtomicBool,
    batch: BatchQueues,
}

impl IndexEventPipeline {
    /// Creates a pipeline delivering with `mode`.
    pub fn new(registry: Arc<MappingRegistry>, engine: Arc<dyn IndexEngine>, mode: DeliveryMode) -> Self {
        let writer = SynchronousHandler::new(Arc::clone(&registry), engine);
        Self {
            local: LocalHandler::new(writer.clone()),
            registry,
            writer,
            broker: None,
            mode: RwLock::new(mode),
            batch_blocking: AtomicBool::new(false),
            batch: BatchQueues::default(),
        }
    }

    /// Attaches a broker transport publishing to `queue`.
    pub fn with_broker(mut self, transport: Arc<dyn BrokerTransport>, queue: impl Into<String>) -> Self {
        self.broker = Some(BrokerHandler::new(transport, Arc::clone(&self.registry), queue));
        self
    }

    /// The inline writer shared by every strategy.
    pub fn writer(&self) -> &SynchronousHandler {
        &self.writer
    }

    /// The local queue handler.
    pub fn local(&self) -> &LocalHandler {
        &self.local
    }

    /// The broker producer, if configured.
    pub fn broker(&self) -> Option<&BrokerHandler> {
        self.broker.as_ref()
    }

    /// Active delivery mode.
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.mode.read().clone()
    }

    /// Swaps the delivery mode.
    pub fn set_delivery_mode(&self, mode: DeliveryMode) -> IndexerResult<()> {
        if matches!(mode, DeliveryMode::Broker) && self.broker.is_none() {
            return Err(PipelineError::BrokerNotConfigured.into());
        }
        info!(mode = mode.name(), "Index delivery mode changed");
        *self.mode.write() = mode;
        Ok(())
    }

    /// Enables or disables batch blocking.
    pub fn set_batch_blocking(&self, enabled: bool) {
        self.batch_blocking.store(enabled, Ordering::SeqCst);
    }

    /// Returns true while events are held for [`flush`](Self::flush).
    pub fn is_batch_blocking(&self) -> bool {
        self.batch_blocking.load(Ordering::SeqCst)
    }

    /// Queued (index, delete) events awaiting a flush.
    pub fn queued(&self) -> (usize, usize) {
        self.batch.len()
    }

    /// Handles a lifecycle notification from the primary store.
    ///
    /// Unknown notification names and non-searchable types are ignored.
    /// Delivery failures are logged and never returned.
    pub async fn notify(&self, event_name: &str, object: Arc<dyn IndexableObject>) {
        let Some(operation) = IndexOperation::from_notification(event_name) else {
            return;
        };
        if !self.registry.is_searchable(object.model_type()) {
            return;
        }
        let mode = self.delivery_mode();
        if let Err(e) = self.dispatch(IndexEvent::new(object, operation), &mode).await {
            error!(
                event = %event_name,
                mode = mode.name(),
                error = %e,
                "Failed to deliver index event"
            );
        }
    }

    /// Indexes an instance with the active delivery mode.
    pub async fn index(&self, object: Arc<dyn IndexableObject>) -> IndexerResult<()> {
        let mode = self.delivery_mode();
        self.index_with(object, &mode).await
    }

    /// Indexes an instance with an explicit delivery mode.
    pub async fn index_with(&self, object: Arc<dyn IndexableObject>, mode: &DeliveryMode) -> IndexerResult<()> {
        self.registry.get_mapper_for(object.model_type())?;
        self.dispatch(IndexEvent::new(object, IndexOperation::Index), mode)
            .await
    }

    /// Deletes an instance's document with the active delivery mode.
    pub async fn delete(&self, object: Arc<dyn IndexableObject>) -> IndexerResult<()> {
        self.registry.get_mapper_for(object.model_type())?;
        let mode = self.delivery_mode();
        self.dispatch(IndexEvent::new(object, IndexOperation::Delete), &mode)
            .await
    }

    async fn dispatch(&self, event: IndexEvent, mode: &DeliveryMode) -> IndexerResult<()> {
        if self.is_batch_blocking() {
            self.batch.push(event);
            return Ok(());
        }
        match mode {
            DeliveryMode::Synchronous => self.writer.handle(event).await,
            DeliveryMode::Local => self.local.handle(event).await,
            DeliveryMode::Broker => match &self.broker {
                Some(broker) => broker.handle(event).await,
                None => Err(PipelineError::BrokerNotConfigured.into()),
            },
            DeliveryMode::Discard => {
                debug!(operation = %event.operation, "Discarded index event");
                Ok(())
            }
            DeliveryMode::Custom(handler) => handler.handle(event).await,
        }
    }

    /// Applies every queued batch event inline, index events first.
    pub async fn flush(&self) -> FlushSummary {
        let mut summary = FlushSummary::default();

        for object in self.batch.take_index() {
            match self.writer.write(object.as_ref()).await {
                Ok(()) => summary.indexed += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Failed to flush queued index event");
                }
            }
        }
        for object in self.batch.take_delete() {
            match self.writer.remove(object.as_ref()).await {
                Ok(_) => summary.deleted += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Failed to flush queued delete event");
                }
            }
        }

        debug!(
            indexed = summary.indexed,
            deleted = summary.deleted,
            failed = summary.failed,
            "Flushed batch queues"
        );
        summary
    }

    /// Waits until the local queue is empty.
    pub async fn drain(&self) {
        self.local.drain().await;
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::engine::{DocumentKey, InMemoryEngine};
    use crate::error::{IndexerError, MappingError};
    use crate::model::{FieldDescriptor, HostType, Model, ModelDescriptor, Searchable};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Order {
        id: i64,
        total: f64,
    }

    impl Model for Order {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>()
                .named("shop.Order")
                .searchable(Searchable::new())
                .field(FieldDescriptor::new("id", HostType::I64))
                .field(FieldDescriptor::new("total", HostType::F64))
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct AuditRow {
        id: i64,
    }

    impl Model for AuditRow {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>().field(FieldDescriptor::new("id", HostType::I64))
        }
    }

    fn pipeline(mode: DeliveryMode) -> (IndexEventPipeline, Arc<InMemoryEngine>) {
        let engine = Arc::new(InMemoryEngine::new());
        let registry = Arc::new(MappingRegistry::default());
        (IndexEventPipeline::new(registry, engine.clone(), mode), engine)
    }

    fn order(id: i64) -> Arc<dyn IndexableObject> {
        Arc::new(Order { id, total: 9.5 })
    }

    fn key(id: &str) -> DocumentKey {
        DocumentKey::new("shop_order", "shop_order", id)
    }

    #[tokio::test]
    async fn test_notify_classifies_and_filters() {
        let (pipeline, engine) = pipeline(DeliveryMode::Synchronous);

        pipeline.notify("store.objectPersisted", order(1)).await;
        pipeline.notify("store.objectLoaded", order(2)).await;
        pipeline.notify("store.objectPersisted", Arc::new(AuditRow { id: 3 })).await;
        assert_eq!(engine.total_documents(), 1);
        assert_eq!(engine.schema_count(), 1);

        pipeline.notify("store.objectDeleted", order(1)).await;
        assert_eq!(engine.total_documents(), 0);
    }

    #[tokio::test]
    async fn test_notify_swallows_write_failures() {
        let (pipeline, engine) = pipeline(DeliveryMode::Synchronous);
        engine.set_unavailable(true);
        pipeline.notify("store.objectUpdated", order(1)).await;
    }

    #[tokio::test]
    async fn test_direct_calls_surface_errors() {
        let (pipeline, engine) = pipeline(DeliveryMode::Synchronous);

        let err = pipeline.index(Arc::new(AuditRow { id: 1 })).await.unwrap_err();
        assert!(matches!(err, IndexerError::Mapping(MappingError::NotSearchable { .. })));

        engine.set_unavailable(true);
        assert!(pipeline.index(order(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_broker_mode_requires_transport() {
        let (pipeline, _) = pipeline(DeliveryMode::Local);
        let err = pipeline.set_delivery_mode(DeliveryMode::Broker).unwrap_err();
        assert!(matches!(err, IndexerError::Pipeline(PipelineError::BrokerNotConfigured)));
        assert!(matches!(pipeline.delivery_mode(), DeliveryMode::Local));
    }

    #[tokio::test]
    async fn test_discard_mode() {
        let (pipeline, engine) = pipeline(DeliveryMode::Discard);
        pipeline.index(order(1)).await.unwrap();
        assert_eq!(engine.total_documents(), 0);
    }

    #[tokio::test]
    async fn test_batch_blocking_until_flush() {
        let (pipeline, engine) = pipeline(DeliveryMode::Synchronous);
        pipeline.index(order(1)).await.unwrap();

        pipeline.set_batch_blocking(true);
        pipeline.index(order(2)).await.unwrap();
        pipeline.index(order(3)).await.unwrap();
        pipeline.delete(order(1)).await.unwrap();
        pipeline.delete(order(42)).await.unwrap();
        assert_eq!(pipeline.queued(), (2, 2));
        assert_eq!(engine.total_documents(), 1);

        let summary = pipeline.flush().await;
        assert_eq!(
            summary,
            FlushSummary {
                indexed: 2,
                deleted: 2,
                failed: 0
            }
        );
        assert_eq!(pipeline.queued(), (0, 0));
        assert!(engine.get_document(&key("1")).await.unwrap().is_none());
        assert!(engine.get_document(&key("3")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_local_mode_applies_after_drain() {
        let (pipeline, engine) = pipeline(DeliveryMode::default());
        for id in 1..=3 {
            pipeline.index(order(id)).await.unwrap();
        }
        pipeline.drain().await;
        assert_eq!(engine.total_documents(), 3);
        assert_eq!(pipeline.local().processed(), 3);
    }
}
