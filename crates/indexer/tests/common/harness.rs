//! Test harness infrastructure.
//!
//! [`TestContext`] wires an [`Indexer`] to an [`InMemoryEngine`] and a
//! [`MemoryStore`] so tests can inspect both sides of the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use helios_indexer::config::{DeliveryModeSetting, IndexerConfig};
use helios_indexer::engine::InMemoryEngine;
use helios_indexer::error::StoreError;
use helios_indexer::model::{IndexableObject, ModelType};
use helios_indexer::pipeline::{DeliveryMode, InProcessBroker, IndexEvent, IndexEventHandler, IndexOperation};
use helios_indexer::store::{MemoryStore, PrimaryStore, StoreResult};
use helios_indexer::{Indexer, IndexerResult};

/// An indexer with direct handles on its engine and store.
pub struct TestContext {
    /// The indexer under test.
    pub indexer: Indexer,
    /// The engine behind the indexer.
    pub engine: Arc<InMemoryEngine>,
    /// The primary store behind the indexer.
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    /// Creates a context with the given delivery mode.
    pub fn new(mode: DeliveryMode) -> Self {
        let ctx = Self::with_config(IndexerConfig::default());
        ctx.indexer
            .set_delivery_mode(mode)
            .expect("Failed to set delivery mode");
        ctx
    }

    /// Creates a context with synchronous delivery.
    pub fn synchronous() -> Self {
        Self::new(DeliveryMode::Synchronous)
    }

    /// Creates a context from a configuration.
    pub fn with_config(config: IndexerConfig) -> Self {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(MemoryStore::new());
        let indexer = Indexer::builder(engine.clone())
            .config(config)
            .store(store.clone())
            .build()
            .expect("Failed to build indexer");
        Self {
            indexer,
            engine,
            store,
        }
    }

    /// Creates a context whose broker delivery goes through an in-process broker.
    pub fn with_broker() -> (Self, Arc<InProcessBroker>) {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(MemoryStore::new());
        let broker = Arc::new(InProcessBroker::new());
        let config = IndexerConfig {
            delivery_mode: DeliveryModeSetting::Broker,
            ..Default::default()
        };
        let indexer = Indexer::builder(engine.clone())
            .config(config)
            .store(store.clone())
            .broker(broker.clone())
            .build()
            .expect("Failed to build indexer");
        (
            Self {
                indexer,
                engine,
                store,
            },
            broker,
        )
    }

    /// Document count for one index/document type.
    pub fn documents(&self, index: &str, doc_type: &str) -> usize {
        self.engine.document_count(index, doc_type)
    }
}

/// A delivery handler that records every event it receives.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<(IndexOperation, serde_json::Value)>>,
}

impl RecordingHandler {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of recorded events.
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Recorded operations in arrival order.
    pub fn operations(&self) -> Vec<IndexOperation> {
        self.events.lock().iter().map(|(op, _)| *op).collect()
    }

    /// Recorded instance value trees in arrival order.
    pub fn values(&self) -> Vec<serde_json::Value> {
        self.events.lock().iter().map(|(_, v)| v.clone()).collect()
    }
}

#[async_trait]
impl IndexEventHandler for RecordingHandler {
    async fn handle(&self, event: IndexEvent) -> IndexerResult<()> {
        let value = event.object.to_value()?;
        self.events.lock().push((event.operation, value));
        Ok(())
    }
}

/// A store reporting a row count no signed 64-bit offset can reach.
#[derive(Debug)]
pub struct OversizedStore {
    model: ModelType,
}

impl OversizedStore {
    /// Creates a store claiming `u64::MAX` rows of `model`.
    pub fn new(model: ModelType) -> Self {
        Self { model }
    }
}

#[async_trait]
impl PrimaryStore for OversizedStore {
    fn model_types(&self) -> Vec<ModelType> {
        vec![self.model]
    }

    async fn count(&self, _model: ModelType) -> StoreResult<u64> {
        Ok(u64::MAX)
    }

    async fn fetch_page(
        &self,
        _model: ModelType,
        _offset: i64,
        _limit: usize,
    ) -> StoreResult<Vec<Box<dyn IndexableObject>>> {
        Err(StoreError::Internal {
            message: "paging must not start".to_string(),
            source: None,
        })
    }

    async fn load_by_ids(
        &self,
        _model: ModelType,
        _ids: &[String],
    ) -> StoreResult<Vec<Box<dyn IndexableObject>>> {
        Ok(Vec::new())
    }
}
