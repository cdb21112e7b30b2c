//! Application facade.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::{DeliveryModeSetting, IndexerConfig};
use crate::engine::{DocumentKey, Filter, IndexEngine};
use crate::error::{IndexerResult, PipelineError, ReindexError};
use crate::mapping::{MappingRegistry, ModelMapper};
use crate::model::{AnyModel, IndexableObject, Model};
use crate::pipeline::{
    BrokerConsumer, BrokerTransport, DeliveryMode, FlushSummary, IndexEventHandler,
    IndexEventPipeline,
};
use crate::query::Query;
use crate::reindex::{ReindexHandle, ReindexJob, ReindexRequest};
use crate::store::PrimaryStore;

/// Builds an [`Indexer`].
#[derive(Debug)]
pub struct IndexerBuilder {
    engine: Arc<dyn IndexEngine>,
    config: IndexerConfig,
    store: Option<Arc<dyn PrimaryStore>>,
    broker: Option<Arc<dyn BrokerTransport>>,
    handlers: HashMap<String, Arc<dyn IndexEventHandler>>,
}

impl IndexerBuilder {
    /// Starts a builder writing to `engine`.
    pub fn new(engine: Arc<dyn IndexEngine>) -> Self {
        Self {
            engine,
            config: IndexerConfig::default(),
            store: None,
            broker: None,
            handlers: HashMap::new(),
        }
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches the primary store (needed for reindexing and hydration).
    pub fn store(mut self, store: Arc<dyn PrimaryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attaches a broker transport.
    pub fn broker(mut self, transport: Arc<dyn BrokerTransport>) -> Self {
        self.broker = Some(transport);
        self
    }

    /// Registers a handler CUSTOM delivery can select by name.
    pub fn custom_handler(mut self, name: impl Into<String>, handler: Arc<dyn IndexEventHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    fn resolve_mode(&self) -> IndexerResult<DeliveryMode> {
        Ok(match self.config.delivery_mode {
            DeliveryModeSetting::Synchronous => DeliveryMode::Synchronous,
            DeliveryModeSetting::Local => DeliveryMode::Local,
            DeliveryModeSetting::Discard => DeliveryMode::Discard,
            DeliveryModeSetting::Broker => {
                if self.broker.is_none() {
                    return Err(PipelineError::BrokerNotConfigured.into());
                }
                DeliveryMode::Broker
            }
            DeliveryModeSetting::Custom => {
                let name = self.config.custom_handler.clone().unwrap_or_default();
                let handler = self
                    .handlers
                    .get(&name)
                    .cloned()
                    .ok_or(PipelineError::CustomHandlerMissing { name })?;
                DeliveryMode::Custom(handler)
            }
        })
    }

    /// Builds the indexer.
    pub fn build(self) -> IndexerResult<Indexer> {
        if self.config.reindex.page_size == 0 {
            return Err(ReindexError::InvalidPageSize { page_size: 0 }.into());
        }
        let mode = self.resolve_mode()?;

        let registry = Arc::new(MappingRegistry::new(self.config.mapping.context()));
        let mut pipeline = IndexEventPipeline::new(Arc::clone(&registry), Arc::clone(&self.engine), mode);
        if let Some(transport) = &self.broker {
            pipeline = pipeline.with_broker(Arc::clone(transport), self.config.broker.queue.clone());
        }

        info!(
            engine = self.engine.name(),
            delivery_mode = %self.config.delivery_mode,
            "Indexer initialized"
        );

        Ok(Indexer {
            config: self.config,
            registry,
            engine: self.engine,
            store: self.store,
            broker: self.broker,
            pipeline: Arc::new(pipeline),
        })
    }
}

/// Entry point for application code.
///
/// Owns the mapping registry, the index engine, the optional primary store
/// and the event pipeline.
#[derive(Debug)]
pub struct Indexer {
    config: IndexerConfig,
    registry: Arc<MappingRegistry>,
    engine: Arc<dyn IndexEngine>,
    store: Option<Arc<dyn PrimaryStore>>,
    broker: Option<Arc<dyn BrokerTransport>>,
    pipeline: Arc<IndexEventPipeline>,
}

impl Indexer {
    /// Creates an indexer with the default configuration.
    pub fn new(engine: Arc<dyn IndexEngine>) -> Self {
        let registry = Arc::new(MappingRegistry::default());
        let pipeline = IndexEventPipeline::new(Arc::clone(&registry), Arc::clone(&engine), DeliveryMode::Local);
        Self {
            config: IndexerConfig::default(),
            registry,
            engine,
            store: None,
            broker: None,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Starts a builder.
    pub fn builder(engine: Arc<dyn IndexEngine>) -> IndexerBuilder {
        IndexerBuilder::new(engine)
    }

    /// Active configuration.
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Mapping registry.
    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    /// Index engine.
    pub fn engine(&self) -> &Arc<dyn IndexEngine> {
        &self.engine
    }

    /// Event pipeline.
    pub fn pipeline(&self) -> &Arc<IndexEventPipeline> {
        &self.pipeline
    }

    /// Builds and caches the mapper for `T`.
    pub fn register<T: Model>(&self) -> IndexerResult<()> {
        Ok(self.registry.register::<T>()?)
    }

    /// Returns the mapper for `T`.
    pub fn get_mapper<T: Model>(&self) -> IndexerResult<Arc<ModelMapper>> {
        Ok(self.registry.get_mapper::<T>()?)
    }

    /// Drops cached mappers and forgets which schemas were ensured.
    pub fn reset(&self) {
        self.registry.reset();
        self.pipeline.writer().reset_schemas();
    }

    /// Lifecycle hook for the primary store. Never fails.
    pub async fn notify<T: Model>(&self, event_name: &str, instance: T) {
        self.pipeline.notify(event_name, Arc::new(instance)).await;
    }

    /// Lifecycle hook taking an erased instance.
    pub async fn notify_object(&self, event_name: &str, object: Arc<dyn IndexableObject>) {
        self.pipeline.notify(event_name, object).await;
    }

    /// Indexes `instance` with the active delivery mode.
    pub async fn index<T: Model>(&self, instance: T) -> IndexerResult<()> {
        self.pipeline.index(Arc::new(instance)).await
    }

    /// Indexes `instance` with an explicit delivery mode.
    pub async fn index_with<T: Model>(&self, instance: T, mode: &DeliveryMode) -> IndexerResult<()> {
        self.pipeline.index_with(Arc::new(instance), mode).await
    }

    /// Deletes the document of `instance`.
    pub async fn delete<T: Model>(&self, instance: T) -> IndexerResult<()> {
        self.pipeline.delete(Arc::new(instance)).await
    }

    /// Swaps the delivery mode at runtime.
    pub fn set_delivery_mode(&self, mode: DeliveryMode) -> IndexerResult<()> {
        self.pipeline.set_delivery_mode(mode)
    }

    /// Enables or disables batch blocking.
    pub fn set_batch_blocking(&self, enabled: bool) {
        self.pipeline.set_batch_blocking(enabled);
    }

    /// Applies every event held by batch blocking.
    pub async fn flush(&self) -> FlushSummary {
        self.pipeline.flush().await
    }

    /// Waits until the local queue is empty.
    pub async fn drain(&self) {
        self.pipeline.drain().await;
    }

    /// Point lookup of an indexed document, rebuilt as `T`.
    pub async fn get_document<T: Model>(&self, id: &str) -> IndexerResult<Option<T>> {
        let mapper = self.registry.get_mapper::<T>()?;
        let key = DocumentKey::new(mapper.index_name(), mapper.document_type(), id);
        match self.engine.get_document(&key).await? {
            Some(source) => Ok(Some(mapper.deserialize::<T>(&source)?)),
            None => Ok(None),
        }
    }

    /// Starts a query over `T`.
    pub fn query<T: Model>(&self, filter: Filter) -> Query<'_, T> {
        self.new_query(filter)
    }

    /// Starts a query over every registered type.
    pub fn query_all(&self, filter: Filter) -> Query<'_, AnyModel> {
        self.new_query(filter)
    }

    fn new_query<R: crate::query::ResultObject>(&self, filter: Filter) -> Query<'_, R> {
        Query::new(&self.registry, self.engine.as_ref(), self.store.as_deref(), filter)
            .fail_on_missing_objects(self.config.hydration.fail_on_missing_objects)
    }

    /// Spawns a reindex job.
    pub fn reindex(&self, request: ReindexRequest) -> IndexerResult<ReindexHandle> {
        Ok(self.reindex_job(request)?.spawn())
    }

    /// Spawns a reindex of every searchable type with the configured page size.
    pub fn reindex_all(&self) -> IndexerResult<ReindexHandle> {
        self.reindex(ReindexRequest::all().with_page_size(self.config.reindex.page_size))
    }

    /// Creates a reindex job without starting it.
    pub fn reindex_job(&self, request: ReindexRequest) -> IndexerResult<ReindexJob> {
        let store = self.store.clone().ok_or(ReindexError::StoreRequired)?;
        Ok(ReindexJob::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.pipeline),
            store,
            request,
        ))
    }

    /// Creates a consumer applying messages from the configured broker queue.
    pub fn broker_consumer(&self) -> IndexerResult<BrokerConsumer> {
        let transport = self.broker.clone().ok_or(PipelineError::BrokerNotConfigured)?;
        Ok(BrokerConsumer::new(
            transport,
            Arc::clone(&self.registry),
            self.pipeline.writer().clone(),
            self.config.broker.queue.clone(),
        )
        .with_reconnect_delay(self.config.broker.reconnect_delay))
    }
}
