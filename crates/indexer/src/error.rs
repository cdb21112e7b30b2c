//! Error types for the indexer.
//!
//! Errors are grouped by the layer that raises them: mapping (build-time
//! descriptor problems), the index engine, the primary store, queries, the
//! event pipeline and reindexing. [`IndexerError`] wraps all of them.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all indexer operations.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Type mapping errors
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Index engine errors
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Primary store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Query and materialization errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Event pipeline errors
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Reindex job errors
    #[error(transparent)]
    Reindex(#[from] ReindexError),
}

/// Errors raised while building or applying a type mapping.
///
/// Build-time variants are fatal and never retried.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The type carries no searchable declaration.
    #[error("type {type_name} is not searchable")]
    NotSearchable { type_name: String },

    /// An embed declaration names a field the child type does not have.
    #[error("embedded field '{field}' does not exist on {child_type} (declared by {owner}.{owner_field})")]
    UnknownEmbeddedField {
        owner: String,
        owner_field: String,
        child_type: String,
        field: String,
    },

    /// Two representations of a multi-field share a name.
    #[error("duplicate multi-field representation '{name}' on {type_name}.{field}")]
    DuplicateMultiField {
        type_name: String,
        field: String,
        name: String,
    },

    /// The declared time-to-live is not a valid duration.
    #[error("invalid ttl '{ttl}' on {type_name}: {message}")]
    InvalidTtl {
        type_name: String,
        ttl: String,
        message: String,
    },

    /// The instance has no usable primary-key value.
    #[error("no document id for {type_name}: key field '{key}' is missing or not a scalar")]
    MissingDocumentId { type_name: String, key: String },

    /// Converting an instance to or from its value tree failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// An inflated value tree could not be turned back into the host type.
    #[error("cannot rebuild {type_name} from document: {message}")]
    Hydration { type_name: String, message: String },
}

/// Errors originating from the index engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine is currently unavailable.
    #[error("index engine unavailable: {engine}")]
    Unavailable { engine: String, message: String },

    /// Connecting to the engine failed.
    #[error("connection failed to {engine}: {message}")]
    ConnectionFailed { engine: String, message: String },

    /// The engine rejected a request.
    #[error("{engine} rejected request on {index}: {message}")]
    Rejected {
        engine: String,
        index: String,
        message: String,
    },

    /// Internal engine error.
    #[error("internal error in {engine}: {message}")]
    Internal {
        engine: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

/// Errors originating from the primary data store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store does not manage the requested type.
    #[error("primary store does not manage type {type_name}")]
    UnknownType { type_name: String },

    /// Internal store error.
    #[error("primary store error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors raised while executing a query or materializing its hits.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Hydration found ids in the index that the primary store no longer has.
    #[error("{} indexed object(s) missing from the primary store, reindex required: {}", .missing.len(), .missing.join(", "))]
    MissingObjects { missing: Vec<String> },

    /// A hit names a document type without a registered mapper.
    #[error("no mapper registered for document type '{doc_type}'")]
    UnknownDocumentType { doc_type: String },

    /// A materialized object is not of the requested type.
    #[error("hit of type {actual} cannot be returned as {expected}")]
    TypeMismatch { expected: String, actual: String },

    /// Hydration needs a primary store and none is configured.
    #[error("hydrating queries require a primary store")]
    StoreRequired,
}

/// Errors raised by the event pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Broker delivery was selected without a broker transport.
    #[error("broker delivery selected but no broker transport is configured")]
    BrokerNotConfigured,

    /// Custom delivery was selected without an injected handler.
    #[error("custom delivery selected but no handler '{name}' was registered")]
    CustomHandlerMissing { name: String },

    /// The local queue consumer is gone.
    #[error("local index queue is closed")]
    QueueClosed,

    /// A broker message could not be decoded.
    #[error("cannot decode index message: {message}")]
    Decode { message: String },

    /// The broker transport failed.
    #[error("broker transport error on queue {queue}: {message}")]
    Transport { queue: String, message: String },
}

/// Errors raised by reindex jobs.
#[derive(Error, Debug)]
pub enum ReindexError {
    /// The row count does not fit the store's offset type.
    #[error("row count {count} for {type_name} exceeds the pageable range")]
    CountOverflow { type_name: String, count: u64 },

    /// Page size must be at least one.
    #[error("invalid reindex page size {page_size}")]
    InvalidPageSize { page_size: usize },

    /// Reindexing reads from the primary store and none is configured.
    #[error("reindexing requires a primary store")]
    StoreRequired,

    /// The job task ended abnormally.
    #[error("reindex job {job_id} aborted: {message}")]
    JobAborted { job_id: String, message: String },
}

/// Result type alias for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

impl From<serde_json::Error> for MappingError {
    fn from(err: serde_json::Error) -> Self {
        MappingError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Mapping(MappingError::from(err))
    }
}

impl IndexerError {
    /// Returns true if this error was raised while building a mapping.
    pub fn is_mapping(&self) -> bool {
        matches!(self, IndexerError::Mapping(_))
    }
}
