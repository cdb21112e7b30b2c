//! Index engine abstraction.
//!
//! The [`IndexEngine`] trait is everything the indexer needs from a document
//! index: idempotent schema creation, keyed document writes and reads, and
//! search. [`InMemoryEngine`] is a complete in-process implementation; the
//! `elasticsearch` feature adds [`elasticsearch::ElasticsearchEngine`].

mod memory;
mod search;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;

use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::EngineError;

pub use memory::InMemoryEngine;
pub use search::{
    DEFAULT_PAGE_SIZE, FacetEntry, FacetRequest, FacetResult, Filter, RangeFilter, SCORE_FIELD,
    SearchHit, SearchRequest, SearchResponse, SearchTarget, SortField, SortOrder,
};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

impl DocumentKey {
    /// Creates a key.
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.index, self.doc_type, self.id)
    }
}

/// Outcome of a schema-create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// The schema was created by this request.
    Created,
    /// The schema already existed; not an error.
    AlreadyExists,
}

/// A document index engine.
#[async_trait]
pub trait IndexEngine: Send + Sync + Debug {
    /// Short engine name for logs and errors.
    fn name(&self) -> &'static str;

    /// Creates the schema of a document type, with optional index settings.
    ///
    /// Must be idempotent: an existing schema yields
    /// [`SchemaStatus::AlreadyExists`].
    async fn create_schema(
        &self,
        index: &str,
        doc_type: &str,
        schema: &Value,
        settings: Option<&Value>,
    ) -> EngineResult<SchemaStatus>;

    /// Writes a document, fully replacing any previous one with the same key.
    async fn put_document(&self, key: &DocumentKey, document: Value) -> EngineResult<()>;

    /// Reads a document.
    async fn get_document(&self, key: &DocumentKey) -> EngineResult<Option<Map<String, Value>>>;

    /// Deletes a document. Returns false if it did not exist.
    async fn delete_document(&self, key: &DocumentKey) -> EngineResult<bool>;

    /// Runs a search.
    async fn search(&self, request: &SearchRequest) -> EngineResult<SearchResponse>;
}
