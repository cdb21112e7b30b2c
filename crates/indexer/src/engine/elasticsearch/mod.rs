//! Elasticsearch engine implementation.
//!
//! Implements [`IndexEngine`](crate::engine::IndexEngine) against an
//! Elasticsearch 8 cluster through the official client.
//!
//! # Index Structure
//!
//! Each logical index maps to `{prefix}_{index}` (or just `{index}` without a
//! prefix). Several document types may share an index; each document records
//! its type in the `model_type` keyword field and is stored under the
//! Elasticsearch id `{doc_type}_{id}`.
//!
//! # Example
//!
//! ```ignore
//! use helios_indexer::engine::elasticsearch::{ElasticsearchConfig, ElasticsearchEngine};
//!
//! let config = ElasticsearchConfig {
//!     nodes: vec!["http://localhost:9200".to_string()],
//!     ..Default::default()
//! };
//! let engine = ElasticsearchEngine::new(config)?;
//! engine.health_check().await?;
//! ```

mod backend;
pub mod query_builder;
pub mod schema;
mod search_impl;
mod storage;

pub use backend::{ElasticsearchAuth, ElasticsearchConfig, ElasticsearchEngine, MODEL_TYPE_FIELD};
