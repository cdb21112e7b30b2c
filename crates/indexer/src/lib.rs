//! Helios Indexer
//!
//! Object-document mapping and an index event pipeline that keep a secondary
//! search index in sync with a primary data store.
//!
//! # Features
//!
//! - **Static mappings**: host types describe their fields once; mappers are
//!   built and cached per type, including embedded, object, nested and
//!   collection fields
//! - **Event pipeline**: lifecycle notifications become index events delivered
//!   inline, through an in-process queue, a message broker, a custom handler,
//!   or held for batch flushing
//! - **Queries**: filters, paging, sorting and terms facets, with hits rebuilt
//!   from the index or hydrated from the primary store
//! - **Reindexing**: paged, memory-bounded rebuilds of every searchable type
//!
//! Index engine features:
//! - `elasticsearch` - Elasticsearch 8 adapter
//!
//! # Architecture
//!
//! - [`model`] - Host types and their static descriptors
//! - [`mapping`] - Field mappers, model mappers and the mapping registry
//! - [`engine`] - Index engine abstraction and implementations
//! - [`store`] - Primary data store abstraction
//! - [`pipeline`] - Index events and delivery strategies
//! - [`query`] - Fluent queries and result materialization
//! - [`reindex`] - Full reindex jobs
//! - [`indexer`] - The [`Indexer`] facade
//! - [`config`] - Configuration
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_indexer::engine::{Filter, InMemoryEngine};
//! use helios_indexer::model::{FieldDescriptor, HostType, Model, ModelDescriptor, Searchable};
//! use helios_indexer::pipeline::DeliveryMode;
//! use helios_indexer::Indexer;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Post {
//!     id: i64,
//!     title: String,
//! }
//!
//! impl Model for Post {
//!     fn descriptor() -> ModelDescriptor {
//!         ModelDescriptor::of::<Self>()
//!             .named("blog.Post")
//!             .searchable(Searchable::new())
//!             .field(FieldDescriptor::new("id", HostType::I64))
//!             .field(FieldDescriptor::new("title", HostType::String))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let indexer = Indexer::new(Arc::new(InMemoryEngine::new()));
//! indexer.set_delivery_mode(DeliveryMode::Synchronous).unwrap();
//!
//! indexer.index(Post { id: 1, title: "Hello Rust".into() }).await.unwrap();
//!
//! let results = indexer
//!     .query::<Post>(Filter::text("title", "rust"))
//!     .fetch()
//!     .await
//!     .unwrap();
//! assert_eq!(results.total, 1);
//! assert_eq!(results.objects[0].title, "Hello Rust");
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod reindex;
pub mod store;

// Re-export commonly used types at crate root
pub use config::IndexerConfig;
pub use error::{IndexerError, IndexerResult};
pub use indexer::{Indexer, IndexerBuilder};
pub use logging::init_logging;
pub use model::{AnyModel, Model, ModelType};

// Re-export core traits
pub use engine::IndexEngine;
pub use pipeline::IndexEventHandler;
pub use store::PrimaryStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
