//! Shared test infrastructure for the indexer integration tests.
//!
//! Model fixtures, a harness building an [`Indexer`](helios_indexer::Indexer)
//! on the in-memory engine and store, and assertion helpers.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
