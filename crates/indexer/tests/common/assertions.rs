//! Assertion helpers for index documents and schemas.

use serde_json::{Map, Value};

use helios_indexer::engine::{DocumentKey, IndexEngine, InMemoryEngine};

/// Fetches a stored document, panicking if it is absent.
pub async fn stored_document(engine: &InMemoryEngine, index: &str, doc_type: &str, id: &str) -> Map<String, Value> {
    engine
        .get_document(&DocumentKey::new(index, doc_type, id))
        .await
        .expect("Failed to read document")
        .unwrap_or_else(|| panic!("Document {}/{}/{} not found", index, doc_type, id))
}

/// Asserts that no document is stored under the given key.
pub async fn assert_no_document(engine: &InMemoryEngine, index: &str, doc_type: &str, id: &str) {
    let found = engine
        .get_document(&DocumentKey::new(index, doc_type, id))
        .await
        .expect("Failed to read document");
    assert!(
        found.is_none(),
        "Expected no document at {}/{}/{}, found {:?}",
        index,
        doc_type,
        id,
        found
    );
}

/// Returns the keys of a JSON object in order.
pub fn keys_of(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// Counts how many `parent` levels a category schema nests before its
/// properties run out.
pub fn parent_levels(properties: &Value) -> usize {
    let mut levels = 0;
    let mut current = properties;
    while let Some(next) = current.get("parent").and_then(|p| p.get("properties")) {
        levels += 1;
        current = next;
    }
    levels
}

/// Asserts a document field, with a readable failure message.
pub fn assert_field(document: &Map<String, Value>, key: &str, expected: Value) {
    assert_eq!(
        document.get(key),
        Some(&expected),
        "Field '{}' mismatch in document {:?}",
        key,
        document
    );
}
