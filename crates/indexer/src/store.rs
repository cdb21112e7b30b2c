//! Primary data store abstraction.
//!
//! The primary store owns the canonical records. The indexer reads from it in
//! two places: the reindex job pages through every row, and hydrating queries
//! bulk-load hits by id. [`MemoryStore`] is an in-process implementation for
//! tests and development.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;
use crate::model::{IndexableObject, Model, ModelType};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to the primary data store.
#[async_trait]
pub trait PrimaryStore: Send + Sync + Debug {
    /// Every persistent type the store knows, searchable or not.
    fn model_types(&self) -> Vec<ModelType>;

    /// Number of rows of a type.
    async fn count(&self, model: ModelType) -> StoreResult<u64>;

    /// One page of rows in a stable order.
    async fn fetch_page(
        &self,
        model: ModelType,
        offset: i64,
        limit: usize,
    ) -> StoreResult<Vec<Box<dyn IndexableObject>>>;

    /// Loads the rows with the given primary keys. Missing ids are skipped;
    /// order is unspecified.
    async fn load_by_ids(
        &self,
        model: ModelType,
        ids: &[String],
    ) -> StoreResult<Vec<Box<dyn IndexableObject>>>;

    /// Discards per-session working state (caches, identity maps).
    async fn release_working_state(&self) {}
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<(String, Value)>,
}

impl Table {
    fn upsert(&mut self, id: String, value: Value) {
        match self.rows.iter_mut().find(|(existing, _)| *existing == id) {
            Some(row) => row.1 = value,
            None => self.rows.push((id, value)),
        }
    }
}

/// In-memory primary store.
///
/// Rows are kept as value trees in insertion order and rebuilt into fresh
/// instances on every read.
#[derive(Debug, Default)]
pub struct MemoryStore {
    types: RwLock<Vec<ModelType>>,
    tables: RwLock<HashMap<ModelType, Table>>,
    releases: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a type without inserting rows.
    pub fn register_type<T: Model>(&self) {
        let model = ModelType::of::<T>();
        let mut types = self.types.write();
        if !types.contains(&model) {
            types.push(model);
        }
    }

    /// Inserts or replaces a row.
    pub fn insert<T: Model>(&self, row: &T) -> StoreResult<()> {
        self.register_type::<T>();
        let value = serde_json::to_value(row).map_err(|e| StoreError::Internal {
            message: format!("cannot serialize row: {}", e),
            source: Some(Box::new(e)),
        })?;
        let descriptor = T::descriptor();
        let id = primary_key(&value, descriptor.key_field()).ok_or_else(|| StoreError::Internal {
            message: format!(
                "row of {} has no primary key '{}'",
                descriptor.type_name(),
                descriptor.key_field()
            ),
            source: None,
        })?;

        self.tables
            .write()
            .entry(ModelType::of::<T>())
            .or_default()
            .upsert(id, value);
        Ok(())
    }

    /// Removes a row. Returns false if it did not exist.
    pub fn remove<T: Model>(&self, id: &str) -> bool {
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(&ModelType::of::<T>()) else {
            return false;
        };
        let before = table.rows.len();
        table.rows.retain(|(existing, _)| existing != id);
        table.rows.len() != before
    }

    /// Number of times working state was released.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn rebuild(model: ModelType, value: &Value) -> StoreResult<Box<dyn IndexableObject>> {
        model.instantiate(value.clone()).map_err(|e| StoreError::Internal {
            message: format!("cannot rebuild row: {}", e),
            source: Some(Box::new(e)),
        })
    }

    fn check_known(&self, model: ModelType) -> StoreResult<()> {
        if self.types.read().contains(&model) {
            Ok(())
        } else {
            Err(StoreError::UnknownType {
                type_name: model.descriptor().type_name().to_string(),
            })
        }
    }
}

fn primary_key(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PrimaryStore for MemoryStore {
    fn model_types(&self) -> Vec<ModelType> {
        self.types.read().clone()
    }

    async fn count(&self, model: ModelType) -> StoreResult<u64> {
        self.check_known(model)?;
        Ok(self
            .tables
            .read()
            .get(&model)
            .map(|t| t.rows.len() as u64)
            .unwrap_or(0))
    }

    async fn fetch_page(
        &self,
        model: ModelType,
        offset: i64,
        limit: usize,
    ) -> StoreResult<Vec<Box<dyn IndexableObject>>> {
        self.check_known(model)?;
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let tables = self.tables.read();
        let Some(table) = tables.get(&model) else {
            return Ok(Vec::new());
        };
        table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(_, value)| Self::rebuild(model, value))
            .collect()
    }

    async fn load_by_ids(
        &self,
        model: ModelType,
        ids: &[String],
    ) -> StoreResult<Vec<Box<dyn IndexableObject>>> {
        self.check_known(model)?;
        let tables = self.tables.read();
        let Some(table) = tables.get(&model) else {
            return Ok(Vec::new());
        };
        table
            .rows
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(_, value)| Self::rebuild(model, value))
            .collect()
    }

    async fn release_working_state(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::model::{FieldDescriptor, HostType, ModelDescriptor};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: i64,
        name: String,
    }

    impl Model for Row {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>()
                .field(FieldDescriptor::new("id", HostType::I64))
                .field(FieldDescriptor::new("name", HostType::String))
        }
    }

    fn row(id: i64) -> Row {
        Row {
            id,
            name: format!("row {id}"),
        }
    }

    #[tokio::test]
    async fn test_paging_in_insertion_order() {
        let store = MemoryStore::new();
        for id in [3, 1, 2] {
            store.insert(&row(id)).unwrap();
        }
        let model = ModelType::of::<Row>();
        assert_eq!(store.count(model).await.unwrap(), 3);

        let page = store.fetch_page(model, 1, 5).await.unwrap();
        let ids: Vec<i64> = page
            .iter()
            .map(|o| o.as_any().downcast_ref::<Row>().unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let store = MemoryStore::new();
        store.insert(&row(1)).unwrap();
        store
            .insert(&Row {
                id: 1,
                name: "renamed".to_string(),
            })
            .unwrap();
        let model = ModelType::of::<Row>();
        assert_eq!(store.count(model).await.unwrap(), 1);

        let loaded = store.load_by_ids(model, &["1".to_string()]).await.unwrap();
        assert_eq!(loaded[0].as_any().downcast_ref::<Row>().unwrap().name, "renamed");

        assert!(store.remove::<Row>("1"));
        assert!(!store.remove::<Row>("1"));
        assert!(store.load_by_ids(model, &["1".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_fails() {
        let store = MemoryStore::new();
        let err = store.count(ModelType::of::<Row>()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownType { .. }));
    }

    #[tokio::test]
    async fn test_release_is_counted() {
        let store = MemoryStore::new();
        store.release_working_state().await;
        store.release_working_state().await;
        assert_eq!(store.release_count(), 2);
    }
}
