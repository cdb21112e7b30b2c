//! Cache of built mappers.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::MappingError;
use crate::model::{Model, ModelType};

use super::field::{FieldMapper, MappingContext};
use super::model::ModelMapper;

/// Builds and caches [`ModelMapper`]s and keeps the reverse
/// document-type lookup.
///
/// Concurrent first access may build the same mapper more than once; the
/// first one inserted wins and every caller gets that instance.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    context: MappingContext,
    mappers: RwLock<HashMap<TypeId, Arc<ModelMapper>>>,
    type_lookup: RwLock<HashMap<String, ModelType>>,
}

impl MappingRegistry {
    /// Creates an empty registry.
    pub fn new(context: MappingContext) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }

    /// Build-time settings.
    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    /// Returns the mapper for `T`, building it on first access.
    pub fn get_mapper<T: Model>(&self) -> Result<Arc<ModelMapper>, MappingError> {
        self.get_mapper_for(ModelType::of::<T>())
    }

    /// Returns the mapper for an erased type handle.
    pub fn get_mapper_for(&self, model_type: ModelType) -> Result<Arc<ModelMapper>, MappingError> {
        if let Some(mapper) = self.mappers.read().get(&model_type.type_id()) {
            return Ok(Arc::clone(mapper));
        }

        // built outside the lock; a racing build is discarded below
        let built = Arc::new(ModelMapper::build_for(model_type, &self.context)?);

        // lock order: mappers, then type_lookup
        let mapper = {
            let mut mappers = self.mappers.write();
            let mapper = Arc::clone(mappers.entry(model_type.type_id()).or_insert(built));
            self.type_lookup
                .write()
                .entry(mapper.document_type().to_string())
                .or_insert(model_type);
            mapper
        };

        debug!(
            type_name = %mapper.type_name(),
            document_type = %mapper.document_type(),
            "Registered model mapper"
        );
        Ok(mapper)
    }

    /// Pre-builds the mapper for `T`.
    pub fn register<T: Model>(&self) -> Result<(), MappingError> {
        self.get_mapper::<T>().map(|_| ())
    }

    /// Returns true if `model_type` carries a searchable declaration.
    pub fn is_searchable(&self, model_type: ModelType) -> bool {
        self.mappers.read().contains_key(&model_type.type_id())
            || model_type.descriptor().is_searchable()
    }

    /// Builds a standalone mapper for one field of `owner`.
    ///
    /// Returns `Ok(None)` when `owner` has no such field.
    pub fn get_field_mapper(
        &self,
        owner: ModelType,
        field: &str,
        prefix: Option<&str>,
    ) -> Result<Option<FieldMapper>, MappingError> {
        let descriptor = owner.descriptor();
        descriptor
            .find_field(field)
            .map(|f| FieldMapper::build(descriptor.type_name(), f, prefix, 0, &self.context))
            .transpose()
    }

    /// Resolves a document type to its host type.
    pub fn lookup_type(&self, document_type: &str) -> Option<ModelType> {
        self.type_lookup.read().get(document_type).copied()
    }

    /// Every type with a built mapper.
    pub fn registered_types(&self) -> Vec<ModelType> {
        self.type_lookup.read().values().copied().collect()
    }

    /// Every built mapper.
    pub fn mappers(&self) -> Vec<Arc<ModelMapper>> {
        self.mappers.read().values().cloned().collect()
    }

    /// Drops all cached mappers and the reverse lookup.
    pub fn reset(&self) {
        let mut mappers = self.mappers.write();
        let mut type_lookup = self.type_lookup.write();
        mappers.clear();
        type_lookup.clear();
        debug!("Mapping registry reset");
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::model::{FieldDescriptor, HostType, ModelDescriptor, Searchable};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Item {
        id: i64,
        name: String,
    }

    impl Model for Item {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>()
                .named("shop.Item")
                .searchable(Searchable::new().type_name("item"))
                .field(FieldDescriptor::new("id", HostType::I64))
                .field(FieldDescriptor::new("name", HostType::String))
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Plain {
        id: i64,
    }

    impl Model for Plain {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>()
        }
    }

    #[test]
    fn test_mapper_is_cached() {
        let registry = MappingRegistry::default();
        let a = registry.get_mapper::<Item>().unwrap();
        let b = registry.get_mapper::<Item>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reset_rebuilds() {
        let registry = MappingRegistry::default();
        let a = registry.get_mapper::<Item>().unwrap();
        registry.reset();
        assert!(registry.lookup_type("item").is_none());
        let b = registry.get_mapper::<Item>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reverse_lookup_populated_on_build() {
        let registry = MappingRegistry::default();
        assert!(registry.lookup_type("item").is_none());
        registry.register::<Item>().unwrap();
        assert_eq!(registry.lookup_type("item"), Some(ModelType::of::<Item>()));
        assert_eq!(registry.registered_types(), vec![ModelType::of::<Item>()]);
    }

    #[test]
    fn test_not_searchable_is_not_cached() {
        let registry = MappingRegistry::default();
        assert!(registry.get_mapper::<Plain>().is_err());
        assert!(registry.mappers().is_empty());
        assert!(!registry.is_searchable(ModelType::of::<Plain>()));
        assert!(registry.is_searchable(ModelType::of::<Item>()));
    }

    #[test]
    fn test_field_mapper_lookup() {
        let registry = MappingRegistry::default();
        let mapper = registry
            .get_field_mapper(ModelType::of::<Item>(), "name", Some("x_"))
            .unwrap()
            .unwrap();
        assert_eq!(mapper.key(), "x_name");
        assert!(registry
            .get_field_mapper(ModelType::of::<Item>(), "missing", None)
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_yields_one_instance() {
        let registry = Arc::new(MappingRegistry::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.get_mapper::<Item>().unwrap() }));
        }
        let mut mappers = Vec::new();
        for handle in handles {
            mappers.push(handle.await.unwrap());
        }
        let first = &mappers[0];
        assert!(mappers.iter().all(|m| Arc::ptr_eq(first, m)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reset_racing_builds_keeps_lookup_consistent() {
        let registry = Arc::new(MappingRegistry::default());
        for _ in 0..50 {
            let builder = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.register::<Item>().unwrap() })
            };
            let resetter = {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.reset() })
            };
            builder.await.unwrap();
            resetter.await.unwrap();

            let has_lookup = registry.lookup_type("item").is_some();
            let has_mapper = !registry.mappers().is_empty();
            assert_eq!(has_lookup, has_mapper);
        }
    }
}
