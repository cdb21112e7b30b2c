//! Fluent queries over indexed documents.
//!
//! A [`Query`] carries a [`Filter`], paging, sort criteria and facet requests.
//! [`Query::fetch`] runs it against the index engine and materializes the hits
//! using one of three strategies:
//!
//! - [`Materialization::Direct`] copies top-level fields by name onto a fresh
//!   instance. Flattened and nested shapes are not reconstructed, and hits
//!   that cannot be rebuilt this way are dropped.
//! - [`Materialization::Mapper`] (default) rebuilds through the type's
//!   [`ModelMapper`](crate::mapping::ModelMapper), including embedded and
//!   collection fields.
//! - [`Materialization::Hydrate`] treats hits as ids and loads the canonical
//!   rows from the primary store, keeping the engine's ranking order.
//!
//! # Example
//!
//! ```ignore
//! let results = indexer
//!     .query::<Post>(Filter::text("title", "rust"))
//!     .size(10)
//!     .sort(SortField::desc("published"))
//!     .facet(FacetRequest::terms("tags", "tags", 5))
//!     .hydrate(true)
//!     .fetch()
//!     .await?;
//! ```

mod results;
mod transform;

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{FacetRequest, Filter, IndexEngine, SearchRequest, SearchTarget, SortField};
use crate::error::{IndexerResult, QueryError};
use crate::mapping::MappingRegistry;
use crate::store::PrimaryStore;

pub use results::{ResultObject, SearchResults};

use transform::{DirectTransformer, HydratingTransformer, MapperTransformer, ResultTransformer};

/// How hits become host instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    /// Best-effort copy of top-level fields.
    Direct,
    /// Full reconstruction through the type mapper.
    #[default]
    Mapper,
    /// Reload from the primary store by id.
    Hydrate,
}

/// A query being configured.
pub struct Query<'a, R> {
    registry: &'a MappingRegistry,
    engine: &'a dyn IndexEngine,
    store: Option<&'a dyn PrimaryStore>,
    filter: Filter,
    from: Option<usize>,
    size: Option<usize>,
    sort: Vec<SortField>,
    facets: Vec<FacetRequest>,
    materialization: Materialization,
    fail_on_missing_objects: bool,
    _result: PhantomData<fn() -> R>,
}

impl<'a, R: ResultObject> Query<'a, R> {
    /// Starts a query.
    pub fn new(
        registry: &'a MappingRegistry,
        engine: &'a dyn IndexEngine,
        store: Option<&'a dyn PrimaryStore>,
        filter: Filter,
    ) -> Self {
        Self {
            registry,
            engine,
            store,
            filter,
            from: None,
            size: None,
            sort: Vec::new(),
            facets: Vec::new(),
            materialization: Materialization::default(),
            fail_on_missing_objects: true,
            _result: PhantomData,
        }
    }

    /// Skips the first `from` hits.
    pub fn from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    /// Returns at most `size` hits.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Appends a sort criterion.
    pub fn sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    /// Appends a facet request.
    pub fn facet(mut self, facet: FacetRequest) -> Self {
        self.facets.push(facet);
        self
    }

    /// Selects the materialization strategy.
    pub fn materialize(mut self, materialization: Materialization) -> Self {
        self.materialization = materialization;
        self
    }

    /// Shorthand for [`Materialization::Hydrate`] (or back to the default).
    pub fn hydrate(self, hydrate: bool) -> Self {
        let materialization = if hydrate {
            Materialization::Hydrate
        } else {
            Materialization::default()
        };
        self.materialize(materialization)
    }

    /// Whether hydration fails when the store lacks an indexed id.
    ///
    /// When false, missing objects are dropped with a warning.
    pub fn fail_on_missing_objects(mut self, fail: bool) -> Self {
        self.fail_on_missing_objects = fail;
        self
    }

    /// Builds the engine request without running it.
    pub fn to_request(&self) -> IndexerResult<SearchRequest> {
        let targets = R::targets(self.registry)?
            .iter()
            .map(|m| SearchTarget::new(m.index_name(), m.document_type()))
            .collect();
        let mut request = SearchRequest::new(targets, self.filter.clone());
        request.from = self.from;
        request.size = self.size;
        request.sort = self.sort.clone();
        request.facets = self.facets.clone();
        Ok(request)
    }

    /// Runs the query.
    pub async fn fetch(self) -> IndexerResult<SearchResults<R>> {
        let request = self.to_request()?;
        if request.targets.is_empty() {
            return Ok(SearchResults::empty());
        }

        let transformer: Box<dyn ResultTransformer + 'a> = match self.materialization {
            Materialization::Direct => Box::new(DirectTransformer::new(self.registry)),
            Materialization::Mapper => Box::new(MapperTransformer::new(self.registry)),
            Materialization::Hydrate => {
                let store = self.store.ok_or(QueryError::StoreRequired)?;
                Box::new(HydratingTransformer::new(
                    self.registry,
                    store,
                    self.fail_on_missing_objects,
                ))
            }
        };

        let response = self.engine.search(&request).await?;
        debug!(
            total = response.total,
            hits = response.hits.len(),
            materialization = ?self.materialization,
            "Query executed"
        );

        let materialized = transformer.transform(&response.hits).await?;

        let mut results = SearchResults {
            total: response.total,
            objects: Vec::with_capacity(materialized.len()),
            scores: Vec::with_capacity(materialized.len()),
            sort_values: Vec::with_capacity(materialized.len()),
            facets: response.facets,
        };
        for (position, object) in materialized {
            let hit = &response.hits[position];
            results.objects.push(R::from_object(object)?);
            results.scores.push(hit.score);
            results.sort_values.push(hit.sort_values.clone());
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::engine::InMemoryEngine;
    use crate::model::{AnyModel, FieldDescriptor, HostType, Model, ModelDescriptor, Searchable};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Song {
        id: i64,
        title: String,
    }

    impl Model for Song {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>()
                .named("music.Song")
                .searchable(Searchable::new().index_name("music"))
                .field(FieldDescriptor::new("id", HostType::I64))
                .field(FieldDescriptor::new("title", HostType::String))
        }
    }

    #[test]
    fn test_request_shape() {
        let registry = MappingRegistry::default();
        let engine = InMemoryEngine::new();
        let request = Query::<Song>::new(&registry, &engine, None, Filter::MatchAll)
            .from(5)
            .size(2)
            .sort(SortField::asc("title"))
            .to_request()
            .unwrap();

        assert_eq!(request.targets, vec![SearchTarget::new("music", "music_song")]);
        assert_eq!(request.offset(), 5);
        assert_eq!(request.limit(), 2);
        assert_eq!(request.sort.len(), 1);
    }

    #[tokio::test]
    async fn test_hydrate_without_store_fails() {
        let registry = MappingRegistry::default();
        let engine = InMemoryEngine::new();
        let err = Query::<Song>::new(&registry, &engine, None, Filter::MatchAll)
            .hydrate(true)
            .fetch()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("primary store"));
    }

    #[tokio::test]
    async fn test_any_model_without_registrations_is_empty() {
        let registry = MappingRegistry::default();
        let engine = InMemoryEngine::new();
        let results = Query::<AnyModel>::new(&registry, &engine, None, Filter::MatchAll)
            .fetch()
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(results.total, 0);
    }
}
