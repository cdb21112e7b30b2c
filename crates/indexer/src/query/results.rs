//! Query result containers.

use std::sync::Arc;

use serde_json::Value;

use crate::engine::FacetResult;
use crate::error::{IndexerResult, QueryError};
use crate::mapping::{MappingRegistry, ModelMapper};
use crate::model::{AnyModel, IndexableObject, Model};

/// A type a query can return.
///
/// Implemented for every [`Model`] (typed queries over one type) and for
/// [`AnyModel`] (queries over every registered type).
pub trait ResultObject: Sized + Send {
    /// Mappers of the types the query searches.
    fn targets(registry: &MappingRegistry) -> IndexerResult<Vec<Arc<ModelMapper>>>;

    /// Converts a materialized instance.
    fn from_object(object: Box<dyn IndexableObject>) -> IndexerResult<Self>;
}

impl<T: Model> ResultObject for T {
    fn targets(registry: &MappingRegistry) -> IndexerResult<Vec<Arc<ModelMapper>>> {
        Ok(vec![registry.get_mapper::<T>()?])
    }

    fn from_object(object: Box<dyn IndexableObject>) -> IndexerResult<Self> {
        let actual = object.model_type().descriptor().type_name().to_string();
        match object.into_any().downcast::<T>() {
            Ok(model) => Ok(*model),
            Err(_) => Err(QueryError::TypeMismatch {
                expected: T::descriptor().type_name().to_string(),
                actual,
            }
            .into()),
        }
    }
}

impl ResultObject for AnyModel {
    fn targets(registry: &MappingRegistry) -> IndexerResult<Vec<Arc<ModelMapper>>> {
        let mut mappers = registry.mappers();
        mappers.sort_by(|a, b| a.document_type().cmp(b.document_type()));
        Ok(mappers)
    }

    fn from_object(object: Box<dyn IndexableObject>) -> IndexerResult<Self> {
        Ok(AnyModel::new(object))
    }
}

/// Materialized results of one query.
///
/// `objects`, `scores` and `sort_values` are parallel: entry `i` of each
/// describes the same hit.
#[derive(Debug)]
pub struct SearchResults<R> {
    /// Total matches, independent of paging.
    pub total: u64,
    /// Materialized hits in rank order.
    pub objects: Vec<R>,
    /// Relevance score per hit.
    pub scores: Vec<f64>,
    /// Sort key values per hit.
    pub sort_values: Vec<Vec<Value>>,
    /// Facet results in request order.
    pub facets: Vec<FacetResult>,
}

impl<R> SearchResults<R> {
    pub(crate) fn empty() -> Self {
        Self {
            total: 0,
            objects: Vec::new(),
            scores: Vec::new(),
            sort_values: Vec::new(),
            facets: Vec::new(),
        }
    }

    /// Hits on this page.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if this page has no hits.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Looks up a facet by name.
    pub fn facet(&self, name: &str) -> Option<&FacetResult> {
        self.facets.iter().find(|f| f.name == name)
    }

    /// Iterates `(object, score, sort values)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&R, f64, &[Value])> {
        self.objects
            .iter()
            .zip(&self.scores)
            .zip(&self.sort_values)
            .map(|((object, score), sort)| (object, *score, sort.as_slice()))
    }

    /// Takes the objects, dropping scores and facets.
    pub fn into_objects(self) -> Vec<R> {
        self.objects
    }
}
