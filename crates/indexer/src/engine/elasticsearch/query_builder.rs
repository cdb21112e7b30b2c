//! Elasticsearch Query DSL builder.
//!
//! Translates a [`SearchRequest`] into a search body.

use serde_json::{Map, Value, json};

use crate::engine::{Filter, SearchRequest, SortField};

use super::backend::{ElasticsearchEngine, MODEL_TYPE_FIELD};

/// A complete Elasticsearch search body ready to be sent.
#[derive(Debug, Clone)]
pub struct EsQuery {
    /// The complete query body.
    pub body: Value,
    /// Physical indices to search.
    pub indices: Vec<String>,
}

/// Builds Elasticsearch queries from search requests.
pub struct EsQueryBuilder<'a> {
    engine: &'a ElasticsearchEngine,
    doc_types: Vec<String>,
}

impl<'a> EsQueryBuilder<'a> {
    /// Creates a builder for the request's targets.
    pub fn new(engine: &'a ElasticsearchEngine, request: &SearchRequest) -> Self {
        let mut doc_types: Vec<String> = request.targets.iter().map(|t| t.doc_type.clone()).collect();
        doc_types.sort();
        doc_types.dedup();
        Self { engine, doc_types }
    }

    /// Builds the complete search body.
    pub fn build(&self, request: &SearchRequest) -> EsQuery {
        let mut indices: Vec<String> = request
            .targets
            .iter()
            .map(|t| self.engine.index_name(&t.index))
            .collect();
        indices.sort();
        indices.dedup();

        let mut bool_query = json!({
            "must": [self.build_filter(&request.filter)],
        });
        if !self.doc_types.is_empty() {
            bool_query["filter"] = json!([{ "terms": { MODEL_TYPE_FIELD: self.doc_types } }]);
        }

        let mut body = json!({
            "query": { "bool": bool_query },
            "from": request.offset(),
            "size": request.limit(),
            "track_total_hits": true,
        });

        if !request.sort.is_empty() {
            body["sort"] = Value::Array(request.sort.iter().map(build_sort).collect());
        }

        if !request.facets.is_empty() {
            let mut aggs = Map::new();
            for facet in &request.facets {
                aggs.insert(
                    facet.name.clone(),
                    json!({ "terms": { "field": facet.field, "size": facet.size } }),
                );
            }
            body["aggs"] = Value::Object(aggs);
        }

        EsQuery { body, indices }
    }

    /// Translates a filter into a query clause.
    pub fn build_filter(&self, filter: &Filter) -> Value {
        match filter {
            Filter::MatchAll => json!({ "match_all": {} }),
            Filter::Term { field, value } => json!({ "term": { field: value } }),
            Filter::Terms { field, values } => json!({ "terms": { field: values } }),
            Filter::Text {
                field: Some(field),
                query,
            } => json!({ "match": { field: query } }),
            Filter::Text { field: None, query } => json!({
                "multi_match": { "query": query, "fields": ["*"], "lenient": true }
            }),
            Filter::Range(range) => {
                let mut bounds = Map::new();
                for (name, bound) in [
                    ("gt", &range.gt),
                    ("gte", &range.gte),
                    ("lt", &range.lt),
                    ("lte", &range.lte),
                ] {
                    if let Some(value) = bound {
                        bounds.insert(name.to_string(), value.clone());
                    }
                }
                json!({ "range": { range.field.clone(): bounds } })
            }
            Filter::Exists { field } => json!({ "exists": { "field": field } }),
            Filter::Ids(ids) => {
                let values: Vec<String> = self
                    .doc_types
                    .iter()
                    .flat_map(|t| ids.iter().map(move |id| ElasticsearchEngine::document_id(t, id)))
                    .collect();
                json!({ "ids": { "values": values } })
            }
            Filter::And(clauses) => json!({
                "bool": { "must": clauses.iter().map(|c| self.build_filter(c)).collect::<Vec<_>>() }
            }),
            Filter::Or(clauses) => json!({
                "bool": {
                    "should": clauses.iter().map(|c| self.build_filter(c)).collect::<Vec<_>>(),
                    "minimum_should_match": 1
                }
            }),
            Filter::Not(clause) => json!({
                "bool": { "must_not": [self.build_filter(clause)] }
            }),
        }
    }
}

fn build_sort(sort: &SortField) -> Value {
    if sort.is_score() {
        return json!({ "_score": { "order": sort.order.as_str() } });
    }
    json!({
        sort.field.clone(): {
            "order": sort.order.as_str(),
            "missing": "_last",
            "unmapped_type": "keyword"
        }
    })
}
