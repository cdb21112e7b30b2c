//! Search execution for the Elasticsearch engine.

use elasticsearch::SearchParts;
use serde_json::Value;

use crate::engine::{
    EngineResult, FacetEntry, FacetResult, SearchHit, SearchRequest, SearchResponse,
};

use super::backend::{ElasticsearchEngine, internal_error};
use super::query_builder::EsQueryBuilder;
use super::storage::strip_metadata;

pub(crate) async fn search(
    engine: &ElasticsearchEngine,
    request: &SearchRequest,
) -> EngineResult<SearchResponse> {
    let es_query = EsQueryBuilder::new(engine, request).build(request);
    if es_query.indices.is_empty() {
        return Ok(SearchResponse::empty());
    }
    let indices: Vec<&str> = es_query.indices.iter().map(String::as_str).collect();

    let response = engine
        .client()
        .search(SearchParts::Index(&indices))
        .body(es_query.body)
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            // Index might not exist yet - return empty results
            tracing::debug!("ES search failed (index may not exist): {}", e);
            return Ok(SearchResponse::empty());
        }
    };

    if !response.status_code().is_success() {
        let body = response.text().await.unwrap_or_default();
        // 404 means index doesn't exist - return empty results
        if body.contains("index_not_found_exception") {
            return Ok(SearchResponse::empty());
        }
        return Err(internal_error(format!("Search failed: {}", body)));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| internal_error(format!("Failed to parse search response: {}", e)))?;

    Ok(parse_response(engine, request, &body))
}

/// Parses a search response body.
pub(crate) fn parse_response(
    engine: &ElasticsearchEngine,
    request: &SearchRequest,
    body: &Value,
) -> SearchResponse {
    let hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .cloned()
        .unwrap_or_default();

    let total = body
        .get("hits")
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let mut parsed = Vec::with_capacity(hits.len());
    for hit in &hits {
        let mut source = match hit.get("_source") {
            Some(Value::Object(s)) => s.clone(),
            _ => continue,
        };
        let Some(doc_type) = strip_metadata(&mut source) else {
            tracing::debug!("Skipping hit without document type: {:?}", hit.get("_id"));
            continue;
        };

        let es_id = hit.get("_id").and_then(Value::as_str).unwrap_or_default();
        let id = es_id
            .strip_prefix(&format!("{}_", doc_type))
            .unwrap_or(es_id)
            .to_string();
        let index = hit
            .get("_index")
            .and_then(Value::as_str)
            .map(|i| engine.logical_index(i))
            .unwrap_or_default();

        parsed.push(SearchHit {
            index,
            doc_type,
            id,
            score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
            sort_values: hit
                .get("sort")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            source,
        });
    }

    let facets = request
        .facets
        .iter()
        .map(|facet| {
            let buckets = body
                .get("aggregations")
                .and_then(|a| a.get(&facet.name))
                .and_then(|a| a.get("buckets"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut result = FacetResult {
                name: facet.name.clone(),
                entries: buckets
                    .iter()
                    .filter_map(|bucket| {
                        let term = match bucket.get("key_as_string").or_else(|| bucket.get("key"))? {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        let count = bucket.get("doc_count").and_then(Value::as_u64)?;
                        Some(FacetEntry { term, count })
                    })
                    .collect(),
            };
            result.normalize(facet.size);
            result
        })
        .collect();

    SearchResponse {
        total,
        hits: parsed,
        facets,
    }
}
