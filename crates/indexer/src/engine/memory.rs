//! In-process index engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::EngineError;

use super::search::{FacetEntry, FacetResult, Filter, RangeFilter, SearchHit, SearchRequest, SearchResponse};
use super::{DocumentKey, EngineResult, IndexEngine, SchemaStatus};

const ENGINE_NAME: &str = "memory";

#[derive(Debug, Clone)]
struct StoredSchema {
    schema: Value,
    settings: Option<Value>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    source: Map<String, Value>,
}

/// Index engine holding everything in process memory.
///
/// Implements the full [`IndexEngine`] contract: filters, paging, sorting,
/// text scoring and terms facets. Writes are visible to the next read.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    schemas: RwLock<HashMap<(String, String), StoredSchema>>,
    documents: RwLock<HashMap<DocumentKey, StoredDocument>>,
    next_seq: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent request fail with [`EngineError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Schema registered for a document type.
    pub fn schema(&self, index: &str, doc_type: &str) -> Option<Value> {
        self.schemas
            .read()
            .get(&(index.to_string(), doc_type.to_string()))
            .map(|s| s.schema.clone())
    }

    /// Index settings registered with a document type's schema.
    pub fn settings(&self, index: &str, doc_type: &str) -> Option<Value> {
        self.schemas
            .read()
            .get(&(index.to_string(), doc_type.to_string()))
            .and_then(|s| s.settings.clone())
    }

    /// Number of registered schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.read().len()
    }

    /// Number of documents in one document type.
    pub fn document_count(&self, index: &str, doc_type: &str) -> usize {
        self.documents
            .read()
            .keys()
            .filter(|k| k.index == index && k.doc_type == doc_type)
            .count()
    }

    /// Number of documents across all indices.
    pub fn total_documents(&self) -> usize {
        self.documents.read().len()
    }

    fn check_available(&self) -> EngineResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(EngineError::Unavailable {
                engine: ENGINE_NAME.to_string(),
                message: "engine marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IndexEngine for InMemoryEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn create_schema(
        &self,
        index: &str,
        doc_type: &str,
        schema: &Value,
        settings: Option<&Value>,
    ) -> EngineResult<SchemaStatus> {
        self.check_available()?;
        let mut schemas = self.schemas.write();
        let key = (index.to_string(), doc_type.to_string());
        if schemas.contains_key(&key) {
            return Ok(SchemaStatus::AlreadyExists);
        }
        schemas.insert(
            key,
            StoredSchema {
                schema: schema.clone(),
                settings: settings.cloned(),
            },
        );
        debug!(index = %index, doc_type = %doc_type, "Created in-memory schema");
        Ok(SchemaStatus::Created)
    }

    async fn put_document(&self, key: &DocumentKey, document: Value) -> EngineResult<()> {
        self.check_available()?;
        let Value::Object(source) = document else {
            return Err(EngineError::Serialization {
                message: format!("document {key} is not a JSON object"),
            });
        };

        let mut documents = self.documents.write();
        match documents.get_mut(key) {
            Some(existing) => existing.source = source,
            None => {
                let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
                documents.insert(key.clone(), StoredDocument { seq, source });
            }
        }
        Ok(())
    }

    async fn get_document(&self, key: &DocumentKey) -> EngineResult<Option<Map<String, Value>>> {
        self.check_available()?;
        Ok(self.documents.read().get(key).map(|d| d.source.clone()))
    }

    async fn delete_document(&self, key: &DocumentKey) -> EngineResult<bool> {
        self.check_available()?;
        Ok(self.documents.write().remove(key).is_some())
    }

    async fn search(&self, request: &SearchRequest) -> EngineResult<SearchResponse> {
        self.check_available()?;

        let targets: HashSet<(&str, &str)> = request
            .targets
            .iter()
            .map(|t| (t.index.as_str(), t.doc_type.as_str()))
            .collect();

        let mut matches: Vec<(DocumentKey, StoredDocument, f64)> = {
            let documents = self.documents.read();
            documents
                .iter()
                .filter(|(key, _)| {
                    targets.is_empty() || targets.contains(&(key.index.as_str(), key.doc_type.as_str()))
                })
                .filter_map(|(key, doc)| {
                    score(&request.filter, &key.id, &doc.source)
                        .map(|s| (key.clone(), doc.clone(), s))
                })
                .collect()
        };

        let total = matches.len() as u64;

        let facets = request
            .facets
            .iter()
            .map(|facet| {
                let mut counts: BTreeMap<String, u64> = BTreeMap::new();
                for (_, doc, _) in &matches {
                    let terms: HashSet<String> = values_at(&doc.source, &facet.field)
                        .into_iter()
                        .map(term_of)
                        .collect();
                    for term in terms {
                        *counts.entry(term).or_insert(0) += 1;
                    }
                }
                let mut result = FacetResult {
                    name: facet.name.clone(),
                    entries: counts
                        .into_iter()
                        .map(|(term, count)| FacetEntry { term, count })
                        .collect(),
                };
                result.normalize(facet.size);
                result
            })
            .collect();

        let mut hits: Vec<(u64, SearchHit)> = matches
            .drain(..)
            .map(|(key, doc, score)| {
                let sort_values = request
                    .sort
                    .iter()
                    .map(|s| {
                        if s.is_score() {
                            Number::from_f64(score).map(Value::Number).unwrap_or(Value::Null)
                        } else {
                            values_at(&doc.source, &s.field)
                                .first()
                                .map(|v| (*v).clone())
                                .unwrap_or(Value::Null)
                        }
                    })
                    .collect();
                (
                    doc.seq,
                    SearchHit {
                        index: key.index,
                        doc_type: key.doc_type,
                        id: key.id,
                        score,
                        sort_values,
                        source: doc.source,
                    },
                )
            })
            .collect();

        hits.sort_by(|(seq_a, a), (seq_b, b)| {
            let by_criteria = if request.sort.is_empty() {
                b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
            } else {
                request
                    .sort
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let ordering = compare_sort_values(&a.sort_values[i], &b.sort_values[i]);
                        match (ordering, s.order) {
                            (SortKeyOrdering::Missing(o), _) => o,
                            (SortKeyOrdering::Present(o), super::SortOrder::Asc) => o,
                            (SortKeyOrdering::Present(o), super::SortOrder::Desc) => o.reverse(),
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            };
            by_criteria.then_with(|| seq_a.cmp(seq_b))
        });

        let hits = hits
            .into_iter()
            .skip(request.offset())
            .take(request.limit())
            .map(|(_, hit)| hit)
            .collect();

        Ok(SearchResponse {
            total,
            hits,
            facets,
        })
    }
}

/// Scores a document against a filter; `None` means no match.
fn score(filter: &Filter, id: &str, source: &Map<String, Value>) -> Option<f64> {
    match filter {
        Filter::MatchAll => Some(1.0),
        Filter::Term { field, value } => values_at(source, field)
            .into_iter()
            .any(|v| values_equal(v, value))
            .then_some(1.0),
        Filter::Terms { field, values } => values_at(source, field)
            .into_iter()
            .any(|v| values.iter().any(|wanted| values_equal(v, wanted)))
            .then_some(1.0),
        Filter::Text { field, query } => {
            let wanted = tokenize(query);
            if wanted.is_empty() {
                return None;
            }
            let mut texts = Vec::new();
            match field {
                Some(field) => texts.extend(values_at(source, field).into_iter().filter_map(text_of)),
                None => collect_text(&Value::Object(source.clone()), &mut texts),
            }
            let present: HashSet<String> = texts.iter().flat_map(|t| tokenize(t)).collect();
            let matched = wanted.iter().filter(|t| present.contains(*t)).count();
            (matched > 0).then_some(matched as f64)
        }
        Filter::Range(range) => values_at(source, &range.field)
            .into_iter()
            .any(|v| in_range(v, range))
            .then_some(1.0),
        Filter::Exists { field } => (!values_at(source, field).is_empty()).then_some(1.0),
        Filter::Ids(ids) => ids.iter().any(|i| i == id).then_some(1.0),
        Filter::And(clauses) => {
            if clauses.is_empty() {
                return Some(1.0);
            }
            clauses
                .iter()
                .map(|c| score(c, id, source))
                .sum::<Option<f64>>()
        }
        Filter::Or(clauses) => {
            let scores: Vec<f64> = clauses.iter().filter_map(|c| score(c, id, source)).collect();
            (!scores.is_empty()).then(|| scores.iter().sum())
        }
        Filter::Not(clause) => score(clause, id, source).is_none().then_some(1.0),
    }
}

/// Values at a document key, flattening arrays.
///
/// The full key is tried first so flattened embedded keys (`author.name`)
/// resolve; otherwise the path descends into structural sub-objects.
fn values_at<'a>(source: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    if let Some(value) = source.get(path) {
        flatten(value, &mut out);
        return out;
    }
    for (i, _) in path.match_indices('.') {
        let (head, rest) = (&path[..i], &path[i + 1..]);
        match source.get(head) {
            Some(Value::Object(sub)) => out.extend(values_at(sub, rest)),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(sub) = item {
                        out.extend(values_at(sub, rest));
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        other => out.push(other),
    }
}

fn values_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            *s == n.to_string()
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => *s == b.to_string(),
        (a, b) => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(s), Value::Number(n)) => s.parse::<f64>().ok()?.partial_cmp(&n.as_f64()?),
        (Value::Number(n), Value::String(s)) => n.as_f64()?.partial_cmp(&s.parse::<f64>().ok()?),
        _ => None,
    }
}

fn in_range(value: &Value, range: &RangeFilter) -> bool {
    let check = |bound: &Option<Value>, accept: fn(Ordering) -> bool| match bound {
        None => true,
        Some(bound) => compare_values(value, bound).is_some_and(accept),
    };
    check(&range.gt, |o| o == Ordering::Greater)
        && check(&range.gte, |o| o != Ordering::Less)
        && check(&range.lt, |o| o == Ordering::Less)
        && check(&range.lte, |o| o != Ordering::Greater)
}

enum SortKeyOrdering {
    /// Ordering involving a missing value; missing sorts last in both directions.
    Missing(Ordering),
    Present(Ordering),
}

fn compare_sort_values(a: &Value, b: &Value) -> SortKeyOrdering {
    match (a.is_null(), b.is_null()) {
        (true, true) => SortKeyOrdering::Missing(Ordering::Equal),
        (true, false) => SortKeyOrdering::Missing(Ordering::Greater),
        (false, true) => SortKeyOrdering::Missing(Ordering::Less),
        (false, false) => SortKeyOrdering::Present(compare_values(a, b).unwrap_or(Ordering::Equal)),
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    tokens.dedup();
    tokens
}

fn term_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::{FacetRequest, SearchTarget, SortField};

    fn key(id: &str) -> DocumentKey {
        DocumentKey::new("posts", "post", id)
    }

    async fn seeded() -> InMemoryEngine {
        let engine = InMemoryEngine::new();
        let docs = [
            ("1", json!({"title": "Rust in practice", "views": 10, "tags": ["rust", "async"], "author.name": "Ann"})),
            ("2", json!({"title": "Tokio deep dive", "views": 30, "tags": ["rust", "tokio"], "author.name": "Bob"})),
            ("3", json!({"title": "Gardening", "views": 20, "tags": ["garden"], "meta": {"lang": "en"}})),
        ];
        for (id, doc) in docs {
            engine.put_document(&key(id), doc).await.unwrap();
        }
        engine
    }

    fn request(filter: Filter) -> SearchRequest {
        SearchRequest::new(vec![SearchTarget::new("posts", "post")], filter)
    }

    fn ids(response: &SearchResponse) -> Vec<&str> {
        response.hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let engine = InMemoryEngine::new();
        let schema = json!({"post": {"properties": {}}});
        assert_eq!(
            engine.create_schema("posts", "post", &schema, None).await.unwrap(),
            SchemaStatus::Created
        );
        assert_eq!(
            engine.create_schema("posts", "post", &schema, None).await.unwrap(),
            SchemaStatus::AlreadyExists
        );
        assert_eq!(engine.schema_count(), 1);
    }

    #[tokio::test]
    async fn test_put_replaces_and_delete_reports_presence() {
        let engine = InMemoryEngine::new();
        engine.put_document(&key("1"), json!({"a": 1, "b": 2})).await.unwrap();
        engine.put_document(&key("1"), json!({"a": 3})).await.unwrap();
        let doc = engine.get_document(&key("1")).await.unwrap().unwrap();
        assert_eq!(Value::Object(doc), json!({"a": 3}));
        assert_eq!(engine.document_count("posts", "post"), 1);

        assert!(engine.delete_document(&key("1")).await.unwrap());
        assert!(!engine.delete_document(&key("1")).await.unwrap());
        assert!(engine.get_document(&key("1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_term_and_dotted_paths() {
        let engine = seeded().await;
        let response = engine.search(&request(Filter::term("tags", "rust"))).await.unwrap();
        assert_eq!(response.total, 2);

        let response = engine.search(&request(Filter::term("author.name", "Bob"))).await.unwrap();
        assert_eq!(ids(&response), vec!["2"]);

        let response = engine.search(&request(Filter::term("meta.lang", "en"))).await.unwrap();
        assert_eq!(ids(&response), vec!["3"]);
    }

    #[tokio::test]
    async fn test_text_scoring_orders_hits() {
        let engine = seeded().await;
        let response = engine
            .search(&request(Filter::text_any("rust tokio")))
            .await
            .unwrap();
        assert_eq!(ids(&response), vec!["2", "1"]);
        assert_eq!(response.hits[0].score, 2.0);
        assert_eq!(response.hits[1].score, 1.0);
    }

    #[tokio::test]
    async fn test_range_not_and_ids() {
        let engine = seeded().await;
        let range = engine
            .search(&request(RangeFilter::new("views").gte(15).lte(30).into()))
            .await
            .unwrap();
        assert_eq!(range.total, 2);

        let not = engine
            .search(&request(Filter::not(Filter::term("tags", "rust"))))
            .await
            .unwrap();
        assert_eq!(ids(&not), vec!["3"]);

        let by_id = engine.search(&request(Filter::ids(["1", "3"]))).await.unwrap();
        assert_eq!(by_id.total, 2);
    }

    #[tokio::test]
    async fn test_sort_and_paging() {
        let engine = seeded().await;
        let mut req = request(Filter::MatchAll);
        req.sort = vec![SortField::desc("views")];
        req.from = Some(1);
        req.size = Some(1);
        let response = engine.search(&req).await.unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(ids(&response), vec!["3"]);
        assert_eq!(response.hits[0].sort_values, vec![json!(20)]);
    }

    #[tokio::test]
    async fn test_missing_sort_values_last() {
        let engine = seeded().await;
        let mut req = request(Filter::MatchAll);
        req.sort = vec![SortField::asc("author.name")];
        let response = engine.search(&req).await.unwrap();
        assert_eq!(ids(&response), vec!["1", "2", "3"]);
        assert_eq!(response.hits[2].sort_values, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_terms_facet() {
        let engine = seeded().await;
        let mut req = request(Filter::MatchAll);
        req.facets = vec![FacetRequest::terms("tags", "tags", 10)];
        req.size = Some(0);
        let response = engine.search(&req).await.unwrap();
        assert!(response.hits.is_empty());
        let facet = &response.facets[0];
        assert_eq!(facet.entries[0].term, "rust");
        assert_eq!(facet.entries[0].count, 2);
        assert_eq!(facet.count_of("garden"), 1);
    }

    #[tokio::test]
    async fn test_unavailable_engine_fails() {
        let engine = InMemoryEngine::new();
        engine.set_unavailable(true);
        let err = engine.put_document(&key("1"), json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable { .. }));
    }
}
