//! Engine-neutral search request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page size used when a request does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Pseudo-field sorting by relevance score.
pub const SCORE_FIELD: &str = "_score";

/// Filter predicate of a search.
///
/// Field names are document keys; dotted names address embedded or
/// structural sub-fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document.
    MatchAll,
    /// Exact value match.
    Term { field: String, value: Value },
    /// Exact match against any of the values.
    Terms { field: String, values: Vec<Value> },
    /// Full-text token match; `None` searches every text value.
    Text { field: Option<String>, query: String },
    /// Bounded value range.
    Range(RangeFilter),
    /// The field holds a non-null value.
    Exists { field: String },
    /// Document id is one of the given ids.
    Ids(Vec<String>),
    /// Every clause matches.
    And(Vec<Filter>),
    /// At least one clause matches.
    Or(Vec<Filter>),
    /// The clause does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Exact value match.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Exact match against any of `values`.
    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Full-text match on one field.
    pub fn text(field: impl Into<String>, query: impl Into<String>) -> Self {
        Filter::Text {
            field: Some(field.into()),
            query: query.into(),
        }
    }

    /// Full-text match on every text value.
    pub fn text_any(query: impl Into<String>) -> Self {
        Filter::Text {
            field: None,
            query: query.into(),
        }
    }

    /// Field is present.
    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists {
            field: field.into(),
        }
    }

    /// Document id filter.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Conjunction.
    pub fn and(clauses: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(clauses.into_iter().collect())
    }

    /// Disjunction.
    pub fn or(clauses: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(clauses.into_iter().collect())
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(clause: Filter) -> Self {
        Filter::Not(Box::new(clause))
    }
}

impl From<RangeFilter> for Filter {
    fn from(range: RangeFilter) -> Self {
        Filter::Range(range)
    }
}

/// Range bounds on one field. Unset bounds are open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl RangeFilter {
    /// Unbounded range on `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Document key, or [`SCORE_FIELD`].
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Relevance, best first.
    pub fn score() -> Self {
        Self::desc(SCORE_FIELD)
    }

    /// Returns true when sorting by relevance.
    pub fn is_score(&self) -> bool {
        self.field == SCORE_FIELD
    }
}

/// Terms facet request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRequest {
    pub name: String,
    pub field: String,
    pub size: usize,
}

impl FacetRequest {
    /// Counts the `size` most frequent values of `field`.
    pub fn terms(name: impl Into<String>, field: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            size,
        }
    }
}

/// One bucket of a terms facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetEntry {
    pub term: String,
    pub count: u64,
}

/// Result of one facet request, most frequent terms first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    pub name: String,
    pub entries: Vec<FacetEntry>,
}

impl FacetResult {
    /// Count of `term`, zero if absent.
    pub fn count_of(&self, term: &str) -> u64 {
        self.entries
            .iter()
            .find(|e| e.term == term)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    /// Orders entries by count descending, then term, and keeps `size`.
    pub(crate) fn normalize(&mut self, size: usize) {
        self.entries
            .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        self.entries.truncate(size);
    }
}

/// One (index, document type) pair a search runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTarget {
    pub index: String,
    pub doc_type: String,
}

impl SearchTarget {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
        }
    }
}

/// A search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub targets: Vec<SearchTarget>,
    pub filter: Filter,
    pub from: Option<usize>,
    pub size: Option<usize>,
    pub sort: Vec<SortField>,
    pub facets: Vec<FacetRequest>,
}

impl SearchRequest {
    /// Match-all request over the given targets.
    pub fn new(targets: Vec<SearchTarget>, filter: Filter) -> Self {
        Self {
            targets,
            filter,
            from: None,
            size: None,
            sort: Vec::new(),
            facets: Vec::new(),
        }
    }

    /// Offset of the first hit.
    pub fn offset(&self) -> usize {
        self.from.unwrap_or(0)
    }

    /// Maximum number of hits.
    pub fn limit(&self) -> usize {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub index: String,
    pub doc_type: String,
    pub id: String,
    pub score: f64,
    /// Sort key tuple, one value per sort criterion.
    pub sort_values: Vec<Value>,
    pub source: Map<String, Value>,
}

/// Search response: total match count and the requested page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Matches independent of paging.
    pub total: u64,
    pub hits: Vec<SearchHit>,
    pub facets: Vec<FacetResult>,
}

impl SearchResponse {
    /// Empty response.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_filter_constructors() {
        assert_eq!(
            Filter::term("status", "open"),
            Filter::Term {
                field: "status".to_string(),
                value: json!("open")
            }
        );
        let range: Filter = RangeFilter::new("views").gte(10).lt(100).into();
        match range {
            Filter::Range(r) => {
                assert_eq!(r.gte, Some(json!(10)));
                assert_eq!(r.lt, Some(json!(100)));
                assert!(r.gt.is_none());
            }
            _ => panic!("expected range"),
        }
    }

    #[test]
    fn test_request_paging_defaults() {
        let request = SearchRequest::new(vec![SearchTarget::new("a", "a")], Filter::MatchAll);
        assert_eq!(request.offset(), 0);
        assert_eq!(request.limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_facet_normalize_orders_by_count_then_term() {
        let mut facet = FacetResult {
            name: "tags".to_string(),
            entries: vec![
                FacetEntry { term: "b".to_string(), count: 2 },
                FacetEntry { term: "c".to_string(), count: 5 },
                FacetEntry { term: "a".to_string(), count: 2 },
            ],
        };
        facet.normalize(2);
        let terms: Vec<&str> = facet.entries.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["c", "a"]);
        assert_eq!(facet.count_of("b"), 0);
    }

    #[test]
    fn test_sort_field_score() {
        let score = SortField::score();
        assert!(score.is_score());
        assert_eq!(score.order, SortOrder::Desc);
        assert!(!SortField::asc("title").is_score());
    }
}
