//! Elasticsearch engine client and configuration.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::Elasticsearch;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{
    DocumentKey, EngineResult, IndexEngine, SchemaStatus, SearchRequest, SearchResponse,
};
use crate::error::EngineError;

pub(crate) const ENGINE_NAME: &str = "elasticsearch";

/// Metadata field recording a document's type.
pub const MODEL_TYPE_FIELD: &str = "model_type";

pub(crate) fn internal_error(message: String) -> EngineError {
    EngineError::Internal {
        engine: ENGINE_NAME.to_string(),
        message,
        source: None,
    }
}

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the Elasticsearch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Elasticsearch node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    pub nodes: Vec<String>,

    /// Prefix prepended to every index name as `{prefix}_{index}`.
    /// Empty means no prefix.
    #[serde(default)]
    pub index_prefix: String,

    /// Number of primary shards per index (default: 1).
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,

    /// Number of replica shards per index (default: 1).
    #[serde(default = "default_replicas")]
    pub number_of_replicas: u32,

    /// Refresh interval (default: "1s").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Refresh the index after every write so searches see it immediately.
    /// Point lookups are real-time regardless.
    #[serde(default)]
    pub refresh_on_write: bool,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_shards() -> u32 {
    1
}

fn default_replicas() -> u32 {
    1
}

fn default_refresh_interval() -> String {
    "1s".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:9200".to_string()],
            index_prefix: String::new(),
            number_of_shards: default_shards(),
            number_of_replicas: default_replicas(),
            refresh_interval: default_refresh_interval(),
            request_timeout_ms: default_request_timeout_ms(),
            refresh_on_write: false,
            auth: None,
            disable_certificate_validation: false,
        }
    }
}

/// Index engine backed by an Elasticsearch 8 cluster.
///
/// Elasticsearch 8 has no mapping types, so every document carries its type
/// in [`MODEL_TYPE_FIELD`] and its Elasticsearch id is `{doc_type}_{id}`.
/// Several document types may share one index.
pub struct ElasticsearchEngine {
    client: Elasticsearch,
    config: ElasticsearchConfig,
}

impl Debug for ElasticsearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchEngine {
    /// Creates a new engine with the given configuration.
    ///
    /// Only builds the client; nothing is sent until the first request.
    pub fn new(config: ElasticsearchConfig) -> EngineResult<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    fn build_client(config: &ElasticsearchConfig) -> EngineResult<Elasticsearch> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url =
            url.parse().map_err(|e| EngineError::ConnectionFailed {
                engine: ENGINE_NAME.to_string(),
                message: format!("Invalid URL: {}", e),
            })?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => {
                    builder.auth(Credentials::Bearer(token.clone()))
                }
            };
        }

        let transport = builder.build().map_err(|e| EngineError::ConnectionFailed {
            engine: ENGINE_NAME.to_string(),
            message: format!("Failed to build transport: {}", e),
        })?;

        Ok(Elasticsearch::new(transport))
    }

    pub(crate) fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// Physical index name for a logical index.
    pub fn index_name(&self, index: &str) -> String {
        if self.config.index_prefix.is_empty() {
            index.to_lowercase()
        } else {
            format!("{}_{}", self.config.index_prefix, index.to_lowercase())
        }
    }

    /// Logical index name for a physical one.
    pub(crate) fn logical_index(&self, physical: &str) -> String {
        if self.config.index_prefix.is_empty() {
            return physical.to_string();
        }
        physical
            .strip_prefix(&format!("{}_", self.config.index_prefix))
            .unwrap_or(physical)
            .to_string()
    }

    /// Elasticsearch document id for a document key.
    pub(crate) fn document_id(doc_type: &str, id: &str) -> String {
        format!("{}_{}", doc_type, id)
    }

    /// Refreshes an index to make recently written documents searchable.
    pub async fn refresh_index(&self, index: &str) -> EngineResult<()> {
        let index = self.index_name(index);
        self.client
            .indices()
            .refresh(elasticsearch::indices::IndicesRefreshParts::Index(&[
                &index,
            ]))
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to refresh index {}: {}", index, e)))?;
        Ok(())
    }

    /// Checks that the cluster is reachable and not red.
    pub async fn health_check(&self) -> EngineResult<()> {
        let response = self
            .client
            .cluster()
            .health(elasticsearch::cluster::ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| EngineError::Unavailable {
                engine: ENGINE_NAME.to_string(),
                message: format!("Health check failed: {}", e),
            })?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(EngineError::Unavailable {
                engine: ENGINE_NAME.to_string(),
                message: format!("Cluster health returned status {}", status),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| internal_error(format!("Failed to parse health response: {}", e)))?;

        let cluster_status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        if cluster_status == "red" {
            return Err(EngineError::Unavailable {
                engine: ENGINE_NAME.to_string(),
                message: format!("Cluster status is red: {:?}", body),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl IndexEngine for ElasticsearchEngine {
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
        super::schema::ensure_schema(self, index, doc_type, schema, settings).await
    }

    async fn put_document(&self, key: &DocumentKey, document: Value) -> EngineResult<()> {
        super::storage::put_document(self, key, document).await
    }

    async fn get_document(&self, key: &DocumentKey) -> EngineResult<Option<Map<String, Value>>> {
        super::storage::get_document(self, key).await
    }

    async fn delete_document(&self, key: &DocumentKey) -> EngineResult<bool> {
        super::storage::delete_document(self, key).await
    }

    async fn search(&self, request: &SearchRequest) -> EngineResult<SearchResponse> {
        super::search_impl::search(self, request).await
    }
}
