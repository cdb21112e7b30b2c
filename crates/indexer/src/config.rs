//! Indexer configuration.
//!
//! [`IndexerConfig`] deserializes from a config file (every field has a
//! default) and doubles as a set of clap arguments a host binary can flatten
//! into its own CLI.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `INDEXER_DELIVERY_MODE` | LOCAL | SYNCHRONOUS, LOCAL, BROKER (or RABBITMQ), DISCARD, CUSTOM |
//! | `INDEXER_CUSTOM_HANDLER` | - | Name of the injected handler for CUSTOM |
//! | `INDEXER_BROKER_HOST` | localhost | Broker host |
//! | `INDEXER_BROKER_PORT` | 5672 | Broker port |
//! | `INDEXER_BROKER_USERNAME` | guest | Broker user |
//! | `INDEXER_BROKER_PASSWORD` | guest | Broker password |
//! | `INDEXER_BROKER_VHOST` | / | Broker virtual host |
//! | `INDEXER_BROKER_QUEUE` | elasticSearchQueue | Queue index events travel on |
//! | `INDEXER_BROKER_RECONNECT_DELAY` | 5s | Delay between reconnect attempts |
//! | `INDEXER_REINDEX_PAGE_SIZE` | 256 | Rows per reindex page |
//! | `INDEXER_FAIL_ON_MISSING_OBJECTS` | true | Fail hydration on index/store drift |
//! | `INDEXER_MAX_EMBED_DEPTH` | 3 | Embedding recursion bound |
//!
//! # Example
//!
//! ```rust
//! use helios_indexer::config::{DeliveryModeSetting, IndexerConfig};
//!
//! let config: IndexerConfig = serde_json::from_str(r#"{
//!     "delivery_mode": "synchronous",
//!     "reindex": {"page_size": 500}
//! }"#).unwrap();
//!
//! assert_eq!(config.delivery_mode, DeliveryModeSetting::Synchronous);
//! assert_eq!(config.reindex.page_size, 500);
//! assert!(config.hydration.fail_on_missing_objects);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::{ArgAction, Args, Parser};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::mapping::{DEFAULT_MAX_EMBED_DEPTH, MappingContext};
use crate::pipeline::DEFAULT_QUEUE;
use crate::reindex::DEFAULT_PAGE_SIZE;

/// Delivery mode as named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeliveryModeSetting {
    /// Inline writes.
    Synchronous,
    /// In-process queue.
    #[default]
    Local,
    /// Message broker.
    Broker,
    /// Drop every event.
    Discard,
    /// Injected handler named by `custom_handler`.
    Custom,
}

impl DeliveryModeSetting {
    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryModeSetting::Synchronous => "SYNCHRONOUS",
            DeliveryModeSetting::Local => "LOCAL",
            DeliveryModeSetting::Broker => "BROKER",
            DeliveryModeSetting::Discard => "DISCARD",
            DeliveryModeSetting::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for DeliveryModeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SYNCHRONOUS" => Ok(DeliveryModeSetting::Synchronous),
            "LOCAL" => Ok(DeliveryModeSetting::Local),
            "BROKER" | "RABBITMQ" => Ok(DeliveryModeSetting::Broker),
            "DISCARD" => Ok(DeliveryModeSetting::Discard),
            "CUSTOM" => Ok(DeliveryModeSetting::Custom),
            other => Err(format!("unknown delivery mode '{}'", other)),
        }
    }
}

impl Serialize for DeliveryModeSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeliveryModeSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Top-level indexer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct IndexerConfig {
    /// How index events are delivered.
    #[serde(default)]
    #[arg(long = "index-delivery-mode", env = "INDEXER_DELIVERY_MODE", default_value_t = DeliveryModeSetting::Local)]
    pub delivery_mode: DeliveryModeSetting,

    /// Name of the injected handler used by CUSTOM delivery.
    #[serde(default)]
    #[arg(long = "index-custom-handler", env = "INDEXER_CUSTOM_HANDLER")]
    pub custom_handler: Option<String>,

    /// Message broker connection.
    #[serde(default)]
    #[command(flatten)]
    pub broker: BrokerConfig,

    /// Reindex job settings.
    #[serde(default)]
    #[command(flatten)]
    pub reindex: ReindexConfig,

    /// Hydrating query settings.
    #[serde(default)]
    #[command(flatten)]
    pub hydration: HydrationConfig,

    /// Mapping build settings.
    #[serde(default)]
    #[command(flatten)]
    pub mapping: MappingConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryModeSetting::default(),
            custom_handler: None,
            broker: BrokerConfig::default(),
            reindex: ReindexConfig::default(),
            hydration: HydrationConfig::default(),
            mapping: MappingConfig::default(),
        }
    }
}

#[derive(Parser)]
#[command(name = "helios-indexer")]
struct EnvArgs {
    #[command(flatten)]
    config: IndexerConfig,
}

impl IndexerConfig {
    /// Reads the configuration from `INDEXER_*` environment variables.
    pub fn from_env() -> Self {
        // Parse with no command-line arguments so only env vars apply
        EnvArgs::try_parse_from(["helios-indexer"])
            .map(|args| args.config)
            .unwrap_or_default()
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.reindex.page_size == 0 {
            errors.push("Reindex page size cannot be 0".to_string());
        }

        if self.delivery_mode == DeliveryModeSetting::Custom && self.custom_handler.is_none() {
            errors.push("CUSTOM delivery requires custom_handler".to_string());
        }

        if self.broker.queue.is_empty() {
            errors.push("Broker queue name cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Message broker connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct BrokerConfig {
    /// Broker host.
    #[serde(default = "default_broker_host")]
    #[arg(long = "index-broker-host", env = "INDEXER_BROKER_HOST", default_value = "localhost")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_broker_port")]
    #[arg(long = "index-broker-port", env = "INDEXER_BROKER_PORT", default_value_t = 5672)]
    pub port: u16,

    /// Broker user.
    #[serde(default = "default_broker_credential")]
    #[arg(long = "index-broker-username", env = "INDEXER_BROKER_USERNAME", default_value = "guest")]
    pub username: String,

    /// Broker password.
    #[serde(default = "default_broker_credential")]
    #[arg(long = "index-broker-password", env = "INDEXER_BROKER_PASSWORD", default_value = "guest")]
    pub password: String,

    /// Virtual host.
    #[serde(default = "default_broker_vhost")]
    #[arg(long = "index-broker-vhost", env = "INDEXER_BROKER_VHOST", default_value = "/")]
    pub vhost: String,

    /// Queue index events travel on.
    #[serde(default = "default_broker_queue")]
    #[arg(long = "index-broker-queue", env = "INDEXER_BROKER_QUEUE", default_value = DEFAULT_QUEUE)]
    pub queue: String,

    /// Delay between reconnect attempts.
    #[serde(with = "humantime_serde", default = "default_reconnect_delay")]
    #[arg(
        long = "index-broker-reconnect-delay",
        env = "INDEXER_BROKER_RECONNECT_DELAY",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub reconnect_delay: Duration,
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    5672
}

fn default_broker_credential() -> String {
    "guest".to_string()
}

fn default_broker_vhost() -> String {
    "/".to_string()
}

fn default_broker_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(5)
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            username: default_broker_credential(),
            password: default_broker_credential(),
            vhost: default_broker_vhost(),
            queue: default_broker_queue(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

impl BrokerConfig {
    /// AMQP connection URI (password included).
    pub fn uri(&self) -> String {
        let vhost = if self.vhost == "/" {
            "%2f".to_string()
        } else {
            self.vhost.trim_start_matches('/').to_string()
        };
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, vhost
        )
    }
}

/// Reindex job settings.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct ReindexConfig {
    /// Rows per page.
    #[serde(default = "default_page_size")]
    #[arg(long = "index-reindex-page-size", env = "INDEXER_REINDEX_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Hydrating query settings.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct HydrationConfig {
    /// Fail when an indexed id is missing from the primary store; otherwise
    /// return partial results.
    #[serde(default = "default_true")]
    #[arg(
        long = "index-fail-on-missing-objects",
        env = "INDEXER_FAIL_ON_MISSING_OBJECTS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub fail_on_missing_objects: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            fail_on_missing_objects: true,
        }
    }
}

/// Mapping build settings.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct MappingConfig {
    /// Levels of embedding followed before recursion stops.
    #[serde(default = "default_max_embed_depth")]
    #[arg(long = "index-max-embed-depth", env = "INDEXER_MAX_EMBED_DEPTH", default_value_t = DEFAULT_MAX_EMBED_DEPTH)]
    pub max_embed_depth: usize,
}

fn default_max_embed_depth() -> usize {
    DEFAULT_MAX_EMBED_DEPTH
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            max_embed_depth: default_max_embed_depth(),
        }
    }
}

impl MappingConfig {
    /// Build context for the mapping registry.
    pub fn context(&self) -> MappingContext {
        MappingContext {
            max_depth: self.max_embed_depth,
        }
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
