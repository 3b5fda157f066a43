//! Service settings loaded from YAML with environment overrides.

use std::env;
use std::time::Duration;

use advert_indexer_kafka::KafkaSettings;
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::errors::IndexerError;

/// Default settings file.
pub const DEFAULT_CONFIG_PATH: &str = "configs/kafka.yaml";

/// Environment variable overriding the settings file path.
pub const CONFIG_PATH_ENV: &str = "ADVERT_INDEXER_CONFIG";

/// Prefix of environment variables overriding file keys, e.g.
/// `ADVERT_INDEXER__OPENSEARCH__URL`.
const ENV_PREFIX: &str = "ADVERT_INDEXER";

/// All settings of the service.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// `clusters`, `consumer_groups`, `error_groups` and `producer_topics`.
    #[serde(flatten)]
    pub kafka: KafkaSettings,
    #[serde(default)]
    pub advert_api: AdvertApiSettings,
    #[serde(default)]
    pub opensearch: OpenSearchSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from the configured file and the environment.
    pub fn load() -> Result<Self, IndexerError> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&path)
    }

    pub fn from_file(path: &str) -> Result<Self, IndexerError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Parse settings from YAML text, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self, IndexerError> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

/// Upstream advert API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvertApiSettings {
    pub url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub max_idle_connections: usize,
    pub idle_timeout_ms: u64,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AdvertApiSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            user_agent: "advert-indexer".to_string(),
            timeout_ms: 5_000,
            max_idle_connections: 32,
            idle_timeout_ms: 90_000,
            max_attempts: 5,
            retry_backoff_ms: 200,
        }
    }
}

impl AdvertApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Connection mode for OpenSearch at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Fail immediately if the indices cannot be prepared.
    FailFast,
    /// Retry until the indices are ready.
    #[default]
    Retry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenSearchSettings {
    pub url: String,
    pub adverts_index: String,
    pub categories_index: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval_ms: u64,
}

impl Default for OpenSearchSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            adverts_index: advert_indexer_repository::opensearch::ADVERT_INDEX.to_string(),
            categories_index: advert_indexer_repository::opensearch::CATEGORY_INDEX.to_string(),
            connection_mode: ConnectionMode::Retry,
            retry_interval_ms: 15_000,
        }
    }
}

impl OpenSearchSettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Operational HTTP endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// In-memory category cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub category_ttl_ms: u64,
    pub max_categories: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            category_ttl_ms: 72 * 60 * 60 * 1000,
            max_categories: 10_000,
        }
    }
}

impl CacheSettings {
    pub fn category_ttl(&self) -> Duration {
        Duration::from_millis(self.category_ttl_ms)
    }
}
