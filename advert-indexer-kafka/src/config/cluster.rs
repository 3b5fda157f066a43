use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{millis_or, non_empty, required, ConsumerTuningSettings, NamedConfigs};
use crate::errors::BrokerError;

/// Producer acknowledgment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAcks {
    NoResponse,
    #[default]
    WaitForLocal,
    WaitForAll,
}

impl RequiredAcks {
    /// Value for the `acks` client setting.
    pub fn as_acks(&self) -> &'static str {
        match self {
            Self::NoResponse => "0",
            Self::WaitForLocal => "1",
            Self::WaitForAll => "all",
        }
    }
}

/// Producer compression codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    /// Value for the `compression.type` client setting.
    pub fn as_codec(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Snappy => "snappy",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    pub required_acks: Option<RequiredAcks>,
    pub timeout_ms: Option<u64>,
    pub max_message_bytes: Option<usize>,
    pub compression: Option<Compression>,
}

/// Resolved producer settings of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerDefaults {
    pub required_acks: RequiredAcks,
    pub timeout: Duration,
    pub max_message_bytes: usize,
    pub compression: Compression,
}

impl Default for ProducerDefaults {
    fn default() -> Self {
        Self {
            required_acks: RequiredAcks::WaitForLocal,
            timeout: Duration::from_secs(10),
            max_message_bytes: 1_000_000,
            compression: Compression::None,
        }
    }
}

impl ProducerSettings {
    fn resolve(&self) -> ProducerDefaults {
        let defaults = ProducerDefaults::default();
        ProducerDefaults {
            required_acks: self.required_acks.unwrap_or(defaults.required_acks),
            timeout: millis_or(self.timeout_ms, defaults.timeout),
            max_message_bytes: self
                .max_message_bytes
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_message_bytes),
            compression: self.compression.unwrap_or(defaults.compression),
        }
    }
}

/// Error-topic policy of a cluster, shared by every consumer group on it.
///
/// Validated when the cluster's error consumer group is assembled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorPolicySettings {
    pub group_id: Option<String>,
    pub cron: Option<String>,
    pub max_error_count: Option<u32>,
    pub max_processing_time_ms: Option<u64>,
    pub idle_no_message_ms: Option<u64>,
    pub idle_message_too_fresh_ms: Option<u64>,
    #[serde(flatten)]
    pub tuning: ConsumerTuningSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Comma-separated broker addresses.
    pub brokers: Option<String>,
    pub version: Option<String>,
    pub client_id: Option<String>,
    pub producer: Option<ProducerSettings>,
    pub error: Option<ErrorPolicySettings>,
}

/// A validated cluster config.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Lower-cased config name, used to key producers.
    pub name: String,
    pub brokers: Vec<String>,
    pub version: String,
    pub client_id: Option<String>,
    pub producer: ProducerDefaults,
    pub error: Option<ErrorPolicySettings>,
}

impl ClusterConfig {
    /// Brokers joined for `bootstrap.servers`.
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

impl NamedConfigs<ClusterSettings> {
    /// Resolve a cluster config, applying producer defaults.
    pub fn config_with_default(&self, name: &str) -> Result<ClusterConfig, BrokerError> {
        let settings = self
            .get(name)
            .ok_or_else(|| BrokerError::config(format!("cluster config not found: {name}")))?;

        let brokers: Vec<String> = required(&settings.brokers, "brokers", "cluster", name)?
            .split(',')
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if brokers.is_empty() {
            return Err(BrokerError::config(format!("brokers required, cluster: {name}")));
        }
        let version = required(&settings.version, "version", "cluster", name)?.to_string();

        Ok(ClusterConfig {
            name: name.to_lowercase(),
            brokers,
            version,
            client_id: non_empty(&settings.client_id).map(str::to_string),
            producer: settings
                .producer
                .as_ref()
                .map(ProducerSettings::resolve)
                .unwrap_or_default(),
            error: settings.error.clone(),
        })
    }
}
