//! Named Kafka configuration.
//!
//! Settings are deserialized once at startup into raw `*Settings` structs and
//! resolved on lookup into validated configs with defaults filled in. Lookups
//! are case-insensitive.

mod client;
mod cluster;
mod consumer_group;
mod error_group;
mod producer_topic;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::BrokerError;

pub use client::{consumer_client_config, producer_client_config, SaslCredentials};
pub use cluster::{
    ClusterConfig, ClusterSettings, Compression, ErrorPolicySettings, ProducerDefaults,
    ProducerSettings, RequiredAcks,
};
pub use consumer_group::{ConsumerGroupConfig, ConsumerGroupSettings};
pub use error_group::{ConsumerGroupErrorConfig, ErrorGroupSettings};
pub use producer_topic::ProducerTopic;

/// 1 MiB, the default fetch size for consumer groups.
pub const DEFAULT_FETCH_MAX_BYTES: usize = 1024 * 1024;

/// All Kafka settings of the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KafkaSettings {
    pub clusters: NamedConfigs<ClusterSettings>,
    pub consumer_groups: NamedConfigs<ConsumerGroupSettings>,
    pub error_groups: NamedConfigs<ErrorGroupSettings>,
    pub producer_topics: NamedConfigs<ProducerTopic>,
}

/// A map of named configs with lower-cased keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "HashMap<String, T>")]
pub struct NamedConfigs<T>(HashMap<String, T>);

impl<T> Default for NamedConfigs<T> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<T> From<HashMap<String, T>> for NamedConfigs<T> {
    fn from(map: HashMap<String, T>) -> Self {
        map.into_iter().collect()
    }
}

impl<T, K: AsRef<str>> FromIterator<(K, T)> for NamedConfigs<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v))
                .collect(),
        )
    }
}

impl<T> NamedConfigs<T> {
    /// Look up a config by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.0.get(&name.to_lowercase())
    }

    pub fn insert(&mut self, name: &str, value: T) {
        self.0.insert(name.to_lowercase(), value);
    }

    /// Iterate over `(lower-cased name, config)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        let mut entries: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where a consumer group starts when it has no committed offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetInitial {
    #[default]
    Newest,
    Oldest,
}

impl OffsetInitial {
    /// Value for `auto.offset.reset`.
    pub fn as_reset_policy(&self) -> &'static str {
        match self {
            Self::Newest => "latest",
            Self::Oldest => "earliest",
        }
    }
}

/// Group membership and fetch settings shared by main and error consumer groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerTuning {
    pub fetch_max_bytes: usize,
    pub offset_initial: OffsetInitial,
    pub session_timeout: Duration,
    pub rebalance_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ConsumerTuning {
    fn default() -> Self {
        Self {
            fetch_max_bytes: DEFAULT_FETCH_MAX_BYTES,
            offset_initial: OffsetInitial::Newest,
            session_timeout: Duration::from_secs(10),
            rebalance_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(3),
        }
    }
}

/// Raw, optional consumer tuning fields as they appear in config files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsumerTuningSettings {
    pub fetch_max_bytes: Option<usize>,
    pub offset_initial: Option<OffsetInitial>,
    pub session_timeout_ms: Option<u64>,
    pub rebalance_timeout_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
}

impl ConsumerTuningSettings {
    /// Fill unset (or zero) fields with defaults.
    pub fn resolve(&self) -> ConsumerTuning {
        let defaults = ConsumerTuning::default();
        ConsumerTuning {
            fetch_max_bytes: self
                .fetch_max_bytes
                .filter(|v| *v > 0)
                .unwrap_or(defaults.fetch_max_bytes),
            offset_initial: self.offset_initial.unwrap_or(defaults.offset_initial),
            session_timeout: millis_or(self.session_timeout_ms, defaults.session_timeout),
            rebalance_timeout: millis_or(self.rebalance_timeout_ms, defaults.rebalance_timeout),
            heartbeat_interval: millis_or(self.heartbeat_interval_ms, defaults.heartbeat_interval),
        }
    }
}

/// A millisecond setting as a duration; unset and zero both mean `default`.
pub(crate) fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value
        .filter(|v| *v > 0)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Treat empty strings as unset.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn required<'a>(
    value: &'a Option<String>,
    what: &str,
    kind: &str,
    name: &str,
) -> Result<&'a str, BrokerError> {
    non_empty(value).ok_or_else(|| BrokerError::config(format!("{what} required, {kind}: {name}")))
}
