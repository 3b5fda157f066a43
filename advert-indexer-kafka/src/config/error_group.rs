use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use super::{
    millis_or, required, ConsumerTuning, ConsumerTuningSettings, ErrorPolicySettings, NamedConfigs,
};
use crate::errors::BrokerError;
use crate::group::schedule;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorGroupSettings {
    pub group_id: Option<String>,
    pub topics: Vec<String>,
    pub cron: Option<String>,
    pub max_error_count: Option<u32>,
    pub cluster: Option<String>,
    pub max_processing_time_ms: Option<u64>,
    /// Unsubscribe once a partition has seen no message for this long.
    pub idle_no_message_ms: Option<u64>,
    /// Unsubscribe once the latest message of a partition is younger than this.
    pub idle_message_too_fresh_ms: Option<u64>,
    #[serde(flatten)]
    pub tuning: ConsumerTuningSettings,
}

impl ErrorGroupSettings {
    /// Error group settings for a cluster's error policy over the given topics.
    pub fn from_policy(cluster: &str, policy: &ErrorPolicySettings, topics: BTreeSet<String>) -> Self {
        Self {
            group_id: policy.group_id.clone(),
            topics: topics.into_iter().collect(),
            cron: policy.cron.clone(),
            max_error_count: policy.max_error_count,
            cluster: Some(cluster.to_string()),
            max_processing_time_ms: policy.max_processing_time_ms,
            idle_no_message_ms: policy.idle_no_message_ms,
            idle_message_too_fresh_ms: policy.idle_message_too_fresh_ms,
            tuning: policy.tuning.clone(),
        }
    }

    /// Validate and fill in defaults. `name` is only used in error messages.
    pub fn resolve(&self, name: &str) -> Result<ConsumerGroupErrorConfig, BrokerError> {
        let kind = "error consumer config";
        let group_id = required(&self.group_id, "group id", kind, name)?;
        let topics: BTreeSet<String> = self
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if topics.is_empty() {
            return Err(BrokerError::config(format!("topics required, {kind}: {name}")));
        }
        let cron = required(&self.cron, "cron", kind, name)?;
        let schedule = schedule::parse(cron)
            .map_err(|e| BrokerError::config(format!("{e}, {kind}: {name}")))?;
        let max_error_count = self
            .max_error_count
            .filter(|v| *v > 0)
            .ok_or_else(|| BrokerError::config(format!("max error count required, {kind}: {name}")))?;
        let cluster = required(&self.cluster, "cluster", kind, name)?;

        Ok(ConsumerGroupErrorConfig {
            group_id: group_id.to_string(),
            topics,
            cron: cron.to_string(),
            schedule,
            max_error_count,
            cluster: cluster.to_string(),
            max_processing_time: millis_or(self.max_processing_time_ms, Duration::from_secs(1)),
            idle_no_message: millis_or(self.idle_no_message_ms, Duration::from_secs(60)),
            idle_message_too_fresh: millis_or(self.idle_message_too_fresh_ms, Duration::from_secs(60)),
            tuning: self.tuning.resolve(),
        })
    }
}

/// A validated error consumer group config.
#[derive(Debug, Clone)]
pub struct ConsumerGroupErrorConfig {
    pub group_id: String,
    pub topics: BTreeSet<String>,
    pub cron: String,
    pub schedule: cron::Schedule,
    pub max_error_count: u32,
    pub cluster: String,
    pub max_processing_time: Duration,
    pub idle_no_message: Duration,
    pub idle_message_too_fresh: Duration,
    pub tuning: ConsumerTuning,
}

impl NamedConfigs<ErrorGroupSettings> {
    /// Resolve a named error consumer group config, applying defaults.
    pub fn config_with_default(&self, name: &str) -> Result<ConsumerGroupErrorConfig, BrokerError> {
        self.get(name)
            .ok_or_else(|| BrokerError::config(format!("error consumer config not found: {name}")))?
            .resolve(name)
    }
}
