use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use super::{millis_or, non_empty, required, ConsumerTuning, ConsumerTuningSettings, NamedConfigs};
use crate::errors::BrokerError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsumerGroupSettings {
    pub group_id: Option<String>,
    /// Main topic.
    pub name: Option<String>,
    pub retry: Option<String>,
    pub error: Option<String>,
    pub retry_count: Option<u32>,
    pub cluster: Option<String>,
    pub max_processing_time_ms: Option<u64>,
    /// Keep the error topic for escalation but stay out of the cluster's error consumer group.
    pub disable_error_consumer: bool,
    #[serde(flatten)]
    pub tuning: ConsumerTuningSettings,
}

/// A validated main-topic consumer group config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupConfig {
    pub config_name: String,
    pub group_id: String,
    pub name: String,
    pub retry: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub cluster: String,
    pub max_processing_time: Duration,
    pub disable_error_consumer: bool,
    pub tuning: ConsumerTuning,
}

impl ConsumerGroupConfig {
    /// Topics the group joins: the main topic plus the retry topic when set.
    pub fn topics(&self) -> BTreeSet<String> {
        let mut topics = BTreeSet::from([self.name.clone()]);
        if let Some(retry) = &self.retry {
            topics.insert(retry.clone());
        }
        topics
    }

    pub fn is_main_topic(&self, topic: &str) -> bool {
        self.name == topic
    }

    pub fn is_retry_topic(&self, topic: &str) -> bool {
        self.retry.as_deref() == Some(topic)
    }

    /// Whether this group contributes its error topic to the cluster's error consumer group.
    pub fn is_error_consumer_enabled(&self) -> bool {
        !self.disable_error_consumer && self.error.is_some()
    }
}

impl NamedConfigs<ConsumerGroupSettings> {
    /// Resolve a consumer group config, applying defaults.
    pub fn config_with_default(&self, name: &str) -> Result<ConsumerGroupConfig, BrokerError> {
        let settings = self
            .get(name)
            .ok_or_else(|| BrokerError::config(format!("consumer group config not found: {name}")))?;

        let group_id = required(&settings.group_id, "group id", "consumer group config", name)?;
        let topic = required(&settings.name, "topic name", "consumer group config", name)?;
        let cluster = required(&settings.cluster, "cluster", "consumer group config", name)?;
        let retry = non_empty(&settings.retry).map(str::to_string);
        let retry_count = settings.retry_count.unwrap_or(0);

        if retry_count > 0 && retry.is_none() {
            return Err(BrokerError::config(format!(
                "retry topic name required when retry_count is set, consumer group config: {name}"
            )));
        }
        let retry_count = if retry.is_some() && retry_count == 0 {
            1
        } else {
            retry_count
        };

        Ok(ConsumerGroupConfig {
            config_name: name.to_lowercase(),
            group_id: group_id.to_string(),
            name: topic.to_string(),
            retry,
            error: non_empty(&settings.error).map(str::to_string),
            retry_count,
            cluster: cluster.to_string(),
            max_processing_time: millis_or(settings.max_processing_time_ms, Duration::from_secs(60)),
            disable_error_consumer: settings.disable_error_consumer,
            tuning: settings.tuning.resolve(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OffsetInitial, DEFAULT_FETCH_MAX_BYTES};

    fn settings() -> ConsumerGroupSettings {
        ConsumerGroupSettings {
            group_id: Some("advert-indexer.advert".to_string()),
            name: Some("advert.updated".to_string()),
            cluster: Some("local".to_string()),
            ..Default::default()
        }
    }

    fn resolve(settings: ConsumerGroupSettings) -> Result<ConsumerGroupConfig, BrokerError> {
        let configs: NamedConfigs<_> = [("advertUpdated", settings)].into_iter().collect();
        configs.config_with_default("advertUpdated")
    }

    #[test]
    fn test_defaults() {
        let config = resolve(settings()).unwrap();

        assert_eq!(config.config_name, "advertupdated");
        assert_eq!(config.retry_count, 0);
        assert_eq!(config.max_processing_time, Duration::from_secs(60));
        assert_eq!(config.tuning.fetch_max_bytes, DEFAULT_FETCH_MAX_BYTES);
        assert_eq!(config.tuning.offset_initial, OffsetInitial::Newest);
        assert_eq!(config.tuning.session_timeout, Duration::from_secs(10));
        assert_eq!(config.tuning.rebalance_timeout, Duration::from_secs(60));
        assert_eq!(config.tuning.heartbeat_interval, Duration::from_secs(3));
        assert_eq!(config.topics(), BTreeSet::from(["advert.updated".to_string()]));
    }

    #[test]
    fn test_retry_topic_without_count_defaults_to_one() {
        let mut s = settings();
        s.retry = Some("advert.retry".to_string());

        let config = resolve(s).unwrap();
        assert_eq!(config.retry_count, 1);
        assert!(config.is_retry_topic("advert.retry"));
        assert!(config.is_main_topic("advert.updated"));
        assert_eq!(config.topics().len(), 2);
    }

    #[test]
    fn test_retry_count_without_retry_topic_is_config_error() {
        let mut s = settings();
        s.retry_count = Some(3);

        assert!(matches!(resolve(s), Err(BrokerError::Config(_))));
    }

    #[test]
    fn test_group_id_and_topic_are_required() {
        let mut no_group = settings();
        no_group.group_id = None;
        assert!(matches!(resolve(no_group), Err(BrokerError::Config(_))));

        let mut no_topic = settings();
        no_topic.name = Some(String::new());
        assert!(matches!(resolve(no_topic), Err(BrokerError::Config(_))));
    }

    #[test]
    fn test_error_consumer_enabled() {
        let mut s = settings();
        s.error = Some("advert.error".to_string());
        assert!(resolve(s.clone()).unwrap().is_error_consumer_enabled());

        s.disable_error_consumer = true;
        assert!(!resolve(s).unwrap().is_error_consumer_enabled());

        assert!(!resolve(settings()).unwrap().is_error_consumer_enabled());
    }
}
