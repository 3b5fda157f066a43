use serde::Deserialize;

use super::NamedConfigs;
use crate::errors::BrokerError;

/// Destination of a produced message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProducerTopic {
    pub name: String,
    pub cluster: String,
}

impl ProducerTopic {
    pub fn new(name: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
        }
    }
}

impl NamedConfigs<ProducerTopic> {
    /// Look up a producer topic; both topic name and cluster are required.
    pub fn config(&self, name: &str) -> Result<&ProducerTopic, BrokerError> {
        let topic = self
            .get(name)
            .ok_or_else(|| BrokerError::config(format!("producer topic config not found: {name}")))?;
        if topic.name.trim().is_empty() {
            return Err(BrokerError::config(format!(
                "producer topic name required, config: {name}"
            )));
        }
        if topic.cluster.trim().is_empty() {
            return Err(BrokerError::config(format!(
                "producer topic cluster required, config: {name}"
            )));
        }
        Ok(topic)
    }
}
