//! Error types for the Kafka orchestration layer.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while configuring, connecting to, or publishing on a broker.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Missing or invalid named configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The broker client could not be created or joined to its group.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error reported by the Kafka client library.
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// No synchronous producer exists for the requested cluster.
    #[error("Sync producer not found for cluster: {0}")]
    ProducerNotFound(String),

    /// A publish to a topic failed.
    #[error("Publish error: topic={topic}, cluster={cluster}: {reason}")]
    Publish {
        topic: String,
        cluster: String,
        reason: String,
    },

    /// A message body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A cron schedule could not be parsed.
    #[error("Schedule error: {0}")]
    Schedule(String),
}

impl BrokerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a publish error.
    pub fn publish(
        topic: impl Into<String>,
        cluster: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Publish {
            topic: topic.into(),
            cluster: cluster.into(),
            reason: reason.into(),
        }
    }

    /// Create a schedule error.
    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for BrokerError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::Kafka(err.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure of a single message processing attempt.
///
/// Drives escalation; never fatal to the processing loop.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The consumer reported a failure.
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// The consumer did not finish within the processing deadline.
    #[error("processing deadline of {0:?} exceeded")]
    Timeout(Duration),
}

impl ProcessingError {
    /// Whether the failure was a deadline exceedance.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
