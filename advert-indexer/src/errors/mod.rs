//! Error types for the advert indexer.

use advert_indexer_kafka::BrokerError;
use advert_indexer_repository::RepositoryError;
use thiserror::Error;

use crate::client::ClientError;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Kafka error.
    #[error("Kafka error: {0}")]
    KafkaError(#[from] BrokerError),

    /// Repository error.
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),

    /// Advert API client error.
    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),

    /// HTTP server error.
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IndexerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an HTTP server error.
    pub fn server(msg: impl Into<String>) -> Self {
        Self::ServerError(msg.into())
    }
}

impl From<::config::ConfigError> for IndexerError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
