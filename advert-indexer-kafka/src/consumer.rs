//! The consumer capability supplied by the domain layer.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::message::ConsumerMessage;

/// Per-invocation context handed to a [`Consumer`].
///
/// `cancellation` fires when the processing deadline is exceeded or the
/// owning session is torn down; long-running consumers should observe it.
#[derive(Debug, Clone)]
pub struct ConsumeContext {
    pub correlation_id: String,
    pub cancellation: CancellationToken,
}

impl ConsumeContext {
    pub fn new(correlation_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            cancellation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Processes a single consumed message.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(&self, ctx: &ConsumeContext, message: &ConsumerMessage) -> anyhow::Result<()>;
}

/// The consumers registered for one consumer group config.
#[derive(Clone)]
pub struct ConsumerGroupConsumers {
    /// Name of the consumer group config.
    pub config_name: String,
    /// Processes main- and retry-topic messages.
    pub consumer: Arc<dyn Consumer>,
    /// Replays error-topic messages. The default error consumer is used when absent.
    pub error_consumer: Option<Arc<dyn Consumer>>,
}

impl ConsumerGroupConsumers {
    pub fn new(config_name: impl Into<String>, consumer: Arc<dyn Consumer>) -> Self {
        Self {
            config_name: config_name.into(),
            consumer,
            error_consumer: None,
        }
    }

    pub fn with_error_consumer(mut self, error_consumer: Arc<dyn Consumer>) -> Self {
        self.error_consumer = Some(error_consumer);
        self
    }
}

impl std::fmt::Debug for ConsumerGroupConsumers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerGroupConsumers")
            .field("config_name", &self.config_name)
            .field("has_error_consumer", &self.error_consumer.is_some())
            .finish()
    }
}
