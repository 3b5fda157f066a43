use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::consumer::{ConsumeContext, Consumer};
use crate::headers;
use crate::message::{ConsumerMessage, ProducerMessage};
use crate::producer::SyncProducer;

/// Replays an error-topic message to the topic named in its target-topic header.
///
/// Messages without a target topic are ignored.
pub struct DefaultErrorConsumer {
    producer: Arc<dyn SyncProducer>,
}

impl DefaultErrorConsumer {
    pub fn new(producer: Arc<dyn SyncProducer>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl Consumer for DefaultErrorConsumer {
    async fn consume(&self, ctx: &ConsumeContext, message: &ConsumerMessage) -> anyhow::Result<()> {
        let Some(target) = headers::target_topic(message) else {
            debug!(
                topic = %message.topic,
                offset = message.offset,
                correlation_id = %ctx.correlation_id,
                "Error message has no target topic, skipping"
            );
            return Ok(());
        };

        let replay = ProducerMessage::forward(message, target, headers::error_to_retry(message));
        self.producer.send_message(replay).await?;
        Ok(())
    }
}
