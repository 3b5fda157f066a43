use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};

use super::{ConsumerGroupHandler, MessageDisposition};
use crate::config::ConsumerGroupConfig;
use crate::consumer::Consumer;
use crate::headers;
use crate::message::ConsumerMessage;
use crate::processing::{escalate, plan_escalation, process_message};
use crate::producer::SyncProducer;
use crate::state::{ConsumerGroupHandlerState, TopicPartition, TopicStatus};

/// Handles main- and retry-topic messages of one consumer group.
///
/// Failed messages are escalated main → retry → error and always acknowledged.
pub struct MainTopicHandler {
    config: Arc<ConsumerGroupConfig>,
    consumer: Arc<dyn Consumer>,
    producer: Arc<dyn SyncProducer>,
    state: Arc<ConsumerGroupHandlerState>,
}

impl MainTopicHandler {
    pub fn new(
        config: Arc<ConsumerGroupConfig>,
        consumer: Arc<dyn Consumer>,
        producer: Arc<dyn SyncProducer>,
    ) -> Self {
        let state = Arc::new(ConsumerGroupHandlerState::new(&config.group_id, Utc::now()));
        Self {
            config,
            consumer,
            producer,
            state,
        }
    }
}

#[async_trait]
impl ConsumerGroupHandler for MainTopicHandler {
    fn state(&self) -> &Arc<ConsumerGroupHandlerState> {
        &self.state
    }

    async fn handle_message(
        &self,
        message: &ConsumerMessage,
        cancellation: &CancellationToken,
    ) -> MessageDisposition {
        let tp = TopicPartition::new(&message.topic, message.partition);
        self.state
            .record_message(&tp, message.offset, TopicStatus::Started, Utc::now());

        let correlation_id = headers::correlation_id(message);
        let span = info_span!(
            "consume",
            group_id = %self.config.group_id,
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            correlation_id = %correlation_id,
        );

        async {
            if let Err(e) = process_message(
                self.consumer.as_ref(),
                message,
                &correlation_id,
                self.config.max_processing_time,
                cancellation,
            )
            .await
            {
                warn!(error = %e, timeout = e.is_timeout(), "Message processing failed");
                let escalation = plan_escalation(message, &e.to_string(), &self.config);
                escalate(self.producer.as_ref(), message, escalation).await;
            }
        }
        .instrument(span)
        .await;

        MessageDisposition::Ack
    }
}
