use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span, warn, Instrument};

use super::{ConsumerGroupHandler, MessageDisposition};
use crate::config::ConsumerGroupErrorConfig;
use crate::consumer::Consumer;
use crate::headers;
use crate::message::ConsumerMessage;
use crate::metrics_consts::{DROP_MAX_ERROR_COUNT, DROP_NO_CONSUMER, MESSAGES_DROPPED, MESSAGES_TOO_FRESH};
use crate::processing::process_message;
use crate::state::{ConsumerGroupHandlerState, TopicPartition, TopicStatus};

/// Replays error-topic messages through the consumer registered for each topic.
///
/// Messages younger than the too-fresh threshold are skipped without
/// acknowledgment; messages past the max error count are dropped.
pub struct ErrorTopicHandler {
    config: Arc<ConsumerGroupErrorConfig>,
    consumers: Arc<HashMap<String, Arc<dyn Consumer>>>,
    state: Arc<ConsumerGroupHandlerState>,
}

impl ErrorTopicHandler {
    /// Create a handler with fresh state. `consumers` is keyed by error topic.
    pub fn new(
        config: Arc<ConsumerGroupErrorConfig>,
        consumers: Arc<HashMap<String, Arc<dyn Consumer>>>,
    ) -> Self {
        let state = Arc::new(ConsumerGroupHandlerState::new(&config.group_id, Utc::now()));
        Self {
            config,
            consumers,
            state,
        }
    }

    fn is_too_fresh(&self, message: &ConsumerMessage) -> bool {
        (Utc::now() - message.timestamp)
            .to_std()
            .map_or(true, |age| age < self.config.idle_message_too_fresh)
    }
}

#[async_trait]
impl ConsumerGroupHandler for ErrorTopicHandler {
    fn state(&self) -> &Arc<ConsumerGroupHandlerState> {
        &self.state
    }

    async fn handle_message(
        &self,
        message: &ConsumerMessage,
        cancellation: &CancellationToken,
    ) -> MessageDisposition {
        let tp = TopicPartition::new(&message.topic, message.partition);

        if self.is_too_fresh(message) {
            metrics::counter!(MESSAGES_TOO_FRESH, "topic" => message.topic.clone()).increment(1);
            self.state
                .record_message(&tp, message.offset, TopicStatus::NewMessage, Utc::now());
            return MessageDisposition::Skip;
        }
        self.state
            .record_message(&tp, message.offset, TopicStatus::Started, Utc::now());

        let correlation_id = headers::correlation_id(message);
        let span = info_span!(
            "replay",
            group_id = %self.config.group_id,
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            correlation_id = %correlation_id,
        );

        async {
            let error_count = headers::error_count(message);
            if error_count > i64::from(self.config.max_error_count) {
                metrics::counter!(
                    MESSAGES_DROPPED,
                    "topic" => message.topic.clone(),
                    "reason" => DROP_MAX_ERROR_COUNT
                )
                .increment(1);
                warn!(
                    error_count,
                    max_error_count = self.config.max_error_count,
                    last_error = headers::error_message(message).unwrap_or_default(),
                    "Reached max error count, dropping message"
                );
                return;
            }

            let Some(consumer) = self.consumers.get(&message.topic) else {
                metrics::counter!(MESSAGES_DROPPED, "topic" => message.topic.clone(), "reason" => DROP_NO_CONSUMER)
                    .increment(1);
                warn!("No consumer registered for error topic, dropping message");
                return;
            };

            if let Err(e) = process_message(
                consumer.as_ref(),
                message,
                &correlation_id,
                self.config.max_processing_time,
                cancellation,
            )
            .await
            {
                error!(error = %e, error_count, "Error message replay failed");
            }
        }
        .instrument(span)
        .await;

        MessageDisposition::Ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsumerTuning, ErrorGroupSettings, ErrorPolicySettings};
    use crate::consumer::ConsumeContext;
    use crate::headers::ERROR_COUNT_KEY;
    use chrono::Duration as ChronoDuration;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Consumer for Counting {
        async fn consume(&self, _ctx: &ConsumeContext, _message: &ConsumerMessage) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> Arc<ConsumerGroupErrorConfig> {
        let policy = ErrorPolicySettings {
            group_id: Some("advert-indexer.error".to_string()),
            cron: Some("*/5 * * * *".to_string()),
            max_error_count: Some(2),
            idle_message_too_fresh_ms: Some(60_000),
            ..Default::default()
        };
        let config = ErrorGroupSettings::from_policy(
            "local",
            &policy,
            BTreeSet::from(["advert.error".to_string()]),
        )
        .resolve("local")
        .unwrap();
        assert_eq!(config.tuning, ConsumerTuning::default());
        assert_eq!(config.max_processing_time, Duration::from_secs(1));
        Arc::new(config)
    }

    fn handler(consumer: Arc<Counting>) -> ErrorTopicHandler {
        let consumers: HashMap<String, Arc<dyn Consumer>> =
            HashMap::from([("advert.error".to_string(), consumer as Arc<dyn Consumer>)]);
        ErrorTopicHandler::new(config(), Arc::new(consumers))
    }

    fn old_message(error_count: &str) -> ConsumerMessage {
        ConsumerMessage::builder("advert.error")
            .header(ERROR_COUNT_KEY, error_count)
            .timestamp(Utc::now() - ChronoDuration::minutes(10))
            .build()
    }

    #[tokio::test]
    async fn test_over_max_error_count_is_dropped_without_consuming() {
        let consumer = Arc::new(Counting::default());
        let handler = handler(consumer.clone());

        let disposition = handler
            .handle_message(&old_message("3"), &CancellationToken::new())
            .await;

        assert_eq!(disposition, MessageDisposition::Ack);
        assert_eq!(consumer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_at_max_error_count_is_replayed() {
        let consumer = Arc::new(Counting::default());
        let handler = handler(consumer.clone());

        let disposition = handler
            .handle_message(&old_message("2"), &CancellationToken::new())
            .await;

        assert_eq!(disposition, MessageDisposition::Ack);
        assert_eq!(consumer.calls.load(Ordering::SeqCst), 1);
        let state = handler
            .state()
            .topic_state(&TopicPartition::new("advert.error", 0))
            .unwrap();
        assert_eq!(state.status, TopicStatus::Started);
    }

    #[tokio::test]
    async fn test_fresh_message_is_skipped_without_ack() {
        let consumer = Arc::new(Counting::default());
        let handler = handler(consumer.clone());
        let fresh = ConsumerMessage::builder("advert.error").offset(5).build();

        let disposition = handler.handle_message(&fresh, &CancellationToken::new()).await;

        assert_eq!(disposition, MessageDisposition::Skip);
        assert_eq!(consumer.calls.load(Ordering::SeqCst), 0);
        let state = handler
            .state()
            .topic_state(&TopicPartition::new("advert.error", 0))
            .unwrap();
        assert_eq!(state.status, TopicStatus::NewMessage);
        assert_eq!(state.latest_consumed_offset, Some(5));
    }
}
