//! Bounded message processing and failure escalation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::ConsumerGroupConfig;
use crate::consumer::{ConsumeContext, Consumer};
use crate::errors::ProcessingError;
use crate::headers::{self, Headers};
use crate::message::{ConsumerMessage, ProducerMessage};
use crate::metrics_consts::{
    DROP_NO_TARGET, DROP_RETRIES_EXHAUSTED, DROP_UNHANDLED_TOPIC, ESCALATION_PUBLISH_FAILED,
    MESSAGES_CONSUMED, MESSAGES_DROPPED, MESSAGES_ESCALATED, MESSAGE_PROCESSING_DURATION,
};
use crate::producer::SyncProducer;

/// Run `consumer` on `message` under a deadline.
///
/// The consume future is driven inline and dropped when the deadline fires,
/// and the context's cancellation token is cancelled so any work the consumer
/// spawned can stop too. `parent` cancellation is visible to the consumer
/// through the same token but does not abort the attempt.
pub async fn process_message(
    consumer: &dyn Consumer,
    message: &ConsumerMessage,
    correlation_id: &str,
    max_processing_time: Duration,
    parent: &CancellationToken,
) -> Result<(), ProcessingError> {
    let cancellation = parent.child_token();
    let ctx = ConsumeContext::new(correlation_id, cancellation.clone());

    let started = Instant::now();
    let result = tokio::select! {
        result = consumer.consume(&ctx, message) => result.map_err(ProcessingError::Failed),
        _ = tokio::time::sleep(max_processing_time) => Err(ProcessingError::Timeout(max_processing_time)),
    };
    cancellation.cancel();

    let status = match &result {
        Ok(()) => "success",
        Err(ProcessingError::Timeout(_)) => "timeout",
        Err(ProcessingError::Failed(_)) => "failure",
    };
    metrics::counter!(MESSAGES_CONSUMED, "topic" => message.topic.clone(), "status" => status).increment(1);
    metrics::histogram!(MESSAGE_PROCESSING_DURATION, "topic" => message.topic.clone())
        .record(started.elapsed().as_secs_f64());
    result
}

/// What to do with a message whose processing failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Escalation {
    /// Acknowledge without publishing anywhere. `kind` is a short metric label.
    Drop { kind: &'static str, reason: String },
    /// Publish the message to `topic` with `headers`, then acknowledge.
    Publish { topic: String, headers: Headers },
}

/// Decide where a failed main- or retry-topic message goes next.
pub fn plan_escalation(
    message: &ConsumerMessage,
    error_message: &str,
    config: &ConsumerGroupConfig,
) -> Escalation {
    if config.is_main_topic(&message.topic) {
        return match (&config.retry, &config.error) {
            (None, None) => Escalation::Drop {
                kind: DROP_NO_TARGET,
                reason: "no retry or error topic configured".to_string(),
            },
            (None, Some(error_topic)) => Escalation::Publish {
                topic: error_topic.clone(),
                headers: headers::for_error(message, error_message),
            },
            (Some(retry_topic), _) => Escalation::Publish {
                topic: retry_topic.clone(),
                headers: headers::for_retry(message, error_message),
            },
        };
    }

    if config.is_retry_topic(&message.topic) {
        let retried_count = headers::retried_count(message);
        if retried_count >= i64::from(config.retry_count) {
            let exhausted = format!(
                "{error_message}\nreached max retry count, retriedCount: {retried_count}"
            );
            return match &config.error {
                None => Escalation::Drop {
                    kind: DROP_RETRIES_EXHAUSTED,
                    reason: exhausted,
                },
                Some(error_topic) => Escalation::Publish {
                    topic: error_topic.clone(),
                    headers: headers::retry_to_error(message, &exhausted),
                },
            };
        }
        if let Some(retry_topic) = &config.retry {
            return Escalation::Publish {
                topic: retry_topic.clone(),
                headers: headers::retry_to_retry(message, error_message, retried_count),
            };
        }
    }

    Escalation::Drop {
        kind: DROP_UNHANDLED_TOPIC,
        reason: format!("topic {} is not handled by this consumer group", message.topic),
    }
}

/// Carry out an escalation. Publish failures are logged and never propagated.
pub async fn escalate(producer: &dyn SyncProducer, message: &ConsumerMessage, escalation: Escalation) {
    match escalation {
        Escalation::Drop { kind, reason } => {
            metrics::counter!(MESSAGES_DROPPED, "topic" => message.topic.clone(), "reason" => kind).increment(1);
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                group_id = %message.group_id,
                reason = %reason,
                "Dropping failed message"
            );
        }
        Escalation::Publish { topic, headers } => {
            let outgoing = ProducerMessage::forward(message, topic.as_str(), headers);
            match producer.send_message(outgoing).await {
                Ok(()) => {
                    metrics::counter!(MESSAGES_ESCALATED, "source" => message.topic.clone(), "target" => topic.clone())
                        .increment(1);
                    debug!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        target = %topic,
                        "Escalated failed message"
                    );
                }
                Err(e) => {
                    metrics::counter!(
                        ESCALATION_PUBLISH_FAILED,
                        "source" => message.topic.clone(),
                        "target" => topic.clone()
                    )
                    .increment(1);
                    error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        group_id = %message.group_id,
                        target = %topic,
                        error = %e,
                        "Failed to escalate message"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsumerTuning;
    use crate::headers::{
        ERROR_COUNT_KEY, ERROR_MESSAGE_KEY, RETRY_COUNT_KEY, TARGET_TOPIC_KEY,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn config(retry: Option<&str>, error: Option<&str>, retry_count: u32) -> ConsumerGroupConfig {
        ConsumerGroupConfig {
            config_name: "advertupdated".to_string(),
            group_id: "advert-indexer.advert".to_string(),
            name: "advert.updated".to_string(),
            retry: retry.map(str::to_string),
            error: error.map(str::to_string),
            retry_count,
            cluster: "local".to_string(),
            max_processing_time: Duration::from_secs(1),
            disable_error_consumer: false,
            tuning: ConsumerTuning::default(),
        }
    }

    fn published(escalation: Escalation) -> (String, Headers) {
        match escalation {
            Escalation::Publish { topic, headers } => (topic, headers),
            other => panic!("expected publish, got {other:?}"),
        }
    }

    #[test]
    fn test_main_topic_without_retry_or_error_is_dropped() {
        let msg = ConsumerMessage::builder("advert.updated").build();
        assert!(matches!(
            plan_escalation(&msg, "boom", &config(None, None, 0)),
            Escalation::Drop { .. }
        ));
    }

    #[test]
    fn test_main_topic_without_retry_goes_to_error() {
        let msg = ConsumerMessage::builder("advert.updated").build();
        let (topic, headers) =
            published(plan_escalation(&msg, "boom", &config(None, Some("advert.error"), 0)));

        assert_eq!(topic, "advert.error");
        assert_eq!(headers.get_str(ERROR_COUNT_KEY), Some("0"));
        assert_eq!(headers.get_str(ERROR_MESSAGE_KEY), Some("boom"));
    }

    #[test]
    fn test_retry_chain_with_limit_two() {
        let cfg = config(Some("advert.retry"), Some("advert.error"), 2);

        let main = ConsumerMessage::builder("advert.updated").build();
        let (topic, headers) = published(plan_escalation(&main, "boom", &cfg));
        assert_eq!(topic, "advert.retry");
        assert_eq!(headers.get_str(RETRY_COUNT_KEY), Some("0"));

        let first_retry = ConsumerMessage::builder("advert.retry").headers(headers).build();
        let (topic, headers) = published(plan_escalation(&first_retry, "boom", &cfg));
        assert_eq!(topic, "advert.retry");
        assert_eq!(headers.get_str(RETRY_COUNT_KEY), Some("1"));

        let second_retry = ConsumerMessage::builder("advert.retry").headers(headers).build();
        let (topic, headers) = published(plan_escalation(&second_retry, "boom", &cfg));
        assert_eq!(topic, "advert.error");
        assert_eq!(headers.get_str(ERROR_COUNT_KEY), Some("1"));
        assert_eq!(headers.get_str(TARGET_TOPIC_KEY), Some("advert.retry"));
        assert!(!headers.contains(RETRY_COUNT_KEY));
        assert_eq!(
            headers.get_str(ERROR_MESSAGE_KEY),
            Some("boom\nreached max retry count, retriedCount: 2")
        );
    }

    #[test]
    fn test_exhausted_retry_without_error_topic_is_dropped() {
        let msg = ConsumerMessage::builder("advert.retry")
            .header(RETRY_COUNT_KEY, "0")
            .build();
        assert!(matches!(
            plan_escalation(&msg, "boom", &config(Some("advert.retry"), None, 1)),
            Escalation::Drop { .. }
        ));
    }

    struct Slow {
        observed_cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Consumer for Slow {
        async fn consume(&self, ctx: &ConsumeContext, _message: &ConsumerMessage) -> anyhow::Result<()> {
            let token = ctx.cancellation.clone();
            let flag = self.observed_cancel.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                flag.store(true, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Consumer for Failing {
        async fn consume(&self, _ctx: &ConsumeContext, _message: &ConsumerMessage) -> anyhow::Result<()> {
            anyhow::bail!("upstream returned 503")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded_cancels_consumer() {
        let observed_cancel = Arc::new(AtomicBool::new(false));
        let consumer = Slow {
            observed_cancel: observed_cancel.clone(),
        };
        let msg = ConsumerMessage::builder("advert.updated").build();

        let err = process_message(
            &consumer,
            &msg,
            "corr",
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(observed_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_consumer_failure_is_reported() {
        let msg = ConsumerMessage::builder("advert.updated").build();
        let err = process_message(&Failing, &msg, "corr", Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "upstream returned 503");
    }
}
