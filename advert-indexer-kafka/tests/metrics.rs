//! Counters recorded while messages are processed, escalated and dropped.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tokio_util::sync::CancellationToken;

use advert_indexer_kafka::config::{ConsumerGroupConfig, ConsumerTuning};
use advert_indexer_kafka::handler::{ConsumerGroupHandler, ErrorTopicHandler, MainTopicHandler, MessageDisposition};
use advert_indexer_kafka::headers::{ERROR_COUNT_KEY, TARGET_TOPIC_KEY};
use advert_indexer_kafka::metrics_consts::{
    DROP_MAX_ERROR_COUNT, DROP_NO_TARGET, MESSAGES_CONSUMED, MESSAGES_DROPPED, MESSAGES_ESCALATED,
    MESSAGES_TOO_FRESH,
};
use advert_indexer_kafka::{Consumer, ConsumerMessage};

use common::{error_config, CountingConsumer, FailingConsumer, MockSyncProducer};

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        drop(recorder.install());
        snapshotter
    })
}

fn counters(snapshotter: &Snapshotter) -> Vec<(String, Vec<(String, String)>, u64)> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((
                key.key().name().to_string(),
                key.key()
                    .labels()
                    .map(|l| (l.key().to_string(), l.value().to_string()))
                    .collect(),
                count,
            )),
            _ => None,
        })
        .collect()
}

fn count(all: &[(String, Vec<(String, String)>, u64)], name: &str, labels: &[(&str, &str)]) -> u64 {
    all.iter()
        .filter(|(n, l, _)| {
            n == name
                && labels
                    .iter()
                    .all(|(k, v)| l.iter().any(|(lk, lv)| lk == k && lv == v))
        })
        .map(|(_, _, c)| c)
        .sum()
}

fn group_config(name: &str, retry: Option<&str>, error: Option<&str>) -> Arc<ConsumerGroupConfig> {
    Arc::new(ConsumerGroupConfig {
        config_name: "metrics".to_string(),
        group_id: "advert-indexer.metrics".to_string(),
        name: name.to_string(),
        retry: retry.map(str::to_string),
        error: error.map(str::to_string),
        retry_count: 2,
        cluster: "local".to_string(),
        max_processing_time: Duration::from_secs(1),
        disable_error_consumer: false,
        tuning: ConsumerTuning::default(),
    })
}

#[tokio::test]
async fn test_processing_outcomes_are_counted() {
    let snapshotter = snapshotter();
    let cancellation = CancellationToken::new();
    let producer = Arc::new(MockSyncProducer::default());

    // Escalated to the retry topic
    let escalating = MainTopicHandler::new(
        group_config("metrics.updated", Some("metrics.retry"), Some("metrics.error")),
        Arc::new(FailingConsumer::default()),
        producer.clone(),
    );
    escalating
        .handle_message(&ConsumerMessage::builder("metrics.updated").key("1").build(), &cancellation)
        .await;

    // Dropped without a retry or error topic
    let dropping = MainTopicHandler::new(
        group_config("metrics.dropped", None, None),
        Arc::new(FailingConsumer::default()),
        producer.clone(),
    );
    dropping
        .handle_message(&ConsumerMessage::builder("metrics.dropped").key("2").build(), &cancellation)
        .await;

    // Error topic: one too fresh, one over the max error count
    let consumers: HashMap<String, Arc<dyn Consumer>> = HashMap::from([(
        "metrics.error".to_string(),
        Arc::new(CountingConsumer::default()) as Arc<dyn Consumer>,
    )]);
    let replay = ErrorTopicHandler::new(error_config(&["metrics.error"], 3), Arc::new(consumers));
    let fresh = ConsumerMessage::builder("metrics.error")
        .header(TARGET_TOPIC_KEY, "metrics.retry")
        .timestamp(Utc::now())
        .build();
    assert_eq!(replay.handle_message(&fresh, &cancellation).await, MessageDisposition::Skip);
    let exhausted = ConsumerMessage::builder("metrics.error")
        .header(ERROR_COUNT_KEY, "9")
        .timestamp(Utc::now() - ChronoDuration::minutes(10))
        .build();
    assert_eq!(replay.handle_message(&exhausted, &cancellation).await, MessageDisposition::Ack);

    let all = counters(snapshotter);
    assert_eq!(
        count(&all, MESSAGES_CONSUMED, &[("topic", "metrics.updated"), ("status", "failure")]),
        1
    );
    assert_eq!(
        count(&all, MESSAGES_ESCALATED, &[("source", "metrics.updated"), ("target", "metrics.retry")]),
        1
    );
    assert_eq!(
        count(&all, MESSAGES_DROPPED, &[("topic", "metrics.dropped"), ("reason", DROP_NO_TARGET)]),
        1
    );
    assert_eq!(count(&all, MESSAGES_TOO_FRESH, &[("topic", "metrics.error")]), 1);
    assert_eq!(
        count(&all, MESSAGES_DROPPED, &[("topic", "metrics.error"), ("reason", DROP_MAX_ERROR_COUNT)]),
        1
    );
    assert_eq!(producer.sent_topics(), vec!["metrics.retry".to_string()]);
}
