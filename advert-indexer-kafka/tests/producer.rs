//! Producer routing and bulk chunking over mock sync producers.

mod common;

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use advert_indexer_kafka::config::ProducerTopic;
use advert_indexer_kafka::{BrokerError, CustomMessage, Message, Producer, SyncProducer};

use common::MockSyncProducer;

#[derive(Serialize)]
struct AdvertIndexed {
    id: i64,
    #[serde(skip)]
    config_name: &'static str,
}

impl Message for AdvertIndexed {
    fn config_name(&self) -> &str {
        self.config_name
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

fn producer(local: &Arc<MockSyncProducer>, remote: &Arc<MockSyncProducer>) -> Producer {
    Producer::new(
        [
            ("Local".to_string(), local.clone() as Arc<dyn SyncProducer>),
            ("remote".to_string(), remote.clone() as Arc<dyn SyncProducer>),
        ],
        [
            ("advertIndexed", ProducerTopic::new("advert.indexed", "local")),
            ("categoryIndexed", ProducerTopic::new("category.indexed", "REMOTE")),
        ]
        .into_iter()
        .collect(),
    )
}

#[tokio::test]
async fn test_bulk_send_chunks_in_order() {
    let local = Arc::new(MockSyncProducer::default());
    let remote = Arc::new(MockSyncProducer::default());
    let producer = producer(&local, &remote);

    let messages: Vec<AdvertIndexed> = (0..7)
        .map(|id| AdvertIndexed {
            id,
            config_name: "advertIndexed",
        })
        .collect();
    producer.produce_bulk(&messages, 3).await.unwrap();

    let batches = local.batches.lock();
    assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);
    let keys: Vec<Vec<u8>> = batches.iter().flatten().filter_map(|m| m.key.clone()).collect();
    let expected: Vec<Vec<u8>> = (0..7).map(|id: i64| id.to_string().into_bytes()).collect();
    assert_eq!(keys, expected);
    assert!(batches.iter().flatten().all(|m| m.topic == "advert.indexed"));
    assert!(remote.batches.lock().is_empty());
}

#[tokio::test]
async fn test_bulk_send_splits_by_cluster() {
    let local = Arc::new(MockSyncProducer::default());
    let remote = Arc::new(MockSyncProducer::default());
    let producer = producer(&local, &remote);

    let messages = vec![
        AdvertIndexed { id: 1, config_name: "advertIndexed" },
        AdvertIndexed { id: 2, config_name: "categoryIndexed" },
        AdvertIndexed { id: 3, config_name: "advertIndexed" },
    ];
    producer.produce_bulk(&messages, 10).await.unwrap();

    assert_eq!(local.batches.lock().len(), 1);
    assert_eq!(local.batches.lock()[0].len(), 2);
    assert_eq!(remote.batches.lock()[0][0].topic, "category.indexed");
}

#[tokio::test]
async fn test_produce_and_custom_message() {
    let local = Arc::new(MockSyncProducer::default());
    let remote = Arc::new(MockSyncProducer::default());
    let producer = producer(&local, &remote);

    producer
        .produce(&AdvertIndexed { id: 5, config_name: "advertIndexed" })
        .await
        .unwrap();
    producer
        .produce_custom(&CustomMessage::new(
            "",
            json!({"id": 9, "type": "categoryUpdated", "version": 2}),
            ProducerTopic::new("category.updated", "remote"),
        ))
        .await
        .unwrap();

    let sent = local.take_sent();
    assert_eq!(sent[0].payload, br#"{"id":5}"#);
    let custom = remote.take_sent();
    assert_eq!(custom[0].topic, "category.updated");
    assert_eq!(custom[0].key, None);
}

#[tokio::test]
async fn test_unknown_topic_or_cluster() {
    let local = Arc::new(MockSyncProducer::default());
    let remote = Arc::new(MockSyncProducer::default());
    let producer = producer(&local, &remote);

    let unknown_topic = producer
        .produce(&AdvertIndexed { id: 1, config_name: "listingIndexed" })
        .await;
    assert!(matches!(unknown_topic, Err(BrokerError::Config(_))));

    let unknown_cluster = producer
        .produce_custom(&CustomMessage::new("1", json!({}), ProducerTopic::new("x", "eu-west")))
        .await;
    assert!(matches!(unknown_cluster, Err(BrokerError::ProducerNotFound(_))));

    let zero_chunk = producer.produce_bulk::<AdvertIndexed>(&[], 0).await;
    assert!(matches!(zero_chunk, Err(BrokerError::Config(_))));
}
