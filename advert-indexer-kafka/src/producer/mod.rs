//! Multi-cluster producer facade.

mod builder;
mod sync_producer;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::{NamedConfigs, ProducerTopic};
use crate::errors::BrokerError;
use crate::message::{CustomMessage, Message, ProducerMessage};

pub use builder::ProducerBuilder;
pub use sync_producer::{KafkaSyncProducer, SyncProducer};

/// Routes messages to the synchronous producer of their destination cluster.
#[derive(Clone)]
pub struct Producer {
    sync_producers: HashMap<String, Arc<dyn SyncProducer>>,
    topics: NamedConfigs<ProducerTopic>,
}

impl Producer {
    /// Create a producer over per-cluster sync producers. Cluster names are matched case-insensitively.
    pub fn new(
        sync_producers: impl IntoIterator<Item = (String, Arc<dyn SyncProducer>)>,
        topics: NamedConfigs<ProducerTopic>,
    ) -> Self {
        Self {
            sync_producers: sync_producers
                .into_iter()
                .map(|(cluster, producer)| (cluster.to_lowercase(), producer))
                .collect(),
            topics,
        }
    }

    /// The synchronous producer of a cluster.
    pub fn sync_producer(&self, cluster: &str) -> Result<Arc<dyn SyncProducer>, BrokerError> {
        self.sync_producers
            .get(&cluster.to_lowercase())
            .cloned()
            .ok_or_else(|| BrokerError::ProducerNotFound(cluster.to_string()))
    }

    /// Resolve a producer topic config by name.
    pub fn producer_topic(&self, config_name: &str) -> Result<&ProducerTopic, BrokerError> {
        self.topics.config(config_name)
    }

    pub async fn produce<M: Message>(&self, message: &M) -> Result<(), BrokerError> {
        let (topic, record) = self.record_from_message(message)?;
        self.sync_producer(&topic.cluster)?
            .send_message(record)
            .await
    }

    /// Publish messages grouped by cluster in chunks of at most `size`.
    pub async fn produce_bulk<M: Message>(&self, messages: &[M], size: usize) -> Result<(), BrokerError> {
        let records = messages
            .iter()
            .map(|m| {
                self.record_from_message(m)
                    .map(|(topic, record)| (topic.cluster.clone(), record))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.send_chunks(records, size).await
    }

    pub async fn produce_custom(&self, message: &CustomMessage) -> Result<(), BrokerError> {
        let record = record_from_custom(message)?;
        self.sync_producer(&message.topic.cluster)?
            .send_message(record)
            .await
    }

    /// Publish custom messages grouped by cluster in chunks of at most `size`.
    pub async fn produce_custom_bulk(&self, messages: &[CustomMessage], size: usize) -> Result<(), BrokerError> {
        let records = messages
            .iter()
            .map(|m| record_from_custom(m).map(|record| (m.topic.cluster.clone(), record)))
            .collect::<Result<Vec<_>, _>>()?;
        self.send_chunks(records, size).await
    }

    async fn send_chunks(&self, records: Vec<(String, ProducerMessage)>, size: usize) -> Result<(), BrokerError> {
        for (cluster, chunk) in chunk_by_cluster(records, size)? {
            let producer = self.sync_producer(&cluster)?;
            info!(cluster = %cluster, message_count = chunk.len(), "Producing message chunk");
            producer.send_messages(chunk).await?;
        }
        Ok(())
    }

    fn record_from_message<M: Message>(&self, message: &M) -> Result<(&ProducerTopic, ProducerMessage), BrokerError> {
        let topic = self.producer_topic(message.config_name())?;
        let record = to_record(&topic.name, &message.key(), message)?;
        Ok((topic, record))
    }
}

fn record_from_custom(message: &CustomMessage) -> Result<ProducerMessage, BrokerError> {
    to_record(&message.topic.name, &message.key, &message.body)
}

fn to_record<T: serde::Serialize + ?Sized>(topic: &str, key: &str, body: &T) -> Result<ProducerMessage, BrokerError> {
    let payload = serde_json::to_vec(body)?;
    let key = (!key.is_empty()).then(|| key.as_bytes().to_vec());
    Ok(ProducerMessage::new(topic, key, payload))
}

/// Group items by cluster, then split each cluster's items into chunks of at most `size`.
///
/// Clusters appear in first-seen order and items keep their relative order.
pub fn chunk_by_cluster<T>(items: Vec<(String, T)>, size: usize) -> Result<Vec<(String, Vec<T>)>, BrokerError> {
    if size == 0 {
        return Err(BrokerError::config("bulk chunk size must be greater than zero"));
    }

    let mut clusters: Vec<(String, Vec<T>)> = Vec::new();
    for (cluster, item) in items {
        match clusters.iter_mut().find(|(name, _)| *name == cluster) {
            Some((_, group)) => group.push(item),
            None => clusters.push((cluster, vec![item])),
        }
    }

    let mut chunks = Vec::new();
    for (cluster, group) in clusters {
        let mut group = group.into_iter().peekable();
        while group.peek().is_some() {
            chunks.push((cluster.clone(), group.by_ref().take(size).collect()));
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(cluster: &str, n: usize) -> Vec<(String, usize)> {
        (0..n).map(|i| (cluster.to_string(), i)).collect()
    }

    #[test]
    fn test_chunks_preserve_order() {
        for (n, k) in [(10, 3), (9, 3), (1, 5), (5, 1), (0, 2)] {
            let chunks = chunk_by_cluster(items("local", n), k).unwrap();

            assert_eq!(chunks.len(), n.div_ceil(k));
            assert!(chunks.iter().all(|(_, c)| c.len() <= k && !c.is_empty()));
            let flattened: Vec<usize> = chunks.into_iter().flat_map(|(_, c)| c).collect();
            assert_eq!(flattened, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_chunks_group_by_cluster() {
        let input = vec![
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("a".to_string(), 3),
            ("b".to_string(), 4),
            ("a".to_string(), 5),
        ];

        let chunks = chunk_by_cluster(input, 2).unwrap();
        assert_eq!(
            chunks,
            vec![
                ("a".to_string(), vec![1, 3]),
                ("a".to_string(), vec![5]),
                ("b".to_string(), vec![2, 4]),
            ]
        );
    }

    #[test]
    fn test_zero_chunk_size_is_config_error() {
        assert!(matches!(
            chunk_by_cluster(items("local", 3), 0),
            Err(BrokerError::Config(_))
        ));
    }

    #[test]
    fn test_empty_key_is_omitted() {
        let record = to_record("advert.indexed", "", &serde_json::json!({"id": 1})).unwrap();
        assert_eq!(record.key, None);
        assert_eq!(record.payload, br#"{"id":1}"#);

        let record = to_record("advert.indexed", "1", &serde_json::json!({"id": 1})).unwrap();
        assert_eq!(record.key.as_deref(), Some(b"1".as_slice()));
    }
}
