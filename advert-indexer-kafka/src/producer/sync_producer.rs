//! Per-cluster synchronous publish primitive.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};
use rdkafka::util::Timeout;
use tracing::{debug, error};

use crate::errors::BrokerError;
use crate::message::ProducerMessage;

/// Publishes messages and waits for broker acknowledgment.
#[async_trait]
pub trait SyncProducer: Send + Sync {
    /// Publish one message.
    async fn send_message(&self, message: ProducerMessage) -> Result<(), BrokerError>;

    /// Publish several messages as one batch, in order.
    ///
    /// All deliveries are awaited; the first failure is returned.
    async fn send_messages(&self, messages: Vec<ProducerMessage>) -> Result<(), BrokerError>;
}

/// [`SyncProducer`] backed by an rdkafka [`FutureProducer`].
pub struct KafkaSyncProducer {
    cluster: String,
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaSyncProducer {
    pub fn new(cluster: impl Into<String>, producer: FutureProducer, queue_timeout: Duration) -> Self {
        Self {
            cluster: cluster.into(),
            producer,
            queue_timeout,
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Flush queued messages, waiting at most `timeout`.
    pub fn flush(&self, timeout: Duration) -> Result<(), BrokerError> {
        self.producer.flush(Timeout::After(timeout))?;
        Ok(())
    }

    async fn deliver(&self, message: &ProducerMessage) -> Result<(), BrokerError> {
        let mut record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&message.topic)
            .payload(message.payload.as_slice())
            .headers(message.headers.to_kafka());
        if let Some(key) = &message.key {
            record = record.key(key.as_slice());
        }

        self.producer
            .send(record, Timeout::After(self.queue_timeout))
            .await
            .map(|_| ())
            .map_err(|(e, _)| BrokerError::publish(&message.topic, &self.cluster, e.to_string()))
    }
}

#[async_trait]
impl SyncProducer for KafkaSyncProducer {
    async fn send_message(&self, message: ProducerMessage) -> Result<(), BrokerError> {
        match self.deliver(&message).await {
            Ok(()) => {
                debug!(topic = %message.topic, cluster = %self.cluster, "Message delivered");
                Ok(())
            }
            Err(e) => {
                error!(topic = %message.topic, cluster = %self.cluster, error = %e, "Message delivery failed");
                Err(e)
            }
        }
    }

    async fn send_messages(&self, messages: Vec<ProducerMessage>) -> Result<(), BrokerError> {
        let results = join_all(messages.iter().map(|m| self.deliver(m))).await;
        let failed = results.iter().filter(|r| r.is_err()).count();

        if failed > 0 {
            error!(
                cluster = %self.cluster,
                message_count = messages.len(),
                failed_count = failed,
                "Batch delivery failed"
            );
        } else {
            debug!(cluster = %self.cluster, message_count = messages.len(), "Batch delivered");
        }

        results.into_iter().collect()
    }
}
