//! Message envelopes flowing in and out of the broker.

use chrono::{DateTime, Utc};
use rdkafka::message::Message as KafkaMessage;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ProducerTopic;
use crate::errors::BrokerError;
use crate::headers::Headers;

/// A message received from a topic partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerMessage {
    pub group_id: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: Headers,
    /// Broker timestamp of the record, falling back to receive time when absent.
    pub timestamp: DateTime<Utc>,
}

impl ConsumerMessage {
    /// Copy a record out of the Kafka client.
    pub fn from_kafka<M: KafkaMessage>(group_id: &str, msg: &M) -> Self {
        let timestamp = msg
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Self {
            group_id: group_id.to_string(),
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            headers: msg.headers().map(Headers::from_kafka).unwrap_or_default(),
            timestamp,
        }
    }

    /// Start building a message for `topic`. Used by tests and tooling.
    pub fn builder(topic: impl Into<String>) -> ConsumerMessageBuilder {
        ConsumerMessageBuilder::new(topic)
    }

    /// Decode the JSON payload.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, BrokerError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// The message key as text, if present and valid UTF-8.
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref().and_then(|k| std::str::from_utf8(k).ok())
    }
}

/// Builder for [`ConsumerMessage`].
#[derive(Debug, Clone)]
pub struct ConsumerMessageBuilder {
    inner: ConsumerMessage,
}

impl ConsumerMessageBuilder {
    fn new(topic: impl Into<String>) -> Self {
        Self {
            inner: ConsumerMessage {
                group_id: String::new(),
                topic: topic.into(),
                partition: 0,
                offset: 0,
                key: None,
                payload: Vec::new(),
                headers: Headers::new(),
                timestamp: Utc::now(),
            },
        }
    }

    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.inner.group_id = group_id.into();
        self
    }

    pub fn partition(mut self, partition: i32) -> Self {
        self.inner.partition = partition;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.inner.offset = offset;
        self
    }

    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.inner.key = Some(key.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.inner.payload = payload.into();
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<Vec<u8>>) -> Self {
        self.inner.headers.insert(key, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.inner.headers = headers;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.inner.timestamp = timestamp;
        self
    }

    pub fn build(self) -> ConsumerMessage {
        self.inner
    }
}

/// A record ready to be published by a [`SyncProducer`](crate::producer::SyncProducer).
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerMessage {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: Headers,
}

impl ProducerMessage {
    pub fn new(topic: impl Into<String>, key: Option<Vec<u8>>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key,
            payload,
            headers: Headers::new(),
        }
    }

    /// Republish a consumed message to `topic` with a new header set.
    ///
    /// Key and payload are carried over untouched.
    pub fn forward(message: &ConsumerMessage, topic: impl Into<String>, headers: Headers) -> Self {
        Self {
            topic: topic.into(),
            key: message.key.clone(),
            payload: message.payload.clone(),
            headers,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// A domain message published through a named producer topic config.
pub trait Message: Serialize + Send + Sync {
    /// Name of the producer topic config the message is routed by.
    fn config_name(&self) -> &str;

    /// Partition routing key.
    fn key(&self) -> String;
}

/// A message addressed to an explicit topic and cluster.
///
/// Only `body` is serialized into the record payload.
#[derive(Debug, Clone)]
pub struct CustomMessage {
    pub key: String,
    pub body: serde_json::Value,
    pub topic: ProducerTopic,
}

impl CustomMessage {
    pub fn new(key: impl Into<String>, body: serde_json::Value, topic: ProducerTopic) -> Self {
        Self {
            key: key.into(),
            body,
            topic,
        }
    }
}
