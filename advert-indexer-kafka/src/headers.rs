//! Header protocol for retry/error escalation.
//!
//! Every escalation step derives a **new** header set from the failed
//! message's headers plus explicit overrides. Headers not touched by a step are
//! carried forward unchanged.
//!
//! | Step             | Changes                                                            |
//! |------------------|--------------------------------------------------------------------|
//! | `for_retry`      | error-message = err, retry-count = "0"                             |
//! | `for_error`      | error-message = err, error-count = "0"                             |
//! | `retry_to_retry` | error-message = err, retry-count = retried count                   |
//! | `retry_to_error` | error-count + 1, error-message = err, target-topic = topic, −retry |
//! | `error_to_retry` | −retry-count                                                       |
//!
//! Reads are asymmetric: [`retried_count`] is pre-incremented ("this would be
//! attempt N") while [`error_count`] is returned verbatim.

use std::collections::BTreeMap;

use rdkafka::message::{Header, Headers as KafkaHeaders, OwnedHeaders};
use uuid::Uuid;

use crate::message::ConsumerMessage;

/// Number of times a message has been republished to its retry topic.
pub const RETRY_COUNT_KEY: &str = "X-RetryCount";
/// Number of times a message has been published to its error topic.
pub const ERROR_COUNT_KEY: &str = "X-ErrorCount";
/// Topic an error-topic message should be replayed to.
pub const TARGET_TOPIC_KEY: &str = "X-TargetTopic";
/// Last processing error, human readable.
pub const ERROR_MESSAGE_KEY: &str = "X-ErrorMessage";
/// Correlation id propagated across escalation steps.
pub const CORRELATION_ID_KEY: &str = "X-CorrelationId";

/// Message headers keyed by name.
///
/// Keys are unique; a later insert replaces an earlier value, matching how the
/// escalation steps override individual headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<u8>>);

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw value of a header.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Get a header value as a UTF-8 string, if present and valid.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Get a header value parsed as an integer.
    ///
    /// Missing or unparsable values read as 0.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get_str(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Set a header, replacing any existing value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.0.remove(key)
    }

    /// Whether the header is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over headers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Copy headers out of a Kafka message. Headers with a null value are skipped.
    pub fn from_kafka<H: KafkaHeaders>(headers: &H) -> Self {
        headers
            .iter()
            .filter_map(|header| {
                header
                    .value
                    .map(|value| (header.key.to_string(), value.to_vec()))
            })
            .collect()
    }

    /// Convert into Kafka record headers.
    pub fn to_kafka(&self) -> OwnedHeaders {
        self.0
            .iter()
            .fold(OwnedHeaders::new_with_capacity(self.0.len()), |acc, (key, value)| {
                acc.insert(Header {
                    key: key.as_str(),
                    value: Some(value.as_slice()),
                })
            })
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Headers for the first publish of a failed main-topic message to its retry topic.
pub fn for_retry(message: &ConsumerMessage, error_message: &str) -> Headers {
    let mut headers = message.headers.clone();
    headers.insert(ERROR_MESSAGE_KEY, error_message);
    headers.insert(RETRY_COUNT_KEY, "0");
    headers
}

/// Headers for the publish of a failed main-topic message straight to its error topic.
pub fn for_error(message: &ConsumerMessage, error_message: &str) -> Headers {
    let mut headers = message.headers.clone();
    headers.insert(ERROR_MESSAGE_KEY, error_message);
    headers.insert(ERROR_COUNT_KEY, "0");
    headers
}

/// Headers for republishing a failed retry-topic message back to the retry topic.
pub fn retry_to_retry(message: &ConsumerMessage, error_message: &str, retried_count: i64) -> Headers {
    let mut headers = message.headers.clone();
    headers.insert(ERROR_MESSAGE_KEY, error_message);
    headers.insert(RETRY_COUNT_KEY, retried_count.to_string());
    headers
}

/// Headers for moving a retry-topic message that exhausted its attempts to the error topic.
pub fn retry_to_error(message: &ConsumerMessage, error_message: &str) -> Headers {
    let mut headers = message.headers.clone();
    let error_count = error_count(message);
    headers.insert(ERROR_COUNT_KEY, error_count.saturating_add(1).to_string());
    headers.insert(ERROR_MESSAGE_KEY, error_message);
    headers.insert(TARGET_TOPIC_KEY, message.topic.as_str());
    headers.remove(RETRY_COUNT_KEY);
    headers
}

/// Headers for replaying an error-topic message to its target topic.
pub fn error_to_retry(message: &ConsumerMessage) -> Headers {
    let mut headers = message.headers.clone();
    headers.remove(RETRY_COUNT_KEY);
    headers
}

/// The attempt number a retry-topic message would represent if it failed now.
pub fn retried_count(message: &ConsumerMessage) -> i64 {
    message.headers.get_int(RETRY_COUNT_KEY).saturating_add(1)
}

/// The error count carried by a message, read verbatim.
pub fn error_count(message: &ConsumerMessage) -> i64 {
    message.headers.get_int(ERROR_COUNT_KEY)
}

/// The last recorded error message, if any.
pub fn error_message(message: &ConsumerMessage) -> Option<&str> {
    message.headers.get_str(ERROR_MESSAGE_KEY)
}

/// The replay target of an error-topic message, if any.
pub fn target_topic(message: &ConsumerMessage) -> Option<&str> {
    message
        .headers
        .get_str(TARGET_TOPIC_KEY)
        .filter(|topic| !topic.is_empty())
}

/// The message's correlation id, or a freshly generated one.
pub fn correlation_id(message: &ConsumerMessage) -> String {
    message
        .headers
        .get_str(CORRELATION_ID_KEY)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
