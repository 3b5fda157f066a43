//! Per-handler and per-partition processing state.
//!
//! Each partition's [`TopicState`] is written only by the worker that owns
//! the partition; the idle monitor reads snapshots of all of them
//! concurrently. Partition entries live in a sharded [`DashMap`] so a reader
//! never blocks writers on other partitions.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rdkafka::topic_partition_list::TopicPartitionListElem;
use serde::Serialize;

/// Lifecycle of a consumer group handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandlerStatus {
    Created,
    Started,
    Closed,
}

/// Lifecycle of a single claimed partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicStatus {
    Created,
    Listening,
    Started,
    /// Error topics only: the latest message was too fresh to replay.
    NewMessage,
    Closed,
}

/// Subscription status of a consumer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumerGroupStatus {
    Created,
    Subscribed,
    Unsubscribed,
}

/// A topic partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.topic, self.partition)
    }
}

impl From<TopicPartitionListElem<'_>> for TopicPartition {
    fn from(elem: TopicPartitionListElem<'_>) -> Self {
        Self::new(elem.topic(), elem.partition())
    }
}

/// State of one claimed partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicState {
    pub topic: String,
    pub partition: i32,
    pub status: TopicStatus,
    pub created_at: DateTime<Utc>,
    pub listening_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub latest_consumed_offset: Option<i64>,
    /// When the latest message was received, not the record timestamp.
    pub latest_consumed_at: Option<DateTime<Utc>>,
}

impl TopicState {
    fn new(tp: &TopicPartition, at: DateTime<Utc>) -> Self {
        Self {
            topic: tp.topic.clone(),
            partition: tp.partition,
            status: TopicStatus::Created,
            created_at: at,
            listening_at: None,
            closed_at: None,
            latest_consumed_offset: None,
            latest_consumed_at: None,
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(&self.topic, self.partition)
    }
}

#[derive(Debug, Clone, Copy)]
struct Lifecycle {
    status: HandlerStatus,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

/// A point-in-time copy of a handler's state.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerSnapshot {
    pub group_id: String,
    pub status: HandlerStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub topics: Vec<TopicState>,
}

/// State owned by one consumer group handler for the life of a subscription.
#[derive(Debug)]
pub struct ConsumerGroupHandlerState {
    group_id: String,
    lifecycle: RwLock<Lifecycle>,
    topics: DashMap<TopicPartition, TopicState>,
}

impl ConsumerGroupHandlerState {
    pub fn new(group_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            group_id: group_id.into(),
            lifecycle: RwLock::new(Lifecycle {
                status: HandlerStatus::Created,
                created_at: at,
                closed_at: None,
            }),
            topics: DashMap::new(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn status(&self) -> HandlerStatus {
        self.lifecycle.read().status
    }

    /// Register newly claimed partitions as `CREATED` and mark the handler started.
    ///
    /// Partitions already tracked are reset, since a re-claim starts a fresh stream.
    pub fn setup<I>(&self, claims: I, at: DateTime<Utc>)
    where
        I: IntoIterator<Item = TopicPartition>,
    {
        let mut lifecycle = self.lifecycle.write();
        for tp in claims {
            let state = TopicState::new(&tp, at);
            self.topics.insert(tp, state);
        }
        if lifecycle.status != HandlerStatus::Closed {
            lifecycle.status = HandlerStatus::Started;
        }
    }

    /// The partition's stream was polled for the first time.
    pub fn mark_listening(&self, tp: &TopicPartition, at: DateTime<Utc>) {
        self.update(tp, at, |state| {
            state.status = TopicStatus::Listening;
            state.listening_at = Some(at);
        });
    }

    /// Record a received message and move the partition to `status`.
    pub fn record_message(&self, tp: &TopicPartition, offset: i64, status: TopicStatus, at: DateTime<Utc>) {
        self.update(tp, at, |state| {
            state.status = status;
            state.latest_consumed_offset = Some(offset);
            state.latest_consumed_at = Some(at);
        });
    }

    /// Move a single partition to `CLOSED`.
    pub fn close_partition(&self, tp: &TopicPartition, at: DateTime<Utc>) {
        if let Some(mut state) = self.topics.get_mut(tp) {
            state.status = TopicStatus::Closed;
            state.closed_at = Some(at);
        }
    }

    /// Force every partition and the handler to `CLOSED`.
    pub fn close(&self, at: DateTime<Utc>) {
        let mut lifecycle = self.lifecycle.write();
        for mut entry in self.topics.iter_mut() {
            entry.status = TopicStatus::Closed;
            entry.closed_at = Some(at);
        }
        lifecycle.status = HandlerStatus::Closed;
        lifecycle.closed_at = Some(at);
    }

    pub fn topic_state(&self, tp: &TopicPartition) -> Option<TopicState> {
        self.topics.get(tp).map(|s| s.clone())
    }

    /// Copy the current state, with partitions ordered by topic and partition.
    pub fn snapshot(&self) -> HandlerSnapshot {
        let lifecycle = *self.lifecycle.read();
        let mut topics: Vec<TopicState> = self.topics.iter().map(|e| e.value().clone()).collect();
        topics.sort_by(|a, b| (&a.topic, a.partition).cmp(&(&b.topic, b.partition)));

        HandlerSnapshot {
            group_id: self.group_id.clone(),
            status: lifecycle.status,
            created_at: lifecycle.created_at,
            closed_at: lifecycle.closed_at,
            topics,
        }
    }

    /// Apply `f` to a partition's state, registering the partition first if it
    /// was never claimed through [`setup`](Self::setup).
    fn update<F: FnOnce(&mut TopicState)>(&self, tp: &TopicPartition, at: DateTime<Utc>, f: F) {
        let mut state = self
            .topics
            .entry(tp.clone())
            .or_insert_with(|| TopicState::new(tp, at));
        f(&mut state);
    }
}
