//! Mocks shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use advert_indexer_kafka::config::{ConsumerGroupErrorConfig, ErrorGroupSettings};
use advert_indexer_kafka::handler::ConsumerGroupHandler;
use advert_indexer_kafka::{
    BrokerError, ConsumeContext, Consumer, ConsumerMessage, GroupConnector, GroupSession, ProducerMessage,
    SyncProducer,
};

// Mock SyncProducer recording every publish call
#[derive(Default)]
pub struct MockSyncProducer {
    pub sent: Mutex<Vec<ProducerMessage>>,
    pub batches: Mutex<Vec<Vec<ProducerMessage>>>,
}

impl MockSyncProducer {
    pub fn sent_topics(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.topic.clone()).collect()
    }

    pub fn take_sent(&self) -> Vec<ProducerMessage> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl SyncProducer for MockSyncProducer {
    async fn send_message(&self, message: ProducerMessage) -> Result<(), BrokerError> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn send_messages(&self, messages: Vec<ProducerMessage>) -> Result<(), BrokerError> {
        self.batches.lock().push(messages);
        Ok(())
    }
}

// Mock Consumer that fails every message
#[derive(Default)]
pub struct FailingConsumer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Consumer for FailingConsumer {
    async fn consume(&self, _ctx: &ConsumeContext, message: &ConsumerMessage) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("advert {} not found", message.key_str().unwrap_or_default())
    }
}

// Mock Consumer that accepts every message
#[derive(Default)]
pub struct CountingConsumer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Consumer for CountingConsumer {
    async fn consume(&self, _ctx: &ConsumeContext, _message: &ConsumerMessage) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// Mock Consumer that outlives any processing deadline unless cancelled
#[derive(Default)]
pub struct SlowConsumer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Consumer for SlowConsumer {
    async fn consume(&self, ctx: &ConsumeContext, _message: &ConsumerMessage) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(()),
            _ = ctx.cancellation.cancelled() => anyhow::bail!("cancelled"),
        }
    }
}

// Mock GroupConnector: sessions run until closed, then clean up the handler
pub struct MockConnector {
    group_id: String,
    pub connects: AtomicUsize,
    pub handlers: Mutex<Vec<Arc<dyn ConsumerGroupHandler>>>,
    fail: bool,
}

impl MockConnector {
    pub fn new(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            connects: AtomicUsize::new(0),
            handlers: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(group_id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(group_id)
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl GroupConnector for MockConnector {
    fn group_id(&self) -> &str {
        &self.group_id
    }

    fn connect(&self, handler: Arc<dyn ConsumerGroupHandler>) -> Result<GroupSession, BrokerError> {
        if self.fail {
            return Err(BrokerError::connection("broker unreachable"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().push(handler.clone());

        let cancellation = CancellationToken::new();
        let token = cancellation.clone();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
            handler.cleanup();
        });
        Ok(GroupSession::new(cancellation, handle))
    }
}

pub fn error_config(topics: &[&str], max_error_count: u32) -> Arc<ConsumerGroupErrorConfig> {
    scheduled_error_config(topics, max_error_count, "*/5 * * * *")
}

pub fn scheduled_error_config(topics: &[&str], max_error_count: u32, cron: &str) -> Arc<ConsumerGroupErrorConfig> {
    let settings = ErrorGroupSettings {
        group_id: Some("advert-indexer.error".to_string()),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        cron: Some(cron.to_string()),
        max_error_count: Some(max_error_count),
        cluster: Some("local".to_string()),
        idle_no_message_ms: Some(60_000),
        idle_message_too_fresh_ms: Some(30_000),
        ..Default::default()
    };
    Arc::new(settings.resolve("test").unwrap())
}

pub fn topic_set(topics: &[&str]) -> BTreeSet<String> {
    topics.iter().map(|t| t.to_string()).collect()
}
