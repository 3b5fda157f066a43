//! Broker group membership: joins a consumer group and drives a session
//! that feeds claimed partitions into a [`PartitionDispatcher`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer as _, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientContext, TopicPartitionList};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::errors::BrokerError;
use crate::handler::{Acknowledger, ConsumerGroupHandler, PartitionDispatcher, DEFAULT_PARTITION_BUFFER};
use crate::message::ConsumerMessage;
use crate::state::TopicPartition;

/// Pause after a failed poll before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Opens group sessions for a handler.
pub trait GroupConnector: Send + Sync {
    fn group_id(&self) -> &str;

    /// Join the group and start a session driving `handler` in the background.
    fn connect(&self, handler: Arc<dyn ConsumerGroupHandler>) -> Result<GroupSession, BrokerError>;
}

/// A running group session.
pub struct GroupSession {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl GroupSession {
    pub fn new(cancellation: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            cancellation,
            handle,
        }
    }

    /// Whether the session loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the session and wait for its workers and cleanup to finish.
    ///
    /// Closing a session that already ended is fine.
    pub async fn close(self) {
        self.cancellation.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Consumer group session task failed");
        }
    }
}

/// What a session does when partitions are revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeBehavior {
    /// Stop the revoked partitions' workers and keep consuming the rest.
    StopPartitions,
    /// End the whole session without rejoining.
    EndSession,
}

#[derive(Debug)]
enum SessionEvent {
    Assign(Vec<TopicPartition>),
    Revoke(Vec<TopicPartition>),
}

fn partitions(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
    tpl.elements().into_iter().map(TopicPartition::from).collect()
}

/// Forwards rebalance callbacks to the session loop.
pub struct GroupContext {
    group_id: String,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl GroupContext {
    fn send(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!(group_id = %self.group_id, "Session loop gone, rebalance event dropped");
        }
    }
}

impl ClientContext for GroupContext {}

impl ConsumerContext for GroupContext {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        if let Rebalance::Revoke(tpl) = rebalance {
            if tpl.count() > 0 {
                self.send(SessionEvent::Revoke(partitions(tpl)));
            }
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(tpl) if tpl.count() > 0 => {
                self.send(SessionEvent::Assign(partitions(tpl)));
            }
            Rebalance::Error(e) => {
                error!(group_id = %self.group_id, error = %e, "Rebalance failed");
            }
            _ => {}
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!(group_id = %self.group_id, partitions = offsets.count(), "Offsets committed"),
            Err(e) => warn!(group_id = %self.group_id, error = %e, "Offset commit failed"),
        }
    }
}

/// Stores the next offset to commit; auto-commit flushes it to the broker.
struct KafkaAcknowledger {
    consumer: Arc<StreamConsumer<GroupContext>>,
}

impl Acknowledger for KafkaAcknowledger {
    fn ack(&self, message: &ConsumerMessage) -> Result<(), BrokerError> {
        self.consumer
            .store_offset(&message.topic, message.partition, message.offset + 1)?;
        Ok(())
    }
}

/// [`GroupConnector`] backed by an rdkafka [`StreamConsumer`].
pub struct KafkaGroupConnector {
    group_id: String,
    topics: BTreeSet<String>,
    client_config: ClientConfig,
    on_revoke: RevokeBehavior,
    buffer: usize,
}

impl KafkaGroupConnector {
    pub fn new(
        group_id: impl Into<String>,
        topics: BTreeSet<String>,
        client_config: ClientConfig,
        on_revoke: RevokeBehavior,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            topics,
            client_config,
            on_revoke,
            buffer: DEFAULT_PARTITION_BUFFER,
        }
    }

    pub fn with_partition_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

impl GroupConnector for KafkaGroupConnector {
    fn group_id(&self) -> &str {
        &self.group_id
    }

    fn connect(&self, handler: Arc<dyn ConsumerGroupHandler>) -> Result<GroupSession, BrokerError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let context = GroupContext {
            group_id: self.group_id.clone(),
            events: events_tx,
        };

        let consumer: StreamConsumer<GroupContext> = self
            .client_config
            .create_with_context(context)
            .map_err(|e| BrokerError::connection(format!("group {}: {e}", self.group_id)))?;

        let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| BrokerError::connection(format!("group {}: {e}", self.group_id)))?;

        info!(group_id = %self.group_id, topics = ?self.topics, "Joined consumer group");

        let consumer = Arc::new(consumer);
        let cancellation = CancellationToken::new();
        let dispatcher = PartitionDispatcher::new(
            handler,
            Arc::new(KafkaAcknowledger {
                consumer: consumer.clone(),
            }),
            self.buffer,
            cancellation.child_token(),
        );

        let span = info_span!("consumer_group", group_id = %self.group_id);
        let handle = tokio::spawn(
            run_session(
                self.group_id.clone(),
                consumer,
                events_rx,
                dispatcher,
                self.on_revoke,
                cancellation.clone(),
            )
            .instrument(span),
        );

        Ok(GroupSession::new(cancellation, handle))
    }
}

async fn run_session(
    group_id: String,
    consumer: Arc<StreamConsumer<GroupContext>>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut dispatcher: PartitionDispatcher,
    on_revoke: RevokeBehavior,
    cancellation: CancellationToken,
) {
    let mut stream = consumer.stream();

    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                info!("Consumer group session closing");
                break;
            }
            Some(event) = events.recv() => match event {
                SessionEvent::Assign(claims) => dispatcher.assign(&claims),
                SessionEvent::Revoke(revoked) => match on_revoke {
                    RevokeBehavior::StopPartitions => dispatcher.revoke(&revoked).await,
                    RevokeBehavior::EndSession => {
                        info!(partitions = ?revoked, "Partitions revoked, ending session");
                        break;
                    }
                },
            },
            message = stream.next() => match message {
                Some(Ok(msg)) => {
                    dispatcher.dispatch(ConsumerMessage::from_kafka(&group_id, &msg)).await;
                }
                Some(Err(e)) => {
                    error!(error = %e, "Kafka error");
                    tokio::select! {
                        _ = cancellation.cancelled() => {}
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
                None => {
                    warn!("Kafka stream ended");
                    break;
                }
            },
        }
    }

    dispatcher.shutdown().await;
    drop(stream);
    consumer.unsubscribe();
    info!("Left consumer group");
}
