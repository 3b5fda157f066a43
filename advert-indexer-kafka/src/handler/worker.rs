//! Partition workers - one task per claimed partition.
//!
//! Each worker owns a bounded channel, so messages within a partition are
//! handled in order while partitions progress independently. A full channel
//! applies backpressure to the session loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ConsumerGroupHandler, MessageDisposition};
use crate::errors::BrokerError;
use crate::message::ConsumerMessage;
use crate::state::TopicPartition;

/// Messages buffered per partition before the session loop waits.
pub const DEFAULT_PARTITION_BUFFER: usize = 100;

/// Marks a message's offset as consumed.
pub trait Acknowledger: Send + Sync {
    fn ack(&self, message: &ConsumerMessage) -> Result<(), BrokerError>;
}

/// A worker processing the messages of a single partition.
pub struct PartitionWorker {
    partition: TopicPartition,
    sender: mpsc::Sender<ConsumerMessage>,
    cancellation: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PartitionWorker {
    pub fn new(
        partition: TopicPartition,
        handler: Arc<dyn ConsumerGroupHandler>,
        acknowledger: Arc<dyn Acknowledger>,
        buffer: usize,
        cancellation: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        let handle = tokio::spawn(Self::run(
            partition.clone(),
            receiver,
            handler,
            acknowledger,
            cancellation.clone(),
        ));

        Self {
            partition,
            sender,
            cancellation,
            handle: Some(handle),
        }
    }

    pub fn partition(&self) -> &TopicPartition {
        &self.partition
    }

    /// A sender usable without holding a borrow of the worker.
    pub fn sender(&self) -> mpsc::Sender<ConsumerMessage> {
        self.sender.clone()
    }

    /// Stop the worker. A message already being handled runs to completion;
    /// queued messages are discarded unacknowledged.
    pub async fn shutdown(mut self) {
        self.cancellation.cancel();
        drop(self.sender);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(partition = %self.partition, error = %e, "Partition worker panicked during shutdown");
            }
        }
    }

    async fn run(
        partition: TopicPartition,
        mut receiver: mpsc::Receiver<ConsumerMessage>,
        handler: Arc<dyn ConsumerGroupHandler>,
        acknowledger: Arc<dyn Acknowledger>,
        cancellation: CancellationToken,
    ) {
        debug!(group_id = handler.group_id(), partition = %partition, "Starting partition worker");
        handler.start_listening(&partition);

        loop {
            let message = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                message = receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            match handler.handle_message(&message, &cancellation).await {
                MessageDisposition::Ack => {
                    if let Err(e) = acknowledger.ack(&message) {
                        error!(
                            topic = %message.topic,
                            partition = message.partition,
                            offset = message.offset,
                            error = %e,
                            "Failed to store message offset"
                        );
                    }
                }
                MessageDisposition::Skip => {
                    debug!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        "Message left unacknowledged"
                    );
                }
            }
        }

        handler.close_partition(&partition);
        debug!(group_id = handler.group_id(), partition = %partition, "Partition worker stopped");
    }
}

/// Routes a session's messages to per-partition workers.
///
/// Owned by a single session loop. `setup` runs before a partition's worker
/// starts and `cleanup` only after every worker has stopped.
pub struct PartitionDispatcher {
    handler: Arc<dyn ConsumerGroupHandler>,
    acknowledger: Arc<dyn Acknowledger>,
    workers: HashMap<TopicPartition, PartitionWorker>,
    buffer: usize,
    cancellation: CancellationToken,
}

impl PartitionDispatcher {
    pub fn new(
        handler: Arc<dyn ConsumerGroupHandler>,
        acknowledger: Arc<dyn Acknowledger>,
        buffer: usize,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            handler,
            acknowledger,
            workers: HashMap::new(),
            buffer,
            cancellation,
        }
    }

    pub fn handler(&self) -> &Arc<dyn ConsumerGroupHandler> {
        &self.handler
    }

    /// Partitions with a running worker.
    pub fn assigned(&self) -> Vec<TopicPartition> {
        let mut partitions: Vec<_> = self.workers.keys().cloned().collect();
        partitions.sort();
        partitions
    }

    /// Register claimed partitions and start a worker for each new one.
    pub fn assign(&mut self, claims: &[TopicPartition]) {
        let new: Vec<TopicPartition> = claims
            .iter()
            .filter(|tp| !self.workers.contains_key(tp))
            .cloned()
            .collect();
        if new.is_empty() {
            return;
        }

        info!(
            group_id = self.handler.group_id(),
            partitions = ?new,
            "Partitions assigned"
        );
        self.handler.setup(&new);

        for tp in new {
            let worker = PartitionWorker::new(
                tp.clone(),
                self.handler.clone(),
                self.acknowledger.clone(),
                self.buffer,
                self.cancellation.child_token(),
            );
            self.workers.insert(tp, worker);
        }
    }

    /// Stop the workers of revoked partitions.
    pub async fn revoke(&mut self, partitions: &[TopicPartition]) {
        for tp in partitions {
            if let Some(worker) = self.workers.remove(tp) {
                worker.shutdown().await;
            }
        }
        info!(
            group_id = self.handler.group_id(),
            partitions = ?partitions,
            "Partitions revoked"
        );
    }

    /// Hand a message to its partition's worker, claiming the partition if needed.
    pub async fn dispatch(&mut self, message: ConsumerMessage) {
        let tp = TopicPartition::new(&message.topic, message.partition);
        if !self.workers.contains_key(&tp) {
            self.assign(std::slice::from_ref(&tp));
        }

        let Some(sender) = self.workers.get(&tp).map(PartitionWorker::sender) else {
            return;
        };
        if sender.send(message).await.is_err() {
            warn!(partition = %tp, "Partition worker is gone, message dropped unacknowledged");
        }
    }

    /// Stop every worker, then run the handler's cleanup.
    pub async fn shutdown(&mut self) {
        for (_, worker) in self.workers.drain() {
            worker.shutdown().await;
        }
        self.handler.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConsumerGroupHandlerState, HandlerStatus, TopicStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct RecordingHandler {
        state: Arc<ConsumerGroupHandlerState>,
        handled: Mutex<Vec<(i32, i64)>>,
        skip_offsets: Vec<i64>,
    }

    impl RecordingHandler {
        fn new(skip_offsets: Vec<i64>) -> Self {
            Self {
                state: Arc::new(ConsumerGroupHandlerState::new("g", Utc::now())),
                handled: Mutex::new(Vec::new()),
                skip_offsets,
            }
        }
    }

    #[async_trait]
    impl ConsumerGroupHandler for RecordingHandler {
        fn state(&self) -> &Arc<ConsumerGroupHandlerState> {
            &self.state
        }

        async fn handle_message(&self, message: &ConsumerMessage, _c: &CancellationToken) -> MessageDisposition {
            self.handled.lock().push((message.partition, message.offset));
            if self.skip_offsets.contains(&message.offset) {
                MessageDisposition::Skip
            } else {
                MessageDisposition::Ack
            }
        }
    }

    #[derive(Default)]
    struct RecordingAcks {
        acked: Mutex<Vec<(i32, i64)>>,
    }

    impl Acknowledger for RecordingAcks {
        fn ack(&self, message: &ConsumerMessage) -> Result<(), BrokerError> {
            self.acked.lock().push((message.partition, message.offset));
            Ok(())
        }
    }

    fn message(partition: i32, offset: i64) -> ConsumerMessage {
        ConsumerMessage::builder("advert.updated")
            .partition(partition)
            .offset(offset)
            .build()
    }

    #[tokio::test]
    async fn test_messages_are_processed_in_partition_order() {
        let handler = Arc::new(RecordingHandler::new(vec![2]));
        let acks = Arc::new(RecordingAcks::default());
        let mut dispatcher =
            PartitionDispatcher::new(handler.clone(), acks.clone(), 8, CancellationToken::new());

        for offset in 0..4 {
            dispatcher.dispatch(message(0, offset)).await;
            dispatcher.dispatch(message(1, offset)).await;
        }
        assert_eq!(
            dispatcher.assigned(),
            vec![
                TopicPartition::new("advert.updated", 0),
                TopicPartition::new("advert.updated", 1)
            ]
        );

        // Let workers drain their channels before shutting down.
        tokio::time::sleep(Duration::from_millis(50)).await;
        dispatcher.shutdown().await;

        let handled = handler.handled.lock().clone();
        let p0: Vec<i64> = handled.iter().filter(|(p, _)| *p == 0).map(|(_, o)| *o).collect();
        assert_eq!(p0, vec![0, 1, 2, 3]);

        let acked = acks.acked.lock().clone();
        assert_eq!(acked.len(), 6);
        assert!(!acked.iter().any(|(_, o)| *o == 2));

        let snapshot = handler.state.snapshot();
        assert_eq!(snapshot.status, HandlerStatus::Closed);
        assert!(snapshot.topics.iter().all(|t| t.status == TopicStatus::Closed));
    }

    #[tokio::test]
    async fn test_revoke_closes_only_revoked_partition() {
        let handler = Arc::new(RecordingHandler::new(vec![]));
        let mut dispatcher = PartitionDispatcher::new(
            handler.clone(),
            Arc::new(RecordingAcks::default()),
            8,
            CancellationToken::new(),
        );
        let p0 = TopicPartition::new("advert.updated", 0);
        let p1 = TopicPartition::new("advert.updated", 1);

        dispatcher.assign(&[p0.clone(), p1.clone()]);
        dispatcher.revoke(std::slice::from_ref(&p1)).await;

        assert_eq!(dispatcher.assigned(), vec![p0.clone()]);
        assert_eq!(handler.state.topic_state(&p1).unwrap().status, TopicStatus::Closed);
        assert_ne!(handler.state.topic_state(&p0).unwrap().status, TopicStatus::Closed);
        assert_eq!(handler.state.status(), HandlerStatus::Started);

        dispatcher.shutdown().await;
        assert_eq!(handler.state.status(), HandlerStatus::Closed);
    }
}
