//! Consumer group handlers: per-message processing plus the partition state machine.
//!
//! A handler is driven by a [`PartitionDispatcher`] that runs one
//! [`PartitionWorker`] per claimed partition. Lifecycle callbacks
//! (`setup`, `cleanup`) never overlap with a running worker.

mod error_topic;
mod main_topic;
mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::message::ConsumerMessage;
use crate::state::{ConsumerGroupHandlerState, TopicPartition};

pub use error_topic::ErrorTopicHandler;
pub use main_topic::MainTopicHandler;
pub use worker::{Acknowledger, PartitionDispatcher, PartitionWorker, DEFAULT_PARTITION_BUFFER};

/// What happens to a message's offset after the handler is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// Mark the offset as consumed.
    Ack,
    /// Leave the offset unmarked so the message is read again by a later session.
    Skip,
}

#[async_trait]
pub trait ConsumerGroupHandler: Send + Sync {
    /// Handler state, shared with observers such as the idle monitor.
    fn state(&self) -> &Arc<ConsumerGroupHandlerState>;

    fn group_id(&self) -> &str {
        self.state().group_id()
    }

    /// Partitions were claimed.
    fn setup(&self, claims: &[TopicPartition]) {
        self.state().setup(claims.iter().cloned(), Utc::now());
    }

    /// A partition worker started polling its stream.
    fn start_listening(&self, tp: &TopicPartition) {
        self.state().mark_listening(tp, Utc::now());
    }

    /// Process one message. Failures are handled internally and never propagate.
    async fn handle_message(
        &self,
        message: &ConsumerMessage,
        cancellation: &CancellationToken,
    ) -> MessageDisposition;

    /// A partition worker stopped.
    fn close_partition(&self, tp: &TopicPartition) {
        self.state().close_partition(tp, Utc::now());
    }

    /// The session ended. Forces every partition and the handler to `CLOSED`.
    fn cleanup(&self) {
        self.state().close(Utc::now());
    }
}
