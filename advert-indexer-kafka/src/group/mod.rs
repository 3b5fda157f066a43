//! Consumer group membership: main-topic groups and the per-cluster error group.

mod connector;
mod consumer_group;
mod error_consumer_group;
pub mod idle;
pub mod schedule;

pub use connector::{GroupConnector, GroupContext, GroupSession, KafkaGroupConnector, RevokeBehavior};
pub use consumer_group::ConsumerGroup;
pub use error_consumer_group::{ErrorConsumerGroup, IDLE_CHECK_INTERVAL};
