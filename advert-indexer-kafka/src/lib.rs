//! # Advert Indexer Kafka
//!
//! Kafka consumer group orchestration for the advert indexer.
//!
//! Each domain consumer gets a main-topic consumer group. Failed messages are
//! escalated main → retry → error through headers, and every cluster with an
//! error policy runs one error consumer group that replays its error topics
//! on a cron schedule and leaves again once the topics go quiet.
//!
//! ## Usage
//!
//! ```ignore
//! use advert_indexer_kafka::{ConsumerBuilder, ConsumerGroupConsumers};
//!
//! let consumers = ConsumerBuilder::new(settings, vec![
//!     ConsumerGroupConsumers::new("advertUpdated", advert_consumer),
//! ])
//! .initialize()
//! .await?;
//!
//! // on shutdown
//! consumers.shutdown().await;
//! ```

pub mod builder;
pub mod config;
pub mod consumer;
pub mod default_error_consumer;
pub mod errors;
pub mod group;
pub mod handler;
pub mod headers;
pub mod message;
pub mod metrics_consts;
pub mod processing;
pub mod producer;
pub mod state;

pub use builder::{ConnectorFactory, ConsumerBuilder, Consumers, ErrorGroupPlan, KafkaConnectorFactory};
pub use config::KafkaSettings;
pub use consumer::{ConsumeContext, Consumer, ConsumerGroupConsumers};
pub use default_error_consumer::DefaultErrorConsumer;
pub use errors::{BrokerError, ProcessingError};
pub use group::{ConsumerGroup, ErrorConsumerGroup, GroupConnector, GroupSession};
pub use headers::Headers;
pub use message::{ConsumerMessage, CustomMessage, Message, ProducerMessage};
pub use producer::{Producer, ProducerBuilder, SyncProducer};
pub use state::{ConsumerGroupHandlerState, ConsumerGroupStatus, HandlerStatus, TopicPartition, TopicStatus};
