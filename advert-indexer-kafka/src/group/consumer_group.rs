use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::GroupConnector;
use super::connector::GroupSession;
use crate::config::ConsumerGroupConfig;
use crate::consumer::Consumer;
use crate::errors::BrokerError;
use crate::handler::{ConsumerGroupHandler, MainTopicHandler};
use crate::producer::SyncProducer;
use crate::state::{ConsumerGroupHandlerState, ConsumerGroupStatus};

#[derive(Default)]
struct Membership {
    session: Option<GroupSession>,
    handler: Option<Arc<MainTopicHandler>>,
}

/// A main-topic consumer group: the main topic plus its retry topic under one group id.
pub struct ConsumerGroup {
    config: Arc<ConsumerGroupConfig>,
    consumer: Arc<dyn Consumer>,
    producer: Arc<dyn SyncProducer>,
    connector: Arc<dyn GroupConnector>,
    membership: Mutex<Membership>,
}

impl ConsumerGroup {
    pub fn new(
        config: Arc<ConsumerGroupConfig>,
        consumer: Arc<dyn Consumer>,
        producer: Arc<dyn SyncProducer>,
        connector: Arc<dyn GroupConnector>,
    ) -> Self {
        Self {
            config,
            consumer,
            producer,
            connector,
            membership: Mutex::new(Membership::default()),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.config.group_id
    }

    pub fn config(&self) -> &ConsumerGroupConfig {
        &self.config
    }

    pub async fn status(&self) -> ConsumerGroupStatus {
        let membership = self.membership.lock().await;
        match (&membership.session, &membership.handler) {
            (Some(_), _) => ConsumerGroupStatus::Subscribed,
            (None, Some(_)) => ConsumerGroupStatus::Unsubscribed,
            (None, None) => ConsumerGroupStatus::Created,
        }
    }

    /// State of the current (or last) handler.
    pub async fn handler_state(&self) -> Option<Arc<ConsumerGroupHandlerState>> {
        let membership = self.membership.lock().await;
        membership.handler.as_ref().map(|h| h.state().clone())
    }

    /// Join the group with a fresh handler. A no-op while a session is running.
    pub async fn subscribe(&self) -> Result<(), BrokerError> {
        let mut membership = self.membership.lock().await;
        if membership.session.is_some() {
            return Ok(());
        }

        let handler = Arc::new(MainTopicHandler::new(
            self.config.clone(),
            self.consumer.clone(),
            self.producer.clone(),
        ));
        let session = self.connector.connect(handler.clone())?;

        membership.handler = Some(handler);
        membership.session = Some(session);
        info!(group_id = %self.config.group_id, topics = ?self.config.topics(), "Consumer group subscribed");
        Ok(())
    }

    /// Leave the group. Unsubscribing an unsubscribed group is a no-op.
    pub async fn unsubscribe(&self) -> Result<(), BrokerError> {
        let session = self.membership.lock().await.session.take();
        if let Some(session) = session {
            session.close().await;
            info!(group_id = %self.config.group_id, "Consumer group unsubscribed");
        }
        Ok(())
    }
}
