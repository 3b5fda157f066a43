use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::connector::GroupSession;
use super::idle::{should_unsubscribe, IdleThresholds};
use super::schedule::until_next;
use super::GroupConnector;
use crate::config::ConsumerGroupErrorConfig;
use crate::consumer::Consumer;
use crate::errors::BrokerError;
use crate::handler::{ConsumerGroupHandler, ErrorTopicHandler};
use crate::metrics_consts::ERROR_GROUP_TRANSITIONS;
use crate::state::{ConsumerGroupHandlerState, ConsumerGroupStatus, HandlerStatus, TopicStatus};

/// How often the idle monitor inspects the handler state.
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(2);

struct Membership {
    status: ConsumerGroupStatus,
    session: Option<GroupSession>,
    handler: Option<Arc<ErrorTopicHandler>>,
}

/// The error-topic consumer group of one cluster.
///
/// Joined on a cron schedule and left again by the idle monitor once every
/// claimed partition has gone quiet.
pub struct ErrorConsumerGroup {
    config: Arc<ConsumerGroupErrorConfig>,
    consumers: Arc<HashMap<String, Arc<dyn Consumer>>>,
    connector: Arc<dyn GroupConnector>,
    membership: Mutex<Membership>,
    cancellation: CancellationToken,
    scheduled: AtomicBool,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl ErrorConsumerGroup {
    /// Create the group and start its idle monitor.
    ///
    /// `consumers` is keyed by error topic; its keys are the topics the group joins.
    pub fn new(
        config: Arc<ConsumerGroupErrorConfig>,
        consumers: HashMap<String, Arc<dyn Consumer>>,
        connector: Arc<dyn GroupConnector>,
    ) -> Arc<Self> {
        let group = Arc::new(Self {
            config,
            consumers: Arc::new(consumers),
            connector,
            membership: Mutex::new(Membership {
                status: ConsumerGroupStatus::Created,
                session: None,
                handler: None,
            }),
            cancellation: CancellationToken::new(),
            scheduled: AtomicBool::new(false),
            tasks: SyncMutex::new(Vec::new()),
        });

        let monitor = tokio::spawn(Self::monitor_idle(Arc::downgrade(&group), group.cancellation.clone()));
        group.tasks.lock().push(monitor);
        group
    }

    pub fn group_id(&self) -> &str {
        &self.config.group_id
    }

    pub fn config(&self) -> &ConsumerGroupErrorConfig {
        &self.config
    }

    fn has_topics(&self) -> bool {
        !self.consumers.is_empty()
    }

    pub async fn status(&self) -> ConsumerGroupStatus {
        self.membership.lock().await.status
    }

    pub async fn is_subscribed(&self) -> bool {
        self.status().await == ConsumerGroupStatus::Subscribed
    }

    /// Subscribed, with the handler started and every claimed partition
    /// listening or processing.
    pub async fn is_started(&self) -> bool {
        let Some(state) = self.handler_state_if_subscribed().await else {
            return false;
        };
        let snapshot = state.snapshot();
        snapshot.status == HandlerStatus::Started
            && snapshot
                .topics
                .iter()
                .all(|t| matches!(t.status, TopicStatus::Listening | TopicStatus::Started))
    }

    /// State of the current (or last) handler.
    pub async fn handler_state(&self) -> Option<Arc<ConsumerGroupHandlerState>> {
        let membership = self.membership.lock().await;
        membership.handler.as_ref().map(|h| h.state().clone())
    }

    async fn handler_state_if_subscribed(&self) -> Option<Arc<ConsumerGroupHandlerState>> {
        let membership = self.membership.lock().await;
        if membership.status != ConsumerGroupStatus::Subscribed {
            return None;
        }
        membership.handler.as_ref().map(|h| h.state().clone())
    }

    /// Join the group with a fresh handler.
    ///
    /// A no-op when already subscribed or when there are no error topics.
    /// Failures are logged; the next scheduled fire tries again.
    pub async fn subscribe(&self) {
        let mut membership = self.membership.lock().await;
        if membership.status == ConsumerGroupStatus::Subscribed {
            info!(group_id = %self.config.group_id, "Error consumer group is already running");
            return;
        }
        if !self.has_topics() {
            return;
        }

        let handler = Arc::new(ErrorTopicHandler::new(self.config.clone(), self.consumers.clone()));
        match self.connector.connect(handler.clone()) {
            Ok(session) => {
                membership.handler = Some(handler);
                membership.session = Some(session);
                membership.status = ConsumerGroupStatus::Subscribed;
                metrics::counter!(ERROR_GROUP_TRANSITIONS, "group_id" => self.config.group_id.clone(), "action" => "subscribe")
                    .increment(1);
                info!(group_id = %self.config.group_id, topics = ?self.config.topics, "Error consumer group subscribed");
            }
            Err(e) => {
                error!(group_id = %self.config.group_id, error = %e, "Error consumer group subscribe failed");
            }
        }
    }

    /// Leave the group.
    ///
    /// Safe to call concurrently with the idle monitor and on a group that
    /// already left.
    pub async fn unsubscribe(&self) -> Result<(), BrokerError> {
        if !self.has_topics() {
            return Ok(());
        }

        let session = {
            let mut membership = self.membership.lock().await;
            if membership.status == ConsumerGroupStatus::Subscribed {
                membership.status = ConsumerGroupStatus::Unsubscribed;
            }
            membership.session.take()
        };

        if let Some(session) = session {
            session.close().await;
            metrics::counter!(ERROR_GROUP_TRANSITIONS, "group_id" => self.config.group_id.clone(), "action" => "unsubscribe")
                .increment(1);
            info!(group_id = %self.config.group_id, "Error consumer group unsubscribed");
        }
        Ok(())
    }

    /// Start subscribing on the configured cron schedule.
    ///
    /// Calling it again while the scheduler runs has no effect.
    pub fn schedule_to_subscribe(self: &Arc<Self>) -> Result<(), BrokerError> {
        if until_next(&self.config.schedule, Utc::now()).is_none() {
            return Err(BrokerError::schedule(format!(
                "cron expression '{}' never fires, group: {}",
                self.config.cron, self.config.group_id
            )));
        }
        if self.scheduled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.tasks.lock().push(tokio::spawn(Self::run_schedule(
            Arc::downgrade(self),
            self.cancellation.clone(),
        )));
        info!(group_id = %self.config.group_id, cron = %self.config.cron, "Error consumer group scheduled");
        Ok(())
    }

    /// Stop the scheduler and the idle monitor, then leave the group.
    pub async fn shutdown(&self) -> Result<(), BrokerError> {
        self.cancellation.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(group_id = %self.config.group_id, error = %e, "Error consumer group task failed");
            }
        }
        self.unsubscribe().await
    }

    async fn run_schedule(group: Weak<Self>, cancellation: CancellationToken) {
        loop {
            let Some(delay) = group
                .upgrade()
                .and_then(|g| until_next(&g.config.schedule, Utc::now()))
            else {
                break;
            };

            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let Some(group) = group.upgrade() else { break };
            debug!(group_id = %group.config.group_id, "Scheduled subscribe");
            group.subscribe().await;
        }
    }

    async fn monitor_idle(group: Weak<Self>, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(IDLE_CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(group) = group.upgrade() else { break };
            let Some(state) = group.handler_state_if_subscribed().await else {
                continue;
            };

            let thresholds = IdleThresholds {
                no_message: group.config.idle_no_message,
                message_too_fresh: group.config.idle_message_too_fresh,
            };
            if should_unsubscribe(&state.snapshot(), &thresholds, Utc::now()) {
                info!(group_id = %group.config.group_id, "Error consumer group idle, unsubscribing");
                if let Err(e) = group.unsubscribe().await {
                    error!(group_id = %group.config.group_id, error = %e, "Error consumer group unsubscribe failed");
                }
            }
        }
    }
}
