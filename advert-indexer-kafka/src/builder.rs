//! Top-level wiring: producers, main-topic consumer groups and one error
//! consumer group per cluster.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{
    consumer_client_config, ClusterConfig, ConsumerGroupConfig, ConsumerGroupErrorConfig, ErrorGroupSettings,
    KafkaSettings, SaslCredentials,
};
use crate::consumer::{Consumer, ConsumerGroupConsumers};
use crate::default_error_consumer::DefaultErrorConsumer;
use crate::errors::BrokerError;
use crate::group::{ConsumerGroup, ErrorConsumerGroup, GroupConnector, KafkaGroupConnector, RevokeBehavior};
use crate::producer::{Producer, ProducerBuilder};

/// Creates the group connectors used by the builder.
pub trait ConnectorFactory: Send + Sync {
    fn main_group(
        &self,
        cluster: &ClusterConfig,
        config: &ConsumerGroupConfig,
    ) -> Result<Arc<dyn GroupConnector>, BrokerError>;

    fn error_group(
        &self,
        cluster: &ClusterConfig,
        config: &ConsumerGroupErrorConfig,
    ) -> Result<Arc<dyn GroupConnector>, BrokerError>;
}

/// Connects groups through rdkafka.
pub struct KafkaConnectorFactory {
    credentials: SaslCredentials,
}

impl KafkaConnectorFactory {
    pub fn new(credentials: SaslCredentials) -> Self {
        Self { credentials }
    }
}

impl ConnectorFactory for KafkaConnectorFactory {
    fn main_group(
        &self,
        cluster: &ClusterConfig,
        config: &ConsumerGroupConfig,
    ) -> Result<Arc<dyn GroupConnector>, BrokerError> {
        let client_config = consumer_client_config(cluster, &config.group_id, &config.tuning, &self.credentials)?;
        Ok(Arc::new(KafkaGroupConnector::new(
            &config.group_id,
            config.topics(),
            client_config,
            RevokeBehavior::StopPartitions,
        )))
    }

    fn error_group(
        &self,
        cluster: &ClusterConfig,
        config: &ConsumerGroupErrorConfig,
    ) -> Result<Arc<dyn GroupConnector>, BrokerError> {
        let client_config = consumer_client_config(cluster, &config.group_id, &config.tuning, &self.credentials)?;
        Ok(Arc::new(KafkaGroupConnector::new(
            &config.group_id,
            config.topics.clone(),
            client_config,
            RevokeBehavior::EndSession,
        )))
    }
}

/// Everything the builder started.
pub struct Consumers {
    pub producer: Producer,
    /// Main-topic consumer groups by group id.
    pub consumer_groups: HashMap<String, Arc<ConsumerGroup>>,
    /// Error consumer groups by group id.
    pub error_consumer_groups: HashMap<String, Arc<ErrorConsumerGroup>>,
}

impl Consumers {
    /// Unsubscribe every group. Individual failures are logged.
    pub async fn shutdown(&self) {
        for (group_id, group) in &self.consumer_groups {
            if let Err(e) = group.unsubscribe().await {
                error!(group_id = %group_id, error = %e, "Failed to unsubscribe consumer group");
            }
        }
        for (group_id, group) in &self.error_consumer_groups {
            if let Err(e) = group.shutdown().await {
                error!(group_id = %group_id, error = %e, "Failed to unsubscribe error consumer group");
            }
        }
        info!("All consumer groups unsubscribed");
    }
}

/// An error consumer group assembled from a cluster's error policy.
pub struct ErrorGroupPlan {
    pub cluster: ClusterConfig,
    pub config: ConsumerGroupErrorConfig,
    /// Consumer per error topic.
    pub consumers: HashMap<String, Arc<dyn Consumer>>,
}

/// Resolves consumer configs, subscribes their groups and schedules the
/// error consumer group of each cluster with an error policy.
pub struct ConsumerBuilder {
    settings: KafkaSettings,
    consumers: Vec<ConsumerGroupConsumers>,
    credentials: SaslCredentials,
}

impl ConsumerBuilder {
    pub fn new(settings: KafkaSettings, consumers: Vec<ConsumerGroupConsumers>) -> Self {
        Self {
            settings,
            consumers,
            credentials: SaslCredentials::from_env(),
        }
    }

    pub fn with_credentials(mut self, credentials: SaslCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Connect producers and start every consumer group.
    pub async fn initialize(&self) -> Result<Consumers, BrokerError> {
        let producer = ProducerBuilder::with_topics(
            self.settings.clusters.clone(),
            self.settings.producer_topics.clone(),
        )
        .with_credentials(self.credentials.clone())
        .initialize()?;

        self.initialize_with(producer, &KafkaConnectorFactory::new(self.credentials.clone()))
            .await
    }

    /// Start every consumer group over the given producer and connectors.
    pub async fn initialize_with(
        &self,
        producer: Producer,
        connectors: &dyn ConnectorFactory,
    ) -> Result<Consumers, BrokerError> {
        let resolved = self.resolve_consumer_groups()?;

        let mut consumer_groups = HashMap::with_capacity(resolved.len());
        for (config, consumers) in &resolved {
            let cluster = self.settings.clusters.config_with_default(&config.cluster)?;
            let sync_producer = producer.sync_producer(&config.cluster)?;
            let connector = connectors.main_group(&cluster, config)?;

            let group = Arc::new(ConsumerGroup::new(
                config.clone(),
                consumers.consumer.clone(),
                sync_producer,
                connector,
            ));
            group.subscribe().await?;
            consumer_groups.insert(config.group_id.clone(), group);
        }

        let mut error_consumer_groups = HashMap::new();
        for plan in self.plan_error_groups(&resolved, &producer)? {
            let connector = connectors.error_group(&plan.cluster, &plan.config)?;
            let group_id = plan.config.group_id.clone();
            let group = ErrorConsumerGroup::new(Arc::new(plan.config), plan.consumers, connector);
            group.schedule_to_subscribe()?;
            error_consumer_groups.insert(group_id, group);
        }

        info!(
            consumer_groups = consumer_groups.len(),
            error_consumer_groups = error_consumer_groups.len(),
            "Kafka consumers initialized"
        );

        Ok(Consumers {
            producer,
            consumer_groups,
            error_consumer_groups,
        })
    }

    fn resolve_consumer_groups(
        &self,
    ) -> Result<Vec<(Arc<ConsumerGroupConfig>, ConsumerGroupConsumers)>, BrokerError> {
        self.consumers
            .iter()
            .map(|consumers| {
                let config = self
                    .settings
                    .consumer_groups
                    .config_with_default(&consumers.config_name)?;
                Ok((Arc::new(config), consumers.clone()))
            })
            .collect()
    }

    /// Assemble one error consumer group per cluster with an error policy.
    ///
    /// Error topics come from the enabled consumer groups of the cluster; each
    /// topic gets its group's error consumer, or the default error consumer
    /// over the cluster's producer.
    pub fn plan_error_groups(
        &self,
        resolved: &[(Arc<ConsumerGroupConfig>, ConsumerGroupConsumers)],
        producer: &Producer,
    ) -> Result<Vec<ErrorGroupPlan>, BrokerError> {
        let mut plans = Vec::new();

        for (name, _) in self.settings.clusters.iter() {
            let cluster = self.settings.clusters.config_with_default(name)?;
            let Some(policy) = cluster.error.clone() else {
                continue;
            };

            let on_cluster: Vec<_> = resolved
                .iter()
                .filter(|(config, _)| config.cluster.eq_ignore_ascii_case(name))
                .collect();
            if on_cluster.is_empty() {
                continue;
            }

            let mut topics = BTreeSet::new();
            let mut consumers: HashMap<String, Arc<dyn Consumer>> = HashMap::new();
            for (config, group_consumers) in on_cluster {
                if !config.is_error_consumer_enabled() {
                    continue;
                }
                let Some(error_topic) = config.error.clone() else {
                    continue;
                };

                let consumer = match &group_consumers.error_consumer {
                    Some(consumer) => consumer.clone(),
                    None => Arc::new(DefaultErrorConsumer::new(producer.sync_producer(name)?)) as Arc<dyn Consumer>,
                };
                consumers.insert(error_topic.clone(), consumer);
                topics.insert(error_topic);
            }

            if topics.is_empty() {
                debug!(cluster = %name, "No error topics on cluster, skipping error consumer group");
                continue;
            }

            let config = ErrorGroupSettings::from_policy(name, &policy, topics).resolve(name)?;
            plans.push(ErrorGroupPlan {
                cluster,
                config,
                consumers,
            });
        }

        Ok(plans)
    }
}
