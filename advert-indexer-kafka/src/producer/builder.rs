use std::sync::Arc;

use rdkafka::producer::FutureProducer;
use tracing::info;

use super::{KafkaSyncProducer, Producer, SyncProducer};
use crate::config::{producer_client_config, ClusterSettings, NamedConfigs, ProducerTopic, SaslCredentials};
use crate::errors::BrokerError;

/// Creates one synchronous producer per configured cluster.
pub struct ProducerBuilder {
    clusters: NamedConfigs<ClusterSettings>,
    topics: NamedConfigs<ProducerTopic>,
    credentials: SaslCredentials,
}

impl ProducerBuilder {
    pub fn new(clusters: NamedConfigs<ClusterSettings>) -> Self {
        Self::with_topics(clusters, NamedConfigs::default())
    }

    pub fn with_topics(clusters: NamedConfigs<ClusterSettings>, topics: NamedConfigs<ProducerTopic>) -> Self {
        Self {
            clusters,
            topics,
            credentials: SaslCredentials::from_env(),
        }
    }

    pub fn with_credentials(mut self, credentials: SaslCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Resolve every cluster and connect its producer.
    pub fn initialize(&self) -> Result<Producer, BrokerError> {
        let mut sync_producers: Vec<(String, Arc<dyn SyncProducer>)> = Vec::with_capacity(self.clusters.len());

        for (name, _) in self.clusters.iter() {
            let cluster = self.clusters.config_with_default(name)?;
            let producer: FutureProducer = producer_client_config(&cluster, &self.credentials)?
                .create()
                .map_err(|e| BrokerError::connection(format!("cluster {name}: {e}")))?;

            info!(
                cluster = %name,
                brokers = %cluster.bootstrap_servers(),
                acks = cluster.producer.required_acks.as_acks(),
                compression = cluster.producer.compression.as_codec(),
                "Created sync producer"
            );

            sync_producers.push((
                name.to_string(),
                Arc::new(KafkaSyncProducer::new(name, producer, cluster.producer.timeout)),
            ));
        }

        Ok(Producer::new(sync_producers, self.topics.clone()))
    }
}
