//! rdkafka client settings derived from resolved configs.

use std::env;

use rdkafka::config::ClientConfig;

use super::{ClusterConfig, ConsumerTuning};
use crate::errors::BrokerError;

const PRODUCER_RETRIES: &str = "2";
const PRODUCER_RETRY_BACKOFF_MS: &str = "1500";
const AUTO_COMMIT_INTERVAL_MS: &str = "1000";

/// SASL/SSL credentials for managed clusters.
#[derive(Debug, Clone, Default)]
pub struct SaslCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Custom CA certificate in PEM format.
    pub ssl_ca_pem: Option<String>,
}

impl SaslCredentials {
    /// Read `KAFKA_USERNAME`, `KAFKA_PASSWORD` and `KAFKA_SSL_CA_PEM`.
    pub fn from_env() -> Self {
        Self {
            username: env::var("KAFKA_USERNAME").ok(),
            password: env::var("KAFKA_PASSWORD").ok(),
            ssl_ca_pem: env::var("KAFKA_SSL_CA_PEM").ok(),
        }
    }

    /// Enable SASL/SSL when both username and password are set; plaintext otherwise.
    fn apply(&self, client_config: &mut ClientConfig) {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }
    }
}

fn base_client_config(
    cluster: &ClusterConfig,
    credentials: &SaslCredentials,
) -> Result<ClientConfig, BrokerError> {
    let client_id = cluster.client_id.as_deref().ok_or_else(|| {
        BrokerError::config(format!("client_id is empty in kafka config, cluster: {}", cluster.name))
    })?;

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", cluster.bootstrap_servers())
        .set("client.id", client_id)
        .set("broker.version.fallback", &cluster.version);
    credentials.apply(&mut client_config);

    Ok(client_config)
}

/// Client settings for a cluster's synchronous producer.
pub fn producer_client_config(
    cluster: &ClusterConfig,
    credentials: &SaslCredentials,
) -> Result<ClientConfig, BrokerError> {
    let mut client_config = base_client_config(cluster, credentials)?;
    let producer = &cluster.producer;

    client_config
        .set("acks", producer.required_acks.as_acks())
        .set("request.timeout.ms", producer.timeout.as_millis().to_string())
        .set("message.max.bytes", producer.max_message_bytes.to_string())
        .set("compression.type", producer.compression.as_codec())
        .set("message.send.max.retries", PRODUCER_RETRIES)
        .set("retry.backoff.ms", PRODUCER_RETRY_BACKOFF_MS);

    Ok(client_config)
}

/// Client settings for a consumer group member.
///
/// Offsets are stored only when a message is acknowledged and committed on a
/// fixed interval.
pub fn consumer_client_config(
    cluster: &ClusterConfig,
    group_id: &str,
    tuning: &ConsumerTuning,
    credentials: &SaslCredentials,
) -> Result<ClientConfig, BrokerError> {
    let mut client_config = base_client_config(cluster, credentials)?;

    client_config
        .set("group.id", group_id)
        .set("auto.offset.reset", tuning.offset_initial.as_reset_policy())
        .set("session.timeout.ms", tuning.session_timeout.as_millis().to_string())
        .set("heartbeat.interval.ms", tuning.heartbeat_interval.as_millis().to_string())
        .set("max.poll.interval.ms", tuning.rebalance_timeout.as_millis().to_string())
        .set("max.partition.fetch.bytes", tuning.fetch_max_bytes.to_string())
        .set("partition.assignment.strategy", "cooperative-sticky")
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", AUTO_COMMIT_INTERVAL_MS)
        .set("enable.auto.offset.store", "false");

    Ok(client_config)
}
