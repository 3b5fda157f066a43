//! JSON-over-HTTP requests with bounded retries.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::AdvertApiSettings;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("[{client}] unexpected status {status}: {body}")]
    Status {
        client: String,
        status: u16,
        body: String,
    },
    #[error("[{client}] request failed: {reason}")]
    Transport { client: String, reason: String },
    #[error("[{client}] invalid response body: {reason}")]
    Decode { client: String, reason: String },
    #[error("[{client}] invalid client configuration: {reason}")]
    Build { client: String, reason: String },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Transport failures and server errors are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A named HTTP client for one upstream service.
///
/// Every request is retried up to `max_attempts` times with a fixed backoff
/// while it fails with a transport error or a 5xx. A 404 is returned as
/// [`ClientError::NotFound`] immediately.
pub struct HttpClient {
    name: String,
    base_url: String,
    client: ReqwestClient,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    pub fn new(name: impl Into<String>, settings: &AdvertApiSettings) -> Result<Self, ClientError> {
        let name = name.into();
        let client = ReqwestClient::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout())
            .pool_max_idle_per_host(settings.max_idle_connections)
            .pool_idle_timeout(settings.idle_timeout())
            .build()
            .map_err(|e| ClientError::Build {
                client: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name,
            base_url: settings.url.trim_end_matches('/').to_string(),
            client,
            max_attempts: settings.max_attempts.max(1),
            retry_backoff: settings.retry_backoff(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let retry = FixedInterval::new(self.retry_backoff).take(self.max_attempts.saturating_sub(1) as usize);
        let mut attempt = 0u32;

        RetryIf::spawn(
            retry,
            || self.try_get_json(&url),
            |e: &ClientError| {
                attempt += 1;
                let retryable = e.is_retryable();
                if retryable && attempt < self.max_attempts {
                    warn!(
                        client = %self.name,
                        url = %url,
                        attempt,
                        error = %e,
                        "Request failed, retrying"
                    );
                }
                retryable
            },
        )
        .await
    }

    async fn try_get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                client: self.name.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                client: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(client = %self.name, url = %url, "Request succeeded");
        response.json::<T>().await.map_err(|e| ClientError::Decode {
            client: self.name.clone(),
            reason: e.to_string(),
        })
    }
}
