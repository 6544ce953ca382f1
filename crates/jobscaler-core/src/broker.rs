//! Broker Probe: queue depth/unacked lookups against the message broker's
//! management HTTP API. Tolerant of broker outages by design - a failed
//! probe must never propagate past this module.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::BrokerConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Adapter over the message broker. Implementations must tolerate broker
/// unavailability by returning `(0, 0)` rather than erroring.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn queue_stats(&self, queue: &str) -> (i64, i64);
}

/// RabbitMQ management-API-backed [`BrokerClient`].
pub struct RabbitMqBrokerClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl RabbitMqBrokerClient {
    pub fn new(config: &BrokerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: format!("http://{}:{}", config.host, config.management_port),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueueDetail {
    #[serde(default)]
    messages_ready: i64,
    #[serde(default)]
    messages_unacknowledged: i64,
}

#[async_trait]
impl BrokerClient for RabbitMqBrokerClient {
    async fn queue_stats(&self, queue: &str) -> (i64, i64) {
        let url = format!("{}/api/queues/%2F/{}", self.base_url, queue);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(queue, error = %e, "broker probe failed, treating as empty");
                return (0, 0);
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(queue, "queue does not exist");
            return (0, 0);
        }

        if !response.status().is_success() {
            tracing::warn!(queue, status = %response.status(), "broker probe returned non-success status");
            return (0, 0);
        }

        match response.json::<QueueDetail>().await {
            Ok(detail) => (detail.messages_ready, detail.messages_unacknowledged),
            Err(e) => {
                tracing::warn!(queue, error = %e, "broker probe returned unparseable body");
                (0, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBroker {
        ready: i64,
        unacked: i64,
    }

    #[async_trait]
    impl BrokerClient for FakeBroker {
        async fn queue_stats(&self, _queue: &str) -> (i64, i64) {
            (self.ready, self.unacked)
        }
    }

    #[tokio::test]
    async fn fake_client_reports_configured_stats() {
        let broker = FakeBroker { ready: 25, unacked: 0 };
        assert_eq!(broker.queue_stats("q").await, (25, 0));
    }
}
