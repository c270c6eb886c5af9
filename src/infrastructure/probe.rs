//! Unauthenticated HTTP(S) reachability checks

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Whether `url` answers with HTTP 200. `relaxed_tls` skips certificate
    /// validation for nodes serving self-signed certificates.
    async fn is_reachable(&self, url: &str, relaxed_tls: bool) -> bool;
}

pub struct HttpProbe {
    strict: reqwest::Client,
    relaxed: reqwest::Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let strict = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        let relaxed = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            strict,
            relaxed,
            attempts: 3,
            retry_delay: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn is_reachable(&self, url: &str, relaxed_tls: bool) -> bool {
        let parsed = match url::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(url, error = %e, "Invalid probe URL");
                return false;
            }
        };
        let client = if relaxed_tls { &self.relaxed } else { &self.strict };

        for attempt in 1..=self.attempts {
            match client.get(parsed.clone()).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::OK => return true,
                Ok(response) => {
                    debug!(url, attempt, status = %response.status(), "Probe answered");
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "Probe failed");
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        false
    }
}
