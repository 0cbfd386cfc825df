use crate::error::FetchError;
use crate::outcome::{Outcome, SkipReason};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Retry policy for a single file download.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Also retry connection-level errors instead of failing the item.
    pub retry_transport: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            attempts: 3,
            retry_delay: Duration::from_secs(5),
            retry_transport: false,
        }
    }
}

enum Attempt {
    Body(String),
    Status(StatusCode),
}

/// Downloads one CSV body, retrying on non-success status.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: FetchPolicy) -> Self {
        Fetcher { client, policy }
    }

    async fn get_text(&self, url: &str) -> Result<Attempt, reqwest::Error> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(Attempt::Status(status));
        }
        Ok(Attempt::Body(resp.text().await?))
    }

    /// Returns the body, or the absent marker once every attempt has come
    /// back with a non-success status. Transport errors are only retried
    /// when the policy opts in; otherwise they fail the item.
    #[instrument(level = "debug", skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<Outcome<String>, FetchError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.get_text(url).await {
                Ok(Attempt::Body(text)) => {
                    debug!(attempt, bytes = text.len(), "fetched");
                    return Ok(Outcome::Present(text));
                }
                Ok(Attempt::Status(status)) if attempt >= attempts => {
                    warn!(%url, %status, attempts, "Failed to fetch CSV");
                    return Ok(Outcome::Absent(SkipReason::FetchExhausted {
                        status: status.as_u16(),
                    }));
                }
                Ok(Attempt::Status(status)) => {
                    debug!(
                        attempt,
                        %status,
                        delay_ms = self.policy.retry_delay.as_millis() as u64,
                        "non-success status, retrying"
                    );
                }
                Err(e) if self.policy.retry_transport && attempt < attempts => {
                    debug!(
                        attempt,
                        error = %e,
                        delay_ms = self.policy.retry_delay.as_millis() as u64,
                        "transport error, retrying"
                    );
                }
                Err(source) => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            }
            sleep(self.policy.retry_delay).await;
        }
    }
}
