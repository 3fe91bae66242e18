//! Fetch collaborator: retrieve raw document bytes from a URL.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while fetching or storing document bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP layer failed before receiving a complete response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status.
    #[error("Unexpected response status {status} from {url}")]
    UnexpectedStatus {
        /// Status returned by the server.
        status: StatusCode,
        /// URL that was requested.
        url: String,
    },
    /// Writing the fetched bytes to local storage failed.
    #[error("Failed to write fetched bytes: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Io(_) => false,
        }
    }
}

/// Interface implemented by document transports.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the full body at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Retry policy applied to transient fetch failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// `reqwest`-backed fetcher with bounded exponential backoff.
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Build a fetcher with the given request timeout and retry policy.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("docdigest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        tracing::debug!(
            timeout_ms = timeout.as_millis() as u64,
            max_retries = retry.max_retries,
            "Initialized HTTP fetcher"
        );
        Ok(Self { client, retry })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) if error.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
