//! HTTP request primitive and sequential request batches.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Why a single request did not count as a success
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Issues one request and reports how long it took.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Request `url`, read the full body, and return the elapsed time.
    async fn request(&self, url: &str, timeout: Duration) -> Result<Duration, ProbeError>;
}

/// [`HttpProbe`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn request(&self, url: &str, timeout: Duration) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                ProbeError::Timeout(timeout)
            } else if e.is_connect() {
                ProbeError::Connection(e.to_string())
            } else {
                ProbeError::Protocol(e.to_string())
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        response.bytes().await.map_err(classify)?;
        Ok(start.elapsed())
    }
}

/// Durations of the successful requests in one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub durations: Vec<Duration>,
    pub failures: usize,
}

impl BatchOutcome {
    pub fn successes(&self) -> usize {
        self.durations.len()
    }
}

/// Send `requests` requests one after another, keeping only successes.
///
/// Failed requests are counted and otherwise ignored; they never abort the
/// batch.
pub async fn run_batch<P: HttpProbe + ?Sized>(
    probe: &P,
    url: &str,
    requests: u32,
    timeout: Duration,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for _ in 0..requests {
        match probe.request(url, timeout).await {
            Ok(elapsed) => outcome.durations.push(elapsed),
            Err(e) => {
                debug!("Request to {} failed: {}", url, e);
                outcome.failures += 1;
            }
        }
    }
    outcome
}
