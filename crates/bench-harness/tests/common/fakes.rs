//! In-process stand-ins for the network and the comparison tool

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bench_harness::artifact::RunSample;
use bench_harness::config::SamplerConfig;
use bench_harness::regression::ComparisonTool;
use bench_harness::sampler::{HttpProbe, ProbeError};
use bench_harness::HarnessError;

/// Every request succeeds after a fixed latency
pub struct FixedProbe(pub Duration);

#[async_trait]
impl HttpProbe for FixedProbe {
    async fn request(&self, _url: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        Ok(self.0)
    }
}

/// Every request is refused
pub struct RefusingProbe {
    pub calls: AtomicUsize,
}

impl RefusingProbe {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpProbe for RefusingProbe {
    async fn request(&self, _url: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProbeError::Connection("connection refused".to_string()))
    }
}

/// Replays fixed comparison output
pub struct CannedTool(pub &'static str);

#[async_trait]
impl ComparisonTool for CannedTool {
    fn name(&self) -> &str {
        "canned"
    }

    async fn compare(&self, _baseline: &Path, _candidate: &Path) -> bench_harness::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Exits non-zero with the given stderr on every comparison
pub struct FailingTool(pub &'static str);

#[async_trait]
impl ComparisonTool for FailingTool {
    fn name(&self) -> &str {
        "benchstat"
    }

    async fn compare(&self, _baseline: &Path, _candidate: &Path) -> bench_harness::Result<String> {
        Err(HarnessError::ToolFailed {
            tool: self.name().to_string(),
            output: self.0.to_string(),
        })
    }
}

pub fn sampler_config(runs: u32, requests: u32) -> SamplerConfig {
    SamplerConfig {
        warmup_requests: 2,
        benchmark_requests: requests,
        runs,
        collect_docker_stats: false,
        ..SamplerConfig::default()
    }
}

pub fn run(rps: f64, p95: f64) -> RunSample {
    RunSample {
        requests: 100,
        duration_seconds: 100.0 / rps,
        rps,
        latency_ms_p50: p95 / 2.0,
        latency_ms_p95: p95,
        latency_ms_p99: p95 * 1.25,
        latency_ms_max: p95 * 2.0,
    }
}

/// Latency fixed per batch, following a schedule
///
/// Assumes no warmup requests, so call `n` belongs to batch `n / batch_size`.
pub struct BatchScheduleProbe {
    pub batch_size: usize,
    pub latencies: Vec<Duration>,
    calls: AtomicUsize,
}

impl BatchScheduleProbe {
    pub fn new(batch_size: usize, latencies: Vec<Duration>) -> Self {
        Self {
            batch_size,
            latencies,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpProbe for BatchScheduleProbe {
    async fn request(&self, _url: &str, _timeout: Duration) -> Result<Duration, ProbeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let batch = call / self.batch_size;
        Ok(self.latencies[batch % self.latencies.len()])
    }
}
