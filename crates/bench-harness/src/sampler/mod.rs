//! Timed HTTP sampling of one target
//!
//! The sampler runs a best-effort warmup, then `runs` independent batches of
//! `requests` sequential requests, and writes one raw artifact for the target.
//!
//! ```text
//! warmup (first success = startup time)
//!   │
//!   ├─ batch 0 ─► RunSample      (dropped if no request succeeded)
//!   ├─ batch 1 ─► RunSample
//!   └─ ...
//!         │
//!         ▼
//!   FilteredRunSet ─► median / quality block ─► RawRecord (raw-v1)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bench_harness::config::SamplerConfig;
//! use bench_harness::sampler::{Sampler, Target};
//! use bench_harness::config::QualityPolicy;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let sampler = Sampler::new(SamplerConfig::default(), QualityPolicy::default())?;
//! let target = Target::new("modkit", "http://localhost:3001", "/health", "passed");
//! let record = sampler.measure(&target).await?;
//! println!("{:?}", record.status);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod hyperfine;
pub mod resources;

use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::artifact::{
    write_json, BenchmarkBlock, MetricUnits, RawRecord, RunSample, TargetStatus,
    RAW_SCHEMA_VERSION, REQUESTS_FAILED_REASON,
};
use crate::config::{Engine, QualityPolicy, SamplerConfig};
use crate::error::Result;
use crate::quality::FilteredRunSet;
use crate::stats::LatencyPercentiles;

pub use http::{run_batch, BatchOutcome, HttpProbe, ProbeError, ReqwestProbe};
pub use hyperfine::HyperfineEngine;

/// Service under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Framework identifier, also used to find its container
    pub framework: String,
    /// Base URL, e.g. `http://localhost:3001`
    pub base_url: String,
    /// Path appended to the base URL, e.g. `/health`
    pub endpoint: String,
    /// Externally produced parity verdict copied into the artifact
    pub parity: String,
}

impl Target {
    pub fn new(framework: &str, base_url: &str, endpoint: &str, parity: &str) -> Self {
        Self {
            framework: framework.to_string(),
            base_url: base_url.to_string(),
            endpoint: endpoint.to_string(),
            parity: parity.to_string(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint)
    }
}

impl RunSample {
    /// Summarize one batch from its successful request durations.
    ///
    /// `requests` is the configured batch size; throughput is
    /// `requests / sum(durations)`, or 0 for a zero total. Returns `None`
    /// when no request succeeded.
    pub fn from_batch(requests: u32, durations: &[Duration]) -> Option<Self> {
        let latencies_ms: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        let latency = LatencyPercentiles::from_samples(&latencies_ms)?;

        let total: f64 = durations.iter().map(Duration::as_secs_f64).sum();
        let rps = if total > 0.0 {
            f64::from(requests) / total
        } else {
            0.0
        };

        Some(RunSample {
            requests,
            duration_seconds: total,
            rps,
            latency_ms_p50: latency.p50,
            latency_ms_p95: latency.p95,
            latency_ms_p99: latency.p99,
            latency_ms_max: latency.max,
        })
    }
}

/// Raw runs collected for one target, before any statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSet {
    pub runs: Vec<RunSample>,
    /// Latency of the first successful warmup request
    pub startup: Option<Duration>,
}

/// Drives warmup and measured batches against one target at a time.
pub struct Sampler<P: HttpProbe = ReqwestProbe> {
    probe: P,
    config: SamplerConfig,
    quality: QualityPolicy,
    hyperfine: HyperfineEngine,
}

impl Sampler<ReqwestProbe> {
    /// Sampler using the real HTTP client
    pub fn new(config: SamplerConfig, quality: QualityPolicy) -> anyhow::Result<Self> {
        Ok(Self::with_probe(ReqwestProbe::new()?, config, quality))
    }
}

impl<P: HttpProbe> Sampler<P> {
    pub fn with_probe(probe: P, config: SamplerConfig, quality: QualityPolicy) -> Self {
        Self {
            probe,
            config,
            quality,
            hyperfine: HyperfineEngine::default(),
        }
    }

    /// Replace the hyperfine engine settings
    pub fn with_hyperfine(mut self, hyperfine: HyperfineEngine) -> Self {
        self.hyperfine = hyperfine;
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Warmup then measured batches, timed request by request.
    #[instrument(skip(self))]
    pub async fn sample_legacy(&self, url: &str) -> RunSet {
        let timeout = self.config.timeout;

        let mut startup = None;
        for _ in 0..self.config.warmup_requests {
            if let Ok(elapsed) = self.probe.request(url, timeout).await {
                startup.get_or_insert(elapsed);
            }
        }

        let mut runs = Vec::with_capacity(self.config.runs as usize);
        for run_index in 0..self.config.runs {
            let batch = run_batch(&self.probe, url, self.config.benchmark_requests, timeout).await;
            match RunSample::from_batch(self.config.benchmark_requests, &batch.durations) {
                Some(run) => runs.push(run),
                None => warn!("Run {} produced no successful requests, dropping it", run_index),
            }
        }

        RunSet { runs, startup }
    }

    /// Sample a target and build its raw record.
    ///
    /// A target whose every batch failed yields a `skipped` record rather
    /// than an error. Errors come only from the hyperfine engine.
    #[instrument(skip(self, target), fields(framework = %target.framework))]
    pub async fn measure(&self, target: &Target) -> Result<RawRecord> {
        let url = target.url();
        let started = Instant::now();

        let run_set = match self.config.engine {
            Engine::Legacy => self.sample_legacy(&url).await,
            Engine::Hyperfine => RunSet {
                runs: self
                    .hyperfine
                    .measure(
                        &url,
                        self.config.benchmark_requests,
                        self.config.runs,
                        self.config.timeout,
                    )
                    .await?,
                startup: None,
            },
        };

        let record = self.build_record(target, run_set).await;
        info!(
            "Sampled {} in {}ms: {:?}",
            target.framework,
            started.elapsed().as_millis(),
            record.status
        );
        Ok(record)
    }

    /// Sample a target and write its raw artifact to `out_file`.
    pub async fn measure_to_file(&self, target: &Target, out_file: &Path) -> Result<RawRecord> {
        let record = self.measure(target).await?;
        write_json(out_file, &record)?;
        Ok(record)
    }

    async fn build_record(&self, target: &Target, run_set: RunSet) -> RawRecord {
        let engine = self.config.engine;
        let filtered = FilteredRunSet::from_runs(&run_set.runs);

        let Some(median) = filtered.median() else {
            warn!("SKIP {}: {}", target.framework, REQUESTS_FAILED_REASON);
            return RawRecord::skipped(
                &target.framework,
                &target.base_url,
                REQUESTS_FAILED_REASON,
                &target.parity,
                engine,
            );
        };

        let docker = if self.config.collect_docker_stats {
            resources::collect_docker_stats(&target.framework).await
        } else {
            Default::default()
        };
        let startup_ms = run_set.startup.map(|d| d.as_secs_f64() * 1000.0);
        let resources_normalized = resources::normalize(&docker, startup_ms);

        info!(
            "OK {}: median_rps={:.2} p50={:.2}ms p95={:.2}ms p99={:.2}ms",
            target.framework,
            median.rps,
            median.latency_ms_p50,
            median.latency_ms_p95,
            median.latency_ms_p99
        );

        RawRecord {
            schema_version: RAW_SCHEMA_VERSION.to_string(),
            framework: target.framework.clone(),
            target: target.base_url.clone(),
            status: TargetStatus::Ok,
            reason: None,
            parity: Some(target.parity.clone()),
            engine: Some(engine),
            metric_units: Some(MetricUnits::default()),
            benchmark: Some(BenchmarkBlock {
                endpoint: target.endpoint.clone(),
                warmup_requests: self.config.warmup_requests,
                requests_per_run: self.config.benchmark_requests,
                runs: self.config.runs,
                quality: filtered.quality_block(&self.quality),
                median,
                run_stats: run_set.runs,
            }),
            docker: Some(docker),
            resources_normalized: Some(resources_normalized),
        }
    }
}
