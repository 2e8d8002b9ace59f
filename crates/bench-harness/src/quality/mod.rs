//! Outlier filtering and variance gating of a target's runs
//!
//! ```text
//! RunSet ──► OutlierReport (rps) ──┐
//!        └─► OutlierReport (p95) ──┴─► FilteredRunSet ──► VarianceResult per metric
//! ```

pub mod filter;
pub mod variance;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::RunSample;

pub use filter::FilteredRunSet;
pub use variance::{
    evaluate_target, CheckStatus, ExcludedRun, TargetVariance, VarianceResult, VarianceSummary,
    VarianceViolation, QUALITY_SCHEMA_VERSION,
};

/// A per-run metric tracked by the quality pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "rps")]
    Rps,
    #[serde(rename = "latency_ms_p50")]
    LatencyP50,
    #[serde(rename = "latency_ms_p95")]
    LatencyP95,
    #[serde(rename = "latency_ms_p99")]
    LatencyP99,
}

impl Metric {
    /// Metrics gated on coefficient of variation
    pub const VARIANCE_GATED: [Metric; 3] = [Metric::Rps, Metric::LatencyP95, Metric::LatencyP99];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rps => "rps",
            Metric::LatencyP50 => "latency_ms_p50",
            Metric::LatencyP95 => "latency_ms_p95",
            Metric::LatencyP99 => "latency_ms_p99",
        }
    }

    pub fn value(&self, run: &RunSample) -> f64 {
        match self {
            Metric::Rps => run.rps,
            Metric::LatencyP50 => run.latency_ms_p50,
            Metric::LatencyP95 => run.latency_ms_p95,
            Metric::LatencyP99 => run.latency_ms_p99,
        }
    }

    /// Extract this metric from each run, in run order.
    pub fn values(&self, runs: &[RunSample]) -> Vec<f64> {
        runs.iter().map(|r| self.value(r)).collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
