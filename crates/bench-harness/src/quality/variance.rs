//! Coefficient-of-variation gating per target.

use serde::{Deserialize, Serialize};

use super::{FilteredRunSet, Metric};
use crate::artifact::{ExclusionReason, RawRecord};
use crate::config::VarianceThresholds;

/// Schema tag of the variance summary record
pub const QUALITY_SCHEMA_VERSION: &str = "quality-v1";

/// cv of one metric over the filtered runs, against its threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceResult {
    pub metric: Metric,
    pub cv: f64,
    pub threshold: f64,
    /// Runs the cv was computed from
    pub samples: usize,
    /// Runs left out as outliers before computing the cv
    pub excluded_samples: usize,
}

impl VarianceResult {
    /// A metric violates only when its cv strictly exceeds the threshold.
    pub fn violates(&self) -> bool {
        self.cv > self.threshold
    }
}

/// Threshold breach with a human-readable diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceViolation {
    pub framework: String,
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Provenance of one excluded run in the summary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedRun {
    pub run_index: usize,
    pub reasons: Vec<ExclusionReason>,
}

/// Variance outcome for one successful target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetVariance {
    pub framework: String,
    pub effective_runs: usize,
    pub excluded_samples: Vec<ExcludedRun>,
    pub results: Vec<VarianceResult>,
    pub violations: Vec<VarianceViolation>,
}

impl TargetVariance {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

fn threshold_for(thresholds: &VarianceThresholds, metric: Metric) -> Option<f64> {
    match metric {
        Metric::Rps => Some(thresholds.rps),
        Metric::LatencyP95 => Some(thresholds.latency_ms_p95),
        Metric::LatencyP99 => Some(thresholds.latency_ms_p99),
        Metric::LatencyP50 => None,
    }
}

/// Evaluate every variance-gated metric of one target.
///
/// # Examples
///
/// ```
/// use bench_harness::artifact::RunSample;
/// use bench_harness::config::VarianceThresholds;
/// use bench_harness::quality::{evaluate_target, FilteredRunSet};
///
/// let run = |rps: f64| RunSample {
///     requests: 100,
///     duration_seconds: 100.0 / rps,
///     rps,
///     latency_ms_p50: 1.0,
///     latency_ms_p95: 2.0,
///     latency_ms_p99: 3.0,
///     latency_ms_max: 4.0,
/// };
/// let filtered = FilteredRunSet::from_runs(&[run(1000.0), run(500.0)]);
/// let outcome = evaluate_target("modkit", &filtered, &VarianceThresholds::default());
///
/// assert!(!outcome.passed());
/// assert!(outcome.violations[0].message.contains("rps"));
/// ```
pub fn evaluate_target(
    framework: &str,
    filtered: &FilteredRunSet,
    thresholds: &VarianceThresholds,
) -> TargetVariance {
    let samples = filtered.runs().len();
    let excluded = filtered.excluded_count();

    let mut results = Vec::new();
    let mut violations = Vec::new();
    for metric in Metric::VARIANCE_GATED {
        let Some(threshold) = threshold_for(thresholds, metric) else {
            continue;
        };
        let result = VarianceResult {
            metric,
            cv: filtered.cv(metric),
            threshold,
            samples,
            excluded_samples: excluded,
        };

        if result.violates() {
            violations.push(VarianceViolation {
                framework: framework.to_string(),
                metric,
                value: result.cv,
                threshold,
                message: format!(
                    "{}: {} cv {:.4} exceeds threshold {:.4} ({} run(s) used, {} excluded as outliers)",
                    framework, metric, result.cv, threshold, samples, excluded
                ),
            });
        }
        results.push(result);
    }

    TargetVariance {
        framework: framework.to_string(),
        effective_runs: samples,
        excluded_samples: filtered
            .excluded()
            .iter()
            .map(|e| ExcludedRun {
                run_index: e.run_index,
                reasons: e.reasons.clone(),
            })
            .collect(),
        results,
        violations,
    }
}

/// Overall check status shared by summary records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
}

/// Quality/variance summary record written by `variance-check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceSummary {
    pub schema_version: String,
    pub generated_at: String,
    pub status: CheckStatus,
    pub thresholds: VarianceThresholds,
    pub targets: Vec<TargetVariance>,
}

impl VarianceSummary {
    /// Assemble the summary; `Skipped` when no target was evaluated.
    pub fn new(thresholds: VarianceThresholds, targets: Vec<TargetVariance>) -> Self {
        let status = if targets.is_empty() {
            CheckStatus::Skipped
        } else if targets.iter().all(TargetVariance::passed) {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        VarianceSummary {
            schema_version: QUALITY_SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            status,
            thresholds,
            targets,
        }
    }

    /// Filter and evaluate every `ok` record; skipped records are ignored.
    pub fn from_records(thresholds: VarianceThresholds, records: &[RawRecord]) -> Self {
        let targets = records
            .iter()
            .filter(|record| record.is_ok())
            .map(|record| {
                let filtered = FilteredRunSet::from_runs(record.run_stats());
                evaluate_target(&record.framework, &filtered, &thresholds)
            })
            .collect();
        Self::new(thresholds, targets)
    }

    pub fn violations(&self) -> impl Iterator<Item = &VarianceViolation> {
        self.targets.iter().flat_map(|t| t.violations.iter())
    }
}
