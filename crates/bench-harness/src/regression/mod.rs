//! Regression comparison against a baseline framework
//!
//! Each run's throughput becomes a per-operation cost (`1e9 / rps`, a
//! nanoseconds-equivalent). The baseline and candidate cost series are
//! written as Go benchmark files and handed to a [`ComparisonTool`]; the
//! signed percent delta is read back through a [`DeltaParser`].
//!
//! A positive delta means the candidate costs more per operation than the
//! baseline. Only that direction is gated.

pub mod benchstat;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::artifact::{RawRecord, RunSample};
use crate::config::RegressionPolicy;
use crate::error::{CheckOutcome, HarnessError, Result};
use crate::quality::CheckStatus;

pub use benchstat::{Benchstat, ComparisonTool, DeltaParser, LastPercentToken};

/// Schema tag of the regression summary record
pub const REGRESSION_SCHEMA_VERSION: &str = "regression-v1";

/// Scale applied to inverse throughput
pub const COST_SCALE: f64 = 1e9;

/// Benchmark name shared by both input files so the tool pairs them
const BENCH_NAME: &str = "BenchmarkEndpoint";

/// Per-operation cost for one run; `None` for non-positive throughput.
pub fn normalized_cost(rps: f64) -> Option<f64> {
    (rps > 0.0).then(|| COST_SCALE / rps)
}

/// Render runs as Go benchmark lines, one per run with a positive rps.
///
/// ```
/// use bench_harness::artifact::RunSample;
/// use bench_harness::regression::render_bench_file;
///
/// let run = RunSample {
///     requests: 10,
///     duration_seconds: 0.01,
///     rps: 1000.0,
///     latency_ms_p50: 1.0,
///     latency_ms_p95: 1.0,
///     latency_ms_p99: 1.0,
///     latency_ms_max: 1.0,
/// };
/// assert_eq!(render_bench_file(&[run]), "BenchmarkEndpoint 1 1000000.000 ns/op\n");
/// ```
pub fn render_bench_file(runs: &[RunSample]) -> String {
    runs.iter()
        .filter_map(|run| normalized_cost(run.rps))
        .map(|cost| format!("{} 1 {:.3} ns/op\n", BENCH_NAME, cost))
        .collect()
}

/// Result of one candidate comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Pass,
    Fail,
    /// No delta could be read from the tool output
    ParseFailed,
}

impl ComparisonOutcome {
    /// Undefined deltas fail; improvements never do.
    pub fn judge(delta_percent: Option<f64>, max_regression_percent: f64) -> Self {
        match delta_percent {
            None => ComparisonOutcome::ParseFailed,
            Some(delta) if delta > max_regression_percent => ComparisonOutcome::Fail,
            Some(_) => ComparisonOutcome::Pass,
        }
    }

    pub fn passed(&self) -> bool {
        *self == ComparisonOutcome::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionComparison {
    pub baseline: String,
    pub candidate: String,
    pub delta_percent: Option<f64>,
    pub outcome: ComparisonOutcome,
}

impl RegressionComparison {
    /// Operator-facing diagnostic for a failed comparison.
    pub fn failure_message(&self, max_regression_percent: f64) -> Option<String> {
        match (self.outcome, self.delta_percent) {
            (ComparisonOutcome::Pass, _) => None,
            (ComparisonOutcome::Fail, Some(delta)) => Some(format!(
                "{}: regression {:+.2}% vs {} exceeds max {:.2}%",
                self.candidate, delta, self.baseline, max_regression_percent
            )),
            _ => Some(format!(
                "{}: could not parse regression delta vs {}",
                self.candidate, self.baseline
            )),
        }
    }
}

/// Comparison that could not run to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// Candidate being compared when the tool failed
    pub framework: String,
    pub message: String,
}

/// Regression summary record written by `benchstat-check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub schema_version: String,
    pub generated_at: String,
    pub status: CheckStatus,
    pub baseline: Option<String>,
    pub max_regression_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub comparisons: Vec<RegressionComparison>,
    /// Set when the comparison tool aborted the pass; `comparisons` then
    /// holds only what finished before it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_failure: Option<ToolFailure>,
}

impl RegressionSummary {
    fn skipped(policy: &RegressionPolicy, reason: String) -> Self {
        info!("Regression check skipped: {}", reason);
        RegressionSummary {
            schema_version: REGRESSION_SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            status: CheckStatus::Skipped,
            baseline: policy.baseline_framework.clone(),
            max_regression_percent: policy.max_regression_percent,
            reason: Some(reason),
            comparisons: Vec::new(),
            tool_failure: None,
        }
    }

    /// Failure diagnostics in comparison order, then any tool failure.
    pub fn failures(&self) -> Vec<(String, String)> {
        self.comparisons
            .iter()
            .filter_map(|c| {
                c.failure_message(self.max_regression_percent)
                    .map(|message| (c.candidate.clone(), message))
            })
            .chain(
                self.tool_failure
                    .iter()
                    .map(|f| (f.framework.clone(), f.message.clone())),
            )
            .collect()
    }
}

/// Compares candidates against the baseline through a tool and parser.
pub struct RegressionComparator<T: ComparisonTool, D: DeltaParser = LastPercentToken> {
    tool: T,
    parser: D,
}

impl<T: ComparisonTool> RegressionComparator<T, LastPercentToken> {
    pub fn new(tool: T) -> Self {
        Self::with_parser(tool, LastPercentToken)
    }
}

impl<T: ComparisonTool, D: DeltaParser> RegressionComparator<T, D> {
    pub fn with_parser(tool: T, parser: D) -> Self {
        Self { tool, parser }
    }

    /// Compare one candidate's raw runs against the baseline's.
    ///
    /// Tool failures are errors; an unparseable report is a
    /// [`ComparisonOutcome::ParseFailed`] result.
    pub async fn compare(
        &self,
        baseline: (&str, &[RunSample]),
        candidate: (&str, &[RunSample]),
        max_regression_percent: f64,
        scratch: &Path,
    ) -> Result<RegressionComparison> {
        let baseline_file = scratch.join("baseline.bench.txt");
        let candidate_file = scratch.join("candidate.bench.txt");
        std::fs::write(&baseline_file, render_bench_file(baseline.1))
            .map_err(|e| HarnessError::io(&baseline_file, e))?;
        std::fs::write(&candidate_file, render_bench_file(candidate.1))
            .map_err(|e| HarnessError::io(&candidate_file, e))?;

        let output = self.tool.compare(&baseline_file, &candidate_file).await?;
        let delta_percent = self.parser.parse_delta(&output);
        if delta_percent.is_none() {
            warn!(
                "{} output for {} had no percent delta",
                self.tool.name(),
                candidate.0
            );
        }

        Ok(RegressionComparison {
            baseline: baseline.0.to_string(),
            candidate: candidate.0.to_string(),
            delta_percent,
            outcome: ComparisonOutcome::judge(delta_percent, max_regression_percent),
        })
    }

    /// Compare every successful non-baseline target to the baseline.
    ///
    /// Skipped when no baseline is configured, the baseline has no
    /// successful record, or there is nothing to compare it with. A tool
    /// error stops the pass; the returned summary is then `failed`, keeps
    /// the comparisons finished so far and records the failure.
    pub async fn run(
        &self,
        records: &[RawRecord],
        policy: &RegressionPolicy,
    ) -> CheckOutcome<RegressionSummary> {
        let Some(baseline_name) = policy.baseline_framework.as_deref() else {
            return CheckOutcome::complete(RegressionSummary::skipped(
                policy,
                "no baseline framework configured".to_string(),
            ));
        };

        let ok: Vec<&RawRecord> = records.iter().filter(|r| r.is_ok()).collect();
        let Some(baseline) = ok.iter().find(|r| r.framework == baseline_name) else {
            return CheckOutcome::complete(RegressionSummary::skipped(
                policy,
                format!("baseline framework {} has no successful result", baseline_name),
            ));
        };

        let candidates: Vec<&&RawRecord> =
            ok.iter().filter(|r| r.framework != baseline_name).collect();
        if candidates.is_empty() {
            return CheckOutcome::complete(RegressionSummary::skipped(
                policy,
                "no candidate targets to compare".to_string(),
            ));
        }

        let mut summary = RegressionSummary {
            schema_version: REGRESSION_SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            status: CheckStatus::Passed,
            baseline: Some(baseline_name.to_string()),
            max_regression_percent: policy.max_regression_percent,
            reason: None,
            comparisons: Vec::with_capacity(candidates.len()),
            tool_failure: None,
        };

        let scratch = match tempfile::Builder::new().prefix("regression-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let error = HarnessError::io(std::env::temp_dir(), e);
                return summary.abort(baseline_name, error);
            }
        };

        for candidate in candidates {
            let result = self
                .compare(
                    (baseline_name, baseline.run_stats()),
                    (candidate.framework.as_str(), candidate.run_stats()),
                    policy.max_regression_percent,
                    scratch.path(),
                )
                .await;
            match result {
                Ok(comparison) => {
                    info!(
                        "{} vs {}: delta={:?} outcome={:?}",
                        comparison.candidate,
                        comparison.baseline,
                        comparison.delta_percent,
                        comparison.outcome
                    );
                    summary.comparisons.push(comparison);
                }
                Err(e) => return summary.abort(&candidate.framework, e),
            }
        }

        if !summary.comparisons.iter().all(|c| c.outcome.passed()) {
            summary.status = CheckStatus::Failed;
        }
        CheckOutcome::complete(summary)
    }
}

impl RegressionSummary {
    fn abort(mut self, framework: &str, error: HarnessError) -> CheckOutcome<Self> {
        warn!("Regression pass aborted at {}: {}", framework, error);
        self.status = CheckStatus::Failed;
        self.tool_failure = Some(ToolFailure {
            framework: framework.to_string(),
            message: error.to_string(),
        });
        CheckOutcome::aborted(self, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::REQUESTS_FAILED_REASON;
    use crate::config::Engine;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Replays canned output and records which files it was given.
    /// Calls listed in `fail_on` return a tool failure instead.
    struct CannedTool {
        output: String,
        fail_on: Vec<usize>,
        calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl CannedTool {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                fail_on: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, call: usize) -> Self {
            self.fail_on.push(call);
            self
        }
    }

    #[async_trait]
    impl ComparisonTool for CannedTool {
        fn name(&self) -> &str {
            "canned"
        }

        async fn compare(&self, baseline: &Path, candidate: &Path) -> Result<String> {
            assert!(baseline.exists() && candidate.exists());
            let mut calls = self.calls.lock().unwrap();
            let call = calls.len();
            calls.push((baseline.to_path_buf(), candidate.to_path_buf()));
            if self.fail_on.contains(&call) {
                return Err(HarnessError::ToolFailed {
                    tool: "canned".to_string(),
                    output: "too few samples".to_string(),
                });
            }
            Ok(self.output.clone())
        }
    }

    fn run(rps: f64) -> RunSample {
        RunSample {
            requests: 10,
            duration_seconds: 10.0 / rps,
            rps,
            latency_ms_p50: 1.0,
            latency_ms_p95: 1.0,
            latency_ms_p99: 1.0,
            latency_ms_max: 1.0,
        }
    }

    fn ok_record(framework: &str, rps: &[f64]) -> RawRecord {
        let mut record = RawRecord::skipped(framework, "http://localhost", "-", "passed", Engine::Legacy);
        let runs: Vec<RunSample> = rps.iter().map(|&r| run(r)).collect();
        let filtered = crate::quality::FilteredRunSet::from_runs(&runs);
        record.status = crate::artifact::TargetStatus::Ok;
        record.reason = None;
        record.benchmark = Some(crate::artifact::BenchmarkBlock {
            endpoint: "/health".to_string(),
            warmup_requests: 0,
            requests_per_run: 10,
            runs: runs.len() as u32,
            quality: filtered.quality_block(&Default::default()),
            median: filtered.median().unwrap(),
            run_stats: runs,
        });
        record
    }

    fn policy(baseline: Option<&str>) -> RegressionPolicy {
        RegressionPolicy {
            baseline_framework: baseline.map(str::to_string),
            ..RegressionPolicy::default()
        }
    }

    #[test]
    fn test_normalized_cost() {
        assert_eq!(normalized_cost(1000.0), Some(1_000_000.0));
        assert_eq!(normalized_cost(0.0), None);
        assert_eq!(normalized_cost(-5.0), None);
    }

    #[test]
    fn test_render_bench_file_skips_zero_rps() {
        let text = render_bench_file(&[run(2000.0), run(0.0), run(4000.0)]);
        assert_eq!(
            text,
            "BenchmarkEndpoint 1 500000.000 ns/op\nBenchmarkEndpoint 1 250000.000 ns/op\n"
        );
        assert_eq!(render_bench_file(&[]), "");
    }

    #[test]
    fn test_outcome_is_one_sided() {
        assert_eq!(ComparisonOutcome::judge(Some(-40.0), 5.0), ComparisonOutcome::Pass);
        assert_eq!(ComparisonOutcome::judge(Some(5.0), 5.0), ComparisonOutcome::Pass);
        assert_eq!(ComparisonOutcome::judge(Some(5.01), 5.0), ComparisonOutcome::Fail);
        assert_eq!(ComparisonOutcome::judge(None, 5.0), ComparisonOutcome::ParseFailed);
    }

    #[tokio::test]
    async fn test_regression_over_max_fails() {
        let tool = CannedTool::new("name old new delta\nBenchmarkbaseline-8 100 115 +15.0%\n");
        let comparator = RegressionComparator::new(tool);
        let records = vec![
            ok_record("baseline", &[1000.0, 1000.0]),
            ok_record("modkit", &[870.0, 870.0]),
        ];

        let summary = comparator
            .run(&records, &policy(Some("baseline")))
            .await
            .into_result()
            .unwrap();
        assert_eq!(summary.status, CheckStatus::Failed);
        assert_eq!(summary.comparisons.len(), 1);
        assert_eq!(summary.comparisons[0].delta_percent, Some(15.0));
        assert_eq!(summary.comparisons[0].outcome, ComparisonOutcome::Fail);

        let failures = summary.failures();
        assert_eq!(failures[0].0, "modkit");
        assert_eq!(failures[0].1, "modkit: regression +15.00% vs baseline exceeds max 5.00%");
    }

    #[tokio::test]
    async fn test_unparseable_output_fails() {
        let comparator = RegressionComparator::new(CannedTool::new("no percent here"));
        let records = vec![
            ok_record("baseline", &[1000.0, 1000.0]),
            ok_record("modkit", &[1000.0, 1000.0]),
        ];

        let summary = comparator
            .run(&records, &policy(Some("baseline")))
            .await
            .into_result()
            .unwrap();
        assert_eq!(summary.status, CheckStatus::Failed);
        assert_eq!(summary.comparisons[0].outcome, ComparisonOutcome::ParseFailed);
        assert_eq!(summary.comparisons[0].delta_percent, None);
        assert!(summary.failures()[0].1.contains("could not parse"));
    }

    #[tokio::test]
    async fn test_improvement_passes() {
        let comparator = RegressionComparator::new(CannedTool::new("geomean -22.50%"));
        let records = vec![
            ok_record("baseline", &[1000.0, 1000.0]),
            ok_record("modkit", &[1300.0, 1300.0]),
        ];

        let outcome = comparator.run(&records, &policy(Some("baseline"))).await;
        assert!(!outcome.is_aborted());
        assert_eq!(outcome.summary.status, CheckStatus::Passed);
        assert!(outcome.summary.failures().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_keeps_finished_comparisons() {
        let comparator = RegressionComparator::new(CannedTool::new("+1.00%").failing_on(1));
        let records = vec![
            ok_record("baseline", &[1000.0, 1000.0]),
            ok_record("express", &[990.0, 990.0]),
            ok_record("modkit", &[1000.0, 1000.0]),
            ok_record("nestjs", &[1000.0, 1000.0]),
        ];

        let outcome = comparator.run(&records, &policy(Some("baseline"))).await;
        let summary = &outcome.summary;
        assert_eq!(summary.status, CheckStatus::Failed);
        assert_eq!(summary.comparisons.len(), 1);
        assert_eq!(summary.comparisons[0].candidate, "express");

        let failure = summary.tool_failure.as_ref().unwrap();
        assert_eq!(failure.framework, "modkit");
        assert_eq!(failure.message, "canned failed: too few samples");
        assert_eq!(
            summary.failures(),
            vec![("modkit".to_string(), "canned failed: too few samples".to_string())]
        );

        // The pass stops at the failing candidate.
        assert_eq!(comparator.tool.calls.lock().unwrap().len(), 2);
        assert!(matches!(
            outcome.into_result(),
            Err(HarnessError::ToolFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_baseline_is_skipped() {
        let comparator = RegressionComparator::new(CannedTool::new("+99%"));
        let records = vec![ok_record("modkit", &[1000.0, 1000.0])];

        let unconfigured = comparator.run(&records, &policy(None)).await.summary;
        assert_eq!(unconfigured.status, CheckStatus::Skipped);

        let absent = comparator.run(&records, &policy(Some("baseline"))).await.summary;
        assert_eq!(absent.status, CheckStatus::Skipped);
        assert!(absent.reason.unwrap().contains("baseline"));
        assert!(comparator.tool.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_baseline_record_is_not_a_baseline() {
        let comparator = RegressionComparator::new(CannedTool::new("+1%"));
        let records = vec![
            RawRecord::skipped("baseline", "http://x", REQUESTS_FAILED_REASON, "passed", Engine::Legacy),
            ok_record("modkit", &[1000.0, 1000.0]),
        ];

        let summary = comparator.run(&records, &policy(Some("baseline"))).await.summary;
        assert_eq!(summary.status, CheckStatus::Skipped);
    }

    #[tokio::test]
    async fn test_tool_receives_cost_files() {
        let comparator = RegressionComparator::new(CannedTool::new("+1.00%"));
        let scratch = tempfile::tempdir().unwrap();
        let comparison = comparator
            .compare(
                ("baseline", &[run(1000.0)][..]),
                ("modkit", &[run(500.0)][..]),
                5.0,
                scratch.path(),
            )
            .await
            .unwrap();
        assert!(comparison.outcome.passed());

        let calls = comparator.tool.calls.lock().unwrap();
        let candidate = std::fs::read_to_string(&calls[0].1).unwrap();
        assert_eq!(candidate, "BenchmarkEndpoint 1 2000000.000 ns/op\n");
    }

    #[tokio::test]
    async fn test_bench_files_stay_in_scratch_dir() {
        let comparator = RegressionComparator::new(CannedTool::new("+1.00%"));
        let scratch = tempfile::tempdir().unwrap();
        comparator
            .compare(
                ("../baseline", &[run(1000.0)][..]),
                ("nested/../../modkit", &[run(500.0)][..]),
                5.0,
                scratch.path(),
            )
            .await
            .unwrap();

        let calls = comparator.tool.calls.lock().unwrap();
        assert_eq!(calls[0].0.parent(), Some(scratch.path()));
        assert_eq!(calls[0].1.parent(), Some(scratch.path()));
    }
}
