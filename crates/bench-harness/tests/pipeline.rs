//! End-to-end tests: sampling into raw artifacts, then every check over them

#[path = "common/fakes.rs"]
#[allow(dead_code)]
mod fakes;

use std::path::Path;
use std::time::Duration;

use bench_harness::artifact::{read_json, TargetStatus, REQUESTS_FAILED_REASON};
use bench_harness::checks::{self, ResultsLayout};
use bench_harness::config::{Policy, SamplerConfig};
use bench_harness::gate::{FailureSource, QualitySummary};
use bench_harness::quality::{CheckStatus, VarianceSummary};
use bench_harness::regression::{ComparisonOutcome, RegressionComparator, RegressionSummary};
use bench_harness::reporter::generate_report;
use bench_harness::sampler::{HttpProbe, Sampler, Target};
use bench_harness::{HarnessError, RawRecord};
use pretty_assertions::assert_eq;
use fakes::{
    sampler_config, BatchScheduleProbe, CannedTool, FailingTool, FixedProbe, RefusingProbe,
};

fn target(framework: &str) -> Target {
    Target::new(framework, "http://localhost:3001", "/health", "passed")
}

async fn measure<P: HttpProbe>(
    probe: P,
    config: SamplerConfig,
    framework: &str,
    layout: &ResultsLayout,
) -> RawRecord {
    let sampler = Sampler::with_probe(probe, config, Default::default());
    sampler
        .measure_to_file(&target(framework), &layout.raw_dir.join(format!("{framework}.json")))
        .await
        .unwrap()
}

fn policy_with_baseline(baseline: &str) -> Policy {
    let toml = format!(
        r#"
        [regression]
        baseline_framework = "{baseline}"
        max_regression_percent = 5.0
        "#
    );
    Policy::from_str(&toml).unwrap()
}

#[tokio::test]
async fn test_measure_writes_valid_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());

    let record = measure(
        FixedProbe(Duration::from_millis(1)),
        sampler_config(2, 10),
        "modkit",
        &layout,
    )
    .await;

    assert_eq!(record.status, TargetStatus::Ok);
    let benchmark = record.benchmark.as_ref().unwrap();
    assert_eq!(benchmark.run_stats.len(), 2);
    assert!((benchmark.median.rps - 1000.0).abs() < 1e-6);
    assert!((benchmark.median.latency_ms_p95 - 1.0).abs() < 1e-9);
    assert!(benchmark.quality.excluded_samples.is_empty());
    assert_eq!(benchmark.quality.effective_runs, 2);
    assert_eq!(benchmark.quality.variance.rps_cv, 0.0);
    assert!(benchmark.quality.policy.outlier_thresholds.rps.lower.is_none());

    let resources = record.resources_normalized.unwrap();
    assert!((resources.startup_ms.unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(resources.memory_mb, None);

    let on_disk: RawRecord = read_json(&layout.raw_dir.join("modkit.json")).unwrap();
    assert_eq!(on_disk, record);

    assert_eq!(checks::raw_schema_check(&layout.raw_dir, None).unwrap(), 1);
    assert_eq!(checks::stats_check(&layout.raw_dir).unwrap().checked, 1);
}

#[tokio::test]
async fn test_unreachable_target_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());

    let record = measure(RefusingProbe::new(), sampler_config(3, 5), "nestjs", &layout).await;

    assert_eq!(record.status, TargetStatus::Skipped);
    assert_eq!(record.reason.as_deref(), Some(REQUESTS_FAILED_REASON));

    assert_eq!(checks::raw_schema_check(&layout.raw_dir, None).unwrap(), 1);
    let report = checks::stats_check(&layout.raw_dir).unwrap();
    assert_eq!(report.checked, 0);

    let summary = checks::variance_check(&layout, &Policy::default(), None).unwrap();
    assert_eq!(summary.status, CheckStatus::Skipped);
    assert!(summary.targets.is_empty());
}

#[tokio::test]
async fn test_outlier_run_is_excluded_with_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());

    let latencies = [1000, 1100, 900, 1050, 10_000]
        .into_iter()
        .map(Duration::from_micros)
        .collect();
    let config = SamplerConfig {
        warmup_requests: 0,
        ..sampler_config(5, 10)
    };
    let record = measure(BatchScheduleProbe::new(10, latencies), config, "express", &layout).await;

    let quality = &record.benchmark.as_ref().unwrap().quality;
    assert_eq!(quality.effective_runs, 4);
    assert_eq!(quality.excluded_samples.len(), 1);
    assert_eq!(quality.excluded_samples[0].run_index, 4);
    assert_eq!(quality.excluded_samples[0].reasons.len(), 2);
    assert!(quality.policy.outlier_thresholds.rps.lower.is_some());

    let summary = checks::variance_check(&layout, &Policy::default(), None).unwrap();
    assert_eq!(summary.status, CheckStatus::Passed);
    assert_eq!(summary.targets[0].effective_runs, 4);
    assert_eq!(summary.targets[0].excluded_samples[0].run_index, 4);
}

#[tokio::test]
async fn test_variance_check_writes_summary_before_failing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());

    let latencies = vec![Duration::from_millis(1), Duration::from_millis(3)];
    let config = SamplerConfig {
        warmup_requests: 0,
        ..sampler_config(2, 10)
    };
    measure(BatchScheduleProbe::new(10, latencies), config, "fastify", &layout).await;

    let err = checks::variance_check(&layout, &Policy::default(), None).unwrap_err();
    assert!(matches!(err, HarnessError::Policy(_)));
    assert!(err.to_string().contains("fastify: rps cv"));

    let summary: VarianceSummary = read_json(&dir.path().join("quality-summary.json")).unwrap();
    assert_eq!(summary.status, CheckStatus::Failed);
    assert_eq!(summary.violations().count(), 3);
}

async fn baseline_and_candidate(layout: &ResultsLayout) {
    measure(
        FixedProbe(Duration::from_millis(1)),
        sampler_config(3, 10),
        "baseline",
        layout,
    )
    .await;
    measure(
        FixedProbe(Duration::from_millis(2)),
        sampler_config(3, 10),
        "modkit",
        layout,
    )
    .await;
}

#[tokio::test]
async fn test_ci_check_fails_on_regression() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    baseline_and_candidate(&layout).await;

    let comparator =
        RegressionComparator::new(CannedTool("name old new delta\nBenchmarkbaseline-8 100 115 +15.0%\n"));
    let err = checks::ci_check(&layout, &policy_with_baseline("baseline"), comparator, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Policy violation: modkit: regression +15.00% vs baseline exceeds max 5.00%"
    );

    let summary: QualitySummary = read_json(&dir.path().join("ci-summary.json")).unwrap();
    assert_eq!(summary.status, CheckStatus::Failed);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].source, FailureSource::Regression);
    assert_eq!(summary.variance.status, CheckStatus::Passed);
}

#[tokio::test]
async fn test_ci_check_without_baseline_skips_regression() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    baseline_and_candidate(&layout).await;

    let comparator = RegressionComparator::new(CannedTool("+99.0%"));
    let summary = checks::ci_check(&layout, &Policy::default(), comparator, None)
        .await
        .unwrap();

    assert_eq!(summary.status, CheckStatus::Passed);
    assert_eq!(summary.regression.status, CheckStatus::Skipped);
    assert_eq!(summary.variance.targets.len(), 2);
}

#[tokio::test]
async fn test_benchstat_check_unparseable_output_fails() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    baseline_and_candidate(&layout).await;

    let comparator = RegressionComparator::new(CannedTool("no percent here"));
    let err = checks::benchstat_check(&layout, &policy_with_baseline("baseline"), &comparator, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("could not parse"));

    let summary: RegressionSummary =
        read_json(&dir.path().join("benchstat-summary.json")).unwrap();
    assert_eq!(summary.comparisons[0].outcome, ComparisonOutcome::ParseFailed);
    assert_eq!(summary.comparisons[0].delta_percent, None);
}

#[tokio::test]
async fn test_summary_outside_results_root_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path().join("latest"));
    measure(
        FixedProbe(Duration::from_millis(1)),
        sampler_config(2, 5),
        "modkit",
        &layout,
    )
    .await;

    let outside = dir.path().join("elsewhere.json");
    let err = checks::variance_check(&layout, &Policy::default(), Some(outside.as_path()))
        .unwrap_err();
    assert!(err.to_string().contains("must be under"));
    assert!(!Path::new(&outside).exists());
}

#[tokio::test]
async fn test_policy_file_drives_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    let latencies = vec![Duration::from_millis(1), Duration::from_millis(3)];
    let config = SamplerConfig {
        warmup_requests: 0,
        ..sampler_config(2, 10)
    };
    measure(BatchScheduleProbe::new(10, latencies), config, "fastify", &layout).await;

    let policy_file = dir.path().join("stats-policy.toml");
    std::fs::write(
        &policy_file,
        "[quality.variance_thresholds_cv]\nrps = 2.0\nlatency_ms_p95 = 2.0\nlatency_ms_p99 = 2.0\n",
    )
    .unwrap();
    let policy = Policy::load(&policy_file).unwrap();

    let summary = checks::variance_check(&layout, &policy, None).unwrap();
    assert_eq!(summary.status, CheckStatus::Passed);
}

#[tokio::test]
async fn test_ci_check_tool_failure_still_writes_summary() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    baseline_and_candidate(&layout).await;

    let comparator = RegressionComparator::new(FailingTool("need at least 2 samples per file"));
    let err = checks::ci_check(&layout, &policy_with_baseline("baseline"), comparator, None)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::ToolFailed { .. }));
    assert_eq!(err.to_string(), "benchstat failed: need at least 2 samples per file");

    let summary: QualitySummary = read_json(&dir.path().join("ci-summary.json")).unwrap();
    assert_eq!(summary.status, CheckStatus::Failed);
    assert_eq!(summary.variance.status, CheckStatus::Passed);
    assert_eq!(summary.variance.targets.len(), 2);
    assert_eq!(summary.regression.status, CheckStatus::Failed);
    let failure = summary.regression.tool_failure.as_ref().unwrap();
    assert_eq!(failure.framework, "modkit");
    assert!(failure.message.contains("need at least 2 samples per file"));
    assert_eq!(summary.failures[0].source, FailureSource::Regression);
}

#[tokio::test]
async fn test_benchstat_check_tool_failure_still_writes_summary() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    baseline_and_candidate(&layout).await;

    let comparator = RegressionComparator::new(FailingTool("exit status 1: bad format"));
    let err = checks::benchstat_check(&layout, &policy_with_baseline("baseline"), &comparator, None)
        .await
        .unwrap_err();
    assert!(err.to_string().ends_with("exit status 1: bad format"));

    let summary: RegressionSummary =
        read_json(&dir.path().join("benchstat-summary.json")).unwrap();
    assert_eq!(summary.status, CheckStatus::Failed);
    assert!(summary.comparisons.is_empty());
    assert_eq!(summary.tool_failure.unwrap().framework, "modkit");
}

#[tokio::test]
async fn test_report_summary_passes_summary_check() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ResultsLayout::new(dir.path());
    baseline_and_candidate(&layout).await;
    measure(RefusingProbe::new(), sampler_config(2, 5), "nestjs", &layout).await;

    let summary = generate_report(&layout, None, None).unwrap();
    assert_eq!(summary.successful_targets, 2);
    let modkit = summary
        .targets
        .iter()
        .find(|t| t.framework == "modkit")
        .unwrap();
    let uncertainty = modkit.uncertainty.unwrap();
    assert_eq!(uncertainty.effective_runs, 3);
    assert_eq!(uncertainty.excluded_runs, 0);
    assert_eq!(uncertainty.rps_cv, 0.0);

    let nestjs = summary
        .targets
        .iter()
        .find(|t| t.framework == "nestjs")
        .unwrap();
    assert!(nestjs.uncertainty.is_none());

    let validated = checks::summary_schema_check(&dir.path().join("summary.json"), None).unwrap();
    assert_eq!(validated, 3);
}
