//! Artifact validation and CI check flows over a results directory.
//!
//! Every flow reads the raw artifacts, never rewrites them, and writes its
//! own summary record before reporting a policy failure or a comparison
//! tool error.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::{
    ensure_under_root, load_raw_records, load_raw_values, read_json, write_json, MetricUnits,
    RAW_SCHEMA_VERSION,
};
use crate::config::Policy;
use crate::error::{HarnessError, Result};
use crate::gate::{QualityGate, QualitySummary};
use crate::quality::{CheckStatus, VarianceSummary};
use crate::regression::{ComparisonTool, DeltaParser, RegressionComparator, RegressionSummary};
use crate::reporter::SUMMARY_SCHEMA_VERSION;

/// Default results root
pub const DEFAULT_RESULTS_ROOT: &str = "results/latest";

/// Results root and the raw artifact directory inside or beside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsLayout {
    pub results_root: PathBuf,
    pub raw_dir: PathBuf,
}

impl Default for ResultsLayout {
    fn default() -> Self {
        Self::new(DEFAULT_RESULTS_ROOT)
    }
}

impl ResultsLayout {
    /// Layout with raw artifacts under `<root>/raw`
    pub fn new(results_root: impl Into<PathBuf>) -> Self {
        let results_root = results_root.into();
        let raw_dir = results_root.join("raw");
        Self {
            results_root,
            raw_dir,
        }
    }

    pub fn with_raw_dir(mut self, raw_dir: impl Into<PathBuf>) -> Self {
        self.raw_dir = raw_dir.into();
        self
    }

    /// Resolve an output file, defaulting to `<root>/<default_name>`.
    ///
    /// Outputs must stay under the results root.
    pub fn output_path(&self, path: Option<&Path>, default_name: &str, label: &str) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.results_root.join(default_name));
        ensure_under_root(&path, &self.results_root, label)
    }
}

fn field<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

fn non_empty_str(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str).is_some_and(|s| !s.is_empty())
}

/// Structural checks on one raw artifact.
pub fn validate_raw_row(path: &Path, payload: &Value, schema_version: &str) -> Result<()> {
    for name in ["schema_version", "framework", "target", "status"] {
        if payload.get(name).is_none() {
            return Err(HarnessError::schema(path, format!("missing {}", name)));
        }
    }

    let found = &payload["schema_version"];
    if found.as_str() != Some(schema_version) {
        return Err(HarnessError::schema(
            path,
            format!("schema_version={}, expected {:?}", found, schema_version),
        ));
    }

    let status = payload["status"].as_str();
    if !matches!(status, Some("ok" | "skipped")) {
        return Err(HarnessError::schema(
            path,
            format!("status={} must be 'ok' or 'skipped'", payload["status"]),
        ));
    }

    for name in ["framework", "target"] {
        if !non_empty_str(payload.get(name)) {
            return Err(HarnessError::schema(
                path,
                format!("{} must be non-empty string", name),
            ));
        }
    }

    if status == Some("skipped") {
        if !non_empty_str(payload.get("reason")) {
            return Err(HarnessError::schema(
                path,
                "skipped rows require non-empty reason",
            ));
        }
        return Ok(());
    }

    for name in ["parity", "engine", "metric_units", "benchmark", "resources_normalized"] {
        if payload.get(name).is_none() {
            return Err(HarnessError::schema(path, format!("missing {}", name)));
        }
    }

    let benchmark = payload["benchmark"]
        .as_object()
        .ok_or_else(|| HarnessError::schema(path, "benchmark must be object"))?;
    for name in ["run_stats", "median"] {
        if !benchmark.contains_key(name) {
            return Err(HarnessError::schema(
                path,
                format!("benchmark.{} is required", name),
            ));
        }
    }
    Ok(())
}

/// Schema version pinned by a JSON schema's `properties.schema_version.const`.
pub fn schema_version_from_file(schema_file: &Path) -> Result<String> {
    let schema: Value = read_json(schema_file)?;
    schema
        .pointer("/properties/schema_version/const")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            HarnessError::schema(schema_file, "schema file missing properties.schema_version.const")
        })
}

/// Validate every raw artifact's shape. Returns the number validated.
pub fn raw_schema_check(raw_dir: &Path, schema_file: Option<&Path>) -> Result<usize> {
    let schema_version = match schema_file {
        Some(file) => schema_version_from_file(file)?,
        None => RAW_SCHEMA_VERSION.to_string(),
    };

    let rows = load_raw_values(raw_dir)?;
    for (path, payload) in &rows {
        validate_raw_row(path, payload, &schema_version)?;
    }
    info!("Validated {} raw artifact(s)", rows.len());
    Ok(rows.len())
}

fn summary_err(path: &Path, message: impl Into<String>) -> HarnessError {
    HarnessError::SummarySchema {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn require_count(path: &Path, payload: &Value, name: &str) -> Result<u64> {
    payload
        .get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| summary_err(path, format!("{} must be a non-negative integer", name)))
}

fn validate_summary_target(path: &Path, index: usize, target: &Value) -> Result<bool> {
    for name in ["framework", "status", "target", "provenance"] {
        if target.get(name).is_none() {
            return Err(summary_err(
                path,
                format!("targets[{}]: missing required property {}", index, name),
            ));
        }
    }
    for name in ["framework", "target"] {
        if !non_empty_str(target.get(name)) {
            return Err(summary_err(
                path,
                format!("targets[{}].{} must be non-empty string", index, name),
            ));
        }
    }
    if !non_empty_str(target["provenance"].get("raw_source")) {
        return Err(summary_err(
            path,
            format!("targets[{}].provenance.raw_source must be non-empty string", index),
        ));
    }

    match target["status"].as_str() {
        Some("skipped") => Ok(false),
        Some("ok") => {
            for (block, fields) in [
                ("median", &["rps", "latency_ms_p50", "latency_ms_p95", "latency_ms_p99"][..]),
                (
                    "uncertainty",
                    &[
                        "effective_runs",
                        "excluded_runs",
                        "rps_cv",
                        "latency_ms_p95_cv",
                        "latency_ms_p99_cv",
                    ][..],
                ),
            ] {
                let Some(value) = field(target, block) else {
                    return Err(summary_err(
                        path,
                        format!("targets[{}]: missing required property {}", index, block),
                    ));
                };
                for name in fields {
                    if !value.get(*name).is_some_and(Value::is_number) {
                        return Err(summary_err(
                            path,
                            format!("targets[{}].{}.{} must be a number", index, block, name),
                        ));
                    }
                }
            }
            Ok(true)
        }
        _ => Err(summary_err(
            path,
            format!(
                "targets[{}].status={} must be 'ok' or 'skipped'",
                index, target["status"]
            ),
        )),
    }
}

/// Validate a `summary.json` written by `report`.
///
/// Every `ok` target must carry its median and uncertainty blocks, and the
/// totals must agree with the target rows. Returns the number of targets.
pub fn summary_schema_check(summary_file: &Path, schema_file: Option<&Path>) -> Result<usize> {
    let schema_version = match schema_file {
        Some(file) => schema_version_from_file(file)?,
        None => SUMMARY_SCHEMA_VERSION.to_string(),
    };
    let path = summary_file;
    let payload: Value = read_json(path)?;

    for name in [
        "schema_version",
        "generated_at",
        "total_targets",
        "successful_targets",
        "skipped_targets",
        "targets",
    ] {
        if payload.get(name).is_none() {
            return Err(summary_err(path, format!("missing required property {}", name)));
        }
    }
    let found = &payload["schema_version"];
    if found.as_str() != Some(schema_version.as_str()) {
        return Err(summary_err(
            path,
            format!("schema_version={}, expected {:?}", found, schema_version),
        ));
    }

    let targets = payload["targets"]
        .as_array()
        .ok_or_else(|| summary_err(path, "targets must be array"))?;
    let mut successful = 0;
    for (index, target) in targets.iter().enumerate() {
        if validate_summary_target(path, index, target)? {
            successful += 1;
        }
    }

    let expected = [
        ("total_targets", targets.len()),
        ("successful_targets", successful),
        ("skipped_targets", targets.len() - successful),
    ];
    for (name, count) in expected {
        let declared = require_count(path, &payload, name)?;
        if declared != count as u64 {
            return Err(summary_err(
                path,
                format!("{}={} but targets contain {}", name, declared, count),
            ));
        }
    }

    info!("Validated summary with {} target(s)", targets.len());
    Ok(targets.len())
}

/// Outcome of a successful `stats-check`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport {
    /// Successful targets validated
    pub checked: usize,
}

impl StatsReport {
    pub fn message(&self) -> String {
        if self.checked == 0 {
            "stats-check: no successful targets to validate (all skipped)".to_string()
        } else {
            format!("stats-check: validated {} successful target(s)", self.checked)
        }
    }
}

fn stats_row(path: &Path, row: &Value) -> Result<()> {
    let median = field(row, "benchmark")
        .and_then(|b| field(b, "median"))
        .cloned()
        .unwrap_or(Value::Null);
    for metric in ["rps", "latency_ms_p50", "latency_ms_p95", "latency_ms_p99"] {
        if !median.get(metric).is_some_and(Value::is_number) {
            return Err(HarnessError::MissingNumber {
                path: path.to_path_buf(),
                field: format!("benchmark.median.{}", metric),
            });
        }
    }

    let units = field(row, "metric_units");
    for (key, expected) in MetricUnits::expected() {
        let found = units.and_then(|u| u.get(key));
        if found.and_then(Value::as_str) != Some(expected) {
            return Err(HarnessError::UnexpectedUnit {
                path: path.to_path_buf(),
                key: key.to_string(),
                found: found.map_or_else(|| "null".to_string(), Value::to_string),
                expected: expected.to_string(),
            });
        }
    }

    let resources = field(row, "resources_normalized");
    for key in ["memory_mb", "cpu_percent", "startup_ms"] {
        let value = resources.and_then(|r| field(r, key));
        if value.is_some_and(|v| !v.is_number()) {
            return Err(HarnessError::InvalidResource {
                path: path.to_path_buf(),
                field: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Check aggregate statistics and units of every `ok` artifact.
pub fn stats_check(raw_dir: &Path) -> Result<StatsReport> {
    let rows = load_raw_values(raw_dir)?;
    let mut checked = 0;
    for (path, row) in &rows {
        if row.get("status").and_then(Value::as_str) != Some("ok") {
            continue;
        }
        stats_row(path, row)?;
        checked += 1;
    }
    Ok(StatsReport { checked })
}

fn first_failure(status: CheckStatus, headline: Option<String>, check: &str) -> Result<()> {
    if status == CheckStatus::Failed {
        let message = headline.unwrap_or_else(|| format!("{} failed", check));
        warn!("{}", message);
        return Err(HarnessError::Policy(message));
    }
    Ok(())
}

/// Variance gate over every `ok` artifact.
///
/// The summary is written to `summary_file` before any failure is returned.
pub fn variance_check(
    layout: &ResultsLayout,
    policy: &Policy,
    summary_file: Option<&Path>,
) -> Result<VarianceSummary> {
    let out = layout.output_path(summary_file, "quality-summary.json", "Summary file")?;
    let records: Vec<_> = load_raw_records(&layout.raw_dir)?
        .into_iter()
        .map(|(_, record)| record)
        .collect();

    let summary = VarianceSummary::from_records(policy.quality.variance_thresholds_cv, &records);
    write_json(&out, &summary)?;

    let headline = summary.violations().next().map(|v| v.message.clone());
    first_failure(summary.status, headline, "variance-check")?;
    Ok(summary)
}

/// Regression comparison of every candidate against the baseline.
///
/// The summary is written before any failure is returned, including a
/// comparison tool error part way through the candidates.
pub async fn benchstat_check<T: ComparisonTool, D: DeltaParser>(
    layout: &ResultsLayout,
    policy: &Policy,
    comparator: &RegressionComparator<T, D>,
    out_file: Option<&Path>,
) -> Result<RegressionSummary> {
    let out = layout.output_path(out_file, "benchstat-summary.json", "Regression file")?;
    let records: Vec<_> = load_raw_records(&layout.raw_dir)?
        .into_iter()
        .map(|(_, record)| record)
        .collect();

    let outcome = comparator.run(&records, &policy.regression).await;
    write_json(&out, &outcome.summary)?;
    let summary = outcome.into_result()?;

    let headline = summary.failures().into_iter().next().map(|(_, message)| message);
    first_failure(summary.status, headline, "benchstat-check")?;
    Ok(summary)
}

/// Full CI gate: variance plus regression.
///
/// The combined summary is written before any failure is returned.
pub async fn ci_check<T: ComparisonTool, D: DeltaParser>(
    layout: &ResultsLayout,
    policy: &Policy,
    comparator: RegressionComparator<T, D>,
    out_file: Option<&Path>,
) -> Result<QualitySummary> {
    let out = layout.output_path(out_file, "ci-summary.json", "Summary file")?;
    let records: Vec<_> = load_raw_records(&layout.raw_dir)?
        .into_iter()
        .map(|(_, record)| record)
        .collect();

    let outcome = QualityGate::new(policy, comparator).evaluate(&records).await;
    write_json(&out, &outcome.summary)?;
    let summary = outcome.into_result()?;

    first_failure(summary.status, summary.headline().map(str::to_string), "ci-check")?;
    Ok(summary)
}
