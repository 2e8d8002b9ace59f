//! Benchmark summary reporting
//!
//! Raw artifacts are folded into a [`BenchmarkSummary`] which can then be
//! rendered in several formats.
//!
//! # Output Formats
//!
//! - **JSON**: Machine-readable `summary.json`
//! - **Console**: Human-readable tables for a terminal
//! - **Markdown**: `report.md` with interpretation guidance
//!
//! # Example
//!
//! ```no_run
//! use bench_harness::checks::ResultsLayout;
//! use bench_harness::reporter::{generate_report, OutputFormat, Reporter};
//!
//! # fn example() -> anyhow::Result<()> {
//! let summary = generate_report(&ResultsLayout::default(), None, None)?;
//! Reporter::new(OutputFormat::Console).report(&summary)?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;
mod markdown;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::{
    list_artifacts, read_json, write_json, BenchmarkBlock, MedianBlock, MetricUnits, RawRecord,
    ResourcesNormalized, TargetStatus,
};
use crate::checks::ResultsLayout;
use crate::error::{HarnessError, Result};

pub use console::ConsoleReporter;
pub use json::JsonReporter;
pub use markdown::MarkdownReporter;

/// Schema tag of `summary.json`
pub const SUMMARY_SCHEMA_VERSION: &str = "summary-v1";

/// Output format for benchmark summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format for machine parsing
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Console output with tables
    #[default]
    Console,
    /// Markdown format for published reports
    Markdown,
}

/// Where a summary row came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub raw_source: String,
}

/// Run-to-run spread behind a target's medians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    /// Runs the medians were taken over
    pub effective_runs: usize,
    /// Runs removed as outliers
    pub excluded_runs: usize,
    pub rps_cv: f64,
    pub latency_ms_p95_cv: f64,
    pub latency_ms_p99_cv: f64,
}

impl From<&BenchmarkBlock> for Uncertainty {
    fn from(benchmark: &BenchmarkBlock) -> Self {
        let quality = &benchmark.quality;
        Uncertainty {
            effective_runs: quality.effective_runs,
            excluded_runs: quality.excluded_samples.len(),
            rps_cv: quality.variance.rps_cv,
            latency_ms_p95_cv: quality.variance.latency_ms_p95_cv,
            latency_ms_p99_cv: quality.variance.latency_ms_p99_cv,
        }
    }
}

/// One target in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub framework: String,
    pub status: TargetStatus,
    pub target: String,
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<MedianBlock>,
    /// Present for every `ok` target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Uncertainty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_normalized: Option<ResourcesNormalized>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_units: Option<MetricUnits>,
    pub provenance: Provenance,
}

/// Aggregate of every raw artifact in a results directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub schema_version: String,
    pub generated_at: String,
    pub total_targets: usize,
    pub successful_targets: usize,
    pub skipped_targets: usize,
    pub targets: Vec<TargetSummary>,
}

impl BenchmarkSummary {
    /// Build a summary from raw records and their source files.
    pub fn from_records(records: &[(PathBuf, RawRecord)]) -> Self {
        let targets: Vec<TargetSummary> = records
            .iter()
            .map(|(path, record)| TargetSummary {
                framework: record.framework.clone(),
                status: record.status,
                target: record.target.clone(),
                reason: record.reason.clone(),
                parity: record.parity.clone(),
                median: record.benchmark.as_ref().map(|b| b.median),
                uncertainty: record.benchmark.as_ref().map(Uncertainty::from),
                resources_normalized: record.resources_normalized,
                metric_units: record.metric_units.clone(),
                provenance: Provenance {
                    raw_source: path.display().to_string(),
                },
            })
            .collect();

        let successful_targets = targets
            .iter()
            .filter(|t| t.status == TargetStatus::Ok)
            .count();

        BenchmarkSummary {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            total_targets: targets.len(),
            successful_targets,
            skipped_targets: targets.len() - successful_targets,
            targets,
        }
    }
}

/// Load raw records for reporting, skipping malformed files with a warning.
///
/// A missing directory yields no records.
pub fn load_report_records(raw_dir: &Path) -> Result<Vec<(PathBuf, RawRecord)>> {
    if !raw_dir.is_dir() {
        warn!("Raw results directory not found: {}", raw_dir.display());
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for path in list_artifacts(raw_dir)? {
        match read_json::<RawRecord>(&path) {
            Ok(record) => records.push((path, record)),
            Err(HarnessError::MalformedJson { source, .. }) => {
                warn!("Skipping malformed JSON {}: {}", path.display(), source);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

/// Reporter for benchmark summaries
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    /// Create a new reporter with the specified output format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report a summary to stdout
    pub fn report(&self, summary: &BenchmarkSummary) -> anyhow::Result<()> {
        let output = self.format_summary(summary)?;
        print!("{}", output);
        io::stdout().flush()?;
        Ok(())
    }

    /// Write a summary to a file
    pub fn write_to_file<P: AsRef<Path>>(
        &self,
        summary: &BenchmarkSummary,
        path: P,
    ) -> anyhow::Result<()> {
        let output = self.format_summary(summary)?;
        fs::write(path, output)?;
        Ok(())
    }

    /// Format a summary as a string
    pub fn format_summary(&self, summary: &BenchmarkSummary) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(summary, false),
            OutputFormat::JsonPretty => JsonReporter::format(summary, true),
            OutputFormat::Console => ConsoleReporter::format(summary),
            OutputFormat::Markdown => MarkdownReporter::format(summary),
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

/// Write `summary.json` and `report.md` for the raw artifacts in `layout`.
pub fn generate_report(
    layout: &ResultsLayout,
    summary_file: Option<&Path>,
    report_file: Option<&Path>,
) -> anyhow::Result<BenchmarkSummary> {
    let summary_path = layout.output_path(summary_file, "summary.json", "Summary file")?;
    let report_path = layout.output_path(report_file, "report.md", "Report file")?;

    let records = load_report_records(&layout.raw_dir)?;
    let summary = BenchmarkSummary::from_records(&records);

    write_json(&summary_path, &summary)?;
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Reporter::new(OutputFormat::Markdown).write_to_file(&summary, &report_path)?;

    info!("Wrote: {}", summary_path.display());
    info!("Wrote: {}", report_path.display());
    Ok(summary)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::REQUESTS_FAILED_REASON;
    use crate::config::Engine;

    #[test]
    fn test_reporter_formats() {
        let summary = test_support::summary();

        let json = Reporter::new(OutputFormat::Json).format_summary(&summary).unwrap();
        assert!(json.contains("\"framework\":\"modkit\""));

        let console = Reporter::new(OutputFormat::Console).format_summary(&summary).unwrap();
        assert!(console.contains("modkit"));

        let markdown = Reporter::new(OutputFormat::Markdown).format_summary(&summary).unwrap();
        assert!(markdown.starts_with("# Benchmark Report"));
    }

    #[test]
    fn test_default_format() {
        let reporter = Reporter::default();
        assert_eq!(reporter.format, OutputFormat::Console);
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![(
            PathBuf::from("raw/nestjs.json"),
            RawRecord::skipped(
                "nestjs",
                "http://localhost:3002",
                REQUESTS_FAILED_REASON,
                "passed",
                Engine::Legacy,
            ),
        )];
        let summary = BenchmarkSummary::from_records(&records);

        assert_eq!(summary.total_targets, 1);
        assert_eq!(summary.successful_targets, 0);
        assert_eq!(summary.skipped_targets, 1);
        assert_eq!(summary.targets[0].provenance.raw_source, "raw/nestjs.json");
        assert!(summary.targets[0].median.is_none());
        assert!(summary.targets[0].uncertainty.is_none());
    }

    #[test]
    fn test_report_skips_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let record = RawRecord::skipped(
            "nestjs",
            "http://localhost:3002",
            REQUESTS_FAILED_REASON,
            "passed",
            Engine::Legacy,
        );
        write_json(&dir.path().join("nestjs.json"), &record).unwrap();
        fs::write(dir.path().join("broken.json"), "{\"framework\": ").unwrap();

        let records = load_report_records(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.framework, "nestjs");

        assert!(load_report_records(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_generate_report_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ResultsLayout::new(dir.path());
        fs::create_dir_all(&layout.raw_dir).unwrap();

        let summary = generate_report(&layout, None, None).unwrap();
        assert_eq!(summary.total_targets, 0);
        assert!(dir.path().join("summary.json").exists());
        assert!(dir.path().join("report.md").exists());

        let outside = dir.path().join("..").join("report.md");
        assert!(generate_report(&layout, None, Some(&outside)).is_err());
    }
}
