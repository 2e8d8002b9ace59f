//! Markdown report with interpretation guidance

use anyhow::Result;
use std::fmt::Write;

use super::BenchmarkSummary;

/// Markdown format reporter
pub struct MarkdownReporter;

impl MarkdownReporter {
    pub fn format(summary: &BenchmarkSummary) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "# Benchmark Report")?;
        writeln!(out)?;
        writeln!(out, "Generated: `{}`", summary.generated_at)?;
        writeln!(out)?;
        writeln!(out, "## Overview")?;
        writeln!(out, "- Total targets: {}", summary.total_targets)?;
        writeln!(out, "- Successful: {}", summary.successful_targets)?;
        writeln!(out, "- Skipped: {}", summary.skipped_targets)?;
        writeln!(out)?;

        writeln!(out, "## Results")?;
        writeln!(out)?;
        writeln!(
            out,
            "| Framework | Status | Median RPS | P50 Latency (ms) | P95 Latency (ms) | P99 Latency (ms) | Notes |"
        )?;
        writeln!(out, "|---|---:|---:|---:|---:|---:|---|")?;

        for target in &summary.targets {
            let median = target.median.as_ref();
            let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
            let status = match target.status {
                crate::artifact::TargetStatus::Ok => "ok",
                crate::artifact::TargetStatus::Skipped => "skipped",
            };
            writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} |",
                target.framework,
                status,
                cell(median.map(|m| m.rps)),
                cell(median.map(|m| m.latency_ms_p50)),
                cell(median.map(|m| m.latency_ms_p95)),
                cell(median.map(|m| m.latency_ms_p99)),
                target.reason.as_deref().unwrap_or("")
            )?;
        }
        writeln!(out)?;

        writeln!(out, "## Fairness Disclaimer")?;
        writeln!(out)?;
        writeln!(
            out,
            "- Language-vs-framework caveat: results compare whole stacks (runtime, language, \
             framework and configuration), not frameworks in isolation."
        )?;
        writeln!(
            out,
            "- All targets run the same endpoint workload on the same host with identical \
             request counts, but runtime defaults differ between stacks."
        )?;
        writeln!(
            out,
            "- Parity failures invalidate performance interpretation for the affected target."
        )?;
        writeln!(out)?;

        writeln!(out, "## Anti-Misinterpretation Guidance")?;
        writeln!(out)?;
        writeln!(
            out,
            "- Do not read cross-language differences as a ranking of frameworks; small deltas \
             are within run-to-run noise."
        )?;
        writeln!(
            out,
            "- Medians are computed after IQR outlier exclusion; consult the raw artifacts for \
             excluded runs and variance."
        )?;
        writeln!(
            out,
            "- Skipped targets have no measurements and must not be treated as zero throughput."
        )?;
        writeln!(out)?;

        writeln!(out, "## Raw Artifacts")?;
        writeln!(out)?;
        writeln!(out, "- Raw JSON: `results/latest/raw/*.json`")?;
        writeln!(out, "- Summary JSON: `results/latest/summary.json`")?;

        Ok(out)
    }
}
