//! Console reporter for benchmark summaries
//!
//! Provides human-readable output with ASCII tables and status indicators.

use anyhow::Result;
use std::fmt::Write;

use super::{BenchmarkSummary, TargetSummary};
use crate::artifact::TargetStatus;

/// Console format reporter
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Format a benchmark summary for console output
    pub fn format(summary: &BenchmarkSummary) -> Result<String> {
        let mut output = String::new();

        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                    BENCHMARK RESULTS                          ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        writeln!(output, "Generated:  {}", summary.generated_at)?;
        writeln!(
            output,
            "Targets:    {} total, {} successful, {} skipped",
            summary.total_targets, summary.successful_targets, summary.skipped_targets
        )?;
        writeln!(output)?;

        writeln!(output, "  ┌──────────────┬────────┬──────────┬─────────┬─────────┬─────────┐")?;
        writeln!(output, "  │ Framework    │ Status │   RPS    │   P50   │   P95   │   P99   │")?;
        writeln!(output, "  ├──────────────┼────────┼──────────┼─────────┼─────────┼─────────┤")?;
        for target in &summary.targets {
            Self::format_target_row(&mut output, target)?;
        }
        writeln!(output, "  └──────────────┴────────┴──────────┴─────────┴─────────┴─────────┘")?;

        let skipped: Vec<&TargetSummary> = summary
            .targets
            .iter()
            .filter(|t| t.status == TargetStatus::Skipped)
            .collect();
        if !skipped.is_empty() {
            writeln!(output)?;
            writeln!(output, "Skipped:")?;
            for target in skipped {
                writeln!(
                    output,
                    "  • {}: {}",
                    target.framework,
                    target.reason.as_deref().unwrap_or("no reason recorded")
                )?;
            }
        }

        writeln!(output)?;
        Ok(output)
    }

    fn format_target_row(output: &mut String, target: &TargetSummary) -> Result<()> {
        let (status, symbol) = match target.status {
            TargetStatus::Ok => ("ok", "✓"),
            TargetStatus::Skipped => ("skip", "✗"),
        };
        let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
        let median = target.median.as_ref();

        writeln!(
            output,
            "  │ {:<12} │ {} {:<4} │ {:>8} │ {:>7} │ {:>7} │ {:>7} │",
            target.framework,
            symbol,
            status,
            cell(median.map(|m| m.rps)),
            cell(median.map(|m| m.latency_ms_p50)),
            cell(median.map(|m| m.latency_ms_p95)),
            cell(median.map(|m| m.latency_ms_p99))
        )?;
        Ok(())
    }
}
