//! JSON reporter for benchmark summaries

use super::BenchmarkSummary;
use anyhow::Result;

/// JSON format reporter
pub struct JsonReporter;

impl JsonReporter {
    /// Format a benchmark summary as JSON
    ///
    /// # Arguments
    ///
    /// * `summary` - The summary to format
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn format(summary: &BenchmarkSummary, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(summary)?
        } else {
            serde_json::to_string(summary)?
        };
        Ok(output)
    }
}
