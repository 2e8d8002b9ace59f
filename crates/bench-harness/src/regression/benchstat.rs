//! External two-sample comparison and delta extraction.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::debug;

use crate::error::{HarnessError, Result};

/// Runs a two-sample comparison over baseline and candidate bench files
/// and returns the tool's textual report.
#[async_trait]
pub trait ComparisonTool: Send + Sync {
    fn name(&self) -> &str;

    async fn compare(&self, baseline: &Path, candidate: &Path) -> Result<String>;
}

/// Extracts a signed percent delta from comparison output.
pub trait DeltaParser: Send + Sync {
    /// `None` when the output carries no usable delta.
    fn parse_delta(&self, output: &str) -> Option<f64>;
}

/// `benchstat` invoked as `benchstat <baseline> <candidate>`
#[derive(Debug, Clone)]
pub struct Benchstat {
    bin: String,
}

impl Benchstat {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for Benchstat {
    fn default() -> Self {
        Self::new("benchstat")
    }
}

#[async_trait]
impl ComparisonTool for Benchstat {
    fn name(&self) -> &str {
        &self.bin
    }

    async fn compare(&self, baseline: &Path, candidate: &Path) -> Result<String> {
        debug!(
            "{} {} {}",
            self.bin,
            baseline.display(),
            candidate.display()
        );
        let output = Command::new(&self.bin)
            .arg(baseline)
            .arg(candidate)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HarnessError::ToolUnavailable(self.bin.clone())
                } else {
                    HarnessError::io(&self.bin, e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(HarnessError::ToolFailed {
                tool: self.bin.clone(),
                output: stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Signed decimal immediately followed by `%`
static PERCENT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([+-]?\d+(?:\.\d+)?)%").expect("Failed to compile percent token regex")
});

/// Takes the last percent token in the output.
///
/// benchstat prints its summary row last, so a trailing percentage wins
/// over any per-row values above it.
///
/// ```
/// use bench_harness::regression::{DeltaParser, LastPercentToken};
///
/// let output = "name old new delta\nBenchmarkbaseline-8 100 115 +15.0%\n";
/// assert_eq!(LastPercentToken.parse_delta(output), Some(15.0));
/// assert_eq!(LastPercentToken.parse_delta("no percent here"), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LastPercentToken;

impl DeltaParser for LastPercentToken {
    fn parse_delta(&self, output: &str) -> Option<f64> {
        PERCENT_TOKEN
            .captures_iter(output)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}
