//! Batch timing delegated to `hyperfine`.
//!
//! Each hyperfine run executes one `batch` sub-command of `requests`
//! requests. Only the batch wall-clock time is known, so per-request latency
//! is approximated as `duration / requests` for every percentile.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::artifact::RunSample;
use crate::error::{HarnessError, Result};
use crate::stats::LatencyPercentiles;

const TOOL: &str = "hyperfine";

#[derive(Debug, Deserialize)]
struct HyperfineExport {
    #[serde(default)]
    results: Vec<HyperfineResult>,
}

#[derive(Debug, Deserialize)]
struct HyperfineResult {
    #[serde(default)]
    times: Vec<f64>,
}

/// Runs hyperfine against this binary's `batch` sub-command
#[derive(Debug, Clone)]
pub struct HyperfineEngine {
    /// hyperfine executable
    pub bin: String,
    /// Program that implements `batch --url ... --requests ...`
    pub batch_program: PathBuf,
}

impl Default for HyperfineEngine {
    fn default() -> Self {
        Self {
            bin: TOOL.to_string(),
            batch_program: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("bench")),
        }
    }
}

/// Quote a string for `sh`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl HyperfineEngine {
    pub fn new(bin: impl Into<String>, batch_program: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            batch_program: batch_program.into(),
        }
    }

    /// Shell command hyperfine times on each run.
    pub fn batch_command(&self, url: &str, requests: u32, timeout: Duration) -> String {
        format!(
            "{} batch --url {} --requests {} --timeout-ms {}",
            shell_quote(&self.batch_program.to_string_lossy()),
            shell_quote(url),
            requests,
            timeout.as_millis()
        )
    }

    /// Time `runs` batches and convert them into run samples.
    ///
    /// # Errors
    ///
    /// Fails when hyperfine is missing, exits non-zero, or exports no
    /// timing samples.
    pub async fn measure(
        &self,
        url: &str,
        requests: u32,
        runs: u32,
        timeout: Duration,
    ) -> Result<Vec<RunSample>> {
        let scratch = tempfile::Builder::new()
            .prefix("hyperfine-")
            .tempdir()
            .map_err(|e| HarnessError::io(std::env::temp_dir(), e))?;
        let export_file = scratch.path().join("hyperfine.json");
        let command = self.batch_command(url, requests, timeout);

        info!("Timing {} batches of {} requests with hyperfine", runs, requests);
        debug!("hyperfine command: {}", command);

        let output = Command::new(&self.bin)
            .arg("--shell")
            .arg("sh")
            .arg("--runs")
            .arg(runs.to_string())
            .arg("--warmup")
            .arg("1")
            .arg("--export-json")
            .arg(&export_file)
            .arg(&command)
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
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(HarnessError::ToolFailed {
                tool: TOOL.to_string(),
                output: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        let times = read_export(&export_file)?;
        Ok(runs_from_batch_times(&times, requests))
    }
}

fn read_export(path: &Path) -> Result<Vec<f64>> {
    let export: HyperfineExport = crate::artifact::read_json(path)?;
    let result = export
        .results
        .into_iter()
        .next()
        .ok_or_else(|| HarnessError::ToolFailed {
            tool: TOOL.to_string(),
            output: "produced no results".to_string(),
        })?;

    if result.times.is_empty() {
        return Err(HarnessError::ToolFailed {
            tool: TOOL.to_string(),
            output: "produced no timing samples".to_string(),
        });
    }
    Ok(result.times)
}

/// Convert batch wall-clock times (seconds) into run samples.
///
/// Non-positive durations are dropped.
pub fn runs_from_batch_times(times: &[f64], requests: u32) -> Vec<RunSample> {
    times
        .iter()
        .copied()
        .filter(|&seconds| seconds > 0.0)
        .map(|seconds| {
            let latency_ms = seconds * 1000.0 / f64::from(requests.max(1));
            let latency = LatencyPercentiles::uniform(latency_ms);
            RunSample {
                requests,
                duration_seconds: seconds,
                rps: f64::from(requests) / seconds,
                latency_ms_p50: latency.p50,
                latency_ms_p95: latency.p95,
                latency_ms_p99: latency.p99,
                latency_ms_max: latency.max,
            }
        })
        .collect()
}
