//! Policy configuration for sampling and quality gating
//!
//! The policy is read from `stats-policy.toml` or `stats-policy.json`
//! (format chosen by extension). A missing policy file means defaults.
//!
//! ```toml
//! [sampler]
//! warmup_requests = 20
//! benchmark_requests = 200
//! runs = 5
//! timeout_ms = 5000
//! engine = "legacy"
//!
//! [quality]
//! outlier_method = "iqr_1.5"
//!
//! [quality.variance_thresholds_cv]
//! rps = 0.10
//! latency_ms_p95 = 0.20
//! latency_ms_p99 = 0.25
//!
//! [regression]
//! baseline_framework = "baseline"
//! max_regression_percent = 5.0
//! tool = "benchstat"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main policy structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Default sampling parameters
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Outlier and variance policy
    #[serde(default)]
    pub quality: QualityPolicy,
    /// Regression comparison policy
    #[serde(default)]
    pub regression: RegressionPolicy,
}

impl Policy {
    /// Load a policy file, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bench_harness::config::Policy;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let policy = Policy::load("stats-policy.json")?;
    /// println!("baseline: {:?}", policy.regression.baseline_framework);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Policy file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Load a policy from a TOML or JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
                .with_context(|| format!("Invalid policy file: {}", path.display()))
        } else {
            Self::from_str(&content)
                .with_context(|| format!("Invalid policy file: {}", path.display()))
        }
    }

    /// Parse a policy from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use bench_harness::config::Policy;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let policy = Policy::from_str(r#"
    ///     [regression]
    ///     baseline_framework = "go-stdlib"
    /// "#)?;
    /// assert_eq!(policy.quality.variance_thresholds_cv.rps, 0.10);
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML policy")
    }

    /// Parse a policy from a JSON string
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("Failed to parse JSON policy")
    }
}

/// Engine used to time request batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Per-request timing inside this process
    #[default]
    Legacy,
    /// Whole-batch timing delegated to `hyperfine`
    Hyperfine,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Legacy => "legacy",
            Engine::Hyperfine => "hyperfine",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(Engine::Legacy),
            "hyperfine" => Ok(Engine::Hyperfine),
            other => Err(format!("unknown engine '{}', use 'legacy' or 'hyperfine'", other)),
        }
    }
}

/// Sampling parameters for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Requests sent before measurement (default: 20)
    #[serde(default = "default_warmup_requests")]
    pub warmup_requests: u32,
    /// Requests per measured run (default: 200)
    #[serde(default = "default_benchmark_requests")]
    pub benchmark_requests: u32,
    /// Number of measured runs (default: 5)
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Per-request timeout (default: 5000ms)
    #[serde(default = "default_timeout", with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    /// Timing engine (default: legacy)
    #[serde(default)]
    pub engine: Engine,
    /// Collect container stats via `docker stats` after sampling
    #[serde(default = "default_true")]
    pub collect_docker_stats: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            warmup_requests: default_warmup_requests(),
            benchmark_requests: default_benchmark_requests(),
            runs: default_runs(),
            timeout: default_timeout(),
            engine: Engine::default(),
            collect_docker_stats: true,
        }
    }
}

fn default_warmup_requests() -> u32 {
    20
}

fn default_benchmark_requests() -> u32 {
    200
}

fn default_runs() -> u32 {
    5
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

/// Outlier classification rule. Only the IQR x 1.5 rule is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    #[default]
    #[serde(rename = "iqr_1.5")]
    Iqr15,
}

impl OutlierMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierMethod::Iqr15 => "iqr_1.5",
        }
    }
}

/// Outlier and variance policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityPolicy {
    #[serde(default)]
    pub outlier_method: OutlierMethod,
    #[serde(default)]
    pub variance_thresholds_cv: VarianceThresholds,
}

/// Maximum coefficient of variation allowed per metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceThresholds {
    /// Throughput cv limit (default: 0.10)
    #[serde(default = "default_rps_cv")]
    pub rps: f64,
    /// p95 latency cv limit (default: 0.20)
    #[serde(default = "default_p95_cv")]
    pub latency_ms_p95: f64,
    /// p99 latency cv limit (default: 0.25)
    #[serde(default = "default_p99_cv")]
    pub latency_ms_p99: f64,
}

impl Default for VarianceThresholds {
    fn default() -> Self {
        Self {
            rps: default_rps_cv(),
            latency_ms_p95: default_p95_cv(),
            latency_ms_p99: default_p99_cv(),
        }
    }
}

fn default_rps_cv() -> f64 {
    0.10
}

fn default_p95_cv() -> f64 {
    0.20
}

fn default_p99_cv() -> f64 {
    0.25
}

/// Regression comparison policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPolicy {
    /// Framework every other target is compared against
    #[serde(default)]
    pub baseline_framework: Option<String>,
    /// Largest allowed cost increase in percent (default: 5.0)
    #[serde(default = "default_max_regression_percent")]
    pub max_regression_percent: f64,
    /// Two-sample comparison tool binary (default: "benchstat")
    #[serde(default = "default_tool")]
    pub tool: String,
}

impl Default for RegressionPolicy {
    fn default() -> Self {
        Self {
            baseline_framework: None,
            max_regression_percent: default_max_regression_percent(),
            tool: default_tool(),
        }
    }
}

fn default_max_regression_percent() -> f64 {
    5.0
}

fn default_tool() -> String {
    "benchstat".to_string()
}

/// Serde module for serializing/deserializing Duration as milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
