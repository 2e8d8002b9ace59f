//! Raw benchmark artifacts and the JSON file store
//!
//! One `raw-v1` record is written per target. Downstream checks only read
//! these files; each check writes its own output record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::{Engine, OutlierMethod, VarianceThresholds};
use crate::error::{HarnessError, Result};
use crate::stats::Fences;

/// Schema tag carried by every raw record
pub const RAW_SCHEMA_VERSION: &str = "raw-v1";

/// Reason recorded when every measured batch failed
pub const REQUESTS_FAILED_REASON: &str = "benchmark requests failed";

/// Outcome of sampling one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Ok,
    Skipped,
}

/// One completed measurement run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    pub requests: u32,
    pub duration_seconds: f64,
    pub rps: f64,
    pub latency_ms_p50: f64,
    pub latency_ms_p95: f64,
    pub latency_ms_p99: f64,
    pub latency_ms_max: f64,
}

/// Units every successful record must declare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricUnits {
    pub throughput: String,
    pub latency: String,
    pub memory: String,
    pub cpu: String,
    pub startup: String,
}

impl Default for MetricUnits {
    fn default() -> Self {
        Self {
            throughput: "requests_per_second".to_string(),
            latency: "milliseconds".to_string(),
            memory: "mb".to_string(),
            cpu: "percent".to_string(),
            startup: "milliseconds".to_string(),
        }
    }
}

impl MetricUnits {
    /// `(key, expected unit)` pairs, in declaration order
    pub fn expected() -> [(&'static str, &'static str); 5] {
        [
            ("throughput", "requests_per_second"),
            ("latency", "milliseconds"),
            ("memory", "mb"),
            ("cpu", "percent"),
            ("startup", "milliseconds"),
        ]
    }
}

/// Fence values as written to JSON; both null when undefined
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FenceRecord {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl From<Option<Fences>> for FenceRecord {
    fn from(fences: Option<Fences>) -> Self {
        match fences {
            Some(f) => FenceRecord {
                lower: Some(f.lower),
                upper: Some(f.upper),
            },
            None => FenceRecord::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierThresholds {
    pub rps: FenceRecord,
    pub latency_ms_p95: FenceRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPolicyRecord {
    pub outlier_method: OutlierMethod,
    pub outlier_thresholds: OutlierThresholds,
    pub variance_thresholds_cv: VarianceThresholds,
}

/// Why a run was excluded from the filtered set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    RpsOutlier,
    LatencyP95Outlier,
}

/// A run removed by outlier filtering, kept for traceability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedSample {
    /// Position of the run in the original `run_stats`
    pub run_index: usize,
    pub reasons: Vec<ExclusionReason>,
    pub run: RunSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceRecord {
    pub rps_cv: f64,
    pub latency_ms_p95_cv: f64,
    pub latency_ms_p99_cv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityBlock {
    pub policy: QualityPolicyRecord,
    pub excluded_samples: Vec<ExcludedSample>,
    pub effective_runs: usize,
    pub variance: VarianceRecord,
}

/// Medians over the filtered runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MedianBlock {
    pub rps: f64,
    pub latency_ms_p50: f64,
    pub latency_ms_p95: f64,
    pub latency_ms_p99: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkBlock {
    pub endpoint: String,
    pub warmup_requests: u32,
    pub requests_per_run: u32,
    pub runs: u32,
    pub run_stats: Vec<RunSample>,
    pub quality: QualityBlock,
    pub median: MedianBlock,
}

/// Container stats as reported by `docker stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesNormalized {
    pub memory_mb: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub startup_ms: Option<f64>,
}

/// Raw measurement record for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub schema_version: String,
    pub framework: String,
    pub target: String,
    pub status: TargetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<Engine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_units: Option<MetricUnits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_normalized: Option<ResourcesNormalized>,
}

impl RawRecord {
    /// Record for a target whose every batch failed.
    pub fn skipped(
        framework: &str,
        target: &str,
        reason: &str,
        parity: &str,
        engine: Engine,
    ) -> Self {
        RawRecord {
            schema_version: RAW_SCHEMA_VERSION.to_string(),
            framework: framework.to_string(),
            target: target.to_string(),
            status: TargetStatus::Skipped,
            reason: Some(reason.to_string()),
            parity: Some(parity.to_string()),
            engine: Some(engine),
            metric_units: None,
            benchmark: None,
            docker: None,
            resources_normalized: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TargetStatus::Ok
    }

    /// Raw per-run stats, empty for skipped records.
    pub fn run_stats(&self) -> &[RunSample] {
        self.benchmark
            .as_ref()
            .map(|b| b.run_stats.as_slice())
            .unwrap_or(&[])
    }
}

/// List `*.json` files in a directory, sorted by path.
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(HarnessError::MissingDirectory(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|e| HarnessError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| HarnessError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read and deserialize one JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| HarnessError::MalformedJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Write pretty JSON with a trailing newline, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, payload: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
    }
    let mut body =
        serde_json::to_string_pretty(payload).map_err(|source| HarnessError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    body.push('\n');
    fs::write(path, body).map_err(|e| HarnessError::io(path, e))
}

/// Load every raw artifact in `dir` as untyped JSON.
///
/// Fails if the directory is missing, holds no artifacts, or any file is
/// malformed.
pub fn load_raw_values(dir: &Path) -> Result<Vec<(PathBuf, serde_json::Value)>> {
    let files = list_artifacts(dir)?;
    if files.is_empty() {
        return Err(HarnessError::NoArtifacts(dir.to_path_buf()));
    }
    files
        .into_iter()
        .map(|path| {
            let value = read_json(&path)?;
            Ok((path, value))
        })
        .collect()
}

/// Load every raw artifact in `dir` as a typed record.
pub fn load_raw_records(dir: &Path) -> Result<Vec<(PathBuf, RawRecord)>> {
    let files = list_artifacts(dir)?;
    if files.is_empty() {
        return Err(HarnessError::NoArtifacts(dir.to_path_buf()));
    }
    files
        .into_iter()
        .map(|path| {
            let record = read_json(&path)?;
            Ok((path, record))
        })
        .collect()
}

/// Lexically absolutize a path, resolving `.` and `..` without touching disk.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Refuse output paths that resolve outside `root`.
pub fn ensure_under_root(path: &Path, root: &Path, label: &str) -> Result<PathBuf> {
    let resolved = normalize(path);
    let root_resolved = normalize(root);
    if resolved.starts_with(&root_resolved) {
        Ok(resolved)
    } else {
        Err(HarnessError::OutsideRoot {
            label: label.to_string(),
            root: root_resolved,
            path: resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_run(rps: f64) -> RunSample {
        RunSample {
            requests: 10,
            duration_seconds: 10.0 / rps,
            rps,
            latency_ms_p50: 1.0,
            latency_ms_p95: 1.5,
            latency_ms_p99: 2.0,
            latency_ms_max: 2.5,
        }
    }

    #[test]
    fn test_skipped_record_shape() {
        let record = RawRecord::skipped(
            "nestjs",
            "http://localhost:3002",
            REQUESTS_FAILED_REASON,
            "passed",
            Engine::Legacy,
        );
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], REQUESTS_FAILED_REASON);
        assert_eq!(json["engine"], "legacy");
        assert!(json.get("benchmark").is_none());
        assert!(record.run_stats().is_empty());
    }

    #[test]
    fn test_exclusion_reason_names() {
        let excluded = ExcludedSample {
            run_index: 3,
            reasons: vec![ExclusionReason::RpsOutlier, ExclusionReason::LatencyP95Outlier],
            run: sample_run(1000.0),
        };
        let json = serde_json::to_value(&excluded).unwrap();
        assert_eq!(json["reasons"][0], "rps_outlier");
        assert_eq!(json["reasons"][1], "latency_p95_outlier");
    }

    #[test]
    fn test_fence_record_from_none_is_null() {
        let json = serde_json::to_value(FenceRecord::from(None)).unwrap();
        assert!(json["lower"].is_null());
        assert!(json["upper"].is_null());
    }

    #[test]
    fn test_list_artifacts_sorted_json_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = list_artifacts(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_load_raw_values_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_raw_values(&dir.path().join("missing")),
            Err(HarnessError::MissingDirectory(_))
        ));
        assert!(matches!(
            load_raw_values(dir.path()),
            Err(HarnessError::NoArtifacts(_))
        ));

        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(
            load_raw_values(dir.path()),
            Err(HarnessError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_write_json_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json(&path, &serde_json::json!({"a": 1})).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("}\n"));
    }

    #[test]
    fn test_ensure_under_root() {
        let root = Path::new("/tmp/results/latest");
        assert!(ensure_under_root(&root.join("summary.json"), root, "Summary file").is_ok());
        assert!(ensure_under_root(root, root, "Summary file").is_ok());

        let err = ensure_under_root(&root.join("../outside.json"), root, "Summary file")
            .unwrap_err();
        assert!(err.to_string().contains("must be under"));
    }
}
