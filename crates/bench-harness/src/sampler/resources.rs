//! Container resource stats for a sampled target.

use regex::Regex;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::debug;

use crate::artifact::{DockerStats, ResourcesNormalized};

/// Factor converting one unit to megabytes
fn unit_to_mb(unit: &str) -> Option<f64> {
    let factor = match unit {
        "b" => 1.0 / (1024.0 * 1024.0),
        "kb" => 1.0 / 1000.0,
        "kib" => 1.0 / 1024.0,
        "mb" | "mib" => 1.0,
        "gb" => 1000.0,
        "gib" => 1024.0,
        "tb" => 1000.0 * 1000.0,
        "tib" => 1024.0 * 1024.0,
        _ => return None,
    };
    Some(factor)
}

/// Amount then alphabetic unit, e.g. `128MiB` or `2 GB`
static MEMORY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:\.[0-9]+)?)\s*([a-zA-Z]+)$")
        .expect("Failed to compile memory amount regex")
});

/// Parse the usage half of a docker memory column, e.g. `"128MiB / 1GiB"`.
///
/// ```
/// use bench_harness::sampler::resources::parse_mem_to_mb;
///
/// assert_eq!(parse_mem_to_mb("128MiB / 1GiB"), Some(128.0));
/// assert_eq!(parse_mem_to_mb("1GiB / 2GiB"), Some(1024.0));
/// assert_eq!(parse_mem_to_mb("lots"), None);
/// ```
pub fn parse_mem_to_mb(value: &str) -> Option<f64> {
    let head = value.split('/').next()?.trim();
    let caps = MEMORY_AMOUNT.captures(head)?;
    let amount: f64 = caps[1].parse().ok()?;
    Some(amount * unit_to_mb(&caps[2].to_ascii_lowercase())?)
}

/// Parse a docker CPU column such as `"12.5%"`.
pub fn parse_cpu_percent(value: &str) -> Option<f64> {
    let raw = value.trim();
    raw.strip_suffix('%').unwrap_or(raw).trim().parse().ok()
}

/// Match a `name|memory|cpu` line against a framework's container name.
///
/// The container matches on its exact name, a `framework-` prefix, or a
/// `-framework` suffix (compose project naming).
pub fn match_stats_line(line: &str, framework: &str) -> Option<DockerStats> {
    let mut parts = line.splitn(3, '|');
    let (name, memory, cpu) = (parts.next()?, parts.next()?, parts.next()?);

    let matches = name == framework
        || name.starts_with(&format!("{}-", framework))
        || name.ends_with(&format!("-{}", framework));
    if !matches {
        return None;
    }

    Some(DockerStats {
        container: Some(name.to_string()),
        memory: Some(memory.to_string()),
        cpu: Some(cpu.to_string()),
    })
}

/// Query `docker stats` once. Any failure yields empty stats.
pub async fn collect_docker_stats(framework: &str) -> DockerStats {
    let output = Command::new("docker")
        .args([
            "stats",
            "--no-stream",
            "--format",
            "{{.Name}}|{{.MemUsage}}|{{.CPUPerc}}",
        ])
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            debug!("docker stats unavailable: {}", e);
            return DockerStats::default();
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| match_stats_line(line, framework))
        .unwrap_or_default()
}

/// Normalize docker stats and warmup startup latency into numeric fields.
pub fn normalize(docker: &DockerStats, startup_ms: Option<f64>) -> ResourcesNormalized {
    ResourcesNormalized {
        memory_mb: docker.memory.as_deref().and_then(parse_mem_to_mb),
        cpu_percent: docker.cpu.as_deref().and_then(parse_cpu_percent),
        startup_ms,
    }
}
