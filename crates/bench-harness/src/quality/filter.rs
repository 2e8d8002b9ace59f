//! Outlier exclusion across tracked metrics.

use tracing::warn;

use super::Metric;
use crate::artifact::{
    ExcludedSample, ExclusionReason, MedianBlock, OutlierThresholds, QualityBlock,
    QualityPolicyRecord, RunSample, VarianceRecord,
};
use crate::config::QualityPolicy;
use crate::stats::{coefficient_of_variation, median, OutlierReport};

/// Runs left after removing outliers flagged on any tracked metric.
///
/// Exclusion records keep the original run index so diagnostics trace back
/// to `run_stats`. If every run is flagged the full set is kept instead.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRunSet {
    runs: Vec<RunSample>,
    excluded: Vec<ExcludedSample>,
    rps_outliers: OutlierReport,
    latency_p95_outliers: OutlierReport,
    fell_back: bool,
}

impl FilteredRunSet {
    /// Classify outliers on throughput and p95 latency and filter them out.
    ///
    /// # Examples
    ///
    /// ```
    /// use bench_harness::artifact::RunSample;
    /// use bench_harness::quality::FilteredRunSet;
    ///
    /// let run = |rps: f64| RunSample {
    ///     requests: 100,
    ///     duration_seconds: 100.0 / rps,
    ///     rps,
    ///     latency_ms_p50: 1.0,
    ///     latency_ms_p95: 2.0,
    ///     latency_ms_p99: 3.0,
    ///     latency_ms_max: 4.0,
    /// };
    /// let runs = vec![run(100.0), run(101.0), run(99.0), run(500.0)];
    ///
    /// let filtered = FilteredRunSet::from_runs(&runs);
    /// assert_eq!(filtered.runs().len(), 3);
    /// assert_eq!(filtered.excluded()[0].run_index, 3);
    /// ```
    pub fn from_runs(run_stats: &[RunSample]) -> Self {
        let rps_outliers = OutlierReport::detect(&Metric::Rps.values(run_stats));
        let latency_p95_outliers = OutlierReport::detect(&Metric::LatencyP95.values(run_stats));

        let mut excluded = Vec::new();
        let mut kept = Vec::with_capacity(run_stats.len());
        for (run_index, run) in run_stats.iter().enumerate() {
            let mut reasons = Vec::new();
            if rps_outliers.contains(run_index) {
                reasons.push(ExclusionReason::RpsOutlier);
            }
            if latency_p95_outliers.contains(run_index) {
                reasons.push(ExclusionReason::LatencyP95Outlier);
            }

            if reasons.is_empty() {
                kept.push(*run);
            } else {
                excluded.push(ExcludedSample {
                    run_index,
                    reasons,
                    run: *run,
                });
            }
        }

        let fell_back = kept.is_empty() && !run_stats.is_empty();
        let runs = if fell_back {
            warn!(
                "All {} runs flagged as outliers, keeping the unfiltered set",
                run_stats.len()
            );
            run_stats.to_vec()
        } else {
            kept
        };

        FilteredRunSet {
            runs,
            excluded,
            rps_outliers,
            latency_p95_outliers,
            fell_back,
        }
    }

    /// Runs feeding the statistics
    pub fn runs(&self) -> &[RunSample] {
        &self.runs
    }

    /// Every flagged run, even when the fallback kept them
    pub fn excluded(&self) -> &[ExcludedSample] {
        &self.excluded
    }

    /// Number of runs actually left out of the statistics.
    pub fn excluded_count(&self) -> usize {
        if self.fell_back {
            0
        } else {
            self.excluded.len()
        }
    }

    /// Whether filtering would have emptied the set
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn outlier_report(&self, metric: Metric) -> Option<&OutlierReport> {
        match metric {
            Metric::Rps => Some(&self.rps_outliers),
            Metric::LatencyP95 => Some(&self.latency_p95_outliers),
            Metric::LatencyP50 | Metric::LatencyP99 => None,
        }
    }

    pub fn values(&self, metric: Metric) -> Vec<f64> {
        metric.values(&self.runs)
    }

    pub fn cv(&self, metric: Metric) -> f64 {
        coefficient_of_variation(&self.values(metric))
    }

    /// Medians of the filtered runs, `None` if there are no runs at all.
    pub fn median(&self) -> Option<MedianBlock> {
        Some(MedianBlock {
            rps: median(&self.values(Metric::Rps))?,
            latency_ms_p50: median(&self.values(Metric::LatencyP50))?,
            latency_ms_p95: median(&self.values(Metric::LatencyP95))?,
            latency_ms_p99: median(&self.values(Metric::LatencyP99))?,
        })
    }

    pub fn variance(&self) -> VarianceRecord {
        VarianceRecord {
            rps_cv: self.cv(Metric::Rps),
            latency_ms_p95_cv: self.cv(Metric::LatencyP95),
            latency_ms_p99_cv: self.cv(Metric::LatencyP99),
        }
    }

    /// Quality block embedded in the raw artifact.
    pub fn quality_block(&self, policy: &QualityPolicy) -> QualityBlock {
        QualityBlock {
            policy: QualityPolicyRecord {
                outlier_method: policy.outlier_method,
                outlier_thresholds: OutlierThresholds {
                    rps: self.rps_outliers.fences.into(),
                    latency_ms_p95: self.latency_p95_outliers.fences.into(),
                },
                variance_thresholds_cv: policy.variance_thresholds_cv,
            },
            excluded_samples: self.excluded.clone(),
            effective_runs: self.runs.len(),
            variance: self.variance(),
        }
    }
}
