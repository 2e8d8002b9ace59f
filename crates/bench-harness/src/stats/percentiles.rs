//! Order statistics for run samples.
//!
//! All quantiles use linear interpolation between closest ranks over the
//! sorted data (the "inclusive" method): position `p * (n - 1)`.

use std::cmp::Ordering;

fn sorted_copy(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Interpolated quantile over data that is already sorted ascending.
fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let rank = q * (sorted.len() - 1) as f64;
    let lower_index = rank.floor() as usize;
    let upper_index = rank.ceil() as usize;

    if lower_index == upper_index {
        Some(sorted[lower_index])
    } else {
        let lower_value = sorted[lower_index];
        let upper_value = sorted[upper_index];
        let fraction = rank - lower_index as f64;
        Some(lower_value + fraction * (upper_value - lower_value))
    }
}

/// Calculate a percentile from unsorted samples.
///
/// # Arguments
///
/// * `samples` - Slice of samples (sorted internally)
/// * `p` - Percentile to calculate (0.0 to 100.0)
///
/// # Returns
///
/// `None` if `samples` is empty or `p` is out of range.
///
/// # Examples
///
/// ```
/// use bench_harness::stats::percentiles::percentile;
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile(&data, 50.0), Some(3.0));
/// ```
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if !(0.0..=100.0).contains(&p) {
        return None;
    }
    quantile_sorted(&sorted_copy(samples), p / 100.0)
}

/// Median of unsorted samples.
pub fn median(samples: &[f64]) -> Option<f64> {
    percentile(samples, 50.0)
}

/// First and third quartile, inclusive method.
///
/// ```
/// use bench_harness::stats::percentiles::quartiles;
///
/// let (q1, q3) = quartiles(&[100.0, 101.0, 99.0, 500.0]).unwrap();
/// assert_eq!(q1, 99.75);
/// assert_eq!(q3, 200.75);
/// ```
pub fn quartiles(samples: &[f64]) -> Option<(f64, f64)> {
    let sorted = sorted_copy(samples);
    Some((quantile_sorted(&sorted, 0.25)?, quantile_sorted(&sorted, 0.75)?))
}

/// Latency distribution of the successful requests in one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyPercentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl LatencyPercentiles {
    /// Summarize per-request durations. `None` when there are none.
    ///
    /// Uses the inclusive (type 7) rule, so p95/p99 never exceed `max`.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(samples);
        Some(LatencyPercentiles {
            p50: quantile_sorted(&sorted, 0.50)?,
            p95: quantile_sorted(&sorted, 0.95)?,
            p99: quantile_sorted(&sorted, 0.99)?,
            max: *sorted.last()?,
        })
    }

    /// Same latency for every percentile, used when only a batch total is known.
    pub fn uniform(latency: f64) -> Self {
        LatencyPercentiles {
            p50: latency,
            p95: latency,
            p99: latency,
            max: latency,
        }
    }
}
