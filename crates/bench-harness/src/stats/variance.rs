//! Dispersion measures used for stability gating.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator), `None` below two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let squared_diffs: f64 = values.iter().map(|&x| (x - mean).powi(2)).sum();
    Some((squared_diffs / (values.len() - 1) as f64).sqrt())
}

/// Coefficient of variation (sample std dev / mean).
///
/// Fewer than two values, or a zero mean, yield `0.0` rather than an
/// undefined ratio.
///
/// # Examples
///
/// ```
/// use bench_harness::stats::variance::coefficient_of_variation;
///
/// assert_eq!(coefficient_of_variation(&[100.0, 100.0, 100.0]), 0.0);
/// assert_eq!(coefficient_of_variation(&[42.0]), 0.0);
/// assert!(coefficient_of_variation(&[90.0, 110.0]) > 0.1);
/// ```
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let (Some(mean), Some(std_dev)) = (mean(values), sample_std_dev(values)) else {
        return 0.0;
    };
    if mean == 0.0 {
        return 0.0;
    }
    std_dev / mean
}
