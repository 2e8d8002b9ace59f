//! Outlier detection for per-run metrics.
//!
//! Runs are flagged with the Interquartile Range (IQR) rule: values outside
//! `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]` are outliers.

use super::percentiles::quartiles;

/// Fewer samples than this cannot produce meaningful quartiles.
pub const MIN_SAMPLES: usize = 4;

/// Fence multiplier applied to the IQR.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Lower and upper bounds outside which a value is an outlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fences {
    pub lower: f64,
    pub upper: f64,
}

/// Outliers found in one metric's per-run values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlierReport {
    /// Indices of flagged runs, ascending, in original run order
    pub outlier_indices: Vec<usize>,
    /// Fences used, or `None` when there were too few samples
    pub fences: Option<Fences>,
}

impl OutlierReport {
    /// Detect outliers in samples using the IQR rule.
    ///
    /// With fewer than [`MIN_SAMPLES`] values nothing is flagged and no
    /// fences are reported. A zero-width IQR (all values equal) reports its
    /// degenerate fences but flags nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use bench_harness::stats::outliers::OutlierReport;
    ///
    /// let report = OutlierReport::detect(&[100.0, 101.0, 99.0, 500.0]);
    /// assert_eq!(report.outlier_indices, vec![3]);
    ///
    /// let short = OutlierReport::detect(&[1.0, 2.0, 300.0]);
    /// assert!(short.fences.is_none());
    /// ```
    pub fn detect(samples: &[f64]) -> Self {
        if samples.len() < MIN_SAMPLES {
            return OutlierReport::default();
        }
        let Some((q1, q3)) = quartiles(samples) else {
            return OutlierReport::default();
        };

        let iqr = q3 - q1;
        let fences = Fences {
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        };

        if iqr <= 0.0 {
            return OutlierReport {
                outlier_indices: Vec::new(),
                fences: Some(fences),
            };
        }

        let outlier_indices = samples
            .iter()
            .enumerate()
            .filter_map(|(i, &value)| {
                if value < fences.lower || value > fences.upper {
                    Some(i)
                } else {
                    None
                }
            })
            .collect();

        OutlierReport {
            outlier_indices,
            fences: Some(fences),
        }
    }

    pub fn has_outliers(&self) -> bool {
        !self.outlier_indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.outlier_indices.binary_search(&index).is_ok()
    }

    /// Samples with the flagged indices removed, order preserved.
    pub fn clean_samples(&self, samples: &[f64]) -> Vec<f64> {
        samples
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.contains(*i))
            .map(|(_, &value)| value)
            .collect()
    }
}
