//! Statistical analysis of benchmark runs
//!
//! Order statistics, IQR outlier detection and the coefficient of variation.
//!
//! # Examples
//!
//! ```
//! use bench_harness::stats::{coefficient_of_variation, median, OutlierReport};
//!
//! let rps = vec![1000.0, 1010.0, 990.0, 400.0, 1005.0];
//!
//! let outliers = OutlierReport::detect(&rps);
//! let clean = outliers.clean_samples(&rps);
//!
//! println!("median: {:?}, cv: {}", median(&clean), coefficient_of_variation(&clean));
//! ```

pub mod outliers;
pub mod percentiles;
pub mod variance;

pub use outliers::{Fences, OutlierReport};
pub use percentiles::{median, percentile, quartiles, LatencyPercentiles};
pub use variance::coefficient_of_variation;
