//! Benchmark harness for HTTP framework comparisons
//!
//! This crate measures HTTP targets with repeated timed request batches and
//! gates CI on the statistical quality of those measurements.
//!
//! # Features
//!
//! - **Sampling**: Warmup plus N sequential request batches per target, with
//!   an optional `hyperfine`-driven engine
//! - **Outlier Detection**: IQR x 1.5 fences on throughput and p95 latency
//! - **Variance Gating**: Coefficient-of-variation thresholds per metric
//! - **Regression Comparison**: Per-operation cost deltas against a baseline
//!   via `benchstat`
//! - **Reports**: JSON summary, console tables and a Markdown report
//!
//! # Pipeline
//!
//! ```text
//! Sampler ──► raw-v1 artifact ──► FilteredRunSet ──► VarianceSummary ──┐
//!                    │                                                  ├──► QualitySummary
//!                    └──────────► RegressionComparator ─────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bench_harness::checks::{ci_check, ResultsLayout};
//! use bench_harness::regression::{Benchstat, RegressionComparator};
//! use bench_harness::Policy;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let policy = Policy::load("stats-policy.json")?;
//! let comparator = RegressionComparator::new(Benchstat::new(&policy.regression.tool));
//!
//! let summary = ci_check(&ResultsLayout::default(), &policy, comparator, None).await?;
//! println!("{:?}", summary.status);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod checks;
pub mod config;
pub mod error;
pub mod gate;
pub mod quality;
pub mod regression;
pub mod reporter;
pub mod sampler;
pub mod stats;

// Re-export main types for convenience
pub use artifact::{RawRecord, RunSample};
pub use config::Policy;
pub use error::{CheckOutcome, HarnessError, Result};
pub use gate::{QualityGate, QualitySummary};
pub use reporter::{OutputFormat, Reporter};
pub use sampler::{Sampler, Target};
