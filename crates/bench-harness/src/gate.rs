//! CI quality gate combining variance and regression checks

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifact::RawRecord;
use crate::config::Policy;
use crate::error::CheckOutcome;
use crate::quality::{CheckStatus, VarianceSummary};
use crate::regression::{ComparisonTool, DeltaParser, RegressionComparator, RegressionSummary};

/// Schema tag of the combined gate record
pub const GATE_SCHEMA_VERSION: &str = "ci-v1";

/// Which sub-check produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSource {
    Variance,
    Regression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub source: FailureSource,
    pub framework: String,
    pub message: String,
}

/// Combined verdict; keeps every failure, not just the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub schema_version: String,
    pub generated_at: String,
    pub status: CheckStatus,
    pub variance: VarianceSummary,
    pub regression: RegressionSummary,
    pub failures: Vec<Failure>,
}

impl QualitySummary {
    /// Combine sub-check results. Variance failures are listed first.
    pub fn combine(variance: VarianceSummary, regression: RegressionSummary) -> Self {
        let mut failures: Vec<Failure> = variance
            .violations()
            .map(|v| Failure {
                source: FailureSource::Variance,
                framework: v.framework.clone(),
                message: v.message.clone(),
            })
            .collect();
        failures.extend(
            regression
                .failures()
                .into_iter()
                .map(|(framework, message)| Failure {
                    source: FailureSource::Regression,
                    framework,
                    message,
                }),
        );

        let status = if !failures.is_empty() {
            CheckStatus::Failed
        } else if variance.status == CheckStatus::Skipped
            && regression.status == CheckStatus::Skipped
        {
            CheckStatus::Skipped
        } else {
            CheckStatus::Passed
        };

        QualitySummary {
            schema_version: GATE_SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            status,
            variance,
            regression,
            failures,
        }
    }

    pub fn passed(&self) -> bool {
        self.status != CheckStatus::Failed
    }

    /// First recorded failure, used as the operator-facing message.
    pub fn headline(&self) -> Option<&str> {
        self.failures.first().map(|f| f.message.as_str())
    }
}

/// Evaluates raw records against the policy.
pub struct QualityGate<'a, T: ComparisonTool, D: DeltaParser> {
    policy: &'a Policy,
    comparator: RegressionComparator<T, D>,
}

impl<'a, T: ComparisonTool, D: DeltaParser> QualityGate<'a, T, D> {
    pub fn new(policy: &'a Policy, comparator: RegressionComparator<T, D>) -> Self {
        Self { policy, comparator }
    }

    /// Variance over every `ok` record, then one regression pass.
    ///
    /// A comparison tool error still yields the combined summary, with the
    /// error carried alongside it.
    pub async fn evaluate(&self, records: &[RawRecord]) -> CheckOutcome<QualitySummary> {
        let variance =
            VarianceSummary::from_records(self.policy.quality.variance_thresholds_cv, records);
        let regression = self.comparator.run(records, &self.policy.regression).await;

        let outcome = regression.map(|regression| QualitySummary::combine(variance, regression));
        info!(
            "Quality gate {:?}: {} failure(s) across {} target(s)",
            outcome.summary.status,
            outcome.summary.failures.len(),
            outcome.summary.variance.targets.len()
        );
        outcome
    }
}
