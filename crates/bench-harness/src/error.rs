//! Error types for checks, artifact I/O and external tools

use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions that end a check invocation.
///
/// Sampling failures and short sample sets are not represented here: they
/// degrade to `skipped` artifacts or empty outlier reports instead.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Raw results directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("No raw benchmark files found in: {0}")]
    NoArtifacts(PathBuf),

    #[error("Malformed JSON in {path}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Raw schema validation failed for {path}: {message}")]
    Schema { path: PathBuf, message: String },

    #[error("Summary schema validation failed for {path}: {message}")]
    SummarySchema { path: PathBuf, message: String },

    #[error("Invalid or missing numeric field: {path}: {field}")]
    MissingNumber { path: PathBuf, field: String },

    #[error("Invalid normalized resource field in {path}: resources_normalized.{field}")]
    InvalidResource { path: PathBuf, field: String },

    #[error("Unexpected unit for {path}: metric_units.{key}={found}, expected {expected:?}")]
    UnexpectedUnit {
        path: PathBuf,
        key: String,
        found: String,
        expected: String,
    },

    #[error("{label} must be under {root}: {path}")]
    OutsideRoot {
        label: String,
        root: PathBuf,
        path: PathBuf,
    },

    #[error("{0} not found on PATH")]
    ToolUnavailable(String),

    #[error("{tool} failed: {output}")]
    ToolFailed { tool: String, output: String },

    #[error("Policy violation: {0}")]
    Policy(String),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn schema(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        HarnessError::Schema {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// A summary paired with the error that cut its check short, if any.
///
/// Checks persist `summary` before surfacing `error`.
#[derive(Debug)]
pub struct CheckOutcome<T> {
    pub summary: T,
    pub error: Option<HarnessError>,
}

impl<T> CheckOutcome<T> {
    pub fn complete(summary: T) -> Self {
        Self {
            summary,
            error: None,
        }
    }

    pub fn aborted(summary: T, error: HarnessError) -> Self {
        Self {
            summary,
            error: Some(error),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CheckOutcome<U> {
        CheckOutcome {
            summary: f(self.summary),
            error: self.error,
        }
    }

    /// Drop the summary and surface the abort error.
    pub fn into_result(self) -> Result<T> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.summary),
        }
    }
}
