//! Error types for the simulation study.

use thiserror::Error;

/// Errors for data generation, model fitting, and artifact handling.
#[derive(Error, Debug)]
pub enum RuidoError {
    /// Rejected before any cell runs.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A single cell's fit or tuning search failed; the sweep continues.
    #[error("fit failed for {family}: {reason}")]
    Fit { family: String, reason: String },

    /// A per-unit artifact could not be read or parsed.
    #[error("artifact {path}: {reason}")]
    Artifact { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, RuidoError>;

impl RuidoError {
    /// Shorthand for per-cell fit failures.
    pub fn fit(family: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RuidoError::Fit {
            family: family.into(),
            reason: reason.to_string(),
        }
    }
}
