//! Error types for the amplicon-predict library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Input abundance data violates the count-data contract.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// The external predictor exited with a nonzero status.
    #[error("Command `{command}` returned with non-zero exit status `{code}`. Check the logs for details")]
    ExternalTool { command: String, code: i32 },

    /// Dropped entities of a padded table do not match the known drop causes.
    #[error("Reconciliation failed for {table}: {reason}")]
    Reconciliation { table: String, reason: String },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Expected predictor output {0:?} does not exist")]
    MissingOutput(PathBuf),

    #[error("Empty data: {0}")]
    EmptyData(String),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, PredictError>;
