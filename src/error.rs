//! Error types for the composable-emcomp library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum ImputeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Insufficient data: need at least {required} usable rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Singular covariance: observed sub-covariance of row {row} is not invertible")]
    SingularCovariance { row: usize },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImputeError {
    /// True for failures caused by malformed inputs, which the caller can fix
    /// before retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ImputeError::Configuration(_) | ImputeError::InvalidValue { .. }
        )
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, ImputeError>;
