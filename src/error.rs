//! Error types for the transfusion experiment

use thiserror::Error;

/// Result type alias for experiment operations
pub type Result<T> = std::result::Result<T, TransfusionError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum TransfusionError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Log transform undefined for column '{column}': found value {value} at row {row}")]
    LogDomain { column: String, row: usize, value: f64 },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for TransfusionError {
    fn from(err: polars::error::PolarsError) -> Self {
        TransfusionError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TransfusionError {
    fn from(err: serde_json::Error) -> Self {
        TransfusionError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TransfusionError {
    fn from(err: ndarray::ShapeError) -> Self {
        TransfusionError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransfusionError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_log_domain_display() {
        let err = TransfusionError::LogDomain {
            column: "Monetary (c.c. blood)".to_string(),
            row: 3,
            value: 0.0,
        };
        assert!(err.to_string().contains("Monetary (c.c. blood)"));
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TransfusionError = io_err.into();
        assert!(matches!(err, TransfusionError::IoError(_)));
    }
}
