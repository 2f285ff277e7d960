//! Error types for the exoclass model lifecycle engine

use thiserror::Error;

/// Result type alias for exoclass operations
pub type Result<T> = std::result::Result<T, ExoClassError>;

/// Main error type for the exoclass engine
#[derive(Error, Debug)]
pub enum ExoClassError {
    #[error("Schema error: required column `{column}` is missing")]
    Schema { column: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Version conflict: {model}/{version} already exists")]
    VersionConflict { model: String, version: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    NotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for ExoClassError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExoClassError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ExoClassError {
    fn from(err: serde_json::Error) -> Self {
        ExoClassError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ExoClassError {
    fn from(err: bincode::Error) -> Self {
        ExoClassError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExoClassError::Schema {
            column: "koi_disposition".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema error: required column `koi_disposition` is missing"
        );
    }

    #[test]
    fn test_version_conflict_display() {
        let err = ExoClassError::VersionConflict {
            model: "koi_classifier".to_string(),
            version: "v1.0.1".to_string(),
        };
        assert!(err.to_string().contains("koi_classifier/v1.0.1"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExoClassError = io_err.into();
        assert!(matches!(err, ExoClassError::Io(_)));
    }
}
