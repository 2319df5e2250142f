//! Error types for the modelport crate

use thiserror::Error;

/// Result type alias for modelport operations
pub type Result<T> = std::result::Result<T, ModelPortError>;

/// Main error type for the modelport crate
#[derive(Error, Debug)]
pub enum ModelPortError {
    #[error("Data error: {0}")]
    Data(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Graph conversion failed: unsupported operator {0}")]
    UnsupportedOperator(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for ModelPortError {
    fn from(err: polars::error::PolarsError) -> Self {
        ModelPortError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ModelPortError {
    fn from(err: serde_json::Error) -> Self {
        ModelPortError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ModelPortError {
    fn from(err: ndarray::ShapeError) -> Self {
        ModelPortError::SchemaMismatch {
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
        let err = ModelPortError::Data("bad row".to_string());
        assert_eq!(err.to_string(), "Data error: bad row");
    }

    #[test]
    fn test_schema_mismatch_display() {
        let err = ModelPortError::SchemaMismatch {
            expected: "Age, Sex_female".to_string(),
            actual: "Age".to_string(),
        };
        assert!(err.to_string().contains("expected Age, Sex_female"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ModelPortError = io_err.into();
        assert!(matches!(err, ModelPortError::Io(_)));
    }
}
