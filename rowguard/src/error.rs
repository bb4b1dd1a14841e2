//! Error types for the rowguard library.

use thiserror::Error;

/// The error type returned by all fallible rowguard operations.
#[derive(Error, Debug)]
pub enum DqError {
    /// One or more check specifications failed validation. Carries the full
    /// newline-separated error listing so every offending spec can be fixed
    /// in one pass.
    #[error("invalid check specification:\n{0}")]
    InvalidCheckSpec(String),

    /// A check referenced a function that is not registered.
    #[error("check function '{0}' is not defined")]
    UnknownFunction(String),

    /// A rule carries a criticality outside the recognized set.
    #[error("invalid criticality value: {0}")]
    InvalidCriticality(String),

    /// A checks file does not exist at the given path.
    #[error("checks file {0} missing")]
    MissingFile(String),

    /// A checks file exists but holds no usable check specifications.
    #[error("invalid or no checks in file: {0}")]
    NoChecksInFile(String),

    /// A check or rule was constructed with arguments the builder cannot use.
    #[error("invalid check arguments: {0}")]
    InvalidArguments(String),

    /// An invariant inside rowguard was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// Error from the underlying query engine.
    #[error(transparent)]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow array handling.
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error from the persistence layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias used throughout rowguard.
pub type Result<T> = std::result::Result<T, DqError>;

impl From<serde_yaml::Error> for DqError {
    fn from(err: serde_yaml::Error) -> Self {
        DqError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DqError {
    fn from(err: serde_json::Error) -> Self {
        DqError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DqError::UnknownFunction("no_such_check".to_string());
        assert_eq!(err.to_string(), "check function 'no_such_check' is not defined");

        let err = DqError::InvalidCriticality("fatal".to_string());
        assert_eq!(err.to_string(), "invalid criticality value: fatal");

        let err = DqError::MissingFile("checks.yml".to_string());
        assert_eq!(err.to_string(), "checks file checks.yml missing");
    }

    #[test]
    fn test_invalid_spec_carries_full_listing() {
        let err = DqError::InvalidCheckSpec("first error\nsecond error".to_string());
        let text = err.to_string();
        assert!(text.contains("first error"));
        assert!(text.contains("second error"));
    }
}
