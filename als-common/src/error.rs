//! Common error types for ALS

use thiserror::Error;

/// Common result type for ALS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the ALS crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (dataset file, cache artifact)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Respondent answers cannot be scored (bad values, uncovered driver scale)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Historical data does not support the requested lookup
    #[error("Data completeness error: {0}")]
    DataCompleteness(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input data (dataset structure, membership notation)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
