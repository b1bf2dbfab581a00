//! Error types for the survival core crate

use thiserror::Error;

/// Errors that can occur while preprocessing, scoring or loading artifacts
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller supplied data that cannot be processed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A record referenced a column the model was not trained on
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A transformer step was used before `fit`
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// Model or transformer structure is inconsistent
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Artifacts on disk do not match their manifest or each other
    #[error("Artifact mismatch: {0}")]
    ArtifactMismatch(String),

    /// Configuration could not be parsed or is out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for survival core operations
pub type Result<T> = std::result::Result<T, CoreError>;
