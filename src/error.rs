//! Error types for mousestyles

use thiserror::Error;

/// Errors that can occur while loading or annotating recordings
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Invalid feature '{name}': must be one of {{{recognized}}}")]
    InvalidFeature { name: String, recognized: String },

    #[error("Invalid subject key: {0}")]
    InvalidSubjectKey(String),

    #[error("Missing interval data for feature {0}")]
    MissingIntervalData(String),

    #[error("Missing movement data for {0}")]
    MissingMovementData(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Malformed array file: {0}")]
    ArrayFormat(String),

    #[error("File name does not encode a subject-day: {0}")]
    InvalidFilename(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
