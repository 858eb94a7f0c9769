//! Error types for Lorekeeper.

use thiserror::Error;

/// Top-level error type for Lorekeeper content and configuration operations.
#[derive(Debug, Error)]
pub enum LorekeeperError {
    /// Content (quiz sets, encounter data) errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },
}

/// Content loading errors.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Content file not found
    #[error("Content not found: {0}")]
    NotFound(String),

    /// Content could not be parsed
    #[error("Failed to parse content: {0}")]
    Parse(String),
}

/// Result type alias for Lorekeeper operations.
pub type LorekeeperResult<T> = Result<T, LorekeeperError>;
