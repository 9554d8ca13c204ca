//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for shared callrun operations
pub type Result<T> = std::result::Result<T, CallrunError>;

/// Main error type for callrun
#[derive(Error, Debug)]
pub enum CallrunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record artifact: {0}")]
    InvalidArtifact(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl CallrunError {
    /// Whether the error came from the filesystem rather than from content
    pub fn is_io(&self) -> bool {
        matches!(self, CallrunError::Io(_))
    }
}
