//! Error types for fivwall-core

use thiserror::Error;

/// Result type alias using fivwall-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in local note store operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input, including unreadable import payloads
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
