//! Error types shared across Connex crates

use thiserror::Error;

/// Result type alias for Connex operations
pub type Result<T> = std::result::Result<T, ConnexError>;

/// Main error type for Connex
#[derive(Error, Debug)]
pub enum ConnexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record whose `time` field is missing or cannot be parsed.
    ///
    /// Never fatal: callers treat such records as infinitely recent.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
