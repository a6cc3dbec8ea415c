//! Common error types for CGM

use thiserror::Error;

/// Common result type for CGM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across CGM crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of stored columns failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation conflicts with current state (e.g. territory already checked out)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error, including rows that fail to decode
    #[error("Internal error: {0}")]
    Internal(String),
}
