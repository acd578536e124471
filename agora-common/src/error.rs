//! Common error types for Agora

use thiserror::Error;

/// Common result type for Agora operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Agora workspace members
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested votable or vote target not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vote value outside the {-1, 0, +1} domain
    #[error("Invalid vote value: {0} (expected -1, 0 or 1)")]
    InvalidVoteValue(i64),

    /// Parent assignment would close a cycle in the votable hierarchy
    #[error("Parent cycle detected at votable {0}")]
    ParentCycle(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
