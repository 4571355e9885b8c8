//! Error types for graphlite

use thiserror::Error;

/// Core error type for graphlite operations
#[derive(Error, Debug)]
pub enum GraphliteError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Acquire timeout: {0}")]
    AcquireTimeout(String),

    #[error("Pool is shutting down")]
    ShuttingDown,

    #[error("Query error: {0}")]
    Query(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for graphlite operations
pub type Result<T> = std::result::Result<T, GraphliteError>;
