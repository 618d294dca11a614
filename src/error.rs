//! Error types for tree operations and configuration loading

use thiserror::Error;

/// Errors returned by mutating tree operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// No open slot exists within the configured height bound.
    ///
    /// Callers should treat this as resource exhaustion: grow the bound or
    /// reject new peers. Retrying without a delete in between cannot succeed.
    #[error("tree is full: no open slot within {max_height} levels")]
    CapacityExceeded { max_height: usize },

    /// Absent or stale peer handle
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
