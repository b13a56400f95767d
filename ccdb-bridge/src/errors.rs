//! Error types for the bridge.

use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Discord transport failure (network, HTTP 5xx, disconnect)
    #[error("Discord transport error: {0}")]
    Transport(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Runner failure
    #[error("Runner error: {0}")]
    Runner(#[from] ccdb_runner::RunnerError),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serenity::Error> for BridgeError {
    fn from(e: serenity::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
