//! Error types for the runner crate.

use thiserror::Error;

/// Errors that can occur while launching or supervising the Claude CLI.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Claude CLI executable was not found
    #[error(
        "Claude CLI not found. Install with: npm install -g @anthropic-ai/claude-code\n\nSearched in:\n{searched_paths}"
    )]
    CliNotFound {
        /// Paths that were searched for the CLI
        searched_paths: String,
    },

    /// A resume session id did not match the expected `^[a-f0-9-]+$` shape
    #[error("Invalid session_id format: {0:?}")]
    InvalidSessionId(String),

    /// Process spawn or I/O failure
    #[error("Process error: {0}")]
    Process(#[from] std::io::Error),
}

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_not_found_display() {
        let err = RunnerError::CliNotFound {
            searched_paths: "/usr/local/bin\n/usr/bin".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("npm install -g @anthropic-ai/claude-code"));
        assert!(msg.contains("/usr/local/bin"));
    }

    #[test]
    fn test_invalid_session_id_display() {
        let err = RunnerError::InvalidSessionId("abc; rm -rf /".to_string());
        assert!(err.to_string().contains("Invalid session_id"));
    }
}
