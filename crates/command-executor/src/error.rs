//! Error types for command execution

use std::time::Duration;
use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// A command ran but exited unsuccessfully while failures were fatal
    #[error("command failed with exit code {code:?}: {command}\n{stderr}")]
    CommandFailed {
        /// The shell command that failed
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// A command did not finish within the configured timeout
    #[error("command timed out after {timeout:?}: {command}")]
    Timeout {
        /// The shell command that was killed
        command: String,
        /// The timeout that expired
        timeout: Duration,
    },

    /// SSH connection failed
    #[cfg(feature = "ssh")]
    #[error("SSH connection failed to {host}: {reason}")]
    SshConnectionFailed {
        /// The hostname or IP address that failed to connect
        host: String,
        /// The detailed reason for the connection failure
        reason: String,
    },

    /// Copying a file to the target failed
    #[error("failed to upload {source_path} to {destination}: {reason}")]
    UploadFailed {
        /// Local path being uploaded
        source_path: String,
        /// Destination on the target
        destination: String,
        /// The reason for the failure
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Add layer context to an error message
    pub fn with_layer_context(self, layer: impl Into<String>) -> Self {
        match self {
            Error::SpawnFailed { reason } => Error::SpawnFailed {
                reason: format!("in {} layer: {}", layer.into(), reason),
            },
            other => other,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
