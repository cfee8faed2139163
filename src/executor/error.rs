//! Domain-specific error types for executor operations.
//!
//! Typed errors let the exec runner and the CLI distinguish failure modes
//! (daemon unreachable, timeout, exec failure) without parsing message
//! strings. At the envelope boundary they are rendered with `to_string()`.

use std::time::Duration;

/// Errors that can occur while driving the container daemon.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ExecutorError {
    /// The Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DaemonUnavailable { message: String },

    /// An exec exceeded its timeout.
    #[error("execution timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// A daemon operation failed (exec create/start/inspect, copy, etc.).
    #[error("{message}")]
    Daemon { message: String },
}

impl ExecutorError {
    /// Creates a `DaemonUnavailable` error.
    pub(crate) fn daemon_unavailable(message: impl Into<String>) -> Self {
        Self::DaemonUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error from a `Duration`.
    pub(crate) fn timeout(duration: Duration) -> Self {
        Self::Timeout {
            timeout_secs: duration.as_secs(),
        }
    }

    /// Creates a `Daemon` error.
    pub(crate) fn daemon(message: impl Into<String>) -> Self {
        Self::Daemon {
            message: message.into(),
        }
    }

    /// Returns true if this is a timeout error.
    #[allow(dead_code)] // Available for callers that retry on timeout
    pub(crate) fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<bollard::errors::Error> for ExecutorError {
    fn from(e: bollard::errors::Error) -> Self {
        Self::daemon(e.to_string())
    }
}
