//! Daemon-level error types.
//!
//! Everything here is fatal: the daemon's recovery story for a divergent
//! kernel view is to exit and relearn kernel state at the next start, so
//! errors propagate to `main`, get logged, and terminate the process.

use std::io;
use thiserror::Error;

use crate::kernel::KernelError;

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Fatal daemon errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The kernel refused an interface or routing operation.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Discovery found kernel state the model cannot represent.
    #[error("inconsistent kernel state: {0}")]
    Discovery(String),

    /// Invalid command line or configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Replay file or socket I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl DaemonError {
    pub fn discovery(message: impl Into<String>) -> Self {
        DaemonError::Discovery(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        DaemonError::Config(message.into())
    }
}
