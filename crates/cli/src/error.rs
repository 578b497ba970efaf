//! Error types for CLI operations.

use dispatcher::DispatcherError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Dispatcher could not be started
    #[error("Failed to start dispatcher: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// A producer, consumer or dispatcher task failed
    #[error("Task '{task}' failed: {message}")]
    Task { task: String, message: String },

    /// Simulation did not finish in time
    #[error("Simulation timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn task(task: impl Into<String>, source: tokio::task::JoinError) -> Self {
        Self::Task {
            task: task.into(),
            message: source.to_string(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
