//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Output count must be at least one
    #[error("output count must be >= 1, got {count}")]
    InvalidCount { count: usize },

    /// Weighted strategy cannot be built from the given weights
    #[error("invalid weights: {message}")]
    InvalidWeights { message: String },

    /// Dispatcher was started outside of a tokio runtime
    #[error("dispatcher must be spawned from within a tokio runtime")]
    NoRuntime,

    /// Configuration error (from contract)
    #[error("config error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create an invalid weights error
    pub fn invalid_weights(message: impl Into<String>) -> Self {
        Self::InvalidWeights {
            message: message.into(),
        }
    }
}
