//! Error types for the deployment watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("deployment status unreachable after {attempts} consecutive attempts: {last_error}")]
    Unreachable { attempts: u32, last_error: String },

    #[error("invalid deployment settings: {0}")]
    Config(#[from] apiwatch_core::ConfigError),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}
