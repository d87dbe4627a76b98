//! Error types for control-plane API access.

use thiserror::Error;

/// Result type alias for control-plane API calls.
pub type CfResult<T> = Result<T, CfError>;

#[derive(Debug, Error)]
pub enum CfError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot fetch token: {0}")]
    Token(String),

    /// A structured control-plane error body.
    #[error("cfclient error ({error_code}|{code}): {description}")]
    Api {
        code: u64,
        error_code: String,
        description: String,
    },

    #[error("unexpected response {status} from {url}: {body}")]
    Status {
        url: String,
        status: String,
        body: String,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("{kind} named {name:?} not found")]
    NotFound { kind: &'static str, name: String },
}
