//! Error types for the embedding layer

/// Result type for embedding operations.
///
/// Convenience alias using [`EmbedError`] as the error type, used throughout
/// the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type covering all embedding operations.
///
/// Covers configuration validation, the remote HTTP provider, the local model
/// runtime, and the bounded batch pool. Transport failures carry their
/// `reqwest` source for error chaining; everything else states which call
/// failed and why.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when an embedder configuration is invalid
    #[error("invalid embedder configuration: {message}")]
    InvalidConfig { message: String },

    /// Transport-level failure talking to an embedding endpoint
    #[error("embedding request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// The embedding endpoint answered with a non-success status
    #[error("embedding API error: HTTP {status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The endpoint answered 200 but the payload did not line up with the request
    #[error("malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// The local model runtime could not be reached and is not optional
    #[error("model runtime unavailable at {base_url}: {message}")]
    RuntimeUnavailable { base_url: String, message: String },

    /// Pulling a model into the local runtime failed
    #[error("failed to pull model {model}: {message}")]
    ModelPull { model: String, message: String },

    /// The embedding pool has been closed for shutdown
    #[error("embedding pool is closed")]
    PoolClosed,

    /// Async task join errors
    #[error("async task failed: {source}")]
    TaskJoin {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed-response error with a custom message.
    pub fn malformed_response<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}
