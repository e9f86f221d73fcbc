//! Error types for the retrieval layer

use crate::types::{RetrieverEngineType, RetrieverType};
use lorekeep_embed::EmbedError;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error type covering registry, composite, and engine operations.
///
/// Construction failures (`DuplicateEngine`, `EngineNotFound`,
/// `UnsupportedRetriever`) are fatal and surfaced before any composite
/// exists. `RetrieverTypeNotFound` is a dispatch failure that fails the
/// whole request batch. `Backend` wraps whatever a storage repository
/// reported; `Embed` carries embedding-provider failures.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// A second engine registration for an already-registered type
    #[error("retrieval engine {0} already registered")]
    DuplicateEngine(RetrieverEngineType),

    /// Lookup of an engine type nobody registered
    #[error("retrieval engine {0} not found")]
    EngineNotFound(RetrieverEngineType),

    /// Wiring asked an engine for a capability it does not declare
    #[error("retrieval engine {engine} does not support retriever type {retriever}")]
    UnsupportedRetriever {
        engine: RetrieverEngineType,
        retriever: RetrieverType,
    },

    /// A query named a retriever type no engine serves
    #[error("retriever type {0} not found")]
    RetrieverTypeNotFound(RetrieverType),

    /// Embedding provider failure
    #[error("embedding failed: {source}")]
    Embed {
        #[from]
        source: EmbedError,
    },

    /// Storage repository failure
    #[error("backend error: {source}")]
    Backend {
        #[from]
        source: anyhow::Error,
    },

    /// Async task join errors
    #[error("async task failed: {source}")]
    TaskJoin {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Configuration file could not be read
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[error("invalid configuration: {source}")]
    Config {
        #[from]
        source: toml::de::Error,
    },
}
