//! # lorekeep-embed
//!
//! Embedding providers for the lorekeep knowledge base: pluggable backends
//! that turn text into fixed-dimension vectors, plus the bounded worker pool
//! that parallelizes large batches.
//!
//! ## Providers
//!
//! - [`RemoteEmbedder`]: OpenAI-compatible HTTP endpoint with retry/backoff
//! - [`OllamaEmbedder`]: local Ollama runtime, with optional-mode degradation
//!   so the rest of the system runs when no local runtime is installed
//!
//! Both implement the [`Embedder`] trait and are selected per model through
//! [`EmbedderConfig`] and [`build_embedder`].
//!
//! ## Batching
//!
//! [`EmbeddingPool`] splits large text lists into fixed-size sub-batches,
//! dispatches them concurrently under a shared semaphore, and reassembles
//! results in input order. The pool is created once at startup, passed
//! explicitly to every component that embeds, and closed once at shutdown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lorekeep_embed::{EmbedderConfig, EmbeddingPool, ModelSource, build_embedder};
//! use std::sync::Arc;
//!
//! # async fn example() -> lorekeep_embed::Result<()> {
//! let embedder = build_embedder(
//!     EmbedderConfig {
//!         source: ModelSource::Remote,
//!         base_url: String::new(),
//!         model_name: "text-embedding-3-small".into(),
//!         api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!         truncate_prompt_tokens: 0,
//!         dimensions: 1536,
//!         model_id: "embedder-1".into(),
//!     },
//!     None,
//! )?;
//!
//! let pool = EmbeddingPool::new(8);
//! let texts = vec!["hello".to_string(), "world".to_string()];
//! let vectors = pool.batch_embed(Arc::clone(&embedder), &texts).await?;
//! assert_eq!(vectors.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ollama;
pub mod pool;
pub mod provider;
pub mod remote;

// Re-export main types for easy access
pub use config::{EmbedderConfig, ModelSource, build_embedder};
pub use error::{EmbedError, Result};
pub use ollama::{OllamaEmbedder, OllamaRuntime};
pub use pool::{EmbeddingPool, SUB_BATCH_SIZE};
pub use provider::Embedder;
pub use remote::RemoteEmbedder;
