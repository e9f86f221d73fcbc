//! # lorekeep-retrieval
//!
//! Retrieval orchestration for the lorekeep knowledge base: a registry of
//! pluggable storage backends, a composite engine that routes and fans
//! queries and index operations out across them, and a hybrid adapter that
//! computes embeddings on the way into vector-capable backends.
//!
//! ## Key Modules
//!
//! - **[`types`]**: backend and capability enumerations, index units, query
//!   parameters and results
//! - **[`engine`]**: the [`EngineRegistry`], [`HybridIndexEngine`], and
//!   [`CompositeRetrieveEngine`], plus the contracts between them
//! - **[`config`]**: wiring and embedder configuration, loadable from TOML
//!
//! ## Architecture
//!
//! ```text
//! caller → CompositeRetrieveEngine → HybridIndexEngine → IndexRepository
//!                                          ↓
//!                                   EmbeddingPool → Embedder
//! ```
//!
//! The composite is built once from `(engine type, retriever type)` wiring
//! pairs and is immutable afterwards. Queries route to the single engine
//! granted their retriever type; indexing, deletion, and copying fan out to
//! every registered engine concurrently, returning the first observed error.
//! Multi-backend mutations are not transactional — a sibling's committed
//! write is not rolled back when another backend fails.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lorekeep_retrieval::config::RetrievalConfig;
//! use lorekeep_retrieval::engine::composite::CompositeRetrieveEngine;
//! use lorekeep_retrieval::engine::registry::EngineRegistry;
//!
//! # async fn example(registry: EngineRegistry) -> anyhow::Result<()> {
//! let config = RetrievalConfig::load("retrieval.toml").await?;
//! let composite = CompositeRetrieveEngine::new(&registry, &config.engines)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::RetrievalConfig;
pub use engine::composite::CompositeRetrieveEngine;
pub use engine::hybrid::HybridIndexEngine;
pub use engine::registry::EngineRegistry;
pub use engine::traits::{IndexRepository, RetrieveEngine};
pub use error::{Result, RetrievalError};
pub use types::{
    IndexInfo, IndexParams, IndexWithScore, MatchType, RetrieveParams, RetrieveResult,
    RetrieverEngineParams, RetrieverEngineType, RetrieverType, SourceType,
};
