//! Contracts between the composite engine, per-backend engines, and storage
//!
//! Two seams exist here. [`IndexRepository`] is what each storage backend
//! (relational full-text, search-engine clusters, graph store) implements;
//! its query and index execution is opaque to this crate. [`RetrieveEngine`]
//! is what the registry stores and the composite fans out to — usually a
//! [`HybridIndexEngine`](super::hybrid::HybridIndexEngine) wrapping one
//! repository.

use crate::error::Result;
use crate::types::{
    IndexInfo, IndexParams, RetrieveParams, RetrieveResult, RetrieverEngineType, RetrieverType,
};
use async_trait::async_trait;
use lorekeep_embed::Embedder;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage-backend contract, one implementation per backend.
///
/// All methods take a caller-cancellable future; implementations should
/// abort promptly when the future is dropped rather than hanging on a dead
/// connection. `estimate_storage_size` is best-effort and has no error
/// channel.
#[async_trait]
pub trait IndexRepository: Send + Sync {
    /// Persist one index entry.
    async fn save(&self, info: &IndexInfo, params: &IndexParams) -> anyhow::Result<()>;

    /// Persist a batch of index entries in one backend call.
    async fn batch_save(&self, infos: &[IndexInfo], params: &IndexParams) -> anyhow::Result<()>;

    /// Execute one retrieval query.
    async fn retrieve(&self, params: RetrieveParams) -> anyhow::Result<Vec<RetrieveResult>>;

    /// Delete entries by chunk ID.
    async fn delete_by_chunk_ids(&self, chunk_ids: &[String], dimension: usize)
    -> anyhow::Result<()>;

    /// Delete entries by knowledge ID.
    async fn delete_by_knowledge_ids(
        &self,
        knowledge_ids: &[String],
        dimension: usize,
    ) -> anyhow::Result<()>;

    /// Copy indexed entries from one knowledge base to another, remapping
    /// identifiers, without recomputing embeddings.
    async fn copy_indices(
        &self,
        source_knowledge_base_id: &str,
        kb_id_map: &HashMap<String, String>,
        chunk_id_map: &HashMap<String, String>,
        target_knowledge_base_id: &str,
        dimension: usize,
    ) -> anyhow::Result<()>;

    /// Estimate the bytes this batch would occupy. Best-effort.
    async fn estimate_storage_size(&self, infos: &[IndexInfo], params: &IndexParams) -> i64;

    /// The retriever types this backend can serve. Static declaration.
    fn support(&self) -> Vec<RetrieverType>;
}

/// A registered retrieval engine: what the composite fans out to.
#[async_trait]
pub trait RetrieveEngine: Send + Sync {
    /// The backend identifier this engine registers under.
    fn engine_type(&self) -> RetrieverEngineType;

    /// The retriever types this engine can serve.
    fn support(&self) -> Vec<RetrieverType>;

    /// Execute one retrieval query.
    async fn retrieve(&self, params: RetrieveParams) -> Result<Vec<RetrieveResult>>;

    /// Index one entry, embedding its content when `retriever_types`
    /// includes vector retrieval.
    async fn index(
        &self,
        embedder: Arc<dyn Embedder>,
        info: &IndexInfo,
        retriever_types: &[RetrieverType],
    ) -> Result<()>;

    /// Index a batch of entries, embedding when requested.
    async fn batch_index(
        &self,
        embedder: Arc<dyn Embedder>,
        infos: &[IndexInfo],
        retriever_types: &[RetrieverType],
    ) -> Result<()>;

    /// Estimate the bytes this batch would occupy. Best-effort.
    async fn estimate_storage_size(
        &self,
        embedder: Arc<dyn Embedder>,
        infos: &[IndexInfo],
        retriever_types: &[RetrieverType],
    ) -> i64;

    /// Delete entries by chunk ID.
    async fn delete_by_chunk_ids(&self, chunk_ids: &[String], dimension: usize) -> Result<()>;

    /// Delete entries by knowledge ID.
    async fn delete_by_knowledge_ids(
        &self,
        knowledge_ids: &[String],
        dimension: usize,
    ) -> Result<()>;

    /// Copy indexed entries between knowledge bases, remapping identifiers.
    async fn copy_indices(
        &self,
        source_knowledge_base_id: &str,
        kb_id_map: &HashMap<String, String>,
        chunk_id_map: &HashMap<String, String>,
        target_knowledge_base_id: &str,
        dimension: usize,
    ) -> Result<()>;
}
