//! Hybrid keyword/vector index engine
//!
//! One [`HybridIndexEngine`] exists per registered backend. It adapts a raw
//! storage repository (save/retrieve/delete/copy) into the
//! [`RetrieveEngine`] contract, computing embeddings on the way in when the
//! granted retriever types include vector retrieval.

use crate::engine::traits::{IndexRepository, RetrieveEngine};
use crate::error::Result;
use crate::types::{
    IndexInfo, IndexParams, RetrieveParams, RetrieveResult, RetrieverEngineType, RetrieverType,
};
use async_trait::async_trait;
use lorekeep_embed::{Embedder, EmbeddingPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Batch-save window when vectors are attached.
const VECTOR_BATCH_SIZE: usize = 20;
/// Batch-save window for keyword-only persistence.
const KEYWORD_BATCH_SIZE: usize = 10;
/// Attempts at batch embedding before a batch index aborts.
const BATCH_EMBED_ATTEMPTS: usize = 5;
/// Pause between embedding attempts.
const EMBED_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Adapter from one storage repository to the retrieval-engine contract.
pub struct HybridIndexEngine {
    repository: Arc<dyn IndexRepository>,
    engine_type: RetrieverEngineType,
    pool: EmbeddingPool,
}

impl HybridIndexEngine {
    pub fn new(
        repository: Arc<dyn IndexRepository>,
        engine_type: RetrieverEngineType,
        pool: EmbeddingPool,
    ) -> Self {
        Self {
            repository,
            engine_type,
            pool,
        }
    }

    /// Batch-embed with bounded retry; transient pool/provider failures get
    /// [`BATCH_EMBED_ATTEMPTS`] tries spaced [`EMBED_RETRY_DELAY`] apart.
    async fn embed_with_retry(
        &self,
        embedder: Arc<dyn Embedder>,
        contents: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let mut last_err = None;
        for attempt in 1..=BATCH_EMBED_ATTEMPTS {
            match self.pool.batch_embed(Arc::clone(&embedder), contents).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(err) => {
                    warn!(
                        "batch embedding failed on {} (attempt {attempt}/{BATCH_EMBED_ATTEMPTS}): {err}",
                        self.engine_type
                    );
                    last_err = Some(err);
                    tokio::time::sleep(EMBED_RETRY_DELAY).await;
                }
            }
        }
        Err(last_err.expect("at least one attempt was made").into())
    }
}

#[async_trait]
impl RetrieveEngine for HybridIndexEngine {
    fn engine_type(&self) -> RetrieverEngineType {
        self.engine_type
    }

    fn support(&self) -> Vec<RetrieverType> {
        self.repository.support()
    }

    async fn retrieve(&self, params: RetrieveParams) -> Result<Vec<RetrieveResult>> {
        Ok(self.repository.retrieve(params).await?)
    }

    async fn index(
        &self,
        embedder: Arc<dyn Embedder>,
        info: &IndexInfo,
        retriever_types: &[RetrieverType],
    ) -> Result<()> {
        let mut params = IndexParams::default();
        if retriever_types.contains(&RetrieverType::Vector) {
            let vector = embedder.embed(&info.content).await?;
            params.embeddings.insert(info.chunk_id.clone(), vector);
        }
        Ok(self.repository.save(info, &params).await?)
    }

    async fn batch_index(
        &self,
        embedder: Arc<dyn Embedder>,
        infos: &[IndexInfo],
        retriever_types: &[RetrieverType],
    ) -> Result<()> {
        if infos.is_empty() {
            return Ok(());
        }

        if retriever_types.contains(&RetrieverType::Vector) {
            let contents: Vec<String> = infos.iter().map(|info| info.content.clone()).collect();
            let embeddings = self.embed_with_retry(embedder, &contents).await?;

            // Windows align with embedding order: entry j of window i carries
            // embeddings[i * VECTOR_BATCH_SIZE + j].
            for (window, chunk) in infos.chunks(VECTOR_BATCH_SIZE).enumerate() {
                let mut params = IndexParams::default();
                for (offset, info) in chunk.iter().enumerate() {
                    params.embeddings.insert(
                        info.source_id.clone(),
                        embeddings[window * VECTOR_BATCH_SIZE + offset].clone(),
                    );
                }
                self.repository.batch_save(chunk, &params).await?;
            }
            return Ok(());
        }

        let params = IndexParams::default();
        for chunk in infos.chunks(KEYWORD_BATCH_SIZE) {
            self.repository.batch_save(chunk, &params).await?;
        }
        Ok(())
    }

    async fn estimate_storage_size(
        &self,
        embedder: Arc<dyn Embedder>,
        infos: &[IndexInfo],
        retriever_types: &[RetrieverType],
    ) -> i64 {
        let mut params = IndexParams::default();
        if retriever_types.contains(&RetrieverType::Vector) {
            // Zero-filled vectors at the declared dimensionality are enough
            // to size the estimate; no embedding call is made.
            for info in infos {
                params
                    .embeddings
                    .insert(info.chunk_id.clone(), vec![0.0; embedder.dimensions()]);
            }
        }
        self.repository.estimate_storage_size(infos, &params).await
    }

    async fn delete_by_chunk_ids(&self, chunk_ids: &[String], dimension: usize) -> Result<()> {
        Ok(self
            .repository
            .delete_by_chunk_ids(chunk_ids, dimension)
            .await?)
    }

    async fn delete_by_knowledge_ids(
        &self,
        knowledge_ids: &[String],
        dimension: usize,
    ) -> Result<()> {
        Ok(self
            .repository
            .delete_by_knowledge_ids(knowledge_ids, dimension)
            .await?)
    }

    async fn copy_indices(
        &self,
        source_knowledge_base_id: &str,
        kb_id_map: &HashMap<String, String>,
        chunk_id_map: &HashMap<String, String>,
        target_knowledge_base_id: &str,
        dimension: usize,
    ) -> Result<()> {
        info!(
            "copying indices from knowledge base {source_knowledge_base_id} to {target_knowledge_base_id}, {} mappings",
            chunk_id_map.len()
        );
        Ok(self
            .repository
            .copy_indices(
                source_knowledge_base_id,
                kb_id_map,
                chunk_id_map,
                target_knowledge_base_id,
                dimension,
            )
            .await?)
    }
}
