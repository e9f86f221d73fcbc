//! Composite retrieval engine
//!
//! The top-level façade over every registered backend. Built once from the
//! wiring pairs `(engine type, retriever type)`, it routes each query to the
//! backend granted that capability and fans indexing, deletion, and copy
//! operations out to all of its engines concurrently.
//!
//! Multi-backend mutations are not transactional: when one backend commits
//! and a sibling fails, the committed work is not compensated. The first
//! observed error is returned and partial success is never reported as
//! overall success.

use crate::engine::registry::EngineRegistry;
use crate::engine::traits::RetrieveEngine;
use crate::error::{Result, RetrievalError};
use crate::types::{
    IndexInfo, RetrieveParams, RetrieveResult, RetrieverEngineParams, RetrieverType,
};
use itertools::Itertools;
use lorekeep_embed::Embedder;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// One registered engine and the retriever types it was granted.
struct EngineInfo {
    engine: Arc<dyn RetrieveEngine>,
    retriever_types: Vec<RetrieverType>,
}

/// Façade aggregating multiple retrieval engines behind one contract.
///
/// The engine set is resolved eagerly at construction and immutable
/// afterwards, so operations read it without locking.
pub struct CompositeRetrieveEngine {
    engine_infos: Vec<EngineInfo>,
}

impl CompositeRetrieveEngine {
    /// Build a composite from wiring pairs, resolving each engine through
    /// the registry.
    ///
    /// Fails fast: an unknown engine type or a capability the engine does
    /// not declare aborts construction; no partial composite is returned.
    /// Pairs resolving to the same engine are grouped into one entry
    /// holding all of its granted capabilities.
    pub fn new(registry: &EngineRegistry, engine_params: &[RetrieverEngineParams]) -> Result<Self> {
        let mut engine_infos: Vec<EngineInfo> = Vec::new();
        for params in engine_params {
            let engine = registry.get(params.retriever_engine_type)?;
            if !engine.support().contains(&params.retriever_type) {
                return Err(RetrievalError::UnsupportedRetriever {
                    engine: engine.engine_type(),
                    retriever: params.retriever_type,
                });
            }
            let existing = engine_infos
                .iter()
                .position(|info| info.engine.engine_type() == engine.engine_type());
            match existing {
                Some(i) => {
                    let info = &mut engine_infos[i];
                    if !info.retriever_types.contains(&params.retriever_type) {
                        info.retriever_types.push(params.retriever_type);
                    }
                }
                None => engine_infos.push(EngineInfo {
                    engine,
                    retriever_types: vec![params.retriever_type],
                }),
            }
        }
        Ok(Self { engine_infos })
    }

    /// Whether any engine was granted the given retriever type.
    pub fn support_retriever(&self, retriever_type: RetrieverType) -> bool {
        self.engine_infos
            .iter()
            .any(|info| info.retriever_types.contains(&retriever_type))
    }

    /// The engine granted a retriever type, if any.
    fn engine_for(&self, retriever_type: RetrieverType) -> Option<Arc<dyn RetrieveEngine>> {
        self.engine_infos
            .iter()
            .find(|info| info.retriever_types.contains(&retriever_type))
            .map(|info| Arc::clone(&info.engine))
    }

    /// Execute a batch of queries, one concurrent task per query.
    ///
    /// Each task routes its query to the engine granted that retriever type
    /// and reports over a channel to a single collecting loop. The batch is
    /// all-or-nothing: every task runs to completion, but if any reported an
    /// error the first observed error is returned and all results, including
    /// those from successful tasks, are discarded.
    pub async fn retrieve(&self, params: Vec<RetrieveParams>) -> Result<Vec<RetrieveResult>> {
        let (tx, mut rx) = mpsc::channel(params.len().max(1));
        let mut tasks = JoinSet::new();
        for param in params {
            let retriever_type = param.retriever_type;
            let engine = self.engine_for(retriever_type);
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = match engine {
                    Some(engine) => engine.retrieve(param).await,
                    None => Err(RetrievalError::RetrieverTypeNotFound(retriever_type)),
                };
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut results = Vec::new();
        let mut first_err = None;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(mut batch) => results.append(&mut batch),
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            joined?;
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    /// Fan an operation out to every registered engine, join all tasks, and
    /// return the first observed error if any.
    async fn for_each_engine<F, Fut>(&self, op: F) -> Result<()>
    where
        F: Fn(Arc<dyn RetrieveEngine>, Vec<RetrieverType>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for info in &self.engine_infos {
            tasks.spawn(op(Arc::clone(&info.engine), info.retriever_types.clone()));
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(()) => {}
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Index one entry on every registered engine.
    ///
    /// Each engine decides internally whether to embed, based on the
    /// retriever types it was granted.
    pub async fn index(&self, embedder: Arc<dyn Embedder>, info: IndexInfo) -> Result<()> {
        debug!(
            "indexing source {} with model {}",
            info.source_id,
            embedder.model_name()
        );
        let info = Arc::new(info);
        self.for_each_engine(move |engine, retriever_types| {
            let embedder = Arc::clone(&embedder);
            let info = Arc::clone(&info);
            async move {
                if let Err(err) = engine.index(embedder, &info, &retriever_types).await {
                    error!("engine {} failed to index: {err}", engine.engine_type());
                    return Err(err);
                }
                Ok(())
            }
        })
        .await
    }

    /// Index a batch of entries on every registered engine.
    ///
    /// The input is deduplicated by source ID first, keeping the first
    /// occurrence of each, so no embedding or persistence work is repeated.
    pub async fn batch_index(
        &self,
        embedder: Arc<dyn Embedder>,
        infos: Vec<IndexInfo>,
    ) -> Result<()> {
        let infos: Vec<IndexInfo> = infos
            .into_iter()
            .unique_by(|info| info.source_id.clone())
            .collect();
        debug!(
            "batch indexing {} entries with model {}",
            infos.len(),
            embedder.model_name()
        );
        let infos: Arc<[IndexInfo]> = infos.into();
        self.for_each_engine(move |engine, retriever_types| {
            let embedder = Arc::clone(&embedder);
            let infos = Arc::clone(&infos);
            async move {
                if let Err(err) = engine
                    .batch_index(embedder, &infos, &retriever_types)
                    .await
                {
                    error!(
                        "engine {} failed to batch index: {err}",
                        engine.engine_type()
                    );
                    return Err(err);
                }
                Ok(())
            }
        })
        .await
    }

    /// Delete entries by chunk ID on every registered engine.
    pub async fn delete_by_chunk_ids(&self, chunk_ids: Vec<String>, dimension: usize) -> Result<()> {
        let chunk_ids: Arc<[String]> = chunk_ids.into();
        self.for_each_engine(move |engine, _| {
            let chunk_ids = Arc::clone(&chunk_ids);
            async move {
                if let Err(err) = engine.delete_by_chunk_ids(&chunk_ids, dimension).await {
                    error!(
                        "engine {} failed to delete chunk IDs: {err}",
                        engine.engine_type()
                    );
                    return Err(err);
                }
                Ok(())
            }
        })
        .await
    }

    /// Delete entries by knowledge ID on every registered engine.
    pub async fn delete_by_knowledge_ids(
        &self,
        knowledge_ids: Vec<String>,
        dimension: usize,
    ) -> Result<()> {
        let knowledge_ids: Arc<[String]> = knowledge_ids.into();
        self.for_each_engine(move |engine, _| {
            let knowledge_ids = Arc::clone(&knowledge_ids);
            async move {
                if let Err(err) = engine
                    .delete_by_knowledge_ids(&knowledge_ids, dimension)
                    .await
                {
                    error!(
                        "engine {} failed to delete knowledge IDs: {err}",
                        engine.engine_type()
                    );
                    return Err(err);
                }
                Ok(())
            }
        })
        .await
    }

    /// Copy indexed entries between knowledge bases on every registered
    /// engine, remapping identifiers through the given maps.
    pub async fn copy_indices(
        &self,
        source_knowledge_base_id: String,
        target_knowledge_base_id: String,
        kb_id_map: HashMap<String, String>,
        chunk_id_map: HashMap<String, String>,
        dimension: usize,
    ) -> Result<()> {
        let source = Arc::new(source_knowledge_base_id);
        let target = Arc::new(target_knowledge_base_id);
        let kb_id_map = Arc::new(kb_id_map);
        let chunk_id_map = Arc::new(chunk_id_map);
        self.for_each_engine(move |engine, _| {
            let source = Arc::clone(&source);
            let target = Arc::clone(&target);
            let kb_id_map = Arc::clone(&kb_id_map);
            let chunk_id_map = Arc::clone(&chunk_id_map);
            async move {
                if let Err(err) = engine
                    .copy_indices(&source, &kb_id_map, &chunk_id_map, &target, dimension)
                    .await
                {
                    error!(
                        "engine {} failed to copy indices: {err}",
                        engine.engine_type()
                    );
                    return Err(err);
                }
                Ok(())
            }
        })
        .await
    }

    /// Estimate the bytes this batch would occupy across every registered
    /// engine. Best-effort: per-engine estimates are summed, and a task that
    /// fails to join is logged and excluded rather than surfaced.
    pub async fn estimate_storage_size(
        &self,
        embedder: Arc<dyn Embedder>,
        infos: Vec<IndexInfo>,
    ) -> i64 {
        let infos: Arc<[IndexInfo]> = infos.into();
        let sum = Arc::new(AtomicI64::new(0));
        let mut tasks = JoinSet::new();
        for info in &self.engine_infos {
            let engine = Arc::clone(&info.engine);
            let retriever_types = info.retriever_types.clone();
            let embedder = Arc::clone(&embedder);
            let infos = Arc::clone(&infos);
            let sum = Arc::clone(&sum);
            tasks.spawn(async move {
                let bytes = engine
                    .estimate_storage_size(embedder, &infos, &retriever_types)
                    .await;
                sum.fetch_add(bytes, Ordering::Relaxed);
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!("storage estimate task failed: {err}");
            }
        }
        sum.load(Ordering::Relaxed)
    }
}
