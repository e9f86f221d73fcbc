//! Registry of retrieval engines, keyed by backend type

use crate::engine::traits::RetrieveEngine;
use crate::error::{Result, RetrievalError};
use crate::types::RetrieverEngineType;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Thread-safe map from backend type to its registered engine.
///
/// Each backend type registers at most once; a second attempt fails and the
/// first registration is kept. Reads proceed concurrently with each other
/// and exclude writes.
pub struct EngineRegistry {
    engines: RwLock<HashMap<RetrieverEngineType, Arc<dyn RetrieveEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Register an engine under its declared type.
    pub fn register(&self, engine: Arc<dyn RetrieveEngine>) -> Result<()> {
        let engine_type = engine.engine_type();
        let mut engines = self.engines.write().unwrap();
        if engines.contains_key(&engine_type) {
            return Err(RetrievalError::DuplicateEngine(engine_type));
        }
        engines.insert(engine_type, engine);
        info!("registered retrieval engine {engine_type}");
        Ok(())
    }

    /// Look up the engine registered for a backend type.
    pub fn get(&self, engine_type: RetrieverEngineType) -> Result<Arc<dyn RetrieveEngine>> {
        self.engines
            .read()
            .unwrap()
            .get(&engine_type)
            .cloned()
            .ok_or(RetrievalError::EngineNotFound(engine_type))
    }

    /// All registered engines, as a defensive copy.
    pub fn get_all(&self) -> Vec<Arc<dyn RetrieveEngine>> {
        self.engines.read().unwrap().values().cloned().collect()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndexInfo, RetrieveParams, RetrieveResult, RetrieverType};
    use async_trait::async_trait;
    use lorekeep_embed::Embedder;

    struct StubEngine {
        engine_type: RetrieverEngineType,
    }

    #[async_trait]
    impl RetrieveEngine for StubEngine {
        fn engine_type(&self) -> RetrieverEngineType {
            self.engine_type
        }

        fn support(&self) -> Vec<RetrieverType> {
            vec![RetrieverType::Keywords]
        }

        async fn retrieve(&self, _params: RetrieveParams) -> crate::error::Result<Vec<RetrieveResult>> {
            Ok(Vec::new())
        }

        async fn index(
            &self,
            _embedder: std::sync::Arc<dyn Embedder>,
            _info: &IndexInfo,
            _retriever_types: &[RetrieverType],
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn batch_index(
            &self,
            _embedder: std::sync::Arc<dyn Embedder>,
            _infos: &[IndexInfo],
            _retriever_types: &[RetrieverType],
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn estimate_storage_size(
            &self,
            _embedder: std::sync::Arc<dyn Embedder>,
            _infos: &[IndexInfo],
            _retriever_types: &[RetrieverType],
        ) -> i64 {
            0
        }

        async fn delete_by_chunk_ids(
            &self,
            _chunk_ids: &[String],
            _dimension: usize,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn delete_by_knowledge_ids(
            &self,
            _knowledge_ids: &[String],
            _dimension: usize,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn copy_indices(
            &self,
            _source_knowledge_base_id: &str,
            _kb_id_map: &std::collections::HashMap<String, String>,
            _chunk_id_map: &std::collections::HashMap<String, String>,
            _target_knowledge_base_id: &str,
            _dimension: usize,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = EngineRegistry::new();
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::Postgres,
            }))
            .unwrap();

        let engine = registry.get(RetrieverEngineType::Postgres).unwrap();
        assert_eq!(engine.engine_type(), RetrieverEngineType::Postgres);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = EngineRegistry::new();
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::Postgres,
            }))
            .unwrap();

        let err = registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::Postgres,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DuplicateEngine(RetrieverEngineType::Postgres)
        ));

        // The first registration is retained.
        assert_eq!(registry.get_all().len(), 1);
    }

    #[test]
    fn test_get_missing_engine_fails() {
        let registry = EngineRegistry::new();
        let err = registry.get(RetrieverEngineType::Neo4j).err().unwrap();
        assert!(matches!(
            err,
            RetrievalError::EngineNotFound(RetrieverEngineType::Neo4j)
        ));
    }

    #[test]
    fn test_get_all_returns_copy() {
        let registry = EngineRegistry::new();
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::Postgres,
            }))
            .unwrap();
        registry
            .register(Arc::new(StubEngine {
                engine_type: RetrieverEngineType::ElasticsearchV8,
            }))
            .unwrap();

        let mut all = registry.get_all();
        assert_eq!(all.len(), 2);
        all.clear();
        // Mutating the copy does not touch the registry.
        assert_eq!(registry.get_all().len(), 2);
    }
}
