//! End-to-end composite retrieval over in-memory storage backends.
//!
//! Two backends stand in for the real storage engines: a hybrid
//! keyword/vector one and a keyword-only one. Everything flows through the
//! public wiring path: TOML config → registry → composite.

use async_trait::async_trait;
use lorekeep_embed::{Embedder, EmbeddingPool};
use lorekeep_retrieval::{
    CompositeRetrieveEngine, EngineRegistry, HybridIndexEngine, IndexInfo, IndexParams,
    IndexRepository, IndexWithScore, MatchType, RetrievalConfig, RetrieveParams, RetrieveResult,
    RetrieverEngineType, RetrieverType, SourceType,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct StoredEntry {
    info: IndexInfo,
    embedding: Option<Vec<f32>>,
}

/// Storage backend double: a map of chunk ID to stored entry.
struct InMemoryRepository {
    engine_type: RetrieverEngineType,
    supported: Vec<RetrieverType>,
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl InMemoryRepository {
    fn new(engine_type: RetrieverEngineType, supported: Vec<RetrieverType>) -> Arc<Self> {
        Arc::new(Self {
            engine_type,
            supported,
            entries: Mutex::new(HashMap::new()),
        })
    }

    fn store(&self, info: &IndexInfo, params: &IndexParams) {
        // Single saves key embeddings by chunk ID, batch saves by source ID.
        let embedding = params
            .embeddings
            .get(&info.chunk_id)
            .or_else(|| params.embeddings.get(&info.source_id))
            .cloned();
        self.entries.lock().unwrap().insert(
            info.chunk_id.clone(),
            StoredEntry {
                info: info.clone(),
                embedding,
            },
        );
    }
}

#[async_trait]
impl IndexRepository for InMemoryRepository {
    async fn save(&self, info: &IndexInfo, params: &IndexParams) -> anyhow::Result<()> {
        self.store(info, params);
        Ok(())
    }

    async fn batch_save(&self, infos: &[IndexInfo], params: &IndexParams) -> anyhow::Result<()> {
        for info in infos {
            self.store(info, params);
        }
        Ok(())
    }

    async fn retrieve(&self, params: RetrieveParams) -> anyhow::Result<Vec<RetrieveResult>> {
        let entries = self.entries.lock().unwrap();
        let results: Vec<IndexWithScore> = entries
            .values()
            .filter(|entry| {
                entry.info.content.contains(&params.query)
                    && (params.knowledge_base_ids.is_empty()
                        || params
                            .knowledge_base_ids
                            .contains(&entry.info.knowledge_base_id))
            })
            .filter(|entry| {
                params.retriever_type != RetrieverType::Vector || entry.embedding.is_some()
            })
            .take(params.top_k)
            .map(|entry| IndexWithScore {
                id: entry.info.id.clone(),
                content: entry.info.content.clone(),
                source_id: entry.info.source_id.clone(),
                source_type: entry.info.source_type,
                chunk_id: entry.info.chunk_id.clone(),
                knowledge_id: entry.info.knowledge_id.clone(),
                knowledge_base_id: entry.info.knowledge_base_id.clone(),
                score: 1.0,
                match_type: match params.retriever_type {
                    RetrieverType::Vector => MatchType::Embedding,
                    _ => MatchType::Keywords,
                },
            })
            .collect();

        Ok(vec![RetrieveResult {
            results,
            engine_type: self.engine_type,
            retriever_type: params.retriever_type,
        }])
    }

    async fn delete_by_chunk_ids(
        &self,
        chunk_ids: &[String],
        _dimension: usize,
    ) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        for chunk_id in chunk_ids {
            entries.remove(chunk_id);
        }
        Ok(())
    }

    async fn delete_by_knowledge_ids(
        &self,
        knowledge_ids: &[String],
        _dimension: usize,
    ) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|_, entry| !knowledge_ids.contains(&entry.info.knowledge_id));
        Ok(())
    }

    async fn copy_indices(
        &self,
        source_knowledge_base_id: &str,
        kb_id_map: &HashMap<String, String>,
        chunk_id_map: &HashMap<String, String>,
        _target_knowledge_base_id: &str,
        _dimension: usize,
    ) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let copies: Vec<StoredEntry> = entries
            .values()
            .filter(|entry| entry.info.knowledge_base_id == source_knowledge_base_id)
            .cloned()
            .collect();
        for mut copy in copies {
            if let Some(target_kb) = kb_id_map.get(&copy.info.knowledge_base_id) {
                copy.info.knowledge_base_id = target_kb.clone();
            }
            if let Some(target_chunk) = chunk_id_map.get(&copy.info.chunk_id) {
                copy.info.chunk_id = target_chunk.clone();
            }
            entries.insert(copy.info.chunk_id.clone(), copy);
        }
        Ok(())
    }

    async fn estimate_storage_size(&self, infos: &[IndexInfo], params: &IndexParams) -> i64 {
        let content: usize = infos.iter().map(|info| info.content.len()).sum();
        let vectors: usize = params
            .embeddings
            .values()
            .map(|v| v.len() * std::mem::size_of::<f32>())
            .sum();
        (content + vectors) as i64
    }

    fn support(&self) -> Vec<RetrieverType> {
        self.supported.clone()
    }
}

/// Deterministic embedder: vector of the content length, repeated.
struct LengthEmbedder;

#[async_trait]
impl Embedder for LengthEmbedder {
    async fn embed(&self, text: &str) -> lorekeep_embed::Result<Vec<f32>> {
        Ok(vec![text.len() as f32; 3])
    }

    async fn batch_embed(&self, texts: &[String]) -> lorekeep_embed::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.len() as f32; 3]).collect())
    }

    fn model_name(&self) -> &str {
        "length"
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_id(&self) -> &str {
        "length"
    }
}

const WIRING: &str = r#"
    [[engines]]
    retriever_engine_type = "postgres"
    retriever_type = "keywords"

    [[engines]]
    retriever_engine_type = "postgres"
    retriever_type = "vector"

    [[engines]]
    retriever_engine_type = "elasticsearch_v8"
    retriever_type = "keywords"
"#;

struct Fixture {
    composite: CompositeRetrieveEngine,
    postgres: Arc<InMemoryRepository>,
    elastic: Arc<InMemoryRepository>,
}

fn fixture() -> Fixture {
    let pool = EmbeddingPool::new(4);
    let postgres = InMemoryRepository::new(
        RetrieverEngineType::Postgres,
        vec![RetrieverType::Keywords, RetrieverType::Vector],
    );
    let elastic = InMemoryRepository::new(
        RetrieverEngineType::ElasticsearchV8,
        vec![RetrieverType::Keywords],
    );

    let registry = EngineRegistry::new();
    registry
        .register(Arc::new(HybridIndexEngine::new(
            Arc::clone(&postgres) as Arc<dyn IndexRepository>,
            RetrieverEngineType::Postgres,
            pool.clone(),
        )))
        .unwrap();
    registry
        .register(Arc::new(HybridIndexEngine::new(
            Arc::clone(&elastic) as Arc<dyn IndexRepository>,
            RetrieverEngineType::ElasticsearchV8,
            pool,
        )))
        .unwrap();

    let config = RetrievalConfig::from_toml_str(WIRING).unwrap();
    let composite = CompositeRetrieveEngine::new(&registry, &config.engines).unwrap();

    Fixture {
        composite,
        postgres,
        elastic,
    }
}

fn index_info(n: usize, knowledge_base_id: &str) -> IndexInfo {
    IndexInfo {
        id: format!("idx-{n}"),
        content: format!("searchable content {n}"),
        source_id: format!("src-{n}"),
        source_type: SourceType::Chunk,
        chunk_id: format!("chunk-{n}"),
        knowledge_id: format!("k-{n}"),
        knowledge_base_id: knowledge_base_id.to_string(),
    }
}

#[tokio::test]
async fn test_index_retrieve_delete_round_trip() {
    let fixture = fixture();
    let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder);

    // Duplicate source IDs collapse before persistence.
    let mut infos: Vec<IndexInfo> = (0..7).map(|n| index_info(n, "kb-1")).collect();
    infos.push(index_info(3, "kb-1"));
    fixture
        .composite
        .batch_index(Arc::clone(&embedder), infos)
        .await
        .unwrap();

    assert_eq!(fixture.postgres.entries.lock().unwrap().len(), 7);
    assert_eq!(fixture.elastic.entries.lock().unwrap().len(), 7);
    // The vector-capable backend stored embeddings; the keyword-only one
    // persisted bare entries.
    assert!(
        fixture
            .postgres
            .entries
            .lock()
            .unwrap()
            .values()
            .all(|entry| entry.embedding.is_some())
    );
    assert!(
        fixture
            .elastic
            .entries
            .lock()
            .unwrap()
            .values()
            .all(|entry| entry.embedding.is_none())
    );

    // Both retriever types resolve, vector to postgres and keywords to the
    // first engine granted it.
    let results = fixture
        .composite
        .retrieve(vec![
            RetrieveParams::new("content 3", RetrieverType::Vector),
            RetrieveParams::new("content 5", RetrieverType::Keywords),
        ])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    let total_hits: usize = results.iter().map(|r| r.results.len()).sum();
    assert_eq!(total_hits, 2);

    // Deletes fan out to every backend.
    fixture
        .composite
        .delete_by_chunk_ids(vec!["chunk-3".to_string()], 3)
        .await
        .unwrap();
    assert_eq!(fixture.postgres.entries.lock().unwrap().len(), 6);
    assert_eq!(fixture.elastic.entries.lock().unwrap().len(), 6);

    let results = fixture
        .composite
        .retrieve(vec![RetrieveParams::new("content 3", RetrieverType::Vector)])
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.results.is_empty()));
}

#[tokio::test]
async fn test_unwired_retriever_type_fails_whole_batch() {
    let fixture = fixture();
    let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder);

    fixture
        .composite
        .index(Arc::clone(&embedder), index_info(0, "kb-1"))
        .await
        .unwrap();

    // One resolvable query plus one for a capability nobody serves: the
    // whole batch fails and no partial results come back.
    let err = fixture
        .composite
        .retrieve(vec![
            RetrieveParams::new("content 0", RetrieverType::Keywords),
            RetrieveParams::new("anything", RetrieverType::Graph),
        ])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("graph"));

    assert!(!fixture.composite.support_retriever(RetrieverType::Graph));
}

#[tokio::test]
async fn test_copy_indices_remaps_into_target_knowledge_base() {
    let fixture = fixture();
    let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder);

    fixture
        .composite
        .batch_index(
            Arc::clone(&embedder),
            (0..3).map(|n| index_info(n, "kb-1")).collect(),
        )
        .await
        .unwrap();

    let kb_id_map = HashMap::from([("kb-1".to_string(), "kb-2".to_string())]);
    let chunk_id_map: HashMap<String, String> = (0..3)
        .map(|n| (format!("chunk-{n}"), format!("chunk-copy-{n}")))
        .collect();

    fixture
        .composite
        .copy_indices(
            "kb-1".to_string(),
            "kb-2".to_string(),
            kb_id_map,
            chunk_id_map,
            3,
        )
        .await
        .unwrap();

    let mut params = RetrieveParams::new("searchable", RetrieverType::Keywords);
    params.knowledge_base_ids = vec!["kb-2".to_string()];
    let results = fixture.composite.retrieve(vec![params]).await.unwrap();
    let hits: Vec<&IndexWithScore> = results.iter().flat_map(|r| r.results.iter()).collect();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|hit| hit.knowledge_base_id == "kb-2"));
    assert!(hits.iter().all(|hit| hit.chunk_id.starts_with("chunk-copy-")));
}

#[tokio::test]
async fn test_estimate_storage_size_covers_all_backends() {
    let fixture = fixture();
    let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder);
    let infos: Vec<IndexInfo> = (0..2).map(|n| index_info(n, "kb-1")).collect();
    let content: usize = infos.iter().map(|info| info.content.len()).sum();

    let bytes = fixture
        .composite
        .estimate_storage_size(Arc::clone(&embedder), infos)
        .await;

    // Postgres sizes content plus zero-filled vectors, elasticsearch content
    // only.
    let vectors = 2 * 3 * std::mem::size_of::<f32>();
    assert_eq!(bytes, (content * 2 + vectors) as i64);
}
