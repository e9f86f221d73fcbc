//! Core types shared across retrieval engines

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a concrete storage backend implementation.
///
/// Unique key in the [`EngineRegistry`](crate::engine::registry::EngineRegistry):
/// each backend registers at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverEngineType {
    Postgres,
    ElasticsearchV7,
    ElasticsearchV8,
    Neo4j,
}

impl fmt::Display for RetrieverEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Postgres => "postgres",
            Self::ElasticsearchV7 => "elasticsearch_v7",
            Self::ElasticsearchV8 => "elasticsearch_v8",
            Self::Neo4j => "neo4j",
        };
        f.write_str(name)
    }
}

/// A retrieval capability a backend can serve for a given request.
///
/// An engine declares the set it supports; within one composite each
/// capability resolves to exactly one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieverType {
    Keywords,
    Vector,
    Graph,
}

impl fmt::Display for RetrieverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keywords => "keywords",
            Self::Vector => "vector",
            Self::Graph => "graph",
        };
        f.write_str(name)
    }
}

/// What kind of content a chunk was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Chunk,
    Passage,
    Summary,
}

/// Which matching path produced a retrieval hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Embedding,
    Keywords,
    Graph,
}

/// One indexable unit of content.
///
/// Produced by the ingestion pipeline and treated as immutable here:
/// engines read it, never rewrite it. `source_id` doubles as the
/// deduplication key for batch indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Unique identifier of this index entry
    pub id: String,
    /// Raw text content to index
    pub content: String,
    /// ID of the source document; dedup key for batch indexing
    pub source_id: String,
    /// Kind of source the content came from
    pub source_type: SourceType,
    /// ID of the text chunk
    pub chunk_id: String,
    /// ID of the owning knowledge entry
    pub knowledge_id: String,
    /// ID of the owning knowledge base
    pub knowledge_base_id: String,
}

/// One retrieval query. Consumed by retrieve, never persisted.
#[derive(Debug, Clone)]
pub struct RetrieveParams {
    /// Query text
    pub query: String,
    /// Precomputed query embedding, for vector retrieval
    pub embedding: Option<Vec<f32>>,
    /// Restrict matching to these knowledge bases
    pub knowledge_base_ids: Vec<String>,
    /// Knowledge entries to exclude from results
    pub exclude_knowledge_ids: Vec<String>,
    /// Chunks to exclude from results
    pub exclude_chunk_ids: Vec<String>,
    /// Number of results to return
    pub top_k: usize,
    /// Minimum relevance score
    pub threshold: f64,
    /// Which capability should serve this query
    pub retriever_type: RetrieverType,
}

impl RetrieveParams {
    /// A query for the given retriever type with no filters.
    pub fn new(query: impl Into<String>, retriever_type: RetrieverType) -> Self {
        Self {
            query: query.into(),
            embedding: None,
            knowledge_base_ids: Vec::new(),
            exclude_knowledge_ids: Vec::new(),
            exclude_chunk_ids: Vec::new(),
            top_k: 10,
            threshold: 0.0,
            retriever_type,
        }
    }
}

/// One retrieval hit, back-referencing the source chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexWithScore {
    pub id: String,
    pub content: String,
    pub source_id: String,
    pub source_type: SourceType,
    pub chunk_id: String,
    pub knowledge_id: String,
    pub knowledge_base_id: String,
    /// Relevance score; scale is backend-specific
    pub score: f64,
    pub match_type: MatchType,
}

/// Result of one retrieval against one backend.
///
/// Ordering of results across different backends is not guaranteed;
/// merging and reranking is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResult {
    pub results: Vec<IndexWithScore>,
    pub engine_type: RetrieverEngineType,
    pub retriever_type: RetrieverType,
}

/// One wiring pair: which capability a backend should serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverEngineParams {
    pub retriever_engine_type: RetrieverEngineType,
    pub retriever_type: RetrieverType,
}

/// Open parameter contract handed to repository save calls.
///
/// The one key every backend recognizes is the embeddings map
/// (chunk or source ID → vector), empty when vector retrieval is not
/// requested. `extra` carries backend-specific values.
#[derive(Debug, Clone, Default)]
pub struct IndexParams {
    pub embeddings: HashMap<String, Vec<f32>>,
    pub extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_type_display_matches_serde() {
        for engine_type in [
            RetrieverEngineType::Postgres,
            RetrieverEngineType::ElasticsearchV7,
            RetrieverEngineType::ElasticsearchV8,
            RetrieverEngineType::Neo4j,
        ] {
            let json = serde_json::to_string(&engine_type).unwrap();
            assert_eq!(json, format!("\"{engine_type}\""));
        }
    }

    #[test]
    fn test_retriever_type_display_matches_serde() {
        for retriever_type in [
            RetrieverType::Keywords,
            RetrieverType::Vector,
            RetrieverType::Graph,
        ] {
            let json = serde_json::to_string(&retriever_type).unwrap();
            assert_eq!(json, format!("\"{retriever_type}\""));
        }
    }

    #[test]
    fn test_engine_params_deserialize() {
        let params: RetrieverEngineParams = serde_json::from_str(
            r#"{"retriever_engine_type": "elasticsearch_v8", "retriever_type": "vector"}"#,
        )
        .unwrap();
        assert_eq!(
            params.retriever_engine_type,
            RetrieverEngineType::ElasticsearchV8
        );
        assert_eq!(params.retriever_type, RetrieverType::Vector);
    }
}
