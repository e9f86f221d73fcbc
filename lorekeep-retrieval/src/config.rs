//! Configuration surface consumed at construction
//!
//! One TOML document describes which capability each backend serves and the
//! embedding models available to the system. Wiring is resolved into a
//! [`CompositeRetrieveEngine`](crate::engine::composite::CompositeRetrieveEngine)
//! once at startup; there is no runtime re-wiring.

use crate::error::Result;
use crate::types::RetrieverEngineParams;
use lorekeep_embed::EmbedderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// `(engine type, retriever type)` wiring pairs
    #[serde(default)]
    pub engines: Vec<RetrieverEngineParams>,
    /// One embedding-provider configuration per model
    #[serde(default)]
    pub embedders: Vec<EmbedderConfig>,
}

impl RetrievalConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        debug!(
            "parsed retrieval config: {} engine pairs, {} embedders",
            config.engines.len(),
            config.embedders.len()
        );
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RetrieverEngineType, RetrieverType};
    use lorekeep_embed::ModelSource;

    const SAMPLE: &str = r#"
        [[engines]]
        retriever_engine_type = "postgres"
        retriever_type = "keywords"

        [[engines]]
        retriever_engine_type = "elasticsearch_v8"
        retriever_type = "vector"

        [[embedders]]
        source = "remote"
        model_name = "text-embedding-3-small"
        api_key = "sk-test"
        dimensions = 1536
    "#;

    #[test]
    fn test_parse_sample_config() {
        let config = RetrievalConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.engines.len(), 2);
        assert_eq!(
            config.engines[0].retriever_engine_type,
            RetrieverEngineType::Postgres
        );
        assert_eq!(config.engines[0].retriever_type, RetrieverType::Keywords);
        assert_eq!(
            config.engines[1].retriever_engine_type,
            RetrieverEngineType::ElasticsearchV8
        );

        assert_eq!(config.embedders.len(), 1);
        let embedder = &config.embedders[0];
        assert_eq!(embedder.source, ModelSource::Remote);
        assert_eq!(embedder.dimensions, 1536);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = RetrievalConfig::from_toml_str("").unwrap();
        assert!(config.engines.is_empty());
        assert!(config.embedders.is_empty());
    }

    #[test]
    fn test_unknown_engine_type_rejected() {
        let err = RetrievalConfig::from_toml_str(
            r#"
            [[engines]]
            retriever_engine_type = "cassandra"
            retriever_type = "keywords"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::RetrievalError::Config { .. }));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retrieval.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let config = RetrievalConfig::load(&path).await.unwrap();
        assert_eq!(config.engines.len(), 2);
    }
}
