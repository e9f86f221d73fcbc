//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use crate::ollama::{OllamaEmbedder, OllamaRuntime};
use crate::provider::Embedder;
use crate::remote::RemoteEmbedder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a model runs: inside the local runtime or behind a remote HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    Local,
    Remote,
}

/// Configuration for one embedding model.
///
/// One of these exists per model the system can embed with. Deserializable
/// from the configuration file; unset fields fall back to provider defaults
/// (see [`RemoteEmbedder::new`] and [`OllamaEmbedder::new`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Whether the model runs locally or remotely
    pub source: ModelSource,
    /// Base URL of the serving endpoint; empty selects the provider default
    #[serde(default)]
    pub base_url: String,
    /// Model name as known to the serving endpoint
    #[serde(default)]
    pub model_name: String,
    /// API key for remote endpoints; unused for local models
    #[serde(default)]
    pub api_key: String,
    /// Token count to truncate prompts to; 0 selects the provider default
    #[serde(default)]
    pub truncate_prompt_tokens: u32,
    /// Dimensionality of the vectors the model produces
    pub dimensions: usize,
    /// Stable identifier for this model configuration
    #[serde(default)]
    pub model_id: String,
}

/// Build an embedder from its configuration.
///
/// Local models share the given [`OllamaRuntime`]; when none is supplied, a
/// runtime is created from the config's base URL and the process environment.
pub fn build_embedder(
    config: EmbedderConfig,
    runtime: Option<Arc<OllamaRuntime>>,
) -> Result<Arc<dyn Embedder>> {
    match config.source {
        ModelSource::Local => {
            let runtime = match runtime {
                Some(runtime) => runtime,
                None => Arc::new(OllamaRuntime::from_env(&config.base_url)?),
            };
            Ok(Arc::new(OllamaEmbedder::new(config, runtime)?))
        }
        ModelSource::Remote => Ok(Arc::new(RemoteEmbedder::new(config)?)),
    }
}

impl EmbedderConfig {
    /// Validate fields every provider requires.
    pub(crate) fn require_dimensions(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(EmbedError::invalid_config(
                "embedder dimensions must be set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml_with_defaults() {
        let config: EmbedderConfig = toml::from_str(
            r#"
            source = "remote"
            model_name = "text-embedding-3-small"
            api_key = "sk-test"
            dimensions = 1536
            "#,
        )
        .unwrap();

        assert_eq!(config.source, ModelSource::Remote);
        assert_eq!(config.model_name, "text-embedding-3-small");
        assert_eq!(config.dimensions, 1536);
        assert!(config.base_url.is_empty());
        assert_eq!(config.truncate_prompt_tokens, 0);
    }

    #[test]
    fn test_build_remote_embedder() {
        let config = EmbedderConfig {
            source: ModelSource::Remote,
            base_url: String::new(),
            model_name: "text-embedding-3-small".to_string(),
            api_key: "sk-test".to_string(),
            truncate_prompt_tokens: 0,
            dimensions: 1536,
            model_id: "model-1".to_string(),
        };

        let embedder = build_embedder(config, None).unwrap();
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.model_id(), "model-1");
    }

    #[test]
    fn test_build_remote_embedder_requires_model_name() {
        let config = EmbedderConfig {
            source: ModelSource::Remote,
            base_url: String::new(),
            model_name: String::new(),
            api_key: "sk-test".to_string(),
            truncate_prompt_tokens: 0,
            dimensions: 1536,
            model_id: String::new(),
        };

        let err = build_embedder(config, None).err().unwrap();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }
}
