//! Local model runtime (Ollama) and its embedding provider

use crate::config::EmbedderConfig;
use crate::error::{EmbedError, Result};
use crate::provider::Embedder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL_NAME: &str = "nomic-embed-text";
const DEFAULT_TRUNCATE_PROMPT_TOKENS: u32 = 511;
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to a local Ollama runtime, shared by all local embedders.
///
/// Tracks whether the runtime answered its last heartbeat. When constructed
/// as `optional`, an unreachable runtime downgrades every operation to a
/// no-op so the rest of the system keeps running without local models;
/// otherwise unavailability is an error.
pub struct OllamaRuntime {
    client: reqwest::Client,
    base_url: String,
    available: Mutex<bool>,
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<ModelEntry>>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

impl OllamaRuntime {
    /// Create a runtime handle for the given base URL.
    pub fn new(base_url: &str, optional: bool) -> Result<Self> {
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };
        reqwest::Url::parse(&base_url)
            .map_err(|err| EmbedError::invalid_config(format!("invalid runtime URL: {err}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            available: Mutex::new(false),
            optional,
        })
    }

    /// Create a runtime handle from the process environment.
    ///
    /// `OLLAMA_BASE_URL` overrides an empty `base_url`; `OLLAMA_OPTIONAL=true`
    /// marks the runtime optional.
    pub fn from_env(base_url: &str) -> Result<Self> {
        let resolved = if base_url.is_empty() {
            std::env::var("OLLAMA_BASE_URL").unwrap_or_default()
        } else {
            base_url.to_string()
        };
        let optional = std::env::var("OLLAMA_OPTIONAL").is_ok_and(|v| v == "true");
        if optional {
            info!("model runtime marked optional");
        }
        Self::new(&resolved, optional)
    }

    /// Whether the runtime answered its most recent heartbeat.
    pub fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }

    /// Whether an unreachable runtime degrades to no-ops instead of erroring.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Heartbeat the runtime and record its availability.
    ///
    /// Returns an error only when the runtime is unreachable and not
    /// optional.
    pub async fn start(&self) -> Result<()> {
        let heartbeat = self
            .client
            .get(&self.base_url)
            .timeout(HEARTBEAT_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match heartbeat {
            Ok(_) => {
                *self.available.lock().unwrap() = true;
                debug!("model runtime ready at {}", self.base_url);
                Ok(())
            }
            Err(err) => {
                *self.available.lock().unwrap() = false;
                warn!("model runtime unavailable: {err}");
                if self.optional {
                    info!("model runtime is optional, continuing without it");
                    return Ok(());
                }
                Err(EmbedError::RuntimeUnavailable {
                    base_url: self.base_url.clone(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Check whether a model is present in the runtime.
    pub async fn is_model_available(&self, model_name: &str) -> Result<bool> {
        self.start().await?;
        if !self.is_available() && self.optional {
            return Ok(false);
        }

        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let tags: TagsResponse = response.json().await?;

        let prefix = format!("{model_name}:");
        Ok(tags.models.is_some_and(|models| {
            models
                .iter()
                .any(|m| m.name == model_name || m.name.starts_with(&prefix))
        }))
    }

    /// Make sure a model is present, pulling it when absent.
    pub async fn ensure_model_available(&self, model_name: &str) -> Result<()> {
        self.start().await?;
        if !self.is_available() && self.optional {
            warn!("model runtime unavailable, unable to pull model {model_name}");
            return Ok(());
        }

        if self.is_model_available(model_name).await? {
            debug!("model {model_name} already present");
            return Ok(());
        }

        info!("pulling model {model_name}");
        let url = format!("{}/api/pull", self.base_url);
        let request = PullRequest {
            name: model_name,
            stream: false,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::ModelPull {
                model: model_name.to_string(),
                message,
            });
        }
        info!("model {model_name} pulled");
        Ok(())
    }
}

/// Embedding provider backed by a shared [`OllamaRuntime`].
///
/// Before embedding, the requested model is pulled into the runtime if
/// absent. With an optional, unreachable runtime the provider returns one
/// empty vector per input instead of failing.
pub struct OllamaEmbedder {
    model_name: String,
    truncate_prompt_tokens: u32,
    dimensions: usize,
    model_id: String,
    runtime: Arc<OllamaRuntime>,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a local embedder from its configuration and a shared runtime.
    pub fn new(config: EmbedderConfig, runtime: Arc<OllamaRuntime>) -> Result<Self> {
        config.require_dimensions()?;
        let model_name = if config.model_name.is_empty() {
            DEFAULT_MODEL_NAME.to_string()
        } else {
            config.model_name
        };
        let truncate_prompt_tokens = if config.truncate_prompt_tokens == 0 {
            DEFAULT_TRUNCATE_PROMPT_TOKENS
        } else {
            config.truncate_prompt_tokens
        };

        Ok(Self {
            model_name,
            truncate_prompt_tokens,
            dimensions: config.dimensions,
            model_id: config.model_id,
            runtime,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.batch_embed(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed_response("no embedding returned"))
    }

    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.runtime.ensure_model_available(&self.model_name).await?;
        if !self.runtime.is_available() {
            // Only reachable in optional mode; a required runtime already
            // errored above. Degrade to empty vectors.
            return Ok(vec![Vec::new(); texts.len()]);
        }

        let options = (self.truncate_prompt_tokens > 0)
            .then(|| serde_json::json!({ "truncate": self.truncate_prompt_tokens }));
        let request = OllamaEmbedRequest {
            model: &self.model_name,
            input: texts,
            options,
        };

        let url = format!("{}/api/embed", self.runtime.base_url);
        let started = std::time::Instant::now();
        let response = self.runtime.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api { status, message });
        }

        let payload: OllamaEmbedResponse = response.json().await?;
        if payload.embeddings.len() != texts.len() {
            return Err(EmbedError::malformed_response(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                payload.embeddings.len()
            )));
        }
        debug!(
            "embedded {} texts with {} in {:?}",
            texts.len(),
            self.model_name,
            started.elapsed()
        );

        Ok(payload.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
