//! Remote HTTP embedding provider (OpenAI-compatible API)

use crate::config::EmbedderConfig;
use crate::error::{EmbedError, Result};
use crate::provider::Embedder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TRUNCATE_PROMPT_TOKENS: u32 = 511;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Transport failures are retried with exponential backoff (capped at 10s);
/// a non-success HTTP status is treated as fatal for the call. The backoff
/// sleeps are plain `tokio::time::sleep`, so dropping the future (caller
/// timeout or cancellation) aborts the call promptly.
pub struct RemoteEmbedder {
    api_key: String,
    base_url: String,
    model_name: String,
    truncate_prompt_tokens: u32,
    dimensions: usize,
    model_id: String,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate_prompt_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    /// Create a remote embedder from its configuration.
    ///
    /// The model name is required; base URL and truncation length fall back
    /// to the OpenAI defaults when unset.
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        config.require_dimensions()?;
        if config.model_name.is_empty() {
            return Err(EmbedError::invalid_config(
                "remote embedder requires a model name",
            ));
        }

        let base_url = if config.base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };
        let truncate_prompt_tokens = if config.truncate_prompt_tokens == 0 {
            DEFAULT_TRUNCATE_PROMPT_TOKENS
        } else {
            config.truncate_prompt_tokens
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: config.api_key,
            base_url,
            model_name: config.model_name,
            truncate_prompt_tokens,
            dimensions: config.dimensions,
            model_id: config.model_id,
            client,
            max_retries: 3,
        })
    }

    /// Override the retry budget for transport failures.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry `attempt` (1-based): 1s, 2s, 4s, ... capped at 10s.
    fn backoff_delay(attempt: u32) -> Duration {
        let exp = Duration::from_secs(1 << (attempt - 1).min(30));
        exp.min(MAX_BACKOFF)
    }

    /// POST the request body, retrying transport failures with backoff.
    ///
    /// Only transport errors are retried; once the server answers, the
    /// response is returned to the caller for status handling.
    async fn request_with_retry(&self, request: &EmbedRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/embeddings", self.base_url);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Self::backoff_delay(attempt);
                warn!(
                    "retrying embedding request ({attempt}/{}), waiting {delay:?}",
                    self.max_retries
                );
                tokio::time::sleep(delay).await;
            }

            match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        "embedding request failed (attempt {}/{}): {err}",
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.expect("at least one attempt was made").into())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.batch_embed(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed_response("no embedding returned"))
    }

    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model_name,
            input: texts,
            truncate_prompt_tokens: self.truncate_prompt_tokens,
        };

        let started = std::time::Instant::now();
        let response = self.request_with_retry(&request).await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api { status, message });
        }

        let payload: EmbedResponse = response.json().await?;
        if payload.data.len() != texts.len() {
            return Err(EmbedError::malformed_response(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                payload.data.len()
            )));
        }
        debug!(
            "embedded {} texts with {} in {:?}",
            texts.len(),
            self.model_name,
            started.elapsed()
        );

        Ok(payload.data.into_iter().map(|d| d.embedding).collect())
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
