//! The embedding provider contract

use crate::error::Result;
use async_trait::async_trait;

/// Trait for providers that turn text into fixed-dimension vectors.
///
/// One instance exists per configured model. Implementations are
/// interchangeable behind `Arc<dyn Embedder>`: the remote HTTP provider
/// ([`RemoteEmbedder`](crate::remote::RemoteEmbedder)) and the local runtime
/// provider ([`OllamaEmbedder`](crate::ollama::OllamaEmbedder)).
///
/// `batch_embed` must return exactly one vector per input text, in input
/// order. Callers that parallelize large batches go through
/// [`EmbeddingPool`](crate::pool::EmbeddingPool) rather than calling
/// `batch_embed` with the whole list at once.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Convert a single text to a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Convert multiple texts to vectors in one provider call.
    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The model name, e.g. `nomic-embed-text`.
    fn model_name(&self) -> &str;

    /// The dimensionality of vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// The configured model ID, used to key model records elsewhere.
    fn model_id(&self) -> &str;
}
