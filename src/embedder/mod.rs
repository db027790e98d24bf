/// Embedding provider trait and shared types.
///
/// The engine treats the provider as an opaque, fallible black box. Retry
/// and timeout policy live in [`resolver::EmbeddingResolver`], never in the
/// providers themselves.
pub mod http;
pub mod mock;
pub mod resolver;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::EmbedderConfig;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Instantiate the provider named in the configuration.
pub fn create_embedder(config: &EmbedderConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(mock::MockEmbedder::new(config.dimensions))),
        "ollama" => Ok(Arc::new(http::HttpEmbedder::new(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other} (expected mock or ollama)"),
    }
}
