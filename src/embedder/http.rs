/// Ollama-compatible HTTP embedding provider.
///
/// Calls `POST {url}/api/embed` with `{"model", "input"}` and reads the
/// `embeddings` array from the response. No retries happen here; a failed
/// request is reported once and the resolver decides what to do.
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Embedder, EmbedderError};
use crate::config::EmbedderConfig;

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbedderConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.model.is_empty(), "embedder.model is required");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("chunkweave/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    async fn request(&self, input: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        debug!("Embedding {} text(s) via {}", input.len(), self.endpoint);

        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedderError::Request(format!("{}: {e}", self.endpoint)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EmbedderError::Request(format!(
                "embedding API returned {status}: {text}"
            )));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbedderError::InferenceFailed(format!("invalid response: {e}")))?;

        parse_embeddings(parsed, input.len(), self.dimensions)
    }
}

fn parse_embeddings(
    resp: EmbedResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    if resp.embeddings.len() != expected {
        return Err(EmbedderError::InferenceFailed(format!(
            "expected {expected} embeddings, got {}",
            resp.embeddings.len()
        )));
    }
    if let Some(bad) = resp.embeddings.iter().find(|v| v.len() != dimensions) {
        return Err(EmbedderError::InferenceFailed(format!(
            "expected {dimensions} dimensions, got {}",
            bad.len()
        )));
    }
    Ok(resp.embeddings)
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.request(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::InferenceFailed("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
