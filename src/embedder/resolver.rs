/// Bounded-retry wrapper around an [`Embedder`].
///
/// A query embedding is attempted once and, on failure, retried exactly once
/// after a short pause. The whole exchange is bounded by an overall timeout.
/// Exhausted retries and timeouts are both reported as `Err` for the caller
/// to turn into a degraded response. Nothing here panics or propagates past
/// the search coordinator.
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{Embedder, EmbedderError};

/// Total attempts per resolution: the first try plus one retry.
pub const MAX_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct EmbeddingResolver {
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
    retry_delay: Duration,
}

impl EmbeddingResolver {
    pub fn new(embedder: Arc<dyn Embedder>, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            embedder,
            timeout,
            retry_delay,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Resolve an embedding for `text` within the configured timeout.
    pub async fn resolve(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        match tokio::time::timeout(self.timeout, self.attempt(text)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Embedding resolution timed out after {:?}", self.timeout);
                Err(EmbedderError::Timeout(self.timeout))
            }
        }
    }

    async fn attempt(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.embedder.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    warn!("Embedding attempt {attempt}/{MAX_ATTEMPTS} failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbedderError::InferenceFailed("no attempt made".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::{FailingEmbedder, FlakyEmbedder, StaticEmbedder};

    fn resolver(embedder: Arc<dyn Embedder>) -> EmbeddingResolver {
        EmbeddingResolver::new(embedder, Duration::from_secs(5), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let embedder = Arc::new(FlakyEmbedder::new(0, vec![1.0, 2.0]));
        let vector = resolver(embedder.clone()).resolve("q").await.unwrap();
        assert_eq!(vector, vec![1.0, 2.0]);
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let embedder = Arc::new(FlakyEmbedder::new(1, vec![0.5]));
        let vector = resolver(embedder.clone()).resolve("q").await.unwrap();
        assert_eq!(vector, vec![0.5]);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_exactly_two_attempts() {
        let embedder = Arc::new(FailingEmbedder::new());
        let result = resolver(embedder.clone()).resolve("q").await;
        assert!(result.is_err());
        assert_eq!(embedder.calls(), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let embedder = Arc::new(
            StaticEmbedder::new(vec![1.0]).with_delay(Duration::from_millis(500)),
        );
        let resolver = EmbeddingResolver::new(embedder, Duration::from_millis(20), Duration::ZERO);
        match resolver.resolve("q").await {
            Err(EmbedderError::Timeout(d)) => assert_eq!(d, Duration::from_millis(20)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
