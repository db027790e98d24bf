//! Hybrid keyword + vector search.
//!
//! [`HybridSearcher`] runs the keyword and semantic sub-searches
//! concurrently, fuses them with reciprocal rank fusion, optionally applies
//! temporal decay, and reports whether it had to fall back to keyword-only
//! results because no query embedding could be obtained.

pub mod aggregate;
pub mod decay;
pub mod fusion;
pub mod vector;

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::db::models::{KeywordOrder, SearchResult};
use crate::embedder::resolver::EmbeddingResolver;
use crate::error::{EngineError, Result};
use crate::store::CorpusStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Vector,
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(EngineError::InvalidOption(format!(
                "unknown search mode: {other} (expected keyword, vector or hybrid)"
            ))),
        }
    }
}

/// Per-call search options. `None` fields fall back to [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub limit: Option<usize>,
    pub temporal_decay: bool,
    pub half_life_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// True when semantic matching was requested but unavailable.
    pub degraded: bool,
}

/// Reject thresholds outside the cosine range.
pub(crate) fn validate_threshold(name: &str, value: f64) -> Result<()> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(EngineError::InvalidOption(format!(
            "{name} must be within [-1, 1], got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(EngineError::InvalidOption(
            "limit must be positive".to_string(),
        ));
    }
    Ok(())
}

pub struct HybridSearcher {
    store: Arc<dyn CorpusStore>,
    resolver: EmbeddingResolver,
    config: SearchConfig,
}

impl HybridSearcher {
    pub fn new(store: Arc<dyn CorpusStore>, resolver: EmbeddingResolver, config: SearchConfig) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    /// Search the corpus for `query` in the requested mode.
    ///
    /// Fails only for malformed input or storage errors. Embedding provider
    /// failures turn into `degraded: true` with keyword results.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let limit = options.limit.unwrap_or(self.config.default_limit);
        validate_limit(limit)?;
        let half_life_days = options.half_life_days.unwrap_or(self.config.half_life_days);
        if options.temporal_decay && !(half_life_days.is_finite() && half_life_days > 0.0) {
            return Err(EngineError::InvalidOption(format!(
                "half_life_days must be positive, got {half_life_days}"
            )));
        }

        let fetch = limit.saturating_mul(self.config.candidate_multiplier.max(1));
        // Keyword hits all score the same, so with decay on the newest ones
        // must survive the candidate cut.
        let order = if options.temporal_decay {
            KeywordOrder::RecentFirst
        } else {
            KeywordOrder::Insertion
        };
        debug!("Searching ({:?}, limit {limit}, fetch {fetch}): {query}", options.mode);

        let (mut results, degraded) = match options.mode {
            SearchMode::Keyword => (self.keyword_candidates(query, fetch, order).await?, false),
            SearchMode::Vector => match self.semantic_search(query, fetch).await? {
                Some(results) => (results, false),
                None => {
                    warn!("Vector search degraded to keyword search");
                    (self.keyword_candidates(query, fetch, order).await?, true)
                }
            },
            SearchMode::Hybrid => {
                let (keyword, semantic) = tokio::join!(
                    self.keyword_candidates(query, fetch, order),
                    self.semantic_search(query, fetch)
                );
                let keyword = keyword?;
                match semantic? {
                    Some(semantic) => (
                        fusion::reciprocal_rank_fusion(&[&keyword, &semantic], self.config.rrf_k),
                        false,
                    ),
                    None => {
                        warn!("Hybrid search degraded to keyword search");
                        (keyword, true)
                    }
                }
            }
        };

        if options.temporal_decay {
            results = decay::apply_temporal_decay(results, half_life_days, Utc::now());
        }
        results.truncate(limit);

        Ok(SearchResponse { results, degraded })
    }

    /// Case-insensitive substring search; every hit scores 1.0.
    pub async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.keyword_candidates(query, limit, KeywordOrder::Insertion)
            .await
    }

    async fn keyword_candidates(
        &self,
        query: &str,
        limit: usize,
        order: KeywordOrder,
    ) -> Result<Vec<SearchResult>> {
        let store = Arc::clone(&self.store);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || store.keyword_search(&query, limit, order)).await?
    }

    /// Rank stored chunks against a precomputed embedding.
    pub async fn vector_search(
        &self,
        embedding: Vec<f32>,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<SearchResult>> {
        let limit = limit.unwrap_or(self.config.default_limit);
        validate_limit(limit)?;
        let threshold = threshold.unwrap_or(self.config.vector_threshold);
        validate_threshold("threshold", threshold)?;

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let chunks = store.embedded_chunks()?;
            let ranked = vector::rank_by_similarity(&embedding, &chunks, threshold, limit)?;
            store.search_results_for(&ranked)
        })
        .await?
    }

    /// Resolve a query embedding and run vector search with it.
    ///
    /// `Ok(None)` means the embedding could not be obtained.
    async fn semantic_search(&self, query: &str, limit: usize) -> Result<Option<Vec<SearchResult>>> {
        let embedding = match self.resolver.resolve(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Query embedding unavailable: {e}");
                return Ok(None);
            }
        };

        self.vector_search(embedding, Some(limit), None).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use crate::embedder::mock::{FailingEmbedder, StaticEmbedder};
    use crate::store::SqliteStore;
    use crate::store::fixtures::seed_item;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    /// Two items: a fresh one and one published 800 days ago.
    ///
    /// Chunk order: c1 "borrow" [1,0], c2 "lifetimes" [0.9,0.1],
    /// c3 "borrow" [1,0] (old item), c4 "garbage" [0,1] (old item).
    fn corpus() -> (Arc<SqliteStore>, Vec<i64>) {
        let x: &[f32] = &[1.0, 0.0];
        let near_x: &[f32] = &[0.9, 0.1];
        let y: &[f32] = &[0.0, 1.0];

        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let (_, fresh) = seed_item(
            &store,
            "fresh",
            Some(now - ChronoDuration::days(1)),
            &[
                ("Borrow checker basics", Some(x)),
                ("Lifetimes explained", Some(near_x)),
            ],
        );
        let (_, old) = seed_item(
            &store,
            "old",
            Some(now - ChronoDuration::days(800)),
            &[
                ("The borrow checker in depth", Some(x)),
                ("Garbage collection", Some(y)),
            ],
        );
        let ids = fresh.into_iter().chain(old).collect();
        (Arc::new(store), ids)
    }

    fn searcher(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> HybridSearcher {
        let resolver = EmbeddingResolver::new(embedder, Duration::from_secs(5), Duration::ZERO);
        HybridSearcher::new(store, resolver, SearchConfig::default())
    }

    fn options(mode: SearchMode) -> SearchOptions {
        SearchOptions {
            mode,
            ..SearchOptions::default()
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<i64> {
        results.iter().map(|r| r.chunk_id).collect()
    }

    #[tokio::test]
    async fn test_empty_query_rejected_in_every_mode() {
        let (store, _) = corpus();
        let s = searcher(store, Arc::new(StaticEmbedder::new(vec![1.0, 0.0])));
        for mode in [SearchMode::Keyword, SearchMode::Vector, SearchMode::Hybrid] {
            let err = s.search("   ", &options(mode)).await.unwrap_err();
            assert!(matches!(err, EngineError::EmptyQuery));
        }
    }

    #[tokio::test]
    async fn test_keyword_mode_ignores_embedder() {
        let (store, chunks) = corpus();
        let embedder = Arc::new(FailingEmbedder::new());
        let s = searcher(store, embedder.clone());

        let resp = s.search("BORROW", &options(SearchMode::Keyword)).await.unwrap();
        assert!(!resp.degraded);
        assert_eq!(ids(&resp.results), vec![chunks[0], chunks[2]]);
        assert!(resp.results.iter().all(|r| r.similarity == 1.0));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_hybrid_degrades_when_embedding_fails_twice() {
        let (store, chunks) = corpus();
        let embedder = Arc::new(FailingEmbedder::new());
        let s = searcher(store, embedder.clone());

        let resp = s.search("borrow", &options(SearchMode::Hybrid)).await.unwrap();
        assert!(resp.degraded);
        assert_eq!(ids(&resp.results), vec![chunks[0], chunks[2]]);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_vector_mode_degrades_to_keyword() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(FailingEmbedder::new()));

        let resp = s.search("garbage", &options(SearchMode::Vector)).await.unwrap();
        assert!(resp.degraded);
        assert_eq!(ids(&resp.results), vec![chunks[3]]);
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let (store, _) = corpus();
        let embedder =
            Arc::new(StaticEmbedder::new(vec![1.0, 0.0]).with_delay(Duration::from_millis(500)));
        let resolver = EmbeddingResolver::new(embedder, Duration::from_millis(20), Duration::ZERO);
        let s = HybridSearcher::new(store, resolver, SearchConfig::default());

        let resp = s.search("borrow", &options(SearchMode::Hybrid)).await.unwrap();
        assert!(resp.degraded);
        assert_eq!(resp.results.len(), 2);
    }

    #[tokio::test]
    async fn test_vector_mode_applies_threshold() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(StaticEmbedder::new(vec![1.0, 0.0])));

        let resp = s.search("anything", &options(SearchMode::Vector)).await.unwrap();
        assert!(!resp.degraded);
        // The orthogonal "garbage" chunk falls below the 0.3 threshold
        assert_eq!(ids(&resp.results), vec![chunks[0], chunks[2], chunks[1]]);
        assert!(resp.results.iter().all(|r| r.similarity >= 0.3));
    }

    #[tokio::test]
    async fn test_hybrid_fuses_and_rewards_agreement() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(StaticEmbedder::new(vec![1.0, 0.0])));

        let resp = s.search("borrow", &options(SearchMode::Hybrid)).await.unwrap();
        assert!(!resp.degraded);
        // c1 and c3 appear in both lists; c2 only in the vector list
        assert_eq!(ids(&resp.results), vec![chunks[0], chunks[2], chunks[1]]);
        let expected = 2.0 / 61.0;
        assert!((resp.results[0].similarity - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_temporal_decay_reorders() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(StaticEmbedder::new(vec![1.0, 0.0])));

        let opts = SearchOptions {
            temporal_decay: true,
            half_life_days: Some(365.0),
            ..SearchOptions::default()
        };
        let resp = s.search("borrow", &opts).await.unwrap();
        // The old item's agreement boost no longer beats the fresh c2
        assert_eq!(ids(&resp.results), vec![chunks[0], chunks[1], chunks[2]]);
    }

    #[tokio::test]
    async fn test_decay_sees_fresh_item_behind_many_stale_matches() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        for external_id in ["stale-1", "stale-2", "stale-3"] {
            seed_item(
                &store,
                external_id,
                Some(now - ChronoDuration::days(3000)),
                &[("rust tooling", None)],
            );
        }
        let (_, fresh) = seed_item(
            &store,
            "fresh",
            Some(now - ChronoDuration::days(1)),
            &[("rust tooling", None)],
        );
        let s = searcher(Arc::new(store), Arc::new(FailingEmbedder::new()));

        for mode in [SearchMode::Keyword, SearchMode::Hybrid] {
            let opts = SearchOptions {
                mode,
                limit: Some(1),
                temporal_decay: true,
                half_life_days: Some(365.0),
            };
            let resp = s.search("rust", &opts).await.unwrap();
            assert_eq!(ids(&resp.results), vec![fresh[0]], "{mode:?}");
            assert!(resp.results[0].similarity > 0.99);
        }
    }

    #[tokio::test]
    async fn test_query_whitespace_is_significant() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(FailingEmbedder::new()));

        let exact = s.search("basics", &options(SearchMode::Keyword)).await.unwrap();
        assert_eq!(ids(&exact.results), vec![chunks[0]]);
        let padded = s.search("basics ", &options(SearchMode::Keyword)).await.unwrap();
        assert!(padded.results.is_empty());
    }

    #[tokio::test]
    async fn test_limit_applies_after_fusion() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(StaticEmbedder::new(vec![1.0, 0.0])));

        let opts = SearchOptions {
            limit: Some(1),
            ..SearchOptions::default()
        };
        let resp = s.search("borrow", &opts).await.unwrap();
        assert_eq!(ids(&resp.results), vec![chunks[0]]);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let (store, _) = corpus();
        let s = searcher(store, Arc::new(StaticEmbedder::new(vec![1.0, 0.0])));

        let zero_limit = SearchOptions {
            limit: Some(0),
            ..SearchOptions::default()
        };
        assert!(matches!(
            s.search("borrow", &zero_limit).await,
            Err(EngineError::InvalidOption(_))
        ));

        let bad_half_life = SearchOptions {
            temporal_decay: true,
            half_life_days: Some(-1.0),
            ..SearchOptions::default()
        };
        assert!(matches!(
            s.search("borrow", &bad_half_life).await,
            Err(EngineError::InvalidOption(_))
        ));
    }

    #[tokio::test]
    async fn test_vector_search_with_precomputed_embedding() {
        let (store, chunks) = corpus();
        let s = searcher(store, Arc::new(FailingEmbedder::new()));

        let results = s.vector_search(vec![0.0, 1.0], Some(5), None).await.unwrap();
        assert_eq!(ids(&results), vec![chunks[3]]);

        let err = s.vector_search(vec![1.0], None, None).await.unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));

        assert!(s.vector_search(vec![1.0, 0.0], None, Some(2.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_not_error() {
        let (store, _) = corpus();
        let s = searcher(store, Arc::new(FailingEmbedder::new()));
        let resp = s.search("quantum", &options(SearchMode::Keyword)).await.unwrap();
        assert!(resp.results.is_empty());
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("HYBRID".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
    }
}
