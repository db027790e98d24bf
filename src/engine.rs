//! The retrieval engine facade.
//!
//! [`Engine`] bundles the hybrid searcher, the graph builder and the request
//! registry over one shared [`CorpusStore`]. All entry points are async.
//! Blocking storage work runs on tokio's blocking pool.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::models::{CorpusStats, RelatedChunk, SearchResult};
use crate::embedder::Embedder;
use crate::embedder::resolver::EmbeddingResolver;
use crate::error::{EngineError, Result};
use crate::graph::{GraphBuilder, RelatedOptions, RelationshipCounts, RelationshipOptions};
use crate::registry::RequestRegistry;
use crate::search::aggregate::{AggregatedResult, aggregate_by_video};
use crate::search::{HybridSearcher, SearchOptions, SearchResponse};
use crate::store::CorpusStore;

#[derive(Debug, Clone, Serialize)]
pub struct SearchVideosResponse {
    pub results: Vec<AggregatedResult>,
    pub degraded: bool,
}

pub struct Engine {
    store: Arc<dyn CorpusStore>,
    searcher: HybridSearcher,
    builder: Arc<GraphBuilder>,
    registry: Arc<RequestRegistry>,
    config: Config,
}

impl Engine {
    pub fn new(store: Arc<dyn CorpusStore>, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        let resolver = EmbeddingResolver::new(
            embedder,
            config.embedder.timeout(),
            config.embedder.retry_delay(),
        );
        let searcher = HybridSearcher::new(Arc::clone(&store), resolver, config.search.clone());
        let builder = Arc::new(GraphBuilder::new(Arc::clone(&store), config.graph.clone()));

        Self {
            store,
            searcher,
            builder,
            registry: Arc::new(RequestRegistry::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Requests registered against this engine instance.
    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    pub async fn hybrid_search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        self.searcher.search(query, &options).await
    }

    /// Hybrid search grouped into one entry per item.
    pub async fn search_videos(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<SearchVideosResponse> {
        let response = self.searcher.search(query, &options).await?;
        Ok(SearchVideosResponse {
            results: aggregate_by_video(&response.results),
            degraded: response.degraded,
        })
    }

    pub async fn vector_search(
        &self,
        embedding: Vec<f32>,
        limit: Option<usize>,
        threshold: Option<f64>,
    ) -> Result<Vec<SearchResult>> {
        self.searcher.vector_search(embedding, limit, threshold).await
    }

    /// Build graph edges for one item. Long-running on large corpora.
    pub async fn compute_relationships(
        &self,
        item_id: i64,
        options: RelationshipOptions,
    ) -> Result<RelationshipCounts> {
        let builder = Arc::clone(&self.builder);
        tokio::task::spawn_blocking(move || builder.build(item_id, &options)).await?
    }

    /// Build graph edges for every item in the corpus.
    ///
    /// The cancellation token is also checked between items. Partial runs
    /// are safe to resume: completed items only report skips.
    pub async fn compute_all_relationships(
        &self,
        options: RelationshipOptions,
    ) -> Result<RelationshipCounts> {
        let store = Arc::clone(&self.store);
        let builder = Arc::clone(&self.builder);

        tokio::task::spawn_blocking(move || {
            let item_ids = store.list_item_ids()?;
            info!("Computing relationships for {} items", item_ids.len());

            let mut counts = RelationshipCounts::default();
            for item_id in item_ids {
                if options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                    warn!("Corpus-wide relationship build cancelled");
                    return Err(EngineError::Cancelled);
                }
                counts += builder.build(item_id, &options)?;
            }

            info!(
                "Corpus relationships: {} created, {} skipped",
                counts.created, counts.skipped
            );
            Ok(counts)
        })
        .await?
    }

    pub async fn get_related_chunks(
        &self,
        item_id: i64,
        options: RelatedOptions,
    ) -> Result<Vec<RelatedChunk>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            crate::graph::related_chunks(store.as_ref(), item_id, &options)
        })
        .await?
    }

    pub async fn stats(&self) -> Result<CorpusStats> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.stats()).await?
    }
}
