//! Materializes similarity edges between one item's chunks and the corpus.
//!
//! Every pair above the threshold is stored as two directed rows with the
//! same similarity, so traversal from either endpoint is a plain indexed
//! lookup on `source_chunk_id`. Inserts are conflict-safe: re-running over
//! an unchanged corpus only counts skips.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::db::models::{EmbeddedChunk, Relationship};
use crate::error::{EngineError, Result};
use crate::search::validate_threshold;
use crate::similarity::cosine_similarity;
use crate::store::CorpusStore;

/// Progress callback: `(processed, total)` comparisons.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RelationshipOptions {
    /// Minimum similarity (exclusive). Defaults to the configured threshold.
    pub threshold: Option<f64>,
    pub on_progress: Option<ProgressFn>,
    /// Checked before each insert batch.
    pub cancel: Option<CancellationToken>,
}

impl fmt::Debug for RelationshipOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipOptions")
            .field("threshold", &self.threshold)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationshipCounts {
    pub created: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for RelationshipCounts {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.skipped += other.skipped;
    }
}

pub struct GraphBuilder {
    store: Arc<dyn CorpusStore>,
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(store: Arc<dyn CorpusStore>, config: GraphConfig) -> Self {
        Self { store, config }
    }

    /// Compare every embedded chunk of `item_id` against every other
    /// embedded chunk in the corpus and persist the pairs above threshold.
    ///
    /// Cost is O(chunks in item × chunks in corpus). Run it off the request
    /// path. Cancellation is honoured between insert batches only; edges
    /// already written stay, which a later run simply skips.
    pub fn build(&self, item_id: i64, options: &RelationshipOptions) -> Result<RelationshipCounts> {
        let threshold = options
            .threshold
            .unwrap_or(self.config.similarity_threshold);
        validate_threshold("threshold", threshold)?;

        let embedded = self
            .store
            .find_chunks_by_item(item_id)?
            .iter()
            .filter(|c| c.embedding.is_some())
            .count();
        if embedded < 2 {
            debug!("Item {item_id} has {embedded} embedded chunk(s); nothing to relate");
            return Ok(RelationshipCounts::default());
        }

        let corpus = self.store.embedded_chunks()?;
        let own: Vec<&EmbeddedChunk> = corpus.iter().filter(|c| c.item_id == item_id).collect();
        if own.len() < 2 {
            return Ok(RelationshipCounts::default());
        }

        let n = own.len();
        let total = n * (corpus.len() - n) + n * (n - 1) / 2;
        info!(
            "Computing relationships for item {item_id}: {n} chunks against {} ({total} comparisons)",
            corpus.len()
        );

        let staged = self.stage_edges(item_id, &own, &corpus, threshold, total, options)?;

        let mut counts = RelationshipCounts::default();
        for batch in staged.chunks(self.config.insert_batch_size.max(1)) {
            if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                warn!(
                    "Relationship build for item {item_id} cancelled ({} created so far)",
                    counts.created
                );
                return Err(EngineError::Cancelled);
            }
            let outcome = self.store.insert_edges(batch)?;
            counts += RelationshipCounts {
                created: outcome.created,
                skipped: outcome.skipped,
            };
        }

        info!(
            "Relationships for item {item_id}: {} created, {} skipped",
            counts.created, counts.skipped
        );
        Ok(counts)
    }

    /// Pairwise scan. Intra-item pairs are visited once (lower id first);
    /// each match stages both directions.
    fn stage_edges(
        &self,
        item_id: i64,
        own: &[&EmbeddedChunk],
        corpus: &[EmbeddedChunk],
        threshold: f64,
        total: usize,
        options: &RelationshipOptions,
    ) -> Result<Vec<Relationship>> {
        let interval = self.config.progress_interval.max(1);
        let mut staged = Vec::new();
        let mut processed = 0usize;

        for a in own {
            for b in corpus {
                if b.id == a.id || (b.item_id == item_id && b.id < a.id) {
                    continue;
                }

                let similarity = cosine_similarity(&a.embedding, &b.embedding)?;
                if similarity > threshold {
                    staged.push(Relationship {
                        source_chunk_id: a.id,
                        target_chunk_id: b.id,
                        similarity,
                    });
                    staged.push(Relationship {
                        source_chunk_id: b.id,
                        target_chunk_id: a.id,
                        similarity,
                    });
                }

                processed += 1;
                if processed % interval == 0 {
                    if let Some(cb) = &options.on_progress {
                        cb(processed, total);
                    }
                }
            }
        }

        // Final report, unless the last interval already covered it
        if processed == 0 || processed % interval != 0 {
            if let Some(cb) = &options.on_progress {
                cb(total, total);
            }
        }
        Ok(staged)
    }
}
