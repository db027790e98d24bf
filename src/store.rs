//! Repository interface between the engine and corpus storage.
//!
//! The search and graph logic only ever sees [`CorpusStore`], never SQL. All
//! methods are synchronous; async callers run them on the blocking pool.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::db::Db;
use crate::db::models::{
    Chunk, CorpusStats, EmbeddedChunk, InsertOutcome, KeywordOrder, RelatedEdge, Relationship,
    SearchResult,
};
use crate::error::Result;

/// Semantic operations the engine needs from the chunk/item/edge store.
///
/// Implementations must enforce uniqueness on `(source, target)` edges;
/// that constraint is what makes repeated or overlapping graph builds
/// converge.
pub trait CorpusStore: Send + Sync {
    /// Case-insensitive substring match over chunk content, cut to `limit`
    /// candidates in the given order.
    fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        order: KeywordOrder,
    ) -> Result<Vec<SearchResult>>;

    /// Every chunk in the corpus that carries an embedding.
    fn embedded_chunks(&self) -> Result<Vec<EmbeddedChunk>>;

    /// Hydrate `(chunk_id, score)` pairs into search results, keeping order.
    fn search_results_for(&self, scored: &[(i64, f64)]) -> Result<Vec<SearchResult>>;

    /// Every chunk owned by an item (with or without an embedding).
    fn find_chunks_by_item(&self, item_id: i64) -> Result<Vec<Chunk>>;

    /// IDs of every chunk owned by an item.
    fn find_chunk_ids_by_item(&self, item_id: i64) -> Result<Vec<i64>>;

    /// Conflict-safe batch insert: existing pairs are counted as skipped.
    fn insert_edges(&self, edges: &[Relationship]) -> Result<InsertOutcome>;

    /// Outgoing edges from any of the given chunks, joined with target metadata.
    fn find_edges_from(&self, chunk_ids: &[i64]) -> Result<Vec<RelatedEdge>>;

    fn list_item_ids(&self) -> Result<Vec<i64>>;

    fn stats(&self) -> Result<CorpusStats>;
}

/// [`CorpusStore`] backed by a single SQLite connection.
pub struct SqliteStore {
    db: Mutex<Db>,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Db::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Db::open_in_memory()?))
    }

    /// Direct access to the underlying database, e.g. for ingestion.
    pub fn db(&self) -> MutexGuard<'_, Db> {
        // Multi-statement writes are transactional, so poisoning is recoverable.
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CorpusStore for SqliteStore {
    fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        order: KeywordOrder,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.db().keyword_search(query, limit, order)?)
    }

    fn embedded_chunks(&self) -> Result<Vec<EmbeddedChunk>> {
        Ok(self.db().embedded_chunks()?)
    }

    fn search_results_for(&self, scored: &[(i64, f64)]) -> Result<Vec<SearchResult>> {
        Ok(self.db().search_results_for(scored)?)
    }

    fn find_chunks_by_item(&self, item_id: i64) -> Result<Vec<Chunk>> {
        Ok(self.db().chunks_for_item(item_id)?)
    }

    fn find_chunk_ids_by_item(&self, item_id: i64) -> Result<Vec<i64>> {
        Ok(self.db().chunk_ids_for_item(item_id)?)
    }

    fn insert_edges(&self, edges: &[Relationship]) -> Result<InsertOutcome> {
        Ok(self.db().insert_relationships(edges)?)
    }

    fn find_edges_from(&self, chunk_ids: &[i64]) -> Result<Vec<RelatedEdge>> {
        Ok(self.db().relationships_from(chunk_ids)?)
    }

    fn list_item_ids(&self) -> Result<Vec<i64>> {
        Ok(self.db().list_item_ids()?)
    }

    fn stats(&self) -> Result<CorpusStats> {
        Ok(self.db().corpus_stats()?)
    }
}
