//! Corpus ingestion helpers used by the CLI.
//!
//! Chunking and transcription happen upstream; this module only loads
//! already-chunked items and back-fills missing embeddings.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::models::{NewChunk, NewItem};
use crate::embedder::Embedder;
use crate::store::SqliteStore;

#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem {
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chunks: Vec<ImportChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportChunk {
    pub content: String,
    #[serde(default)]
    pub start_offset: Option<f64>,
    #[serde(default)]
    pub end_offset: Option<f64>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub items: usize,
    pub chunks: usize,
    pub embedded: usize,
    /// Items that already had chunks; only their metadata was refreshed.
    pub unchanged: usize,
}

/// Parse a JSON array of items.
pub fn parse_items(json: &str) -> Result<Vec<ImportItem>> {
    serde_json::from_str(json).context("invalid import file (expected a JSON array of items)")
}

/// Upsert items and append their chunks.
///
/// Chunks are immutable once stored, so items that already own chunks keep
/// them and only have their metadata refreshed. Every supplied embedding
/// must have `dimensions` components.
pub fn import_items(
    store: &SqliteStore,
    items: &[ImportItem],
    dimensions: usize,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut db = store.db();

    for item in items {
        anyhow::ensure!(
            !item.external_id.trim().is_empty(),
            "item external_id must not be empty"
        );
        for chunk in &item.chunks {
            if let Some(embedding) = &chunk.embedding {
                anyhow::ensure!(
                    embedding.len() == dimensions,
                    "item {}: embedding has {} dimensions, expected {dimensions}",
                    item.external_id,
                    embedding.len()
                );
            }
        }

        let item_id = db.upsert_item(&NewItem {
            external_id: &item.external_id,
            title: &item.title,
            source_name: item.source_name.as_deref(),
            thumbnail: item.thumbnail.as_deref(),
            published_at: item.published_at,
        })?;
        summary.items += 1;

        if !db.chunk_ids_for_item(item_id)?.is_empty() {
            summary.unchanged += 1;
            continue;
        }

        let chunks: Vec<NewChunk<'_>> = item
            .chunks
            .iter()
            .map(|c| NewChunk {
                content: &c.content,
                start_offset: c.start_offset,
                end_offset: c.end_offset,
                embedding: c.embedding.as_deref(),
            })
            .collect();
        db.insert_chunks(item_id, &chunks)?;
        summary.chunks += chunks.len();
        summary.embedded += chunks.iter().filter(|c| c.embedding.is_some()).count();
    }

    info!(
        "Imported {} items ({} new chunks, {} embedded, {} unchanged)",
        summary.items, summary.chunks, summary.embedded, summary.unchanged
    );
    Ok(summary)
}

/// Embed every chunk that has no embedding yet, `batch_size` at a time.
///
/// Returns the number of chunks that received an embedding.
pub async fn embed_pending(
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut total = 0;

    loop {
        let s = Arc::clone(&store);
        let pending =
            tokio::task::spawn_blocking(move || s.db().chunks_missing_embeddings(batch_size))
                .await??;
        if pending.is_empty() {
            break;
        }

        let texts: Vec<&str> = pending.iter().map(|c| c.content.as_str()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .context("embedding provider failed")?;
        anyhow::ensure!(
            vectors.len() == pending.len(),
            "provider returned {} embeddings for {} chunks",
            vectors.len(),
            pending.len()
        );

        let updates: Vec<(i64, Vec<f32>)> = pending.iter().map(|c| c.id).zip(vectors).collect();
        let s = Arc::clone(&store);
        let written = tokio::task::spawn_blocking(move || {
            let db = s.db();
            let mut written = 0;
            for (chunk_id, embedding) in &updates {
                if db.backfill_embedding(*chunk_id, embedding)? {
                    written += 1;
                }
            }
            Ok::<_, rusqlite::Error>(written)
        })
        .await??;

        total += written;
        if written == 0 {
            warn!("No embeddings written in the last batch; stopping");
            break;
        }
        info!("Embedded {total} chunks so far");
    }

    Ok(total)
}
