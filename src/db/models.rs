use chrono::{DateTime, Utc};
use serde::Serialize;

/// An item to be inserted (or updated) by ingestion tooling.
#[derive(Debug, Clone)]
pub struct NewItem<'a> {
    pub external_id: &'a str,
    pub title: &'a str,
    pub source_name: Option<&'a str>,
    pub thumbnail: Option<&'a str>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A chunk to be inserted under an existing item.
#[derive(Debug, Clone)]
pub struct NewChunk<'a> {
    pub content: &'a str,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub embedding: Option<&'a [f32]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub source_name: Option<String>,
    pub thumbnail: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: i64,
    pub item_id: i64,
    pub content: String,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub embedding: Option<Vec<f32>>,
}

/// The minimal projection of a chunk needed for pairwise scans.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub id: i64,
    pub item_id: i64,
    pub embedding: Vec<f32>,
}

/// A directed similarity edge between two chunks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relationship {
    pub source_chunk_id: i64,
    pub target_chunk_id: i64,
    pub similarity: f64,
}

/// Outcome of a conflict-safe batch insert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub created: usize,
    pub skipped: usize,
}

/// A chunk-level search hit joined with its owning item.
/// Candidate order for keyword matches, which all score the same.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeywordOrder {
    /// Chunk insertion order.
    #[default]
    Insertion,
    /// Undated items first, then newest publish date first. Equal keyword
    /// scores decay into exactly this order.
    RecentFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub content: String,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub similarity: f64,
    pub item_id: i64,
    pub item_title: String,
    pub source_name: Option<String>,
    pub external_id: String,
    pub thumbnail: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedItem {
    pub id: i64,
    pub title: String,
    pub source_name: Option<String>,
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedChunk {
    pub chunk_id: i64,
    pub content: String,
    pub start_offset: Option<f64>,
    pub end_offset: Option<f64>,
    pub similarity: f64,
    pub item: RelatedItem,
}

/// An outgoing edge joined with its target chunk and that chunk's item.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedEdge {
    pub source_chunk_id: i64,
    pub target: RelatedChunk,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub items: i64,
    pub chunks: i64,
    pub embedded_chunks: i64,
    pub relationships: i64,
}
