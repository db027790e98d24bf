//! # chunkweave — hybrid retrieval and chunk relationship graph
//!
//! Searches a corpus of transcript chunks with keyword, vector and fused
//! hybrid retrieval, and maintains a persistent similarity graph between
//! chunks for "related content" lookups. Served to AI assistants via the
//! Model Context Protocol (MCP).
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation and defaults
//! - **[`db`]** — SQLite storage for items, chunks and relationship edges
//! - **[`store`]** — The [`store::CorpusStore`] repository interface
//! - **[`embedder`]** — Embedding providers and the bounded-retry resolver
//! - **[`search`]** — Keyword / vector / hybrid search, RRF, temporal decay, aggregation
//! - **[`graph`]** — Relationship graph builder and traversal
//! - **[`engine`]** — The async facade tying the above together
//! - **[`registry`]** — Per-engine tracking of cancellable requests
//! - **[`ingest`]** — JSON import and embedding back-fill
//! - **[`mcp`]** — MCP server with 6 tool handlers (stdio transport via rmcp)

pub mod config;
pub mod db;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod mcp;
pub mod registry;
pub mod search;
pub mod similarity;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use search::aggregate::aggregate_by_video;
