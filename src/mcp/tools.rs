/// MCP Tool handlers for chunkweave.
///
/// 1. search                – hybrid / keyword / vector chunk search
/// 2. search_videos         – the same search grouped per item
/// 3. related_chunks        – graph traversal from an item
/// 4. compute_relationships – build graph edges (one item or the corpus)
/// 5. cancel_request        – cancel a running relationship build
/// 6. corpus_stats          – item / chunk / edge counts
use crate::error::EngineError;
use crate::graph::{RelatedOptions, RelationshipOptions};
use crate::mcp::server::McpContext;
use crate::search::{SearchMode, SearchOptions};
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct SearchParams {
    /// Search query (natural language or keywords)
    query: String,
    /// keyword | vector | hybrid (default: hybrid)
    mode: Option<SearchMode>,
    /// Max results (default: 10)
    limit: Option<usize>,
    /// Favour recent items (default: false)
    temporal_decay: Option<bool>,
    /// Half-life in days for temporal decay (default: 365)
    half_life_days: Option<f64>,
}

#[derive(Deserialize, JsonSchema)]
struct RelatedParams {
    /// Item whose related content is wanted
    item_id: i64,
    /// Max results (default: 10)
    limit: Option<usize>,
    /// Minimum edge similarity
    min_similarity: Option<f64>,
    /// Include chunks of the same item (default: false)
    include_within_video: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct ComputeParams {
    /// Item to relate; every item when omitted
    item_id: Option<i64>,
    /// Similarity threshold (default: 0.75)
    threshold: Option<f64>,
    /// Caller-chosen id that makes the build cancellable via cancel_request
    request_id: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct CancelParams {
    /// Id passed to compute_relationships
    request_id: String,
}

impl From<SearchParams> for SearchOptions {
    fn from(p: SearchParams) -> Self {
        Self {
            mode: p.mode.unwrap_or_default(),
            limit: p.limit,
            temporal_decay: p.temporal_decay.unwrap_or(false),
            half_life_days: p.half_life_days,
        }
    }
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

/// Caller mistakes become tool errors; storage failures are internal errors.
fn engine_error(e: EngineError) -> Result<CallToolResult, McpError> {
    match e {
        EngineError::EmptyQuery
        | EngineError::InvalidOption(_)
        | EngineError::DimensionMismatch { .. }
        | EngineError::Cancelled => error_result(&e.to_string()),
        EngineError::Storage(_) | EngineError::Task(_) => {
            Err(McpError::internal_error(e.to_string(), None))
        }
    }
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: search ──────────────────────────────────────────────

    #[tool(
        description = "Search transcript chunks. Hybrid mode fuses keyword and semantic matches; if degraded is true, semantic matching was unavailable and only keyword matches were used."
    )]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let query = p.query.clone();

        match self.ctx.engine.hybrid_search(&query, p.into()).await {
            Ok(resp) => json_result(serde_json::json!({
                "results": resp.results,
                "degraded": resp.degraded,
            })),
            Err(e) => engine_error(e),
        }
    }

    // ── Tool 2: search_videos ───────────────────────────────────────

    #[tool(
        description = "Search and group matches per item (video), with the best matching chunk and match count for each."
    )]
    async fn search_videos(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let query = p.query.clone();

        match self.ctx.engine.search_videos(&query, p.into()).await {
            Ok(resp) => json_result(serde_json::json!({
                "results": resp.results,
                "degraded": resp.degraded,
            })),
            Err(e) => engine_error(e),
        }
    }

    // ── Tool 3: related_chunks ──────────────────────────────────────

    #[tool(description = "List chunks from other items that are similar to an item's chunks")]
    async fn related_chunks(
        &self,
        params: Parameters<RelatedParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let options = RelatedOptions {
            limit: Some(
                p.limit
                    .unwrap_or(self.ctx.engine.config().graph.related_limit),
            ),
            min_similarity: p.min_similarity,
            include_within_video: p.include_within_video.unwrap_or(false),
        };

        match self.ctx.engine.get_related_chunks(p.item_id, options).await {
            Ok(related) => json_result(serde_json::json!({ "related": related })),
            Err(e) => engine_error(e),
        }
    }

    // ── Tool 4: compute_relationships ───────────────────────────────

    #[tool(
        description = "Compute similarity edges for one item (or the whole corpus when item_id is omitted). Safe to re-run: existing edges are skipped."
    )]
    async fn compute_relationships(
        &self,
        params: Parameters<ComputeParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let guard = p
            .request_id
            .as_deref()
            .map(|id| self.ctx.engine.registry().register(id));
        let options = RelationshipOptions {
            threshold: p.threshold,
            on_progress: None,
            cancel: guard.as_ref().map(|g| g.token()),
        };

        let result = match p.item_id {
            Some(item_id) => {
                self.ctx
                    .engine
                    .compute_relationships(item_id, options)
                    .await
            }
            None => self.ctx.engine.compute_all_relationships(options).await,
        };
        drop(guard);

        match result {
            Ok(counts) => json_result(serde_json::json!({
                "success": true,
                "created": counts.created,
                "skipped": counts.skipped,
            })),
            Err(e) => engine_error(e),
        }
    }

    // ── Tool 5: cancel_request ──────────────────────────────────────

    #[tool(description = "Cancel a running compute_relationships call by its request_id")]
    async fn cancel_request(
        &self,
        params: Parameters<CancelParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = &params.0.request_id;
        if id.is_empty() {
            return error_result("request_id is required");
        }

        let cancelled = self.ctx.engine.registry().cancel(id);
        if cancelled {
            info!("Cancellation requested for {id}");
        }
        json_result(serde_json::json!({
            "cancelled": cancelled,
            "active": self.ctx.engine.registry().active(),
        }))
    }

    // ── Tool 6: corpus_stats ────────────────────────────────────────

    #[tool(description = "Count items, chunks, embedded chunks and relationship edges")]
    async fn corpus_stats(&self) -> Result<CallToolResult, McpError> {
        match self.ctx.engine.stats().await {
            Ok(stats) => json_result(serde_json::json!({ "stats": stats })),
            Err(e) => engine_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedder::mock::FailingEmbedder;
    use crate::engine::Engine;
    use crate::store::SqliteStore;
    use crate::store::fixtures::seed_item;
    use std::sync::Arc;

    fn tools() -> AppTools {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        seed_item(&store, "v1", None, &[("hello transcripts", None)]);
        let mut config = Config::default();
        config.embedder.retry_delay_ms = 0;
        let engine = Engine::new(store, Arc::new(FailingEmbedder::new()), config);
        AppTools::new(McpContext {
            engine: Arc::new(engine),
        })
    }

    fn search_params(query: &str) -> Parameters<SearchParams> {
        Parameters(SearchParams {
            query: query.to_string(),
            mode: None,
            limit: None,
            temporal_decay: None,
            half_life_days: None,
        })
    }

    #[tokio::test]
    async fn test_empty_query_is_tool_error() {
        let result = tools().search(search_params("  ")).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_degraded_search_succeeds() {
        let result = tools().search(search_params("hello")).await.unwrap();
        assert_eq!(result.is_error, Some(false));
    }

    #[tokio::test]
    async fn test_cancel_unknown_request() {
        let result = tools()
            .cancel_request(Parameters(CancelParams {
                request_id: "nope".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
    }

    #[tokio::test]
    async fn test_compute_relationships_deregisters_request() {
        let tools = tools();
        let result = tools
            .compute_relationships(Parameters(ComputeParams {
                item_id: None,
                threshold: None,
                request_id: Some("job-1".to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        assert!(tools.ctx.engine.registry().active().is_empty());
    }
}
