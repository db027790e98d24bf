//! # chunkweave CLI
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chunkweave serve` | Start the MCP server on stdio (default) |
//! | `chunkweave search "<query>"` | Hybrid / keyword / vector search |
//! | `chunkweave related <item_id>` | Related chunks from other items |
//! | `chunkweave relate <item_id>` | Build relationship edges for one item |
//! | `chunkweave relate-all` | Build relationship edges for every item |
//! | `chunkweave import <file.json>` | Load pre-chunked items |
//! | `chunkweave embed-pending` | Back-fill missing chunk embeddings |
//! | `chunkweave stats` | Corpus counts |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chunkweave::config::Config;
use chunkweave::embedder::create_embedder;
use chunkweave::engine::Engine;
use chunkweave::graph::{RelatedOptions, RelationshipOptions};
use chunkweave::ingest;
use chunkweave::mcp::server::{McpContext, McpServer};
use chunkweave::search::{SearchMode, SearchOptions};
use chunkweave::store::SqliteStore;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "chunkweave",
    version,
    about = "Hybrid search and chunk relationship graph over transcript corpora"
)]
struct Cli {
    /// Path to the JSON configuration file (default: ./chunkweave.json)
    #[arg(long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP tools over stdio.
    Serve,

    /// Search chunks.
    Search {
        query: String,
        /// keyword | vector | hybrid
        #[arg(long, default_value = "hybrid")]
        mode: SearchMode,
        #[arg(long)]
        limit: Option<usize>,
        /// Apply temporal decay by publish date.
        #[arg(long)]
        decay: bool,
        #[arg(long)]
        half_life_days: Option<f64>,
        /// Group results per item.
        #[arg(long)]
        videos: bool,
    },

    /// Show chunks related to an item.
    Related {
        item_id: i64,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_similarity: Option<f64>,
        #[arg(long)]
        include_within_video: bool,
    },

    /// Compute relationship edges for one item.
    Relate {
        item_id: i64,
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Compute relationship edges for every item.
    RelateAll {
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Import items with chunks from a JSON array.
    Import { file: PathBuf },

    /// Embed chunks that have no embedding yet.
    EmbedPending {
        #[arg(long, default_value_t = 64)]
        batch_size: usize,
    },

    /// Print corpus counts.
    Stats,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` on Ctrl-C. Builds stop at the next insert batch.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current batch");
            child.cancel();
        }
    });
    token
}

fn progress_options(threshold: Option<f64>, message: String) -> Result<(RelationshipOptions, ProgressBar)> {
    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}")?);
    pb.set_message(message);

    let bar = pb.clone();
    let options = RelationshipOptions {
        threshold,
        on_progress: Some(Arc::new(move |done: usize, total: usize| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })),
        cancel: Some(cancel_on_ctrl_c()),
    };
    Ok((options, pb))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    // 2. Init store
    let store = Arc::new(SqliteStore::open(&config.db_path).context("Failed to open database")?);

    // 3. Init embedder
    let embedder = create_embedder(&config.embedder)?;
    info!("Embedding provider: {}", config.embedder.provider);

    // 4. Init engine
    let engine = Arc::new(Engine::new(store.clone(), embedder.clone(), config.clone()));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let server = McpServer::new(McpContext { engine });
            server.start().await?;
        }
        Commands::Search {
            query,
            mode,
            limit,
            decay,
            half_life_days,
            videos,
        } => {
            let options = SearchOptions {
                mode,
                limit,
                temporal_decay: decay,
                half_life_days,
            };
            if videos {
                let resp = engine.search_videos(&query, options).await?;
                if resp.degraded {
                    warn!("Semantic search unavailable; showing keyword matches only");
                }
                print_json(&resp)?;
            } else {
                let resp = engine.hybrid_search(&query, options).await?;
                if resp.degraded {
                    warn!("Semantic search unavailable; showing keyword matches only");
                }
                print_json(&resp)?;
            }
        }
        Commands::Related {
            item_id,
            limit,
            min_similarity,
            include_within_video,
        } => {
            let options = RelatedOptions {
                limit: Some(limit.unwrap_or(config.graph.related_limit)),
                min_similarity,
                include_within_video,
            };
            print_json(&engine.get_related_chunks(item_id, options).await?)?;
        }
        Commands::Relate { item_id, threshold } => {
            let (options, pb) = progress_options(threshold, format!("Item {item_id}"))?;
            let counts = engine.compute_relationships(item_id, options).await;
            pb.finish_and_clear();
            print_json(&counts?)?;
        }
        Commands::RelateAll { threshold } => {
            let (options, pb) = progress_options(threshold, "Comparisons".to_string())?;
            let counts = engine.compute_all_relationships(options).await;
            pb.finish_and_clear();
            print_json(&counts?)?;
        }
        Commands::Import { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let items = ingest::parse_items(&data)?;
            let summary = ingest::import_items(&store, &items, config.embedder.dimensions)?;
            print_json(&summary)?;
        }
        Commands::EmbedPending { batch_size } => {
            let written = ingest::embed_pending(store, embedder, batch_size).await?;
            print_json(&serde_json::json!({ "embedded": written }))?;
        }
        Commands::Stats => {
            print_json(&engine.stats().await?)?;
        }
    }

    Ok(())
}
