/// Configuration module for chunkweave.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Config file used when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "chunkweave.json";

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./chunkweave.db".to_string()
}

fn default_limit() -> usize {
    10
}

fn default_rrf_k() -> f64 {
    60.0
}

fn default_half_life_days() -> f64 {
    365.0
}

fn default_vector_threshold() -> f64 {
    0.3
}

fn default_candidate_multiplier() -> usize {
    3
}

fn default_similarity_threshold() -> f64 {
    0.75
}

fn default_progress_interval() -> usize {
    10
}

fn default_insert_batch_size() -> usize {
    500
}

fn default_provider() -> String {
    "mock".to_string()
}

fn default_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retry_delay_ms() -> u64 {
    250
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Rank damping constant for reciprocal rank fusion.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,

    #[serde(default = "default_vector_threshold")]
    pub vector_threshold: f64,

    /// Sub-searches fetch `limit * candidate_multiplier` rows before fusion.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,

    #[serde(default = "default_limit")]
    pub related_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbedderConfig {
    /// `mock` or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Overall bound on one query embedding, retry included.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            search: SearchConfig::default(),
            graph: GraphConfig::default(),
            embedder: EmbedderConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            rrf_k: default_rrf_k(),
            half_life_days: default_half_life_days(),
            vector_threshold: default_vector_threshold(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            progress_interval: default_progress_interval(),
            insert_batch_size: default_insert_batch_size(),
            related_limit: default_limit(),
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: default_url(),
            model: default_model(),
            dimensions: default_dimensions(),
            timeout_ms: default_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl EmbedderConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to it.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.search.default_limit > 0,
            "search.default_limit must be positive"
        );
        anyhow::ensure!(self.search.rrf_k > 0.0, "search.rrf_k must be positive");
        anyhow::ensure!(
            self.search.half_life_days > 0.0,
            "search.half_life_days must be positive"
        );
        anyhow::ensure!(
            (-1.0..=1.0).contains(&self.search.vector_threshold),
            "search.vector_threshold must be within [-1, 1]"
        );
        anyhow::ensure!(
            self.search.candidate_multiplier > 0,
            "search.candidate_multiplier must be positive"
        );
        anyhow::ensure!(
            (-1.0..=1.0).contains(&self.graph.similarity_threshold),
            "graph.similarity_threshold must be within [-1, 1]"
        );
        anyhow::ensure!(
            self.graph.progress_interval > 0,
            "graph.progress_interval must be positive"
        );
        anyhow::ensure!(
            self.graph.insert_batch_size > 0,
            "graph.insert_batch_size must be positive"
        );
        anyhow::ensure!(
            self.embedder.dimensions > 0,
            "embedder.dimensions must be positive"
        );
        anyhow::ensure!(
            self.embedder.timeout_ms > 0,
            "embedder.timeout_ms must be positive"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_path, "./chunkweave.db");
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.search.rrf_k, 60.0);
        assert_eq!(config.search.half_life_days, 365.0);
        assert_eq!(config.search.vector_threshold, 0.3);
        assert_eq!(config.graph.similarity_threshold, 0.75);
        assert_eq!(config.graph.progress_interval, 10);
        assert_eq!(config.embedder.provider, "mock");
        assert_eq!(config.embedder.timeout(), Duration::from_secs(5));
        assert_eq!(config.embedder.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"db_path": "./test.db", "search": {"rrf_k": 10}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.db_path, "./test.db");
        assert_eq!(config.search.rrf_k, 10.0);
        // Other fields should have defaults
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.graph.insert_batch_size, 500);
        assert_eq!(config.embedder.dimensions, 384);
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_threshold() {
        let mut config = Config::default();
        config.graph.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_half_life() {
        let mut config = Config::default();
        config.search.half_life_days = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.db_path, "./chunkweave.db");
        // Templates are only generated for the default path
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.search.default_limit, 10);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut config = Config::default();
        config.embedder.provider = "ollama".to_string();
        config.save(path.to_str().unwrap()).unwrap();

        let parsed = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(parsed.embedder.provider, "ollama");
        assert_eq!(parsed.db_path, config.db_path);
        assert_eq!(parsed.graph.related_limit, config.graph.related_limit);
    }
}
