//! Configuration parsing and validation.
//!
//! The retrieval core is configured via a TOML file (default:
//! `config/shortlist.toml`). The config defines the database path,
//! retrieval tuning, the dense embedding provider, the cross-encoder
//! reranker provider, and the server bind address.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Retrieval tuning: candidate widths per leg, the RRF constant, the
/// relevance floor, the classic-mode result limit, and the per-stage
/// soft timeouts.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k_dense")]
    pub k_dense: i64,
    #[serde(default = "default_k_sparse")]
    pub k_sparse: i64,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f64,
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
    #[serde(default = "default_m_min")]
    pub m_min: usize,
    #[serde(default = "default_retriever_timeout_secs")]
    pub retriever_timeout_secs: u64,
    #[serde(default = "default_rerank_timeout_secs")]
    pub rerank_timeout_secs: u64,
    #[serde(default = "default_agentic_timeout_secs")]
    pub agentic_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_dense: default_k_dense(),
            k_sparse: default_k_sparse(),
            rrf_k: default_rrf_k(),
            min_relevance_score: default_min_relevance_score(),
            final_limit: default_final_limit(),
            m_min: default_m_min(),
            retriever_timeout_secs: default_retriever_timeout_secs(),
            rerank_timeout_secs: default_rerank_timeout_secs(),
            agentic_timeout_secs: default_agentic_timeout_secs(),
        }
    }
}

fn default_k_dense() -> i64 {
    300
}
fn default_k_sparse() -> i64 {
    300
}
fn default_rrf_k() -> f64 {
    60.0
}
fn default_min_relevance_score() -> f64 {
    20.0
}
fn default_final_limit() -> i64 {
    50
}
fn default_m_min() -> usize {
    3
}
fn default_retriever_timeout_secs() -> u64 {
    2
}
fn default_rerank_timeout_secs() -> u64 {
    5
}
fn default_agentic_timeout_secs() -> u64 {
    20
}

/// The dense-embedding provider (C5). `provider = "disabled"` turns off
/// dense retrieval entirely; the query engine then falls back to lexical-only
/// candidates with `semanticScore` fixed at 0.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// The cross-encoder reranker provider (C10). Reranking is opt-in
/// per-query (`enable_rerank`) but the provider must be configured
/// ahead of time for the flag to have any effect.
#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RerankConfig {
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Load and validate the TOML config at `path`, then apply any recognized
/// environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_env_overrides(&mut config);

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if config.retrieval.rrf_k <= 0.0 {
        anyhow::bail!("retrieval.rrf_k must be > 0");
    }
    if config.retrieval.k_dense < 1 || config.retrieval.k_sparse < 1 {
        anyhow::bail!("retrieval.k_dense and retrieval.k_sparse must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" => {}
        "http" => {
            if config.embedding.endpoint.is_none() {
                anyhow::bail!("embedding.endpoint must be set when provider = \"http\"");
            }
            if config.embedding.dims.unwrap_or(0) == 0 {
                anyhow::bail!("embedding.dims must be > 0 when provider = \"http\"");
            }
        }
        other => anyhow::bail!("Unknown embedding provider: '{}'. Must be disabled or http.", other),
    }

    Ok(config)
}

/// Environment overrides let an operator retune retrieval or point at a
/// different provider endpoint without editing the config file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("SHORTLIST_DB_PATH") {
        config.db.path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("EMBEDDING_ENDPOINT") {
        config.embedding.endpoint = Some(v);
    }
    if let Ok(v) = std::env::var("RERANK_ENDPOINT") {
        config.rerank.endpoint = Some(v);
    }
    if let Ok(v) = std::env::var("K_DENSE") {
        if let Ok(n) = v.parse() {
            config.retrieval.k_dense = n;
        }
    }
    if let Ok(v) = std::env::var("K_SPARSE") {
        if let Ok(n) = v.parse() {
            config.retrieval.k_sparse = n;
        }
    }
    if let Ok(v) = std::env::var("RRF_K") {
        if let Ok(n) = v.parse() {
            config.retrieval.rrf_k = n;
        }
    }
    if let Ok(v) = std::env::var("MIN_RELEVANCE_SCORE") {
        if let Ok(n) = v.parse() {
            config.retrieval.min_relevance_score = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let f = write_temp_config(
            r#"
            [db]
            path = "./shortlist.db"

            [server]
            bind = "127.0.0.1:8080"
            "#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.retrieval.k_dense, 300);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert!(!config.embedding.is_enabled());
        assert!(!config.rerank.is_enabled());
    }

    #[test]
    fn rejects_http_embedding_without_endpoint() {
        let f = write_temp_config(
            r#"
            [db]
            path = "./shortlist.db"

            [embedding]
            provider = "http"
            dims = 384

            [server]
            bind = "127.0.0.1:8080"
            "#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn rejects_zero_rrf_k() {
        let f = write_temp_config(
            r#"
            [db]
            path = "./shortlist.db"

            [retrieval]
            rrf_k = 0

            [server]
            bind = "127.0.0.1:8080"
            "#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
