//! Dense retrieval (C5): cosine similarity over candidate resumes' chunk
//! embeddings, aggregated per resume by MAX (best matching chunk wins),
//! grounded on `search.rs`'s `fetch_vector_candidates` brute-force scan,
//! generalized from per-chunk to per-chunk-then-per-resume aggregation.

use anyhow::Result;
use std::collections::HashMap;

use crate::config::EmbeddingConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::store::ChunkStore;

use super::{rank_by_score, RankedResume};

/// Embed `query_text`, score every chunk belonging to `resume_ids` by
/// cosine similarity, aggregate per resume by the best (max) chunk score,
/// rank descending, and truncate to `limit`.
///
/// Returns an empty list rather than an error when the embedding provider
/// is disabled — dense retrieval degrades to a no-op leg, not a failure.
pub async fn retrieve(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    embedding_config: &EmbeddingConfig,
    resume_ids: &[String],
    query_text: &str,
    limit: usize,
) -> Result<Vec<RankedResume>> {
    if resume_ids.is_empty() || !embedding_config.is_enabled() {
        return Ok(Vec::new());
    }

    let query_vec = embedding::embed_query(provider, embedding_config, query_text).await?;

    let chunks = store.chunks_for(resume_ids).await?;

    let mut best: HashMap<String, f64> = HashMap::new();
    for chunk in &chunks {
        if chunk.embedding.is_empty() {
            continue;
        }
        let sim = embedding::cosine_similarity(&query_vec, &chunk.embedding) as f64;
        let entry = best.entry(chunk.resume_id.clone()).or_insert(f64::NEG_INFINITY);
        if sim > *entry {
            *entry = sim;
        }
    }

    let scored: Vec<(String, f64)> = best.into_iter().collect();
    Ok(rank_by_score(scored, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use crate::embedding::DisabledProvider;
    use crate::migrate;

    async fn test_store() -> crate::store::sqlite::SqliteStore {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            db: crate::config::DbConfig {
                path: tmp.path().to_path_buf(),
            },
            retrieval: Default::default(),
            embedding: Default::default(),
            rerank: Default::default(),
            server: crate::config::ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        };
        migrate::run_migrations(&config).await.unwrap();
        let pool = db::connect(&config).await.unwrap();
        crate::store::sqlite::SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn disabled_provider_returns_empty() {
        let store = test_store().await;
        let provider = DisabledProvider;
        let config = EmbeddingConfig::default();
        let resume_ids = vec!["r1".to_string()];

        let ranked = retrieve(&store, &provider, &config, &resume_ids, "rust engineer", 10)
            .await
            .unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn empty_resume_ids_returns_empty() {
        let store = test_store().await;
        let provider = DisabledProvider;
        let config = EmbeddingConfig::default();

        let ranked = retrieve(&store, &provider, &config, &[], "rust engineer", 10)
            .await
            .unwrap();
        assert!(ranked.is_empty());
    }
}
