//! Lexical retrieval (C4): term-hit counting over gated candidates' chunks.
//!
//! Per-chunk term hit counts come from [`crate::store::ChunkStore::chunks_matching_terms`]
//! (store-side, since SQLite has no native regex); this module only
//! aggregates those counts up to the resume level and ranks the result —
//! the best matching chunk wins, the same MAX-aggregation shape `dense.rs`
//! uses for cosine similarity, so a resume's score reflects its strongest
//! chunk rather than growing with chunk count.

use anyhow::Result;
use std::collections::HashMap;

use crate::store::ChunkStore;

use super::{rank_by_score, RankedResume};

/// Aggregate term-hit counts per resume across `resume_ids`' chunks by MAX
/// (best matching chunk wins), rank descending by that score (ties broken
/// by `resume_id` ascending), and truncate to `limit`.
///
/// Resumes with zero matching chunks are omitted entirely rather than
/// ranked with a score of zero.
pub async fn retrieve(
    store: &dyn ChunkStore,
    resume_ids: &[String],
    query_terms: &[String],
    limit: usize,
) -> Result<Vec<RankedResume>> {
    if resume_ids.is_empty() || query_terms.is_empty() {
        return Ok(Vec::new());
    }

    // Fetch generously — enough chunks to cover every candidate resume —
    // since the per-term filter happens inside the store, not here.
    let fetch_limit = resume_ids.len().saturating_mul(query_terms.len()).max(limit) * 4;
    let matched = store
        .chunks_matching_terms(resume_ids, query_terms, fetch_limit)
        .await?;

    let mut best: HashMap<String, f64> = HashMap::new();
    for m in &matched {
        let hits = m.total_hits as f64;
        let entry = best.entry(m.chunk.resume_id.clone()).or_insert(f64::NEG_INFINITY);
        if hits > *entry {
            *entry = hits;
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
    use crate::migrate;
    use crate::models::{Chunk, ResumeCore, SectionType};
    use crate::store::sqlite::SqliteStore;

    async fn test_store() -> SqliteStore {
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
        SqliteStore::new(pool)
    }

    fn core(id: &str) -> ResumeCore {
        ResumeCore {
            resume_id: id.to_string(),
            summary: "Engineer".to_string(),
            location_country: None,
            location_city: None,
            total_yoe: 3,
            experience: vec![],
            projects: vec![],
            education: vec![],
        }
    }

    fn chunk(id: &str, resume_id: &str, text: &str, ordinal: i64) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            resume_id: resume_id.to_string(),
            section_type: SectionType::Experience,
            section_ordinal: ordinal,
            chunk_text: text.to_string(),
            embedding: vec![],
            skills_in_chunk: vec![],
        }
    }

    #[tokio::test]
    async fn ranks_by_total_term_hits() {
        let store = test_store().await;
        store
            .upsert_resume(
                &core("r1"),
                &[],
                &[chunk("c1", "r1", "built rust services with rust async rust", 0)],
            )
            .await
            .unwrap();
        store
            .upsert_resume(&core("r2"), &[], &[chunk("c2", "r2", "wrote one rust service", 0)])
            .await
            .unwrap();

        let resume_ids = vec!["r1".to_string(), "r2".to_string()];
        let terms = vec!["rust".to_string()];
        let ranked = retrieve(&store, &resume_ids, &terms, 10).await.unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].resume_id, "r1");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].resume_id, "r2");
    }

    #[tokio::test]
    async fn no_matches_returns_empty() {
        let store = test_store().await;
        store
            .upsert_resume(&core("r1"), &[], &[chunk("c1", "r1", "no overlap here", 0)])
            .await
            .unwrap();

        let resume_ids = vec!["r1".to_string()];
        let terms = vec!["kubernetes".to_string()];
        let ranked = retrieve(&store, &resume_ids, &terms, 10).await.unwrap();
        assert!(ranked.is_empty());
    }
}
