//! Classic search orchestration (C8): gate → fork-join lexical/dense
//! retrieval → fuse → score → attach evidence → sort → truncate.
//!
//! This is the synchronous counterpart to the agentic pipeline in
//! [`crate::agent::pipeline`] — same stages, no intermediate narration and
//! no weak-match fallback (that widening belongs to the agentic path, C9).

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::AppError;
use crate::models::{Candidate, Chunk, EvidenceItem, MatchQuality, WhyMatched};
use crate::retrieval::{dense, fusion, lexical};
use crate::skills::{ledger, normalizer};
use crate::store::ChunkStore;

use super::{HybridStats, SearchOutcome, SearchParams};

/// How many term-matching chunks to fetch per resume before ranking and
/// truncating evidence to 3 — generous enough that the top-3-by-score
/// chunks are never cut off by the store's fetch cap before scoring runs.
const EVIDENCE_FETCH_LIMIT: usize = 50;
/// How many of the top dense-similarity chunks to consider as evidence
/// candidates, alongside whatever lexical term-matching turned up.
const EVIDENCE_DENSE_CANDIDATES: usize = 3;

/// Run the classic search pipeline and return ranked candidates, already
/// truncated to `params.limit`.
///
/// # Errors
///
/// Returns [`AppError::InvalidQuery`] if `must_have` is empty once
/// normalized — a classic-mode query needs at least one concrete skill to
/// gate on (unlike the agentic path, which can widen to the whole corpus).
pub async fn search(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    params: &SearchParams,
) -> Result<SearchOutcome, AppError> {
    let must_have = normalizer::normalize_list(&params.must_have);
    let nice_to_have = normalizer::normalize_list(&params.nice_to_have);

    if must_have.is_empty() {
        return Err(AppError::InvalidQuery(
            "must_have must contain at least one recognizable skill".to_string(),
        ));
    }

    let threshold = ledger::threshold_for(params.gate_mode, must_have.len());
    let mut gated = store.gate_candidates(&must_have, threshold).await?;
    ledger::sort_gated(&mut gated);

    let mut resume_ids: Vec<String> = gated.iter().map(|c| c.resume_id.clone()).collect();

    if params.min_years.is_some() || params.location.is_some() {
        resume_ids = store
            .filter_by_profile(&resume_ids, params.min_years, params.location.as_deref())
            .await?;
        let keep: std::collections::HashSet<&String> = resume_ids.iter().collect();
        gated.retain(|c| keep.contains(&c.resume_id));
    }

    if gated.is_empty() {
        return Ok(SearchOutcome::default());
    }

    let query_terms: Vec<String> = must_have.iter().chain(nice_to_have.iter()).cloned().collect();
    let k_sparse = config.retrieval.k_sparse.max(0) as usize;
    let k_dense = config.retrieval.k_dense.max(0) as usize;
    let retriever_timeout = Duration::from_secs(config.retrieval.retriever_timeout_secs);

    let lexical_fut = tokio::time::timeout(
        retriever_timeout,
        lexical::retrieve(store, &resume_ids, &query_terms, k_sparse),
    );
    let dense_fut = tokio::time::timeout(
        retriever_timeout,
        dense::retrieve(
            store,
            provider,
            &config.embedding,
            &resume_ids,
            &params.query_text,
            k_dense,
        ),
    );

    let (lexical_result, dense_result) = tokio::join!(lexical_fut, dense_fut);

    let lexical_ranked = lexical_result.ok().and_then(|r| r.ok()).unwrap_or_default();
    let dense_ranked = dense_result.ok().and_then(|r| r.ok()).unwrap_or_default();

    let rrf_scores = fusion::fuse(&[&lexical_ranked, &dense_ranked], config.retrieval.rrf_k);

    let hybrid_stats = HybridStats {
        lexical_hits: lexical_ranked.len(),
        vector_hits: dense_ranked.len(),
    };

    let total_query_skills = must_have.len();
    let total_candidates = gated.len();

    let mut candidates = Vec::with_capacity(gated.len());
    for gc in &gated {
        let rrf_score = rrf_scores.get(&gc.resume_id).copied().unwrap_or(0.0);
        let breakdown = crate::retrieval::scorer::score(gc.matched_count, total_query_skills, rrf_score);

        let evidence = evidence_for(
            store,
            provider,
            &config.embedding,
            &gc.resume_id,
            &query_terms,
            &params.query_text,
        )
        .await?;

        let match_quality = if breakdown.final_score >= config.retrieval.min_relevance_score {
            MatchQuality::Strong
        } else {
            MatchQuality::None
        };

        let core = store.get_resume_core(&gc.resume_id).await?;
        let (headline, total_yoe, location_country, location_city) = match &core {
            Some(core) => (
                core.headline(),
                core.total_yoe,
                core.location_country.clone(),
                core.location_city.clone(),
            ),
            None => (None, 0, None, None),
        };

        candidates.push(Candidate {
            resume_id: gc.resume_id.clone(),
            matched_skills: gc.matched_skills.clone(),
            matched_count: gc.matched_count,
            avg_confidence: gc.avg_confidence,
            rrf_score,
            semantic_score: breakdown.semantic_score,
            skill_score: breakdown.skill_score,
            final_score: breakdown.final_score,
            evidence,
            match_quality,
            headline,
            total_yoe,
            location_country,
            location_city,
        });
    }

    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.resume_id.cmp(&b.resume_id))
    });

    // C8 step 6: widen the pool before (optionally) reranking, then
    // retruncate to the requested limit — reranking needs a larger pool to
    // draw from than the final result count, the same expand-then-rerank
    // shape `agent::pipeline::apply_rerank`'s caller uses.
    let expanded_limit = params.limit.saturating_mul(2).min(100).max(params.limit);
    candidates.truncate(expanded_limit);

    if params.enable_rerank && config.rerank.is_enabled() && !candidates.is_empty() {
        let (reordered, _) = crate::rerank::rerank_candidates(
            &config.rerank,
            Duration::from_secs(config.retrieval.rerank_timeout_secs),
            &params.query_text,
            candidates,
        )
        .await;
        candidates = reordered;
    }

    candidates.truncate(params.limit);

    Ok(SearchOutcome {
        candidates,
        total_candidates,
        hybrid_stats,
    })
}

/// Up to 3 evidence snippets for one resume: chunks whose text matched the
/// query's skill terms (sparse), union'd with the resume's top
/// dense-similarity chunks, each tagged `whyMatched` per its own membership
/// in those two sets — not a single resume-level verdict.
pub(crate) async fn evidence_for(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    embedding_config: &crate::config::EmbeddingConfig,
    resume_id: &str,
    query_terms: &[String],
    query_text: &str,
) -> Result<Vec<EvidenceItem>> {
    let resume_ids = vec![resume_id.to_string()];

    let matched = store
        .chunks_matching_terms(&resume_ids, query_terms, EVIDENCE_FETCH_LIMIT)
        .await?;
    let lexical_chunk_ids: HashSet<String> = matched.iter().map(|m| m.chunk.chunk_id.clone()).collect();

    let mut by_chunk: HashMap<String, (Chunk, f64)> = HashMap::new();
    for m in matched {
        by_chunk.insert(m.chunk.chunk_id.clone(), (m.chunk, m.total_hits as f64));
    }

    let mut dense_chunk_ids: HashSet<String> = HashSet::new();
    if embedding_config.is_enabled() && !query_text.trim().is_empty() {
        if let Ok(query_vec) = embedding::embed_query(provider, embedding_config, query_text).await {
            let mut scored: Vec<(Chunk, f64)> = store
                .chunks_for(&resume_ids)
                .await?
                .into_iter()
                .filter(|c| !c.embedding.is_empty())
                .map(|c| {
                    let sim = embedding::cosine_similarity(&query_vec, &c.embedding) as f64;
                    (c, sim)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(EVIDENCE_DENSE_CANDIDATES);

            for (chunk, sim) in scored {
                dense_chunk_ids.insert(chunk.chunk_id.clone());
                by_chunk.entry(chunk.chunk_id.clone()).or_insert((chunk, sim));
            }
        }
    }

    let mut items: Vec<EvidenceItem> = by_chunk
        .into_values()
        .map(|(chunk, score)| {
            let why_matched = match (
                lexical_chunk_ids.contains(&chunk.chunk_id),
                dense_chunk_ids.contains(&chunk.chunk_id),
            ) {
                (true, true) => Some(WhyMatched::Both),
                (true, false) => Some(WhyMatched::Sparse),
                (false, true) => Some(WhyMatched::Dense),
                (false, false) => None,
            };
            EvidenceItem {
                chunk_text: chunk.chunk_text,
                section_type: chunk.section_type,
                section_ordinal: chunk.section_ordinal,
                score,
                why_matched,
            }
        })
        .collect();

    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(3);

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, RetrievalConfig, ServerConfig};
    use crate::db;
    use crate::embedding::DisabledProvider;
    use crate::migrate;
    use crate::models::{Chunk, ResumeCore, SectionType, SkillLedgerEntry};
    use crate::store::sqlite::SqliteStore;

    async fn test_setup() -> (SqliteStore, Config) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            db: DbConfig {
                path: tmp.path().to_path_buf(),
            },
            retrieval: RetrievalConfig::default(),
            embedding: Default::default(),
            rerank: Default::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        };
        migrate::run_migrations(&config).await.unwrap();
        let pool = db::connect(&config).await.unwrap();
        (SqliteStore::new(pool), config)
    }

    fn core(id: &str) -> ResumeCore {
        ResumeCore {
            resume_id: id.to_string(),
            summary: "Backend engineer".to_string(),
            location_country: Some("USA".to_string()),
            location_city: None,
            total_yoe: 5,
            experience: vec![],
            projects: vec![],
            education: vec![],
        }
    }

    #[tokio::test]
    async fn ranks_strong_candidate_above_gated_out_ones() {
        let (store, config) = test_setup().await;

        store
            .upsert_resume(
                &core("r1"),
                &[SkillLedgerEntry {
                    resume_id: "r1".to_string(),
                    skill_canonical: "rust".to_string(),
                    confidence: 1.0,
                    evidence_count: 1,
                    evidence_sources: vec!["skills_section".to_string()],
                }],
                &[Chunk {
                    chunk_id: "c1".to_string(),
                    resume_id: "r1".to_string(),
                    section_type: SectionType::Experience,
                    section_ordinal: 0,
                    chunk_text: "Built services in rust for five years".to_string(),
                    embedding: vec![],
                    skills_in_chunk: vec!["rust".to_string()],
                }],
            )
            .await
            .unwrap();

        store
            .upsert_resume(&core("r2"), &[], &[])
            .await
            .unwrap();

        let provider = DisabledProvider;
        let params = SearchParams {
            must_have: vec!["rust".to_string()],
            nice_to_have: vec![],
            query_text: "rust engineer".to_string(),
            min_years: None,
            location: None,
            gate_mode: ledger::GateMode::MatchAll,
            limit: 10,
            enable_rerank: false,
        };

        let outcome = search(&store, &provider, &config, &params).await.unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].resume_id, "r1");
        assert_eq!(outcome.candidates[0].match_quality, MatchQuality::Strong);
        assert_eq!(outcome.candidates[0].total_yoe, 5);
        assert_eq!(outcome.total_candidates, 1);
        assert_eq!(outcome.hybrid_stats.lexical_hits, 1);
    }

    #[tokio::test]
    async fn no_matching_skills_yields_empty_result() {
        let (store, config) = test_setup().await;
        store.upsert_resume(&core("r1"), &[], &[]).await.unwrap();

        let provider = DisabledProvider;
        let params = SearchParams {
            must_have: vec!["kubernetes".to_string()],
            nice_to_have: vec![],
            query_text: "kubernetes expert".to_string(),
            min_years: None,
            location: None,
            gate_mode: ledger::GateMode::MatchAll,
            limit: 10,
            enable_rerank: false,
        };

        let outcome = search(&store, &provider, &config, &params).await.unwrap();
        assert!(outcome.candidates.is_empty());
    }

    #[tokio::test]
    async fn enable_rerank_without_configured_endpoint_keeps_fused_order() {
        // enable_rerank is a per-query opt-in; with no rerank.endpoint set,
        // `config.rerank.is_enabled()` is false and the reranker must never
        // be called — search still returns the fused-order result.
        let (store, config) = test_setup().await;
        store
            .upsert_resume(
                &core("r1"),
                &[SkillLedgerEntry {
                    resume_id: "r1".to_string(),
                    skill_canonical: "rust".to_string(),
                    confidence: 1.0,
                    evidence_count: 1,
                    evidence_sources: vec!["skills_section".to_string()],
                }],
                &[],
            )
            .await
            .unwrap();

        let provider = DisabledProvider;
        let params = SearchParams {
            must_have: vec!["rust".to_string()],
            nice_to_have: vec![],
            query_text: "rust engineer".to_string(),
            min_years: None,
            location: None,
            gate_mode: ledger::GateMode::MatchAll,
            limit: 10,
            enable_rerank: true,
        };

        let outcome = search(&store, &provider, &config, &params).await.unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].resume_id, "r1");
    }

    #[tokio::test]
    async fn empty_must_have_is_an_invalid_query() {
        let (store, config) = test_setup().await;
        let provider = DisabledProvider;
        let params = SearchParams {
            must_have: vec![],
            nice_to_have: vec![],
            query_text: "anything".to_string(),
            min_years: None,
            location: None,
            gate_mode: ledger::GateMode::MatchAll,
            limit: 10,
            enable_rerank: false,
        };

        let err = search(&store, &provider, &config, &params).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn evidence_for_ranks_by_hits_and_tags_sparse_matches() {
        let (store, config) = test_setup().await;
        let chunks = vec![
            Chunk {
                chunk_id: "c1".to_string(),
                resume_id: "r1".to_string(),
                section_type: SectionType::Experience,
                section_ordinal: 0,
                chunk_text: "rust rust rust".to_string(),
                embedding: vec![],
                skills_in_chunk: vec!["rust".to_string()],
            },
            Chunk {
                chunk_id: "c2".to_string(),
                resume_id: "r1".to_string(),
                section_type: SectionType::Experience,
                section_ordinal: 1,
                chunk_text: "rust".to_string(),
                embedding: vec![],
                skills_in_chunk: vec!["rust".to_string()],
            },
        ];
        store.upsert_resume(&core("r1"), &[], &chunks).await.unwrap();

        let provider = DisabledProvider;
        let items = evidence_for(&store, &provider, &config.embedding, "r1", &["rust".to_string()], "")
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].chunk_text, "rust rust rust");
        assert_eq!(items[0].why_matched, Some(WhyMatched::Sparse));
    }
}
