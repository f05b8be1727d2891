//! Stage machine for the agentic `/shortlist` endpoint (C9).
//!
//! `jd_understanding → retrieval → fusion → evidence_building → ranking →
//! assembly`, each stage narrated onto the event sink. If fewer than
//! `m_min` candidates clear `min_relevance_score` after ranking, retrieval
//! is retried once with the skill gate dropped entirely (weak-match
//! fallback); if that still comes up empty, the response carries
//! `matchQuality = none`.

use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::models::{Candidate, MatchQuality, MissionSpec};
use crate::retrieval::{dense, fusion, lexical, scorer};
use crate::skills::normalizer;
use crate::store::{ChunkStore, GatedCandidate};

use super::events::EventSink;

const STAGE_JD_UNDERSTANDING: &str = "jd_understanding";
const STAGE_RETRIEVAL: &str = "retrieval";
const STAGE_FUSION: &str = "fusion";
const STAGE_EVIDENCE_BUILDING: &str = "evidence_building";
const STAGE_RANKING: &str = "ranking";
const STAGE_ASSEMBLY: &str = "assembly";

/// Run the full pipeline, streaming every stage's events to `sink`, and
/// return the final ranked candidates plus the overall match quality.
///
/// Returns `Ok(None)` if `cancel` fires mid-run — the caller (the SSE
/// handler, on client disconnect or the hard agentic timeout) treats that
/// as "nothing more to send," not an error.
pub async fn run(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    raw_query: &str,
    enable_rerank: bool,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Result<Option<(Vec<Candidate>, MatchQuality)>> {
    if cancel.is_cancelled() {
        return Ok(None);
    }

    sink.agent_start(STAGE_JD_UNDERSTANDING).await;
    let mission = extract_mission_spec(raw_query);
    sink.agent_thought(
        STAGE_JD_UNDERSTANDING,
        format!(
            "identified {} must-have skill(s), min_years={:?}",
            mission.must_have.len(),
            mission.min_years
        ),
    )
    .await;
    sink.mission_spec(mission.clone()).await;
    sink.stage_complete(STAGE_JD_UNDERSTANDING).await;

    if cancel.is_cancelled() {
        return Ok(None);
    }

    let (candidates, quality) =
        retrieve_and_score(store, provider, config, &mission, raw_query, sink, cancel).await?;

    let strong_count = candidates
        .iter()
        .filter(|c| c.final_score >= config.retrieval.min_relevance_score)
        .count();

    let (mut candidates, mut quality) = (candidates, quality);

    if strong_count < config.retrieval.m_min {
        sink.agent_thought(
            STAGE_RANKING,
            format!(
                "only {} candidate(s) cleared the relevance floor (need {}); widening search",
                strong_count, config.retrieval.m_min
            ),
        )
        .await;

        let widened_mission = MissionSpec {
            must_have: Vec::new(),
            ..mission.clone()
        };
        let (fallback_candidates, _) =
            retrieve_and_score(store, provider, config, &widened_mission, raw_query, sink, cancel).await?;

        if fallback_candidates.is_empty() {
            quality = MatchQuality::None;
            candidates = Vec::new();
        } else {
            quality = MatchQuality::Weak;
            candidates = fallback_candidates
                .into_iter()
                .map(|mut c| {
                    c.match_quality = MatchQuality::Weak;
                    c
                })
                .collect();
        }
    }

    if cancel.is_cancelled() {
        return Ok(None);
    }

    sink.agent_start(STAGE_ASSEMBLY).await;
    if enable_rerank && config.rerank.is_enabled() && !candidates.is_empty() {
        candidates = apply_rerank(config, raw_query, candidates, sink, cancel).await;
    }

    if cancel.is_cancelled() {
        return Ok(None);
    }

    candidates.truncate(config.retrieval.final_limit.max(0) as usize);
    sink.stage_complete(STAGE_ASSEMBLY).await;

    Ok(Some((candidates, quality)))
}

async fn retrieve_and_score(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    mission: &MissionSpec,
    raw_query: &str,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Result<(Vec<Candidate>, MatchQuality)> {
    sink.agent_start(STAGE_RETRIEVAL).await;

    let must_have = normalizer::normalize_list(&mission.must_have);
    let nice_to_have = normalizer::normalize_list(&mission.nice_to_have);

    sink.tool_call(
        STAGE_RETRIEVAL,
        "gate_candidates",
        serde_json::json!({ "skills": must_have }),
    )
    .await;

    let gated: Vec<GatedCandidate> = if must_have.is_empty() {
        let all_ids = store.all_resume_ids().await?;
        all_ids
            .into_iter()
            .map(|resume_id| GatedCandidate {
                resume_id,
                matched_skills: Vec::new(),
                matched_count: 0,
                avg_confidence: 0.0,
            })
            .collect()
    } else {
        store.gate_candidates(&must_have, must_have.len()).await?
    };

    sink.tool_result(
        STAGE_RETRIEVAL,
        "gate_candidates",
        format!("{} candidate(s) cleared the skill gate", gated.len()),
    )
    .await;

    let mut resume_ids: Vec<String> = gated.iter().map(|c| c.resume_id.clone()).collect();
    if mission.min_years.is_some() || mission.location.is_some() {
        resume_ids = store
            .filter_by_profile(&resume_ids, mission.min_years, mission.location.as_deref())
            .await?;
    }

    if resume_ids.is_empty() || cancel.is_cancelled() {
        sink.stage_complete(STAGE_RETRIEVAL).await;
        return Ok((Vec::new(), MatchQuality::None));
    }

    let query_terms: Vec<String> = must_have.iter().chain(nice_to_have.iter()).cloned().collect();
    let k_sparse = config.retrieval.k_sparse.max(0) as usize;
    let k_dense = config.retrieval.k_dense.max(0) as usize;
    let retriever_timeout = Duration::from_secs(config.retrieval.retriever_timeout_secs);

    let lexical_fut =
        tokio::time::timeout(retriever_timeout, lexical::retrieve(store, &resume_ids, &query_terms, k_sparse));
    let dense_fut = tokio::time::timeout(
        retriever_timeout,
        dense::retrieve(store, provider, &config.embedding, &resume_ids, raw_query, k_dense),
    );

    // Race the fork-joined retrieval legs against cancellation, not just
    // poll between stages: dropping `retrieval_fut` on the losing branch
    // drops the in-flight lexical/dense futures with it, which tears down
    // the dense leg's embedding HTTP call mid-request rather than waiting
    // for it to finish.
    let retrieval_fut = async { tokio::join!(lexical_fut, dense_fut) };
    tokio::pin!(retrieval_fut);

    let (lexical_result, dense_result) = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            sink.stage_complete(STAGE_RETRIEVAL).await;
            return Ok((Vec::new(), MatchQuality::None));
        }
        result = &mut retrieval_fut => result,
    };
    let lexical_ranked = lexical_result.ok().and_then(|r| r.ok()).unwrap_or_default();
    let dense_ranked = dense_result.ok().and_then(|r| r.ok()).unwrap_or_default();

    sink.tool_result(
        STAGE_RETRIEVAL,
        "hybrid_retrieve",
        format!(
            "{} lexical hit(s), {} dense hit(s)",
            lexical_ranked.len(),
            dense_ranked.len()
        ),
    )
    .await;
    sink.stage_complete(STAGE_RETRIEVAL).await;

    sink.agent_start(STAGE_FUSION).await;
    let rrf_scores = fusion::fuse(&[&lexical_ranked, &dense_ranked], config.retrieval.rrf_k);
    sink.stage_complete(STAGE_FUSION).await;

    sink.agent_start(STAGE_EVIDENCE_BUILDING).await;
    let total_query_skills = must_have.len();

    let mut candidates = Vec::with_capacity(gated.len());
    for gc in &gated {
        let rrf_score = rrf_scores.get(&gc.resume_id).copied().unwrap_or(0.0);
        let breakdown = scorer::score(gc.matched_count, total_query_skills, rrf_score);

        let evidence = crate::query::classic::evidence_for(
            store,
            provider,
            &config.embedding,
            &gc.resume_id,
            &query_terms,
            raw_query,
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
    sink.stage_complete(STAGE_EVIDENCE_BUILDING).await;

    sink.agent_start(STAGE_RANKING).await;
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.resume_id.cmp(&b.resume_id))
    });
    sink.stage_complete(STAGE_RANKING).await;

    let overall_quality = if candidates.iter().any(|c| c.match_quality == MatchQuality::Strong) {
        MatchQuality::Strong
    } else {
        MatchQuality::None
    };

    Ok((candidates, overall_quality))
}

async fn apply_rerank(
    config: &Config,
    query: &str,
    candidates: Vec<Candidate>,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Vec<Candidate> {
    let count = candidates.len();
    sink.tool_call(STAGE_ASSEMBLY, "rerank", serde_json::json!({ "count": count })).await;

    let rerank_fut = crate::rerank::rerank_candidates(
        &config.rerank,
        Duration::from_secs(config.retrieval.rerank_timeout_secs),
        query,
        candidates,
    );
    tokio::pin!(rerank_fut);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            sink.tool_result(STAGE_ASSEMBLY, "rerank", "rerank cancelled").await;
            Vec::new()
        }
        (reordered, msg) = &mut rerank_fut => {
            sink.tool_result(STAGE_ASSEMBLY, "rerank", msg).await;
            reordered
        }
    }
}

/// Best-effort intent extraction from free-text query intent: no LLM call,
/// just the skill normalizer's vocabulary plus a small `"N+ years"` regex.
/// Everything it recognizes becomes a must-have skill — distinguishing
/// must-have from nice-to-have out of freeform text needs real NLP and is
/// out of scope here (see the must/nice split resolution in DESIGN.md).
fn extract_mission_spec(raw_query: &str) -> MissionSpec {
    let mut must_have = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for token in raw_query.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#' && c != '.') {
        if token.is_empty() {
            continue;
        }
        let normalized = normalizer::normalize(token);
        if normalizer::is_known_skill(&normalized) && seen.insert(normalized.clone()) {
            must_have.push(normalized);
        }
    }

    let min_years = extract_min_years(raw_query);

    MissionSpec {
        must_have,
        nice_to_have: Vec::new(),
        negative_constraints: Vec::new(),
        min_years,
        location: None,
        core_domain: None,
        clarifications: raw_query.to_string(),
    }
}

fn extract_min_years(raw_query: &str) -> Option<u32> {
    let re = regex::Regex::new(r"(\d+)\s*\+?\s*years?").ok()?;
    re.captures(raw_query)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_mission_spec_finds_known_skills() {
        let mission = extract_mission_spec("Senior Rust and Kubernetes engineer, 5+ years experience");
        assert!(mission.must_have.contains(&"rust".to_string()));
        assert!(mission.must_have.contains(&"kubernetes".to_string()));
        assert_eq!(mission.min_years, Some(5));
    }

    #[test]
    fn extract_mission_spec_dedupes_skills() {
        let mission = extract_mission_spec("rust rust RUST engineer");
        assert_eq!(mission.must_have, vec!["rust".to_string()]);
    }

    #[test]
    fn extract_min_years_handles_missing() {
        assert_eq!(extract_min_years("python engineer"), None);
    }
}
