//! Cross-encoder reranker adapter (C10).
//!
//! Reranking is opt-in per query and always non-fatal: if the reranker
//! endpoint is unset, times out, or returns malformed output, callers keep
//! the RRF-fused order rather than failing the whole search. This mirrors
//! the embedding provider's fail-soft posture but pushes the decision one
//! level up — the rerank call site degrades, not this module.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::RerankConfig;
use crate::models::Candidate;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    score: f64,
}

/// One document's position after reranking: its original index into the
/// `documents` slice passed to [`rerank`], and the cross-encoder's score.
#[derive(Debug, Clone, Copy)]
pub struct RerankedIndex {
    pub index: usize,
    pub score: f64,
}

/// Call the configured reranker endpoint with `query` against `documents`,
/// returning indices into `documents` sorted by score descending.
///
/// `top_k` caps how many reranked positions come back; the endpoint may
/// itself return fewer than `documents.len()` results.
///
/// # Errors
///
/// Returns an error if no endpoint is configured, the request fails, or the
/// response is malformed. Callers are expected to catch this and fall back
/// to the pre-rerank order — reranking never aborts a search.
pub async fn rerank(
    config: &RerankConfig,
    query: &str,
    documents: &[String],
    top_k: usize,
) -> Result<Vec<RerankedIndex>> {
    let endpoint = config
        .endpoint
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("rerank.endpoint is not configured"))?;

    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = RerankRequest {
        query,
        documents,
        top_k,
    };

    let response = client.post(endpoint).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Rerank endpoint error {}: {}", status, body_text);
    }

    let parsed: RerankResponse = response.json().await?;

    let mut results: Vec<RerankedIndex> = parsed
        .results
        .into_iter()
        .filter(|r| r.index < documents.len())
        .map(|r| RerankedIndex {
            index: r.index,
            score: r.score,
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);

    Ok(results)
}

/// Rerank `candidates` by their first evidence snippet and reorder them by
/// the cross-encoder's scores, falling back to the original (fused) order
/// whenever reranking is disabled, times out, or fails — the one shared
/// reorder-by-index routine both the classic and agentic search paths call,
/// so the two stay behaviorally identical.
///
/// Returns the (possibly reordered) candidates alongside a short status
/// message describing what happened, for callers that narrate it (the
/// agentic pipeline's event sink) and callers that don't (classic search).
pub async fn rerank_candidates(
    config: &RerankConfig,
    timeout: Duration,
    query: &str,
    candidates: Vec<Candidate>,
) -> (Vec<Candidate>, String) {
    let documents: Vec<String> = candidates
        .iter()
        .map(|c| c.evidence.first().map(|e| e.chunk_text.clone()).unwrap_or_default())
        .collect();

    match tokio::time::timeout(timeout, rerank(config, query, &documents, documents.len())).await {
        Ok(Ok(reranked)) => {
            let mut reordered = Vec::with_capacity(candidates.len());
            for r in &reranked {
                if let Some(c) = candidates.get(r.index) {
                    reordered.push(c.clone());
                }
            }
            // Any candidate the reranker dropped keeps its pre-rerank order at the tail.
            let seen: HashSet<&str> = reordered.iter().map(|c| c.resume_id.as_str()).collect();
            for c in candidates {
                if !seen.contains(c.resume_id.as_str()) {
                    reordered.push(c);
                }
            }
            let msg = format!("reordered {} candidate(s)", reranked.len());
            (reordered, msg)
        }
        Ok(Err(e)) => (candidates, format!("rerank failed, keeping fused order: {}", e)),
        Err(_) => (candidates, "rerank timed out, keeping fused order".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_when_endpoint_unset() {
        let config = RerankConfig {
            endpoint: None,
            timeout_secs: 5,
        };
        let result = rerank(&config, "rust engineer", &["doc".to_string()], 10).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_documents_short_circuits() {
        let config = RerankConfig {
            endpoint: Some("http://127.0.0.1:1/rerank".to_string()),
            timeout_secs: 5,
        };
        let result = rerank(&config, "rust engineer", &[], 10).await.unwrap();
        assert!(result.is_empty());
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            resume_id: id.to_string(),
            matched_skills: vec![],
            matched_count: 0,
            avg_confidence: 0.0,
            rrf_score: 0.0,
            semantic_score: 0.0,
            skill_score: 0.0,
            final_score: 0.0,
            evidence: vec![],
            match_quality: crate::models::MatchQuality::Strong,
            headline: None,
            total_yoe: 0,
            location_country: None,
            location_city: None,
        }
    }

    #[tokio::test]
    async fn rerank_candidates_keeps_order_when_endpoint_unset() {
        let config = RerankConfig {
            endpoint: None,
            timeout_secs: 5,
        };
        let candidates = vec![candidate("r1"), candidate("r2")];
        let (reordered, msg) =
            rerank_candidates(&config, Duration::from_secs(1), "rust engineer", candidates).await;
        assert_eq!(reordered.len(), 2);
        assert_eq!(reordered[0].resume_id, "r1");
        assert!(msg.contains("failed"));
    }
}
