//! Query orchestration: the classic (non-agentic) search path (C8). The
//! agentic/streamed path lives in [`crate::agent`].

pub mod classic;

/// Parameters shared by the classic and agentic entry points: the skills a
/// candidate must/should have, free-text query, and optional profile
/// filters. Built directly from the `/search` request body or from the
/// agentic pipeline's mission spec.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub must_have: Vec<String>,
    pub nice_to_have: Vec<String>,
    pub query_text: String,
    pub min_years: Option<u32>,
    pub location: Option<String>,
    pub gate_mode: crate::skills::ledger::GateMode,
    pub limit: usize,
    pub enable_rerank: bool,
}

/// Per-leg hit counts from one search's hybrid retrieval (§6.1 `hybridStats`).
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridStats {
    pub lexical_hits: usize,
    pub vector_hits: usize,
}

/// A classic search's full result: the ranked, truncated candidates plus
/// the counts a caller needs to report `meta` (§6.1) — how many candidates
/// cleared the gate before truncation, and how each retrieval leg did.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<crate::models::Candidate>,
    pub total_candidates: usize,
    pub hybrid_stats: HybridStats,
}
