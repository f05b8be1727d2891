//! Hybrid retrieval: lexical (C4) and dense (C5) legs, fused by RRF (C6)
//! and converted into a final score by the scorer (C7).

pub mod dense;
pub mod fusion;
pub mod lexical;
pub mod scorer;

/// One resume's position in a single retrieval leg's ranked output.
/// Rank is 1-based; ties are broken by `resume_id` ascending so ranking is
/// deterministic given identical inputs.
#[derive(Debug, Clone)]
pub struct RankedResume {
    pub resume_id: String,
    pub rank: usize,
    pub raw_score: f64,
}

/// Sort candidates by score descending, id ascending on ties, then assign
/// 1-based ranks and truncate to `limit`. Shared by both retrieval legs so
/// their tie-break behavior stays identical.
pub(crate) fn rank_by_score(mut scored: Vec<(String, f64)>, limit: usize) -> Vec<RankedResume> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(limit);
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (resume_id, raw_score))| RankedResume {
            resume_id,
            rank: i + 1,
            raw_score,
        })
        .collect()
}
