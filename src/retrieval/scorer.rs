//! Final scoring (C7).
//!
//! `coverageRatio = matchedCount / totalQuerySkills`
//! `skillScore = coverageRatio * 50`
//! `semanticScore = min(rrfScore * 1500, 50)`
//! `finalScore = skillScore + semanticScore`
//!
//! Bounded to `[0, 100]` by construction: each term is capped at 50.

/// Compute the three score components for one candidate.
pub struct ScoreBreakdown {
    pub skill_score: f64,
    pub semantic_score: f64,
    pub final_score: f64,
}

/// `total_query_skills == 0` yields `skillScore = 0` rather than dividing
/// by zero — a query with no must-have/nice-to-have skills relies on
/// semantic score alone.
pub fn score(matched_count: usize, total_query_skills: usize, rrf_score: f64) -> ScoreBreakdown {
    let skill_score = if total_query_skills == 0 {
        0.0
    } else {
        (matched_count as f64 / total_query_skills as f64) * 50.0
    };
    let semantic_score = (rrf_score * 1500.0).min(50.0);
    let final_score = skill_score + semantic_score;

    ScoreBreakdown {
        skill_score,
        semantic_score,
        final_score,
    }
}
