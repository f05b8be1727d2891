//! Reciprocal Rank Fusion (C6).
//!
//! `rrf(resumeId) = Σ 1 / (k + rank_L(resumeId))` summed over every
//! retrieval leg the resume appears in; a leg it is absent from
//! contributes 0, not a penalty term.

use std::collections::HashMap;

use super::RankedResume;

/// Fuse any number of ranked legs into one RRF score per resume id.
/// Order of the returned map is unspecified; callers sort by score
/// themselves (the scorer does, combining it with the skill score).
pub fn fuse(legs: &[&[RankedResume]], k: f64) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for leg in legs {
        for ranked in leg.iter() {
            let contribution = 1.0 / (k + ranked.rank as f64);
            *scores.entry(ranked.resume_id.clone()).or_insert(0.0) += contribution;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(resume_id: &str, rank: usize) -> RankedResume {
        RankedResume {
            resume_id: resume_id.to_string(),
            rank,
            raw_score: 0.0,
        }
    }

    #[test]
    fn sums_contributions_across_legs() {
        let lexical = vec![ranked("r1", 1), ranked("r2", 2)];
        let dense = vec![ranked("r1", 2), ranked("r3", 1)];

        let scores = fuse(&[&lexical, &dense], 60.0);

        let expected_r1 = 1.0 / 61.0 + 1.0 / 62.0;
        let expected_r2 = 1.0 / 62.0;
        let expected_r3 = 1.0 / 61.0;

        assert!((scores["r1"] - expected_r1).abs() < 1e-12);
        assert!((scores["r2"] - expected_r2).abs() < 1e-12);
        assert!((scores["r3"] - expected_r3).abs() < 1e-12);
    }

    #[test]
    fn missing_leg_contributes_zero_not_penalty() {
        let lexical = vec![ranked("r1", 1)];
        let dense: Vec<RankedResume> = vec![];

        let scores = fuse(&[&lexical, &dense], 60.0);
        assert!((scores["r1"] - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn empty_legs_produce_empty_scores() {
        let lexical: Vec<RankedResume> = vec![];
        let dense: Vec<RankedResume> = vec![];
        let scores = fuse(&[&lexical, &dense], 60.0);
        assert!(scores.is_empty());
    }
}
