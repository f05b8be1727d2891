//! Skill-ledger gating (C2).
//!
//! Turns a query's must-have skill list and a [`GateMode`] into the
//! `threshold` argument [`crate::store::ChunkStore::gate_candidates`] needs,
//! and gates/sorts an already-fetched candidate set the same way the store
//! does, for callers (the fallback retry path) that need to re-apply gating
//! in memory rather than round-trip to storage.

use crate::store::GatedCandidate;

/// How many of a query's must-have skills a resume needs to clear the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    /// Every must-have skill must be present.
    #[default]
    MatchAll,
    /// At least `n` of the must-have skills must be present.
    MatchAtLeast(usize),
}

/// Resolve a [`GateMode`] against the number of must-have skills in the
/// query into the literal `matchedCount` threshold a candidate must meet.
///
/// `MatchAll` requires all `skill_count` skills. `MatchAtLeast(n)` requires
/// `max(1, n)`, capped at `skill_count` so a query can never demand more
/// matches than it names skills.
pub fn threshold_for(mode: GateMode, skill_count: usize) -> usize {
    match mode {
        GateMode::MatchAll => skill_count,
        GateMode::MatchAtLeast(n) => {
            if skill_count == 0 {
                0
            } else {
                n.max(1).min(skill_count)
            }
        }
    }
}

/// Widened gate used by the weak-match fallback (§4.9): no skill requirement
/// at all, so every resume with ledger rows for the queried skills — or none
/// of them — still needs its own `gate_candidates` call with an empty skill
/// list to mean "no gating." Call sites drive that directly; this helper
/// exists so the threshold-zero choice is named and tested in one place.
pub const FALLBACK_THRESHOLD: usize = 0;

/// Re-sort an already-gated candidate set per the tie-break order the store
/// also applies: `(matchedCount desc, avgConfidence desc, resumeId asc)`.
/// Confidence is a tiebreaker only — it is never folded into `skillScore`.
pub fn sort_gated(candidates: &mut [GatedCandidate]) {
    candidates.sort_by(|a, b| {
        b.matched_count
            .cmp(&a.matched_count)
            .then(
                b.avg_confidence
                    .partial_cmp(&a.avg_confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.resume_id.cmp(&b.resume_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_all_requires_every_skill() {
        assert_eq!(threshold_for(GateMode::MatchAll, 4), 4);
        assert_eq!(threshold_for(GateMode::MatchAll, 0), 0);
    }

    #[test]
    fn match_at_least_is_capped_at_skill_count() {
        assert_eq!(threshold_for(GateMode::MatchAtLeast(2), 5), 2);
        assert_eq!(threshold_for(GateMode::MatchAtLeast(10), 3), 3);
    }

    #[test]
    fn match_at_least_floors_at_one() {
        assert_eq!(threshold_for(GateMode::MatchAtLeast(0), 5), 1);
    }

    #[test]
    fn sort_gated_orders_by_count_then_confidence_then_id() {
        let mut candidates = vec![
            GatedCandidate {
                resume_id: "b".to_string(),
                matched_skills: vec![],
                matched_count: 2,
                avg_confidence: 0.5,
            },
            GatedCandidate {
                resume_id: "a".to_string(),
                matched_skills: vec![],
                matched_count: 2,
                avg_confidence: 0.5,
            },
            GatedCandidate {
                resume_id: "c".to_string(),
                matched_skills: vec![],
                matched_count: 3,
                avg_confidence: 0.1,
            },
        ];
        sort_gated(&mut candidates);
        let ids: Vec<&str> = candidates.iter().map(|c| c.resume_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
