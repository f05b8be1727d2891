//! Skill normalization (C1) and the per-resume skill ledger (C2).

pub mod ledger;
pub mod normalizer;
