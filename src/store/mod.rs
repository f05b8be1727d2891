//! Storage abstraction for the retrieval core (C3).
//!
//! The [`ChunkStore`] trait defines every storage operation the retrieval
//! and ranking pipeline needs, enabling pluggable backends (SQLite now; an
//! ANN-backed store could be substituted behind the same interface per
//! the Non-goals).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Chunk, ResumeCore, SkillLedgerEntry};

/// A resume that cleared the skill-ledger gate (C2), annotated with its
/// matched-skill list, match count, and average confidence across the
/// matched skills.
#[derive(Debug, Clone)]
pub struct GatedCandidate {
    pub resume_id: String,
    pub matched_skills: Vec<String>,
    pub matched_count: usize,
    pub avg_confidence: f64,
}

/// A chunk annotated with its per-term occurrence counts, as returned by
/// [`ChunkStore::chunks_matching_terms`].
#[derive(Debug, Clone)]
pub struct TermMatchedChunk {
    pub chunk: Chunk,
    /// Total occurrences, summed across all query terms.
    pub total_hits: usize,
}

/// A chunk rendered for `GET /resume/:id` — text and position, no embedding.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub section_type: crate::models::SectionType,
    pub section_ordinal: i64,
    pub chunk_text: String,
    pub skills_in_chunk: Vec<String>,
}

/// The full response body for `GET /resume/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeDetail {
    pub core: ResumeCore,
    pub skills: Vec<SkillLedgerEntry>,
    pub chunks: Vec<ChunkSummary>,
}

/// Abstract storage backend for the retrieval core.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// C2: resumes whose matched canonical-skill count meets `threshold`,
    /// sorted `(matchedCount desc, avgConfidence desc, resumeId asc)`.
    ///
    /// Empty `canonical_skills` returns an empty result, not an error.
    async fn gate_candidates(
        &self,
        canonical_skills: &[String],
        threshold: usize,
    ) -> Result<Vec<GatedCandidate>>;

    /// Narrow `resume_ids` to those matching optional `minYOE` /
    /// `locationCountry` (substring, case-insensitive) filters.
    async fn filter_by_profile(
        &self,
        resume_ids: &[String],
        min_yoe: Option<u32>,
        location_country: Option<&str>,
    ) -> Result<Vec<String>>;

    /// C3: all chunks (with embeddings) belonging to `resume_ids`, ordered
    /// deterministically by `(resumeId, sectionType, sectionOrdinal)`.
    async fn chunks_for(&self, resume_ids: &[String]) -> Result<Vec<Chunk>>;

    /// C3: chunks in `resume_ids` whose text contains any of `terms`
    /// case-insensitively, each carrying its summed per-term hit count.
    /// Capped at `limit`, by insertion (deterministic) order, before the
    /// caller scores and sorts — see the lexical retriever's design note
    /// on this choice.
    async fn chunks_matching_terms(
        &self,
        resume_ids: &[String],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<TermMatchedChunk>>;

    /// Every resume id in storage. Used by the weak-match fallback (§4.9),
    /// which widens retrieval to the whole corpus once the skill gate has
    /// been dropped entirely.
    async fn all_resume_ids(&self) -> Result<Vec<String>>;

    /// The immutable core profile for one resume, or `None` if absent.
    async fn get_resume_core(&self, resume_id: &str) -> Result<Option<ResumeCore>>;

    /// Full detail for `GET /resume/:id`: core, skill ledger, chunks (no embeddings).
    async fn get_resume_detail(&self, resume_id: &str) -> Result<Option<ResumeDetail>>;

    /// Ingestion-side write: replace the core profile, skill ledger, and
    /// chunks for one resume, atomically (§3.3). Confidence-supersede
    /// merge semantics apply to the skill ledger.
    async fn upsert_resume(
        &self,
        core: &ResumeCore,
        skills: &[SkillLedgerEntry],
        chunks: &[Chunk],
    ) -> Result<()>;

    /// Atomically remove every trace of a resume (ledger rows, chunks,
    /// vectors, core profile). Returns `false` if the resume did not exist.
    async fn delete_resume(&self, resume_id: &str) -> Result<bool>;
}
