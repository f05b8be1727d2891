//! Core data models used throughout the retrieval and ranking pipeline.
//!
//! These types represent resumes, their skill ledger entries, their text
//! chunks, and the in-flight candidate state the query engine builds up on
//! the way to a final ranking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single position in a resume's work history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub title: String,
    pub company: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

/// A project listed on a resume (personal, academic, or professional).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectItem {
    pub name: String,
    pub description: String,
}

/// An education entry (degree, institution, dates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationItem {
    pub institution: String,
    pub credential: String,
    pub end_date: Option<String>,
}

/// The immutable, PII-free core profile of a resume.
///
/// Produced once by an external ingestion pipeline (§3.3) and read-only from
/// this crate's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeCore {
    pub resume_id: String,
    pub summary: String,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
    pub total_yoe: u32,
    pub experience: Vec<ExperienceItem>,
    pub projects: Vec<ProjectItem>,
    pub education: Vec<EducationItem>,
}

impl ResumeCore {
    /// `"<latest title> at <latest company>"`, or `None` with no experience.
    ///
    /// "Latest" is the first element of `experience`; ingestion is expected
    /// to store experience items in reverse-chronological order, the same
    /// convention resume documents themselves use.
    pub fn headline(&self) -> Option<String> {
        let latest = self.experience.first()?;
        Some(format!("{} at {}", latest.title, latest.company))
    }
}

/// One row of the per-resume skill ledger: `(resumeId, canonicalSkill) -> evidence`.
///
/// At most one entry exists per `(resume_id, skill_canonical)` pair;
/// higher-confidence observations supersede lower ones during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillLedgerEntry {
    pub resume_id: String,
    pub skill_canonical: String,
    pub confidence: f64,
    pub evidence_count: u32,
    pub evidence_sources: Vec<String>,
}

/// The section a chunk was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Summary,
    Experience,
    Project,
    Education,
    Skills,
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SectionType::Summary => "summary",
            SectionType::Experience => "experience",
            SectionType::Project => "project",
            SectionType::Education => "education",
            SectionType::Skills => "skills",
        };
        f.write_str(s)
    }
}

impl FromStr for SectionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(SectionType::Summary),
            "experience" => Ok(SectionType::Experience),
            "project" => Ok(SectionType::Project),
            "education" => Ok(SectionType::Education),
            "skills" => Ok(SectionType::Skills),
            other => Err(anyhow::anyhow!("unknown section type: {}", other)),
        }
    }
}

/// A semantically coherent slice of a resume — one experience entry, one
/// project, the skills section, etc. — carrying its own embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub resume_id: String,
    pub section_type: SectionType,
    pub section_ordinal: i64,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
    pub skills_in_chunk: Vec<String>,
}

/// The structured interpretation of a free-text query produced by the
/// intent-extraction stage of the agentic pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionSpec {
    #[serde(default)]
    pub must_have: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
    #[serde(default)]
    pub negative_constraints: Vec<String>,
    #[serde(default)]
    pub min_years: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub core_domain: Option<String>,
    #[serde(default)]
    pub clarifications: String,
}

/// Whether a piece of evidence came from the dense list, the sparse list, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhyMatched {
    Dense,
    Sparse,
    Both,
}

/// A chunk snippet surfaced to explain why a candidate was selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub chunk_text: String,
    pub section_type: SectionType,
    pub section_ordinal: i64,
    pub score: f64,
    pub why_matched: Option<WhyMatched>,
}

/// `strong` candidates clear the relevance floor; `weak` survived only the
/// widened fallback retrieval; `none` means even the fallback was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    Strong,
    Weak,
    None,
}

/// A candidate resume as it flows through gating, retrieval, fusion, and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub resume_id: String,
    pub matched_skills: Vec<String>,
    pub matched_count: usize,
    pub avg_confidence: f64,
    pub rrf_score: f64,
    pub semantic_score: f64,
    pub skill_score: f64,
    pub final_score: f64,
    pub evidence: Vec<EvidenceItem>,
    pub match_quality: MatchQuality,
    /// Display fields joined from `resumes_core` (C8 step 7) — not part of
    /// scoring, just enough profile context for a caller to show a result
    /// without a second `GET /resume/:id` round trip.
    pub headline: Option<String>,
    pub total_yoe: u32,
    pub location_country: Option<String>,
    pub location_city: Option<String>,
}
