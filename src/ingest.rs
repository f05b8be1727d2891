//! Ingestion (§3.3): upsert and delete a resume's core profile, skill
//! ledger, and chunks as one atomic unit.
//!
//! Parsing resumes out of source documents is an external pipeline's job
//! (§1 Non-goals) — this module's input is already-structured data: a core
//! profile, raw skill observations (normalized and confidence-merged here),
//! and text chunks (embedded here if dense retrieval is enabled).

use anyhow::Result;
use serde::Deserialize;

use crate::config::EmbeddingConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::{Chunk, ResumeCore, SectionType, SkillLedgerEntry};
use crate::skills::normalizer;
use crate::store::ChunkStore;

/// One raw skill mention pulled from a resume, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillObservation {
    pub skill_raw: String,
    pub confidence: f64,
    pub evidence_source: String,
}

/// One chunk of resume text, before embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkInput {
    pub chunk_id: String,
    pub section_type: SectionType,
    pub section_ordinal: i64,
    pub chunk_text: String,
    #[serde(default)]
    pub skills_in_chunk: Vec<String>,
}

/// The full payload for one resume's ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct ResumeIngestRequest {
    pub core: ResumeCore,
    #[serde(default)]
    pub skills: Vec<SkillObservation>,
    #[serde(default)]
    pub chunks: Vec<ChunkInput>,
}

/// Normalize skill observations, confidence-merge duplicates within this
/// request, embed chunks (if dense retrieval is enabled), and write
/// everything atomically via [`ChunkStore::upsert_resume`].
pub async fn upsert_resume(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    embedding_config: &EmbeddingConfig,
    request: ResumeIngestRequest,
) -> Result<()> {
    let skill_entries = merge_skill_observations(&request.core.resume_id, &request.skills);
    let chunks = embed_chunks(provider, embedding_config, &request.core.resume_id, &request.chunks).await?;

    store
        .upsert_resume(&request.core, &skill_entries, &chunks)
        .await
}

/// Remove every trace of a resume. Returns `false` if it did not exist.
pub async fn delete_resume(store: &dyn ChunkStore, resume_id: &str) -> Result<bool> {
    store.delete_resume(resume_id).await
}

/// Normalize each observation's raw skill string and keep the
/// highest-confidence observation per canonical skill, summing evidence
/// counts and collecting every distinct evidence source.
fn merge_skill_observations(resume_id: &str, observations: &[SkillObservation]) -> Vec<SkillLedgerEntry> {
    use std::collections::HashMap;

    let mut merged: HashMap<String, SkillLedgerEntry> = HashMap::new();

    for obs in observations {
        let canonical = normalizer::normalize(&obs.skill_raw);
        merged
            .entry(canonical.clone())
            .and_modify(|entry| {
                entry.evidence_count += 1;
                if !entry.evidence_sources.contains(&obs.evidence_source) {
                    entry.evidence_sources.push(obs.evidence_source.clone());
                }
                if obs.confidence > entry.confidence {
                    entry.confidence = obs.confidence;
                }
            })
            .or_insert_with(|| SkillLedgerEntry {
                resume_id: resume_id.to_string(),
                skill_canonical: canonical,
                confidence: obs.confidence,
                evidence_count: 1,
                evidence_sources: vec![obs.evidence_source.clone()],
            });
    }

    merged.into_values().collect()
}

async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    embedding_config: &EmbeddingConfig,
    resume_id: &str,
    inputs: &[ChunkInput],
) -> Result<Vec<Chunk>> {
    let normalized_skills: Vec<Vec<String>> = inputs
        .iter()
        .map(|c| normalizer::normalize_list(&c.skills_in_chunk))
        .collect();

    let embeddings: Vec<Vec<f32>> = if embedding_config.is_enabled() && !inputs.is_empty() {
        let texts: Vec<String> = inputs.iter().map(|c| c.chunk_text.clone()).collect();
        embedding::embed_texts(provider, embedding_config, &texts).await?
    } else {
        vec![Vec::new(); inputs.len()]
    };

    Ok(inputs
        .iter()
        .zip(normalized_skills)
        .zip(embeddings)
        .map(|((input, skills), embedding)| Chunk {
            chunk_id: input.chunk_id.clone(),
            resume_id: resume_id.to_string(),
            section_type: input.section_type,
            section_ordinal: input.section_ordinal,
            chunk_text: input.chunk_text.clone(),
            embedding,
            skills_in_chunk: skills,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_highest_confidence_and_sums_evidence() {
        let observations = vec![
            SkillObservation {
                skill_raw: "Rust".to_string(),
                confidence: 0.6,
                evidence_source: "narrative".to_string(),
            },
            SkillObservation {
                skill_raw: "rustlang".to_string(),
                confidence: 0.9,
                evidence_source: "skills_section".to_string(),
            },
        ];

        let merged = merge_skill_observations("r1", &observations);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].skill_canonical, "rust");
        assert_eq!(merged[0].confidence, 0.9);
        assert_eq!(merged[0].evidence_count, 2);
        assert_eq!(merged[0].evidence_sources.len(), 2);
    }

    #[test]
    fn distinct_skills_produce_distinct_entries() {
        let observations = vec![
            SkillObservation {
                skill_raw: "python".to_string(),
                confidence: 1.0,
                evidence_source: "skills_section".to_string(),
            },
            SkillObservation {
                skill_raw: "go".to_string(),
                confidence: 1.0,
                evidence_source: "skills_section".to_string(),
            },
        ];

        let merged = merge_skill_observations("r1", &observations);
        assert_eq!(merged.len(), 2);
    }
}
