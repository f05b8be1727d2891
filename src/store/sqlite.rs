//! SQLite-backed [`ChunkStore`] implementation.
//!
//! Maps each `ChunkStore` operation onto the `resumes_core` / `resume_skills`
//! / `resume_chunks` / `chunk_vectors` / `chunks_fts` schema created by
//! [`crate::migrate`].

use anyhow::Result;
use async_trait::async_trait;
use regex::escape;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{Chunk, EducationItem, ExperienceItem, ProjectItem, ResumeCore, SectionType, SkillLedgerEntry};

use super::{ChunkStore, ChunkSummary, GatedCandidate, ResumeDetail, TermMatchedChunk};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(dead_code)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
    let section_type_raw: String = row.get("section_type");
    let skills_json: String = row.get("skills_in_chunk_json");
    let embedding_blob: Option<Vec<u8>> = row.try_get("embedding").ok();

    Ok(Chunk {
        chunk_id: row.get("chunk_id"),
        resume_id: row.get("resume_id"),
        section_type: SectionType::from_str(&section_type_raw)?,
        section_ordinal: row.get("section_ordinal"),
        chunk_text: row.get("chunk_text"),
        embedding: embedding_blob.map(|b| blob_to_vec(&b)).unwrap_or_default(),
        skills_in_chunk: serde_json::from_str(&skills_json).unwrap_or_default(),
    })
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn gate_candidates(
        &self,
        canonical_skills: &[String],
        threshold: usize,
    ) -> Result<Vec<GatedCandidate>> {
        if canonical_skills.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT resume_id, skill_canonical, confidence FROM resume_skills WHERE skill_canonical IN ({})",
            placeholders(canonical_skills.len())
        );
        let mut query = sqlx::query(&sql);
        for skill in canonical_skills {
            query = query.bind(skill);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut by_resume: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for row in &rows {
            let resume_id: String = row.get("resume_id");
            let skill: String = row.get("skill_canonical");
            let confidence: f64 = row.get("confidence");
            by_resume.entry(resume_id).or_default().push((skill, confidence));
        }

        let mut candidates: Vec<GatedCandidate> = by_resume
            .into_iter()
            .filter_map(|(resume_id, matches)| {
                let matched_count = matches.len();
                if matched_count < threshold {
                    return None;
                }
                let avg_confidence =
                    matches.iter().map(|(_, c)| c).sum::<f64>() / matched_count as f64;
                // preserve the order the caller's canonical_skills list gives.
                let matched_skills: Vec<String> = canonical_skills
                    .iter()
                    .filter(|s| matches.iter().any(|(m, _)| m == *s))
                    .cloned()
                    .collect();
                Some(GatedCandidate {
                    resume_id,
                    matched_skills,
                    matched_count,
                    avg_confidence,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.matched_count
                .cmp(&a.matched_count)
                .then(b.avg_confidence.partial_cmp(&a.avg_confidence).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.resume_id.cmp(&b.resume_id))
        });

        Ok(candidates)
    }

    async fn filter_by_profile(
        &self,
        resume_ids: &[String],
        min_yoe: Option<u32>,
        location_country: Option<&str>,
    ) -> Result<Vec<String>> {
        if resume_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT resume_id, total_yoe, location_country FROM resumes_core WHERE resume_id IN ({})",
            placeholders(resume_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in resume_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let filtered: Vec<String> = rows
            .iter()
            .filter(|row| {
                let yoe: i64 = row.get("total_yoe");
                if let Some(min) = min_yoe {
                    if (yoe as u32) < min {
                        return false;
                    }
                }
                if let Some(wanted) = location_country {
                    let country: Option<String> = row.get("location_country");
                    let matches = country
                        .map(|c| c.to_lowercase().contains(&wanted.to_lowercase()))
                        .unwrap_or(false);
                    if !matches {
                        return false;
                    }
                }
                true
            })
            .map(|row| row.get::<String, _>("resume_id"))
            .collect();

        Ok(filtered)
    }

    async fn chunks_for(&self, resume_ids: &[String]) -> Result<Vec<Chunk>> {
        if resume_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT rc.chunk_id, rc.resume_id, rc.section_type, rc.section_ordinal,
                   rc.chunk_text, rc.skills_in_chunk_json, cv.embedding
            FROM resume_chunks rc
            LEFT JOIN chunk_vectors cv ON cv.chunk_id = rc.chunk_id
            WHERE rc.resume_id IN ({})
            ORDER BY rc.resume_id ASC, rc.section_type ASC, rc.section_ordinal ASC
            "#,
            placeholders(resume_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in resume_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_chunk).collect()
    }

    async fn chunks_matching_terms(
        &self,
        resume_ids: &[String],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<TermMatchedChunk>> {
        if resume_ids.is_empty() || terms.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT rc.chunk_id, rc.resume_id, rc.section_type, rc.section_ordinal,
                   rc.chunk_text, rc.skills_in_chunk_json, cv.embedding
            FROM resume_chunks rc
            LEFT JOIN chunk_vectors cv ON cv.chunk_id = rc.chunk_id
            WHERE rc.resume_id IN ({})
            ORDER BY rc.resume_id ASC, rc.section_type ASC, rc.section_ordinal ASC
            "#,
            placeholders(resume_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in resume_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let patterns: Vec<regex::Regex> = terms
            .iter()
            .filter_map(|t| regex::Regex::new(&format!("(?i){}", escape(t))).ok())
            .collect();

        let mut matched = Vec::new();
        for row in &rows {
            let chunk = row_to_chunk(row)?;
            let total_hits: usize = patterns
                .iter()
                .map(|re| re.find_iter(&chunk.chunk_text).count())
                .sum();
            if total_hits > 0 {
                matched.push(TermMatchedChunk { chunk, total_hits });
            }
            if matched.len() >= limit {
                break;
            }
        }

        Ok(matched)
    }

    async fn all_resume_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT resume_id FROM resumes_core ORDER BY resume_id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("resume_id")).collect())
    }

    async fn get_resume_core(&self, resume_id: &str) -> Result<Option<ResumeCore>> {
        let row = sqlx::query(
            "SELECT resume_id, summary, location_country, location_city, total_yoe, experience_json, projects_json, education_json FROM resumes_core WHERE resume_id = ?",
        )
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_resume_core(&r)))
    }

    async fn get_resume_detail(&self, resume_id: &str) -> Result<Option<ResumeDetail>> {
        let core = match self.get_resume_core(resume_id).await? {
            Some(c) => c,
            None => return Ok(None),
        };

        let skill_rows = sqlx::query(
            "SELECT resume_id, skill_canonical, confidence, evidence_count, evidence_sources_json FROM resume_skills WHERE resume_id = ? ORDER BY skill_canonical ASC",
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await?;

        let skills: Vec<SkillLedgerEntry> = skill_rows
            .iter()
            .map(|row| {
                let sources_json: String = row.get("evidence_sources_json");
                SkillLedgerEntry {
                    resume_id: row.get("resume_id"),
                    skill_canonical: row.get("skill_canonical"),
                    confidence: row.get("confidence"),
                    evidence_count: row.get::<i64, _>("evidence_count") as u32,
                    evidence_sources: serde_json::from_str(&sources_json).unwrap_or_default(),
                }
            })
            .collect();

        let chunk_rows = sqlx::query(
            "SELECT chunk_id, resume_id, section_type, section_ordinal, chunk_text, skills_in_chunk_json FROM resume_chunks WHERE resume_id = ? ORDER BY section_type ASC, section_ordinal ASC",
        )
        .bind(resume_id)
        .fetch_all(&self.pool)
        .await?;

        let chunks: Vec<ChunkSummary> = chunk_rows
            .iter()
            .map(|row| {
                let section_type_raw: String = row.get("section_type");
                let skills_json: String = row.get("skills_in_chunk_json");
                ChunkSummary {
                    chunk_id: row.get("chunk_id"),
                    section_type: SectionType::from_str(&section_type_raw).unwrap_or(SectionType::Summary),
                    section_ordinal: row.get("section_ordinal"),
                    chunk_text: row.get("chunk_text"),
                    skills_in_chunk: serde_json::from_str(&skills_json).unwrap_or_default(),
                }
            })
            .collect();

        Ok(Some(ResumeDetail { core, skills, chunks }))
    }

    async fn upsert_resume(
        &self,
        core: &ResumeCore,
        skills: &[SkillLedgerEntry],
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO resumes_core (resume_id, summary, location_country, location_city, total_yoe, experience_json, projects_json, education_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(resume_id) DO UPDATE SET
                summary = excluded.summary,
                location_country = excluded.location_country,
                location_city = excluded.location_city,
                total_yoe = excluded.total_yoe,
                experience_json = excluded.experience_json,
                projects_json = excluded.projects_json,
                education_json = excluded.education_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&core.resume_id)
        .bind(&core.summary)
        .bind(&core.location_country)
        .bind(&core.location_city)
        .bind(core.total_yoe as i64)
        .bind(serde_json::to_string(&core.experience)?)
        .bind(serde_json::to_string(&core.projects)?)
        .bind(serde_json::to_string(&core.education)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Replace the skill ledger with confidence-supersede merge: when the
        // incoming observation's confidence is lower than an existing entry
        // for the same (resumeId, skillCanonical), keep the existing one.
        for skill in skills {
            let existing: Option<f64> = sqlx::query_scalar(
                "SELECT confidence FROM resume_skills WHERE resume_id = ? AND skill_canonical = ?",
            )
            .bind(&skill.resume_id)
            .bind(&skill.skill_canonical)
            .fetch_optional(&mut *tx)
            .await?;

            if existing.map(|c| c >= skill.confidence).unwrap_or(false) {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO resume_skills (resume_id, skill_canonical, confidence, evidence_count, evidence_sources_json)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(resume_id, skill_canonical) DO UPDATE SET
                    confidence = excluded.confidence,
                    evidence_count = excluded.evidence_count,
                    evidence_sources_json = excluded.evidence_sources_json
                "#,
            )
            .bind(&skill.resume_id)
            .bind(&skill.skill_canonical)
            .bind(skill.confidence)
            .bind(skill.evidence_count as i64)
            .bind(serde_json::to_string(&skill.evidence_sources)?)
            .execute(&mut *tx)
            .await?;
        }

        // Child-before-parent replace of chunks: vectors and FTS shadow
        // first, then chunk rows themselves.
        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT chunk_id FROM resume_chunks WHERE resume_id = ?)",
        )
        .bind(&core.resume_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chunks_fts WHERE resume_id = ?")
            .bind(&core.resume_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM resume_chunks WHERE resume_id = ?")
            .bind(&core.resume_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO resume_chunks (chunk_id, resume_id, section_type, section_ordinal, chunk_text, skills_in_chunk_json) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.resume_id)
            .bind(chunk.section_type.to_string())
            .bind(chunk.section_ordinal)
            .bind(&chunk.chunk_text)
            .bind(serde_json::to_string(&chunk.skills_in_chunk)?)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunks_fts (chunk_id, resume_id, chunk_text) VALUES (?, ?, ?)")
                .bind(&chunk.chunk_id)
                .bind(&chunk.resume_id)
                .bind(&chunk.chunk_text)
                .execute(&mut *tx)
                .await?;

            if !chunk.embedding.is_empty() {
                let blob = vec_to_blob(&chunk.embedding);
                sqlx::query(
                    r#"
                    INSERT INTO chunk_vectors (chunk_id, resume_id, embedding)
                    VALUES (?, ?, ?)
                    ON CONFLICT(chunk_id) DO UPDATE SET
                        resume_id = excluded.resume_id,
                        embedding = excluded.embedding
                    "#,
                )
                .bind(&chunk.chunk_id)
                .bind(&chunk.resume_id)
                .bind(&blob)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_resume(&self, resume_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM resumes_core WHERE resume_id = ?",
        )
        .bind(resume_id)
        .fetch_one(&self.pool)
        .await?;

        if !exists {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT chunk_id FROM resume_chunks WHERE resume_id = ?)",
        )
        .bind(resume_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chunks_fts WHERE resume_id = ?")
            .bind(resume_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM resume_chunks WHERE resume_id = ?")
            .bind(resume_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM resume_skills WHERE resume_id = ?")
            .bind(resume_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM resumes_core WHERE resume_id = ?")
            .bind(resume_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

fn row_to_resume_core(row: &sqlx::sqlite::SqliteRow) -> ResumeCore {
    let experience_json: String = row.get("experience_json");
    let projects_json: String = row.get("projects_json");
    let education_json: String = row.get("education_json");

    ResumeCore {
        resume_id: row.get("resume_id"),
        summary: row.get("summary"),
        location_country: row.get("location_country"),
        location_city: row.get("location_city"),
        total_yoe: row.get::<i64, _>("total_yoe") as u32,
        experience: serde_json::from_str::<Vec<ExperienceItem>>(&experience_json).unwrap_or_default(),
        projects: serde_json::from_str::<Vec<ProjectItem>>(&projects_json).unwrap_or_default(),
        education: serde_json::from_str::<Vec<EducationItem>>(&education_json).unwrap_or_default(),
    }
}
