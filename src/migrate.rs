//! Database schema migrations.
//!
//! Creates all required tables (`resumes_core`, `resume_skills`,
//! `resume_chunks`, `chunk_vectors`, `chunks_fts`) and ensures idempotent
//! execution. Designed to be run via `shortlist init`.

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resumes_core (
            resume_id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            location_country TEXT,
            location_city TEXT,
            total_yoe INTEGER NOT NULL DEFAULT 0,
            experience_json TEXT NOT NULL DEFAULT '[]',
            projects_json TEXT NOT NULL DEFAULT '[]',
            education_json TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resume_skills (
            resume_id TEXT NOT NULL,
            skill_canonical TEXT NOT NULL,
            confidence REAL NOT NULL,
            evidence_count INTEGER NOT NULL DEFAULT 1,
            evidence_sources_json TEXT NOT NULL DEFAULT '[]',
            UNIQUE(resume_id, skill_canonical),
            FOREIGN KEY (resume_id) REFERENCES resumes_core(resume_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resume_chunks (
            chunk_id TEXT PRIMARY KEY,
            resume_id TEXT NOT NULL,
            section_type TEXT NOT NULL,
            section_ordinal INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            skills_in_chunk_json TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (resume_id) REFERENCES resumes_core(resume_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            resume_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES resume_chunks(chunk_id),
            FOREIGN KEY (resume_id) REFERENCES resumes_core(resume_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks_fts'",
    )
    .fetch_one(&pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE chunks_fts USING fts5(
                chunk_id UNINDEXED,
                resume_id UNINDEXED,
                chunk_text
            )
            "#,
        )
        .execute(&pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resume_chunks_resume_id ON resume_chunks(resume_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resume_skills_resume_id ON resume_skills(resume_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resume_skills_skill ON resume_skills(skill_canonical)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_resume_id ON chunk_vectors(resume_id)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
