//! Resume retrieval by ID (`GET /resume/:id`).
//!
//! Thin wrapper over [`ChunkStore::get_resume_detail`] — kept as its own
//! module (rather than inlined into `server.rs`) so it has the same CLI /
//! HTTP dual entry point the teacher's `get_document` did.

use anyhow::Result;

use crate::error::AppError;
use crate::store::{ChunkStore, ResumeDetail};

/// Fetch a resume's full detail (core profile, skill ledger, chunks).
///
/// # Errors
///
/// Returns [`AppError::NotFound`] if no resume exists with `resume_id`.
pub async fn get_resume(store: &dyn ChunkStore, resume_id: &str) -> Result<ResumeDetail, AppError> {
    store
        .get_resume_detail(resume_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("resume not found: {}", resume_id)))
}

/// CLI entry point — calls [`get_resume`] and prints the result to stdout.
pub async fn run_get(store: &dyn ChunkStore, resume_id: &str) -> Result<()> {
    let detail = match get_resume(store, resume_id).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("--- Resume: {} ---", detail.core.resume_id);
    if let Some(headline) = detail.core.headline() {
        println!("headline: {}", headline);
    }
    println!("summary:  {}", detail.core.summary);
    println!("yoe:      {}", detail.core.total_yoe);
    if let Some(ref country) = detail.core.location_country {
        println!("location: {}", country);
    }
    println!();

    println!("--- Skills ({}) ---", detail.skills.len());
    for skill in &detail.skills {
        println!("  {} (confidence {:.2})", skill.skill_canonical, skill.confidence);
    }
    println!();

    println!("--- Chunks ({}) ---", detail.chunks.len());
    for chunk in &detail.chunks {
        println!("[{} #{}]", chunk.section_type, chunk.section_ordinal);
        println!("{}", chunk.chunk_text);
        println!();
    }

    Ok(())
}
