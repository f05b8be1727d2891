//! # Resume Shortlist CLI
//!
//! The `shortlist` binary wraps the [`resume_shortlist`] library's retrieval
//! core: schema migrations, resume ingestion, the classic search path, the
//! streamed agentic pipeline (run to completion and printed, for CLI use),
//! and the HTTP + SSE server.
//!
//! ## Commands
//!
//! - `init` — create the SQLite schema
//! - `ingest <file>` — upsert one resume from a JSON file (see
//!   [`resume_shortlist::ingest::ResumeIngestRequest`])
//! - `delete <resume_id>` — remove a resume
//! - `get <resume_id>` — print a resume's full detail
//! - `search` — classic gate → retrieve → fuse → score search
//! - `shortlist <query>` — run the agentic pipeline to completion on stdout
//! - `serve` — start the HTTP + SSE server

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use resume_shortlist::config::{self, Config};
use resume_shortlist::embedding::{self, EmbeddingProvider};
use resume_shortlist::skills::ledger::GateMode;
use resume_shortlist::store::{sqlite::SqliteStore, ChunkStore};
use resume_shortlist::{agent, db, get, ingest, migrate, models, query, server};

#[derive(Parser)]
#[command(
    name = "shortlist",
    about = "Hybrid skill-gated resume retrieval and ranking core",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/shortlist.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Init,

    /// Ingest (upsert) one resume from a JSON file
    Ingest {
        /// Path to a JSON file matching ResumeIngestRequest
        file: PathBuf,
    },

    /// Remove a resume and all its skill/chunk data
    Delete {
        /// Resume ID
        resume_id: String,
    },

    /// Retrieve a resume's full detail
    Get {
        /// Resume ID
        resume_id: String,
    },

    /// Classic (non-streamed) hybrid search
    Search {
        /// Required skills (repeatable)
        #[arg(long = "must-have")]
        must_have: Vec<String>,

        /// Preferred skills (repeatable)
        #[arg(long = "nice-to-have")]
        nice_to_have: Vec<String>,

        /// Free-text query used for dense retrieval
        #[arg(long, default_value = "")]
        query_text: String,

        /// Minimum years of experience
        #[arg(long)]
        min_years: Option<u32>,

        /// Location substring filter
        #[arg(long)]
        location: Option<String>,

        /// `match_all` (default) or `match_at_least:<n>`
        #[arg(long)]
        gate_mode: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Reorder results with the configured cross-encoder reranker
        #[arg(long)]
        enable_rerank: bool,
    },

    /// Run the agentic pipeline to completion and print the result
    Shortlist {
        /// Free-text job description / query intent
        query: String,

        /// Reorder results with the configured cross-encoder reranker
        #[arg(long)]
        enable_rerank: bool,
    },

    /// Start the HTTP + SSE server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file } => {
            let (store, provider) = build_store_and_provider(&cfg).await?;
            let content = std::fs::read_to_string(&file)?;
            let request: ingest::ResumeIngestRequest = serde_json::from_str(&content)?;
            let resume_id = request.core.resume_id.clone();
            ingest::upsert_resume(store.as_ref(), provider.as_ref(), &cfg.embedding, request).await?;
            println!("Ingested resume {}", resume_id);
        }
        Commands::Delete { resume_id } => {
            let (store, _provider) = build_store_and_provider(&cfg).await?;
            let deleted = ingest::delete_resume(store.as_ref(), &resume_id).await?;
            if deleted {
                println!("Deleted resume {}", resume_id);
            } else {
                eprintln!("No such resume: {}", resume_id);
                std::process::exit(1);
            }
        }
        Commands::Get { resume_id } => {
            let (store, _provider) = build_store_and_provider(&cfg).await?;
            get::run_get(store.as_ref(), &resume_id).await?;
        }
        Commands::Search {
            must_have,
            nice_to_have,
            query_text,
            min_years,
            location,
            gate_mode,
            limit,
            enable_rerank,
        } => {
            let (store, provider) = build_store_and_provider(&cfg).await?;
            let gate_mode = parse_gate_mode(gate_mode.as_deref())?;
            let params = query::SearchParams {
                must_have,
                nice_to_have,
                query_text,
                min_years,
                location,
                gate_mode,
                limit: limit.unwrap_or(cfg.retrieval.final_limit.max(0) as usize),
                enable_rerank,
            };

            let outcome =
                query::classic::search(store.as_ref(), provider.as_ref(), &cfg, &params).await?;
            println!(
                "{} of {} candidates (lexical_hits={}, vector_hits={})",
                outcome.candidates.len(),
                outcome.total_candidates,
                outcome.hybrid_stats.lexical_hits,
                outcome.hybrid_stats.vector_hits
            );
            print_candidates(&outcome.candidates);
        }
        Commands::Shortlist { query, enable_rerank } => {
            let (store, provider) = build_store_and_provider(&cfg).await?;
            run_shortlist(store.as_ref(), provider.as_ref(), &cfg, &query, enable_rerank).await?;
        }
        Commands::Serve => {
            let (store, provider) = build_store_and_provider(&cfg).await?;
            server::run_server(cfg, store, provider).await?;
        }
    }

    Ok(())
}

async fn build_store_and_provider(
    cfg: &Config,
) -> anyhow::Result<(Arc<dyn ChunkStore>, Arc<dyn EmbeddingProvider>)> {
    let pool = db::connect(cfg).await?;
    let store: Arc<dyn ChunkStore> = Arc::new(SqliteStore::new(pool));
    let provider: Arc<dyn EmbeddingProvider> = embedding::create_provider(&cfg.embedding)?.into();
    Ok((store, provider))
}

fn parse_gate_mode(raw: Option<&str>) -> anyhow::Result<GateMode> {
    match raw {
        None | Some("match_all") => Ok(GateMode::MatchAll),
        Some(s) => {
            if let Some(n) = s.strip_prefix("match_at_least:") {
                Ok(GateMode::MatchAtLeast(n.parse()?))
            } else {
                anyhow::bail!("invalid gate_mode: {}", s)
            }
        }
    }
}

fn print_candidates(candidates: &[models::Candidate]) {
    if candidates.is_empty() {
        println!("No candidates matched.");
        return;
    }
    for (i, c) in candidates.iter().enumerate() {
        println!(
            "{}. {} — final_score={:.1} (skill={:.1}, semantic={:.1}) match_quality={:?}",
            i + 1,
            c.resume_id,
            c.final_score,
            c.skill_score,
            c.semantic_score,
            c.match_quality
        );
        println!("   matched skills: {}", c.matched_skills.join(", "));
        for e in &c.evidence {
            println!("   - [{}] {}", e.section_type, truncate(&e.chunk_text, 120));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

/// Run the agentic pipeline to completion (no SSE here — the CLI just
/// drains the event channel and prints each event as it arrives) and print
/// the final candidates.
async fn run_shortlist(
    store: &dyn ChunkStore,
    provider: &dyn EmbeddingProvider,
    cfg: &Config,
    query: &str,
    enable_rerank: bool,
) -> anyhow::Result<()> {
    use agent::events::{AgentEvent, EventSink};
    use tokio_util::sync::CancellationToken;

    let (tx, mut rx) = tokio::sync::mpsc::channel::<AgentEvent>(64);
    let sink = EventSink::new(tx);
    let cancel = CancellationToken::new();

    let print_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event {
                AgentEvent::AgentStart { stage } => println!("[{}] start", stage),
                AgentEvent::AgentThought { stage, thought } => println!("[{}] {}", stage, thought),
                AgentEvent::ToolCall { stage, tool, args } => {
                    println!("[{}] -> {} {}", stage, tool, args)
                }
                AgentEvent::ToolResult { stage, tool, summary } => {
                    println!("[{}] <- {}: {}", stage, tool, summary)
                }
                AgentEvent::StageComplete { stage } => println!("[{}] done", stage),
                AgentEvent::MissionSpec { mission } => {
                    println!("mission_spec: {}", serde_json::to_string(mission).unwrap_or_default())
                }
                AgentEvent::Result { .. } | AgentEvent::Done => {}
                AgentEvent::Error { message } => eprintln!("error: {}", message),
            }
        }
    });

    let outcome = agent::pipeline::run(store, provider, cfg, query, enable_rerank, &sink, &cancel).await?;
    drop(sink);
    let _ = print_task.await;

    match outcome {
        Some((candidates, quality)) => {
            println!("match_quality: {:?}", quality);
            print_candidates(&candidates);
        }
        None => println!("pipeline was cancelled"),
    }

    Ok(())
}
