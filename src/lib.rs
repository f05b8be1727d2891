//! # Resume Shortlist
//!
//! **Hybrid skill-gated resume retrieval and ranking core.**
//!
//! Given a set of required/preferred skills and free-text query intent,
//! this crate gates candidate resumes against a per-resume skill ledger,
//! retrieves supporting evidence via parallel lexical (FTS5) and dense
//! (cosine similarity) legs, fuses the two rankings with Reciprocal Rank
//! Fusion, and produces a bounded `[0, 100]` relevance score per candidate.
//! An optional cross-encoder reranker can reorder the fused shortlist, and
//! an agentic pipeline streams the whole process as Server-Sent Events.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  Ingest   │──▶│  SQLite    │──▶│  Retrieval  │──▶│  Query   │
//! │ (§3.3)    │   │ FTS5+BLOB  │   │ lex + dense │   │ classic/ │
//! └───────────┘   └────────────┘   └──────┬──────┘   │  agentic │
//!                                         ▼           └────┬─────┘
//!                                   ┌───────────┐          │
//!                                   │  Fusion +  │◀─────────┘
//!                                   │  Scoring   │
//!                                   └────┬───────┘
//!                                        ▼
//!                                 ┌──────────────┐
//!                                 │ CLI / HTTP+SSE│
//!                                 └──────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. **Ingestion** ([`ingest`]) writes a resume's core profile, skill
//!    ledger, and embedded chunks atomically to storage ([`store`]).
//! 2. A query normalizes its skill terms ([`skills::normalizer`]) and
//!    gates candidates against the skill ledger ([`skills::ledger`]).
//! 3. Gated candidates are retrieved via parallel lexical
//!    ([`retrieval::lexical`]) and dense ([`retrieval::dense`]) legs.
//! 4. The two rankings are fused by RRF ([`retrieval::fusion`]) and
//!    converted into a final score ([`retrieval::scorer`]).
//! 5. An optional cross-encoder reranker ([`rerank`]) can reorder the top
//!    results; failures are non-fatal.
//! 6. Results are exposed via the classic synchronous path
//!    ([`query::classic`]) or the streamed agentic pipeline ([`agent`]),
//!    both fronted by the CLI and the HTTP server ([`server`]).
//!
//! ## Quick Start
//!
//! ```bash
//! shortlist init
//! shortlist ingest resume.json
//! shortlist search --must-have rust --must-have kubernetes
//! shortlist shortlist "senior rust engineer, 5+ years, kubernetes"
//! shortlist serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types: resumes, skill ledger entries, chunks, candidates |
//! | [`error`] | Typed application errors and their HTTP mapping |
//! | [`skills::normalizer`] | Skill alias resolution to a canonical vocabulary |
//! | [`skills::ledger`] | Skill-ledger gate-mode thresholds and tie-break sorting |
//! | [`store`] | Storage abstraction ([`store::ChunkStore`]) and its SQLite backend |
//! | [`embedding`] | Dense embedding provider trait, HTTP implementation, vector utilities |
//! | [`rerank`] | Cross-encoder reranker adapter |
//! | [`retrieval`] | Lexical and dense retrieval legs, RRF fusion, final scoring |
//! | [`query::classic`] | Synchronous gate → retrieve → fuse → score orchestration |
//! | [`agent`] | Streamed agentic pipeline and its SSE event vocabulary |
//! | [`ingest`] | Resume ingestion: normalize, confidence-merge, embed, store |
//! | [`get`] | Resume retrieval by id |
//! | [`server`] | HTTP + SSE server (Axum) with CORS |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//!
//! ## Configuration
//!
//! The retrieval core is configured via a TOML file (default:
//! `config/shortlist.toml`). See [`config`] for all available options and
//! [`config::load_config`] for validation rules.

pub mod agent;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod rerank;
pub mod retrieval;
pub mod server;
pub mod skills;
pub mod store;
