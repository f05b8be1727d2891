//! HTTP + SSE server exposing the retrieval core.
//!
//! # Endpoints
//!
//! | Method   | Path            | Description |
//! |----------|-----------------|-------------|
//! | `POST`   | `/search`       | Classic (non-streamed) hybrid search (C8) |
//! | `POST`   | `/shortlist`    | Agentic, streamed search over SSE (C9) |
//! | `POST`   | `/resume`       | Ingest (upsert) one resume |
//! | `GET`    | `/resume/:id`   | Fetch one resume's full detail |
//! | `DELETE` | `/resume/:id`   | Remove one resume |
//! | `GET`    | `/health`       | Health check |
//!
//! # Error Contract
//!
//! All error responses follow [`crate::error::AppError`]'s JSON shape:
//!
//! ```json
//! { "error": { "code": "invalid_query", "message": "must_have must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted, the same posture the
//! teacher's MCP server used, to support browser-based and cross-origin
//! tool clients.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::events::{AgentEvent, EventSink};
use crate::agent::pipeline;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::AppError;
use crate::ingest::{self, ResumeIngestRequest};
use crate::models::Candidate;
use crate::query::classic;
use crate::query::SearchParams;
use crate::skills::ledger::GateMode;
use crate::store::{ChunkStore, ResumeDetail};

/// Shared application state passed to every route handler.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn ChunkStore>,
    provider: Arc<dyn EmbeddingProvider>,
    config: Arc<Config>,
}

/// Start the server. Binds to `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(
    config: Config,
    store: Arc<dyn ChunkStore>,
    provider: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        store,
        provider,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", post(handle_search))
        .route("/shortlist", post(handle_shortlist))
        .route("/resume", post(handle_ingest))
        .route("/resume/:id", get(handle_get_resume))
        .route("/resume/:id", delete(handle_delete_resume))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("resume-shortlist server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ POST /search ============

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    must_have: Vec<String>,
    #[serde(default)]
    nice_to_have: Vec<String>,
    #[serde(default)]
    query_text: String,
    #[serde(default)]
    min_years: Option<u32>,
    #[serde(default)]
    location: Option<String>,
    /// `"match_all"` (default) or `"match_at_least:<n>"`.
    #[serde(default)]
    gate_mode: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    enable_rerank: bool,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    candidates: Vec<Candidate>,
    meta: SearchMeta,
}

#[derive(Debug, Serialize)]
struct SearchMeta {
    query: String,
    total_candidates: usize,
    results_returned: usize,
    latency_ms: u128,
    hybrid_stats: HybridStatsResponse,
}

#[derive(Debug, Serialize)]
struct HybridStatsResponse {
    lexical_hits: usize,
    vector_hits: usize,
}

fn parse_gate_mode(raw: Option<&str>) -> Result<GateMode, AppError> {
    match raw {
        None | Some("match_all") => Ok(GateMode::MatchAll),
        Some(s) => {
            if let Some(n) = s.strip_prefix("match_at_least:") {
                let n: usize = n
                    .parse()
                    .map_err(|_| AppError::InvalidQuery(format!("invalid gate_mode: {}", s)))?;
                Ok(GateMode::MatchAtLeast(n))
            } else {
                Err(AppError::InvalidQuery(format!("invalid gate_mode: {}", s)))
            }
        }
    }
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.must_have.is_empty() && req.query_text.trim().is_empty() {
        return Err(AppError::InvalidQuery(
            "at least one of must_have or query_text is required".to_string(),
        ));
    }

    let gate_mode = parse_gate_mode(req.gate_mode.as_deref())?;
    let query_text = req.query_text.clone();
    let params = SearchParams {
        must_have: req.must_have,
        nice_to_have: req.nice_to_have,
        query_text: req.query_text,
        min_years: req.min_years,
        location: req.location,
        gate_mode,
        limit: req.limit.unwrap_or(state.config.retrieval.final_limit.max(0) as usize),
        enable_rerank: req.enable_rerank,
    };

    let started = Instant::now();
    let outcome =
        classic::search(state.store.as_ref(), state.provider.as_ref(), &state.config, &params).await?;
    let latency_ms = started.elapsed().as_millis();

    Ok(Json(SearchResponse {
        meta: SearchMeta {
            query: query_text,
            total_candidates: outcome.total_candidates,
            results_returned: outcome.candidates.len(),
            latency_ms,
            hybrid_stats: HybridStatsResponse {
                lexical_hits: outcome.hybrid_stats.lexical_hits,
                vector_hits: outcome.hybrid_stats.vector_hits,
            },
        },
        candidates: outcome.candidates,
    }))
}

// ============ POST /shortlist (SSE) ============

#[derive(Debug, Deserialize)]
struct ShortlistRequest {
    query: String,
    #[serde(default)]
    enable_rerank: bool,
}

async fn handle_shortlist(
    State(state): State<AppState>,
    Json(req): Json<ShortlistRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::InvalidQuery("query must not be empty".to_string()));
    }

    let (tx, rx) = tokio::sync::mpsc::channel::<AgentEvent>(64);
    let sink = EventSink::new(tx);
    let cancel = CancellationToken::new();

    let store = state.store.clone();
    let provider = state.provider.clone();
    let config = state.config.clone();
    let query = req.query.clone();
    let enable_rerank = req.enable_rerank;
    let run_cancel = cancel.clone();
    let spawn_sink = sink.clone();

    tokio::spawn(async move {
        let timeout = Duration::from_secs(config.retrieval.agentic_timeout_secs);
        let outcome = tokio::time::timeout(
            timeout,
            pipeline::run(
                store.as_ref(),
                provider.as_ref(),
                &config,
                &query,
                enable_rerank,
                &spawn_sink,
                &run_cancel,
            ),
        )
        .await;

        match outcome {
            Ok(Ok(Some((candidates, quality)))) => {
                spawn_sink.result(candidates, quality).await;
                spawn_sink.done().await;
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                spawn_sink.error(e.to_string()).await;
            }
            Err(_) => {
                run_cancel.cancel();
                spawn_sink.error("shortlist pipeline timed out").await;
            }
        }
    });

    // Axum drops the response body's stream on client disconnect without
    // running any more of `handle_shortlist`'s own code, so the only way to
    // learn about it is a guard whose `Drop` fires when the stream itself is
    // dropped. Holding it inside the `stream::unfold` state ties the
    // in-flight pipeline's cancellation to the client actually going away,
    // not just the hard timeout.
    let stream_state = ShortlistStreamState {
        rx,
        _cancel_guard: CancelOnDrop(cancel),
    };

    let stream = stream::unfold(stream_state, |mut state| async move {
        state.rx.recv().await.map(|event| (event, state))
    })
    .map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event.event_name()).data(payload))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

struct ShortlistStreamState {
    rx: mpsc::Receiver<AgentEvent>,
    _cancel_guard: CancelOnDrop,
}

// ============ POST /resume ============

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<ResumeIngestRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.core.resume_id.trim().is_empty() {
        return Err(AppError::InvalidQuery("core.resume_id must not be empty".to_string()));
    }

    ingest::upsert_resume(state.store.as_ref(), state.provider.as_ref(), &state.config.embedding, req)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

// ============ GET /resume/:id ============

async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResumeDetail>, AppError> {
    let detail = crate::get::get_resume(state.store.as_ref(), &id).await?;
    Ok(Json(detail))
}

// ============ DELETE /resume/:id ============

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = state
        .store
        .delete_resume(&id)
        .await
        .map_err(AppError::Internal)?;

    if !deleted {
        return Err(AppError::NotFound(format!("resume not found: {}", id)));
    }

    Ok(Json(DeleteResponse { deleted }))
}

// ============ GET /health ============

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
