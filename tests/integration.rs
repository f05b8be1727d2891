//! End-to-end scenarios against a temp SQLite database, one per numbered
//! scenario in the testable-properties section: exact/at-least skill
//! gating, dense fallback, RRF tiebreak, the agentic weak-match fallback,
//! and cancellation.

use resume_shortlist::agent::events::{AgentEvent, EventSink};
use resume_shortlist::agent::pipeline;
use resume_shortlist::config::{Config, DbConfig, RetrievalConfig, ServerConfig};
use resume_shortlist::db;
use resume_shortlist::embedding::DisabledProvider;
use resume_shortlist::ingest::{self, ChunkInput, ResumeIngestRequest, SkillObservation};
use resume_shortlist::migrate;
use resume_shortlist::models::{MatchQuality, ResumeCore, SectionType};
use resume_shortlist::query::{classic, SearchParams};
use resume_shortlist::retrieval::{fusion, scorer, RankedResume};
use resume_shortlist::skills::ledger::GateMode;
use resume_shortlist::store::sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;

async fn test_env() -> (SqliteStore, Config) {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let config = Config {
        db: DbConfig {
            path: tmp.path().to_path_buf(),
        },
        retrieval: RetrievalConfig::default(),
        embedding: Default::default(),
        rerank: Default::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    };
    migrate::run_migrations(&config).await.unwrap();
    let pool = db::connect(&config).await.unwrap();
    (SqliteStore::new(pool), config)
}

fn resume_core(id: &str) -> ResumeCore {
    ResumeCore {
        resume_id: id.to_string(),
        summary: "Engineer".to_string(),
        location_country: Some("USA".to_string()),
        location_city: None,
        total_yoe: 4,
        experience: vec![],
        projects: vec![],
        education: vec![],
    }
}

fn skill(raw: &str) -> SkillObservation {
    SkillObservation {
        skill_raw: raw.to_string(),
        confidence: 1.0,
        evidence_source: "skills_section".to_string(),
    }
}

fn chunk(id: &str, text: &str) -> ChunkInput {
    ChunkInput {
        chunk_id: id.to_string(),
        section_type: SectionType::Experience,
        section_ordinal: 0,
        chunk_text: text.to_string(),
        skills_in_chunk: vec![],
    }
}

async fn seed(
    store: &SqliteStore,
    config: &Config,
    resume_id: &str,
    skills: Vec<&str>,
    chunk_texts: Vec<&str>,
) {
    let provider = DisabledProvider;
    let chunks = chunk_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| chunk(&format!("{}-c{}", resume_id, i), text))
        .collect();
    let request = ResumeIngestRequest {
        core: resume_core(resume_id),
        skills: skills.into_iter().map(skill).collect(),
        chunks,
    };
    ingest::upsert_resume(store, &provider, &config.embedding, request)
        .await
        .unwrap();
}

// Scenario 1: exact skill gate, match_all.
#[tokio::test]
async fn scenario_1_exact_gate_match_all() {
    let (store, config) = test_env().await;
    seed(&store, &config, "a", vec!["Python", "ML"], vec!["built ml pipelines in python"]).await;
    seed(&store, &config, "b", vec!["Python"], vec!["wrote python scripts"]).await;

    let provider = DisabledProvider;
    let params = SearchParams {
        must_have: vec!["Python".to_string(), "ML".to_string()],
        nice_to_have: vec![],
        query_text: "python and ml".to_string(),
        min_years: None,
        location: None,
        gate_mode: GateMode::MatchAll,
        limit: 10,
        enable_rerank: false,
    };

    let outcome = classic::search(&store, &provider, &config, &params).await.unwrap();
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].resume_id, "a");
    assert_eq!(outcome.candidates[0].matched_count, 2);
}

// Scenario 2: at-least-N gating.
#[tokio::test]
async fn scenario_2_match_at_least_n() {
    let (store, config) = test_env().await;
    seed(&store, &config, "c", vec!["python", "go"], vec!["python and go services"]).await;

    let provider = DisabledProvider;
    let params = SearchParams {
        must_have: vec!["python".to_string(), "go".to_string(), "rust".to_string()],
        nice_to_have: vec![],
        query_text: "python go rust".to_string(),
        min_years: None,
        location: None,
        gate_mode: GateMode::MatchAtLeast(2),
        limit: 10,
        enable_rerank: false,
    };

    let outcome = classic::search(&store, &provider, &config, &params).await.unwrap();
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].resume_id, "c");
    assert_eq!(outcome.candidates[0].matched_count, 2);
}

// Scenario 3: dense fallback. Embedding stays disabled (equivalent to the
// embedding service being unreachable from the classic path's point of
// view) — results are still returned, ranked by skill coverage alone, and
// `hybridStats.vectorHits` reports zero rather than the search failing.
#[tokio::test]
async fn scenario_3_dense_fallback_reports_zero_vector_hits() {
    let (store, config) = test_env().await;
    assert!(!config.embedding.is_enabled());
    seed(&store, &config, "d", vec!["kubernetes"], vec!["ran kubernetes clusters"]).await;

    let provider = DisabledProvider;
    let params = SearchParams {
        must_have: vec!["kubernetes".to_string()],
        nice_to_have: vec![],
        query_text: "kubernetes operator".to_string(),
        min_years: None,
        location: None,
        gate_mode: GateMode::MatchAll,
        limit: 10,
        enable_rerank: false,
    };

    let outcome = classic::search(&store, &provider, &config, &params).await.unwrap();
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.hybrid_stats.vector_hits, 0);
    assert!(outcome.candidates[0].final_score > 0.0);
}

// Scenario 4: RRF fusion tiebreak. Two resumes each rank 1 in a different
// leg get identical rrfScore; the final ordering falls back to resumeId
// ascending, the same comparator `query::classic::search` sorts
// candidates with.
#[tokio::test]
async fn scenario_4_rrf_tiebreak_orders_by_resume_id() {
    let lexical = vec![RankedResume {
        resume_id: "zulu".to_string(),
        rank: 1,
        raw_score: 3.0,
    }];
    let dense = vec![RankedResume {
        resume_id: "alpha".to_string(),
        rank: 1,
        raw_score: 0.9,
    }];

    let rrf_scores = fusion::fuse(&[&lexical, &dense], 60.0);
    assert_eq!(rrf_scores["zulu"], rrf_scores["alpha"]);

    let breakdown_zulu = scorer::score(1, 1, rrf_scores["zulu"]);
    let breakdown_alpha = scorer::score(1, 1, rrf_scores["alpha"]);
    assert_eq!(breakdown_zulu.final_score, breakdown_alpha.final_score);

    let mut ordered = vec![
        ("zulu", breakdown_zulu.final_score),
        ("alpha", breakdown_alpha.final_score),
    ];
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(b.0)));

    assert_eq!(ordered[0].0, "alpha");
    assert_eq!(ordered[1].0, "zulu");
}

// Scenario 5: agentic weak-match fallback. The query names no recognized
// skill at all, so the gate widens to the whole corpus from the first
// retrieval attempt; with at least one resume in storage the pipeline
// still streams through `assembly` and `done`, reporting `match_quality =
// weak` rather than erroring.
#[tokio::test]
async fn scenario_5_agentic_weak_match_fallback() {
    let (store, config) = test_env().await;
    seed(
        &store,
        &config,
        "e",
        vec!["cobol"],
        vec!["maintained mainframe batch jobs"],
    )
    .await;

    let provider = DisabledProvider;
    let (tx, mut rx) = tokio::sync::mpsc::channel::<AgentEvent>(64);
    let sink = EventSink::new(tx);
    let cancel = CancellationToken::new();

    let drain = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    let outcome = pipeline::run(
        &store,
        &provider,
        &config,
        "Senior COBOL on mainframes with Helm",
        false,
        &sink,
        &cancel,
    )
    .await
    .unwrap();

    drop(sink);
    let events = drain.await.unwrap();

    let (candidates, quality) = outcome.expect("pipeline must not report cancellation");
    assert!(matches!(quality, MatchQuality::Weak | MatchQuality::None));
    if quality == MatchQuality::Weak {
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.match_quality == MatchQuality::Weak));
    }

    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::StageComplete { stage } if stage == "assembly")));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::Result { .. })));
    assert!(events.iter().any(|e| matches!(e, AgentEvent::Done)));
}

// Scenario 6: cancellation. A token cancelled before the pipeline starts
// must short-circuit to `Ok(None)` with no events emitted at all — the
// same contract the in-flight `tokio::select!` races around retrieval and
// reranking uphold once the token fires mid-run, just observed at the
// earliest possible checkpoint so the assertion is deterministic.
#[tokio::test]
async fn scenario_6_cancellation_emits_no_events() {
    let (store, config) = test_env().await;
    seed(&store, &config, "f", vec!["rust"], vec!["rust backend engineer"]).await;

    let provider = DisabledProvider;
    let (tx, mut rx) = tokio::sync::mpsc::channel::<AgentEvent>(64);
    let sink = EventSink::new(tx);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = pipeline::run(&store, &provider, &config, "rust engineer", false, &sink, &cancel)
        .await
        .unwrap();

    assert!(outcome.is_none());
    drop(sink);
    assert!(rx.recv().await.is_none(), "no events should be emitted once already cancelled");
}
