//! The agentic pipeline's SSE event stream.
//!
//! Mirrors `progress.rs`'s reporter pattern — a narrow trait-like sink the
//! pipeline writes to — generalized from 2 sync-phase variants to the 9
//! stage/lifecycle events a streamed `/shortlist` request emits, and from a
//! stderr line writer to an async channel an HTTP handler turns into SSE.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{Candidate, MatchQuality, MissionSpec};

/// One event in the totally-ordered stream emitted by a `/shortlist` request.
/// The `event:` SSE field is this variant's kebab-case name (see
/// [`AgentEvent::event_name`]); the `data:` field is this event serialized
/// as JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentStart {
        stage: String,
    },
    AgentThought {
        stage: String,
        thought: String,
    },
    ToolCall {
        stage: String,
        tool: String,
        args: serde_json::Value,
    },
    ToolResult {
        stage: String,
        tool: String,
        summary: String,
    },
    StageComplete {
        stage: String,
    },
    MissionSpec {
        mission: MissionSpec,
    },
    Result {
        candidates: Vec<Candidate>,
        match_quality: MatchQuality,
    },
    Error {
        message: String,
    },
    Done,
}

impl AgentEvent {
    /// The SSE `event:` field — matches the spec's event-name vocabulary.
    pub fn event_name(&self) -> &'static str {
        match self {
            AgentEvent::AgentStart { .. } => "agent_start",
            AgentEvent::AgentThought { .. } => "agent_thought",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::StageComplete { .. } => "stage_complete",
            AgentEvent::MissionSpec { .. } => "mission_spec",
            AgentEvent::Result { .. } => "result",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Done => "done",
        }
    }
}

/// The pipeline's write-side handle onto the event channel. Cloneable so
/// concurrent stages (the fork-joined retrieval legs) can each hold one.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx }
    }

    /// Send an event, dropping it silently if the receiver (the HTTP
    /// response stream) has already gone away — a client disconnect
    /// mid-pipeline must not fail the in-flight work.
    pub async fn send(&self, event: AgentEvent) {
        let _ = self.tx.send(event).await;
    }

    pub async fn agent_start(&self, stage: &str) {
        self.send(AgentEvent::AgentStart { stage: stage.to_string() }).await;
    }

    pub async fn agent_thought(&self, stage: &str, thought: impl Into<String>) {
        self.send(AgentEvent::AgentThought {
            stage: stage.to_string(),
            thought: thought.into(),
        })
        .await;
    }

    pub async fn tool_call(&self, stage: &str, tool: &str, args: serde_json::Value) {
        self.send(AgentEvent::ToolCall {
            stage: stage.to_string(),
            tool: tool.to_string(),
            args,
        })
        .await;
    }

    pub async fn tool_result(&self, stage: &str, tool: &str, summary: impl Into<String>) {
        self.send(AgentEvent::ToolResult {
            stage: stage.to_string(),
            tool: tool.to_string(),
            summary: summary.into(),
        })
        .await;
    }

    pub async fn stage_complete(&self, stage: &str) {
        self.send(AgentEvent::StageComplete { stage: stage.to_string() }).await;
    }

    pub async fn mission_spec(&self, mission: MissionSpec) {
        self.send(AgentEvent::MissionSpec { mission }).await;
    }

    pub async fn result(&self, candidates: Vec<Candidate>, match_quality: MatchQuality) {
        self.send(AgentEvent::Result { candidates, match_quality }).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.send(AgentEvent::Error { message: message.into() }).await;
    }

    pub async fn done(&self) {
        self.send(AgentEvent::Done).await;
    }
}
