//! # Cycle Events
//!
//! Notifications emitted while a run progresses. They are observational
//! only; nothing in the run depends on whether anyone is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of cycle event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleEventKind {
    /// Run started
    RunStarted,
    /// Roster defined by the analyst
    SpecialistsDefined,
    /// A specialist wrote a chunk
    AgentCompleted,
    /// A specialist contributed nothing this cycle
    AgentFailed,
    /// A chunk was created without an embedding
    EmbeddingFailed,
    /// A cycle finished (decay and cluster check included)
    CycleCompleted,
    /// A broadcast was synthesized and re-injected
    BroadcastProduced,
    /// Broadcast synthesis failed; the sentinel was recorded instead
    BroadcastFailed,
    /// The thought index rejected a chunk
    IndexFailed,
    /// Run completed
    RunCompleted,
    /// Run aborted before cycling
    RunFailed,
}

/// An event in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: CycleEventKind,
    /// Agent that produced this event
    pub agent: String,
    /// 1-based cycle index, when the event belongs to a cycle
    #[serde(default)]
    pub cycle: Option<u32>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl CycleEvent {
    pub fn new(kind: CycleEventKind, agent: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            cycle: None,
            data: None,
        }
    }

    pub fn with_cycle(mut self, cycle: u32) -> Self {
        self.cycle = Some(cycle);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
