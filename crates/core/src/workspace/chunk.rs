//! # Thought Chunks
//!
//! The atomic unit of the workspace. Everything about a chunk is fixed at
//! creation except its activation energy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source id of the chunk holding the initial prompt
pub const USER_SOURCE: &str = "user";

/// Source id of chunks produced by broadcast synthesis
pub const BROADCAST_SOURCE: &str = "broadcast";

/// A fragment of text carrying a mutable salience score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThoughtChunk {
    /// Unique id, assigned at creation
    pub id: String,
    /// Text payload
    pub content: String,
    /// Present only if embedding generation succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Salience score; the only field that changes after creation
    pub activation_energy: f64,
    /// Producing agent id, or one of the reserved sources
    pub source_id: String,
    /// Ids of the chunks this one was derived from, in order
    #[serde(default)]
    pub parent_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ThoughtChunk {
    /// Create a chunk with a fresh id and the current timestamp
    pub fn new(
        content: impl Into<String>,
        embedding: Option<Vec<f32>>,
        activation_energy: f64,
        source_id: impl Into<String>,
        parent_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            embedding,
            activation_energy,
            source_id: source_id.into(),
            parent_ids,
            created_at: Utc::now(),
        }
    }

    /// The initial user prompt: no parents, no embedding, reserved source
    pub fn user_prompt(content: impl Into<String>, activation_energy: f64) -> Self {
        Self::new(content, None, activation_energy, USER_SOURCE, Vec::new())
    }

    /// Multiply energy by `rate`. A rate of 1 leaves it unchanged.
    pub fn decay(&mut self, rate: f64) {
        self.activation_energy *= rate;
    }

    /// Add `amount` to energy. No sign constraint is enforced.
    pub fn boost(&mut self, amount: f64) {
        self.activation_energy += amount;
    }

    pub fn has_parent(&self, id: &str) -> bool {
        self.parent_ids.iter().any(|p| p == id)
    }

    pub fn is_broadcast(&self) -> bool {
        self.source_id == BROADCAST_SOURCE
    }

    /// `[source]: content`, the attributed form used in prompts
    pub fn attributed(&self) -> String {
        format!("[{}]: {}", self.source_id, self.content)
    }
}
