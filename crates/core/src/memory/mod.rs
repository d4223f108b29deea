//! # Memory Module
//!
//! Optional long-lived vector store for thoughts. The workspace itself never
//! reads from it; the orchestrator only writes embedded chunks into it so
//! later runs (or other tools) can search past thinking.
//!
//! ```text
//! Orchestrator ──upsert──▶ ThoughtIndex
//!                              └── SqliteThoughtIndex (.synapse/thoughts.db)
//! ```

pub mod sqlite_index;

pub use sqlite_index::SqliteThoughtIndex;

use serde::{Deserialize, Serialize};

use crate::workspace::ThoughtChunk;

/// One similarity-search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexHit {
    pub chunk_id: String,
    pub source_id: String,
    /// Cosine similarity to the query vector
    pub score: f64,
}

/// Persistent embedding store
pub trait ThoughtIndex: Send + Sync {
    /// Insert or replace a chunk. Chunks without an embedding are rejected.
    fn upsert(&self, chunk: &ThoughtChunk) -> anyhow::Result<()>;

    /// Most similar stored chunks of the same dimensionality, best first
    fn query(&self, embedding: &[f32], limit: usize) -> anyhow::Result<Vec<IndexHit>>;

    fn len(&self) -> anyhow::Result<usize>;

    fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len()? == 0)
    }
}
