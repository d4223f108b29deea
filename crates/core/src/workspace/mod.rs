//! # Global Workspace
//!
//! Holds every thought chunk produced during a run and decides which of them
//! matter.
//!
//! ## Energy Model
//!
//! ```text
//! create:  energy = base + factor * avg(sim(chunk, parent) * parent.energy)
//! cycle:   energy *= decay_rate            (every chunk)
//! cluster: sum(energy) over a lineage component >= threshold → broadcast
//! ```

pub mod chunk;
pub mod similarity;
pub mod store;

pub use chunk::{ThoughtChunk, BROADCAST_SOURCE, USER_SOURCE};
pub use similarity::cosine_similarity;
pub use store::{Workspace, WorkspaceConfig};
