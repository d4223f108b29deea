//! # Synapse Errors
//!
//! Typed failures at the seams of the core. Application glue (gateway,
//! index, config loading) uses `anyhow` and converts at these boundaries.

use thiserror::Error;

/// Failures raised by the workspace and its numeric model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkspaceError {
    /// Cosine similarity was asked to compare vectors of different lengths.
    /// This points at an embedding-dimensionality bug upstream.
    #[error("invalid input: vector lengths differ ({left} vs {right})")]
    InvalidInput { left: usize, right: usize },

    /// A chunk with this id is already present
    #[error("duplicate chunk id: {0}")]
    DuplicateChunk(String),
}

/// Failures from the external text/embedding generation capability
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("text generation failed: {0}")]
    Text(String),

    #[error("embedding generation failed: {0}")]
    Embedding(String),

    /// Provider could not be constructed (missing key, bad config)
    #[error("generation provider unavailable: {0}")]
    Unavailable(String),
}

/// Why one specialist contributed nothing this cycle
#[derive(Debug, Error)]
pub enum ContributionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("workspace lock poisoned")]
    Poisoned,
}

/// Failures that abort a run
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The analysis step produced no usable specialist definitions
    #[error("failed to define specialists: {0}")]
    FatalDefinition(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
