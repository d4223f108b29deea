//! # Generation Gateway
//!
//! The two capabilities the core consumes from its environment: text from a
//! system+user prompt, and an embedding vector from text.
//!
//! ```text
//! Orchestrator ──▶ Arc<dyn Generator> ──▶ LlmGateway ──┬─ radkit LlmFunction (text)
//!                                                       └─ reqwest /embeddings
//! ```

pub mod llm;

pub use llm::{GatewayConfig, LlmGateway};

use async_trait::async_trait;

use crate::error::GenerationResult;

/// Text and embedding generation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for `user_prompt` under `system_prompt`
    async fn generate_text(&self, system_prompt: &str, user_prompt: &str)
        -> GenerationResult<String>;

    /// Generate a fixed-dimensionality embedding for `text`
    async fn generate_embedding(&self, text: &str) -> GenerationResult<Vec<f32>>;
}
