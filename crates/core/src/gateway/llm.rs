//! # LLM Gateway
//!
//! Production [`Generator`]: text through radkit's provider clients, embeddings
//! through an OpenAI-compatible `/embeddings` endpoint. Per-call timeouts live
//! here so the cycle engine never has to know about them.

use anyhow::Context;
use async_trait::async_trait;
use radkit::agent::LlmFunction;
use radkit::macros::LLMOutput;
use radkit::models::providers::{
    AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Generator;
use crate::error::{GenerationError, GenerationResult};
use crate::models::{EmbeddingConfig, LlmProvider, ModelConfig};

/// Free-form model reply
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct GeneratedText {
    /// The complete response, exactly as it should be recorded
    pub text: String,
}

/// Gateway settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Model for every text generation call
    pub model: ModelConfig,
    pub embedding: EmbeddingConfig,
    /// Upper bound for one text generation call
    pub text_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            embedding: EmbeddingConfig::default(),
            text_timeout_secs: 120,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Provider-backed generator
pub struct LlmGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl LlmGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.embedding.timeout_secs))
            .user_agent("synapse/0.1")
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn request_embedding(&self, api_key: &str, text: &str) -> anyhow::Result<Vec<f32>> {
        let cfg = &self.config.embedding;
        let response = self
            .http
            .post(cfg.endpoint())
            .bearer_auth(api_key)
            .json(&EmbeddingRequest {
                model: &cfg.model,
                input: text,
            })
            .send()
            .await
            .context("Embedding request failed")?
            .error_for_status()
            .context("Embedding endpoint returned an error")?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("Invalid embedding response")?;
        first_embedding(body)
    }
}

fn first_embedding(body: EmbeddingResponse) -> anyhow::Result<Vec<f32>> {
    body.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|e| !e.is_empty())
        .context("Embedding response contained no vectors")
}

macro_rules! complete_with {
    ($llm:expr, $system:expr, $input:expr) => {
        LlmFunction::<GeneratedText>::new_with_system_instructions($llm, $system)
            .run($input)
            .await
            .map_err(Into::into)
    };
}

/// One text completion against whichever provider `model` selects
async fn complete(
    model: &ModelConfig,
    system_prompt: &str,
    input: String,
) -> anyhow::Result<GeneratedText> {
    match model.provider {
        LlmProvider::Anthropic => {
            complete_with!(AnthropicLlm::from_env(&model.model)?, system_prompt, input)
        }
        LlmProvider::OpenAI => {
            let mut llm = OpenAILlm::from_env(&model.model)?;
            if let Some(base_url) = &model.base_url {
                llm = llm.with_base_url(base_url);
            }
            complete_with!(llm, system_prompt, input)
        }
        LlmProvider::Gemini => {
            complete_with!(GeminiLlm::from_env(&model.model)?, system_prompt, input)
        }
        LlmProvider::OpenRouter => {
            complete_with!(OpenRouterLlm::from_env(&model.model)?, system_prompt, input)
        }
        LlmProvider::Grok => complete_with!(GrokLlm::from_env(&model.model)?, system_prompt, input),
        LlmProvider::DeepSeek => {
            complete_with!(DeepSeekLlm::from_env(&model.model)?, system_prompt, input)
        }
    }
}

#[async_trait]
impl Generator for LlmGateway {
    async fn generate_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> GenerationResult<String> {
        let limit = Duration::from_secs(self.config.text_timeout_secs);
        let call = complete(&self.config.model, system_prompt, user_prompt.to_string());

        match tokio::time::timeout(limit, call).await {
            Ok(Ok(output)) if output.text.trim().is_empty() => {
                Err(GenerationError::Text("model returned an empty reply".to_string()))
            }
            Ok(Ok(output)) => Ok(output.text),
            Ok(Err(e)) => Err(GenerationError::Text(format!(
                "{} (provider: {}, model: {})",
                e,
                self.config.model.provider.display_name(),
                self.config.model.model
            ))),
            Err(_) => Err(GenerationError::Text(format!(
                "timed out after {}s",
                limit.as_secs()
            ))),
        }
    }

    async fn generate_embedding(&self, text: &str) -> GenerationResult<Vec<f32>> {
        let cfg = &self.config.embedding;
        if !cfg.enabled {
            return Err(GenerationError::Unavailable(
                "embeddings are disabled".to_string(),
            ));
        }
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            GenerationError::Unavailable(format!("{} is not set", cfg.api_key_env))
        })?;

        self.request_embedding(&api_key, text)
            .await
            .map_err(|e| GenerationError::Embedding(format!("{:#}", e)))
    }
}
