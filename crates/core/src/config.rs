//! # Configuration
//!
//! `SynapseConfig` gathers every tunable of a run. It is read from
//! `.synapse/config.json` (missing file means defaults), then environment
//! overrides are applied on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cycle::OrchestratorConfig;
use crate::gateway::GatewayConfig;
use crate::models::LlmProvider;
use crate::workspace::WorkspaceConfig;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = ".synapse/config.json";

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynapseConfig {
    pub workspace: WorkspaceConfig,
    pub orchestrator: OrchestratorConfig,
    pub gateway: GatewayConfig,
}

impl SynapseConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Read the config at `path`; a missing file yields defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Load, apply `SYNAPSE_*` environment overrides and validate
    pub async fn resolve(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::load(path).await?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// `SYNAPSE_PROVIDER` switches the model to that provider's default unless
    /// `SYNAPSE_MODEL` is also set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SYNAPSE_MAX_CYCLES") {
            self.orchestrator.max_cycles = v
                .trim()
                .parse()
                .with_context(|| format!("SYNAPSE_MAX_CYCLES is not a count: {}", v))?;
        }
        if let Some(v) = lookup("SYNAPSE_DECAY_RATE") {
            self.workspace.decay_rate = v
                .trim()
                .parse()
                .with_context(|| format!("SYNAPSE_DECAY_RATE is not a number: {}", v))?;
        }
        if let Some(v) = lookup("SYNAPSE_ACTIVATION_THRESHOLD") {
            self.workspace.activation_threshold = v
                .trim()
                .parse()
                .with_context(|| format!("SYNAPSE_ACTIVATION_THRESHOLD is not a number: {}", v))?;
        }
        if let Some(v) = lookup("SYNAPSE_PROVIDER") {
            let provider: LlmProvider = v.parse()?;
            self.gateway.model.model = provider.default_model().to_string();
            self.gateway.model.provider = provider;
        }
        if let Some(v) = lookup("SYNAPSE_MODEL") {
            self.gateway.model.model = v;
        }
        if let Some(v) = lookup("SYNAPSE_BASE_URL") {
            self.gateway.model.base_url = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.workspace.validate().context("workspace")?;
        self.orchestrator.validate().context("orchestrator")?;
        if self.gateway.model.model.trim().is_empty() {
            anyhow::bail!("gateway.model.model must not be empty");
        }
        if self.gateway.model.base_url.is_some() && !self.gateway.model.provider.supports_base_url() {
            tracing::warn!(
                "base_url is ignored for provider {}",
                self.gateway.model.provider.display_name()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            tokio_test::block_on(SynapseConfig::load(dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, SynapseConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".synapse").join("config.json");

        let mut config = SynapseConfig::default();
        config.orchestrator.max_cycles = 9;
        config.workspace.activation_threshold = 4.5;
        config.save(&path).await.unwrap();

        let loaded = SynapseConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"workspace": {"decay_rate": 0.5}}"#)
            .await
            .unwrap();

        let config = SynapseConfig::load(&path).await.unwrap();
        assert_eq!(config.workspace.decay_rate, 0.5);
        assert_eq!(config.workspace.activation_threshold, 15.0);
        assert_eq!(config.orchestrator.max_cycles, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SynapseConfig::default();
        config
            .apply_overrides(env(&[
                ("SYNAPSE_MAX_CYCLES", "3"),
                ("SYNAPSE_DECAY_RATE", "0.75"),
                ("SYNAPSE_PROVIDER", "openai"),
                ("SYNAPSE_BASE_URL", "http://localhost:11434/v1"),
            ]))
            .unwrap();

        assert_eq!(config.orchestrator.max_cycles, 3);
        assert_eq!(config.workspace.decay_rate, 0.75);
        assert_eq!(config.gateway.model.provider, LlmProvider::OpenAI);
        assert_eq!(config.gateway.model.model, "gpt-4o");
        assert_eq!(
            config.gateway.model.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_model_wins_over_provider_default() {
        let mut config = SynapseConfig::default();
        config
            .apply_overrides(env(&[
                ("SYNAPSE_PROVIDER", "deepseek"),
                ("SYNAPSE_MODEL", "deepseek-reasoner"),
            ]))
            .unwrap();
        assert_eq!(config.gateway.model.model, "deepseek-reasoner");
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = SynapseConfig::default();
        assert!(config
            .apply_overrides(env(&[("SYNAPSE_MAX_CYCLES", "many")]))
            .is_err());
        assert!(config
            .apply_overrides(env(&[("SYNAPSE_PROVIDER", "mystery")]))
            .is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_decay() {
        let mut config = SynapseConfig::default();
        config.workspace.decay_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
