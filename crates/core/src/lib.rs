//! # Synapse Core
//!
//! A global-workspace attention engine. Specialist agents write thoughts into
//! a shared workspace; energy decays every cycle, related thoughts resonate,
//! and when a lineage cluster becomes energetic enough it is synthesized into
//! a broadcast that is fed back for the next cycle.
//!
//! ## Architecture
//!
//! - `workspace/` - Thought chunks, resonance, decay, salience ranking, clustering
//! - `agents/` - Analyst and specialists, roster parsing, prompt templates
//! - `cycle/` - Run state machine and the cycle orchestrator
//! - `gateway/` - Text and embedding generation (`Generator` trait, `LlmGateway`)
//! - `memory/` - Optional persistent thought index
//! - `config` / `models` - Configuration and provider selection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use synapse_core::config::SynapseConfig;
//! use synapse_core::cycle::Orchestrator;
//! use synapse_core::gateway::LlmGateway;
//!
//! let config = SynapseConfig::resolve(".synapse/config.json").await?;
//! let gateway = Arc::new(LlmGateway::new(config.gateway.clone())?);
//! let mut orchestrator = Orchestrator::new(config.orchestrator, config.workspace, gateway);
//! let result = orchestrator.run("Design a tiny house").await?;
//! println!("{}", result.final_broadcast);
//! ```

pub mod agents;
pub mod config;
pub mod cycle;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod models;
pub mod workspace;
