//! # Synapse Agents
//!
//! The workers that feed the workspace.
//!
//! ```text
//! Analyst (once) ──▶ [SpecialistDefinition] ──▶ Roster
//!                                                 └── Specialist × N (every cycle)
//! ```

pub mod agent;
pub mod definitions;
pub mod prompts;

pub use agent::{Agent, AgentKind, Roster, ANALYST_ID};
pub use definitions::{parse_specialist_definitions, SpecialistDefinition};
