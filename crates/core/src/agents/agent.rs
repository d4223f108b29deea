//! # Agents
//!
//! A single capability shape, `{role, system_prompt, process(active) -> text}`,
//! with two kinds: the fixed analyst that defines the roster once per run,
//! and the data-driven specialists that contribute one thought per cycle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::definitions::SpecialistDefinition;
use super::prompts;
use crate::error::GenerationResult;
use crate::gateway::Generator;
use crate::workspace::ThoughtChunk;

/// Id of the analyst agent
pub const ANALYST_ID: &str = "analyst";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Reads the user prompt and proposes specialists
    Analyst,
    /// Turns the active chunks into one new chunk per cycle
    Specialist,
}

/// A role-scoped worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub kind: AgentKind,
    pub role: String,
    pub system_prompt: String,
}

impl Agent {
    pub fn analyst() -> Self {
        Self {
            id: ANALYST_ID.to_string(),
            kind: AgentKind::Analyst,
            role: "Analyst".to_string(),
            system_prompt: prompts::ANALYST.to_string(),
        }
    }

    /// A specialist with a freshly assigned id
    pub fn specialist(definition: &SpecialistDefinition) -> Self {
        let short = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("specialist-{}", &short[..8]),
            kind: AgentKind::Specialist,
            role: definition.role.clone(),
            system_prompt: definition.system_prompt.clone(),
        }
    }

    /// Produce this agent's text for the given chunks.
    ///
    /// The analyst reads the chunk contents verbatim (in practice, only the
    /// initial prompt). A specialist sees the chunks as attributed lines
    /// framed by its role.
    pub async fn process(
        &self,
        generator: &dyn Generator,
        active: &[ThoughtChunk],
    ) -> GenerationResult<String> {
        let user_prompt = match self.kind {
            AgentKind::Analyst => active
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            AgentKind::Specialist => prompts::specialist_turn(&self.role, active),
        };
        generator
            .generate_text(&self.system_prompt, &user_prompt)
            .await
    }
}

/// The specialists of one run, in definition order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<Agent>,
}

impl Roster {
    pub fn from_definitions(definitions: &[SpecialistDefinition]) -> Self {
        Self {
            agents: definitions.iter().map(Agent::specialist).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the prompts it receives and echoes the system prompt back
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Generator for Recorder {
        async fn generate_text(&self, system: &str, user: &str) -> GenerationResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(format!("reply to {}", system))
        }

        async fn generate_embedding(&self, _text: &str) -> GenerationResult<Vec<f32>> {
            Err(GenerationError::Unavailable("none".to_string()))
        }
    }

    #[test]
    fn test_specialist_ids_are_fresh() {
        let def = SpecialistDefinition::new("Skeptic", "Doubt.");
        let a = Agent::specialist(&def);
        let b = Agent::specialist(&def);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("specialist-"));
        assert_eq!(a.kind, AgentKind::Specialist);
        assert_eq!(a.role, "Skeptic");
    }

    #[test]
    fn test_roster_lookup() {
        let roster = Roster::from_definitions(&[
            SpecialistDefinition::new("A", "a"),
            SpecialistDefinition::new("B", "b"),
        ]);
        assert_eq!(roster.len(), 2);
        let second = roster.agents()[1].clone();
        assert_ne!(roster.agents()[0].id, second.id);
        assert!(roster.iter().all(|a| a.id != ANALYST_ID));
    }

    #[tokio::test]
    async fn test_analyst_sends_prompt_verbatim() {
        let generator = Recorder::default();
        let prompt = ThoughtChunk::user_prompt("Design a tiny house", 10.0);

        let reply = Agent::analyst()
            .process(&generator, std::slice::from_ref(&prompt))
            .await
            .unwrap();

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, prompts::ANALYST);
        assert_eq!(calls[0].1, "Design a tiny house");
        assert!(reply.starts_with("reply to"));
    }

    #[tokio::test]
    async fn test_specialist_frames_active_chunks() {
        let generator = Recorder::default();
        let agent = Agent::specialist(&SpecialistDefinition::new("Architect", "You design."));
        let active = vec![ThoughtChunk::user_prompt("Design a tiny house", 10.0)];

        agent.process(&generator, &active).await.unwrap();

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls[0].0, "You design.");
        assert!(calls[0].1.contains("[user]: Design a tiny house"));
        assert!(calls[0].1.contains("as Architect"));
    }
}
