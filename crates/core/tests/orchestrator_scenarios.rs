//! End-to-end runs of the cycle engine against a scripted generator.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use synapse_core::agents::prompts;
use synapse_core::cycle::{CycleEvent, CycleEventKind, Orchestrator, OrchestratorConfig, RunPhase};
use synapse_core::error::{GenerationError, GenerationResult, OrchestratorError};
use synapse_core::gateway::Generator;
use synapse_core::memory::{SqliteThoughtIndex, ThoughtIndex};
use synapse_core::workspace::{WorkspaceConfig, USER_SOURCE};
use tokio::sync::mpsc;

/// Replies by system prompt. Specialists are recognised by the
/// `You are <role>.` prompt the analyst reply gives them.
struct ScriptedGenerator {
    analyst_reply: String,
    failing_role: Option<String>,
    embeddings: bool,
    specialist_calls: Mutex<usize>,
}

impl ScriptedGenerator {
    fn new(roles: &[&str]) -> Self {
        let records: Vec<_> = roles
            .iter()
            .map(|r| serde_json::json!({ "role": r, "systemPrompt": format!("You are {}.", r) }))
            .collect();
        Self {
            analyst_reply: format!(
                "Here is the team:\n```json\n{}\n```",
                serde_json::Value::Array(records)
            ),
            failing_role: None,
            embeddings: true,
            specialist_calls: Mutex::new(0),
        }
    }

    fn failing(mut self, role: &str) -> Self {
        self.failing_role = Some(role.to_string());
        self
    }

    fn without_embeddings(mut self) -> Self {
        self.embeddings = false;
        self
    }

    fn specialist_calls(&self) -> usize {
        *self.specialist_calls.lock().unwrap()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_text(&self, system: &str, user: &str) -> GenerationResult<String> {
        if system == prompts::ANALYST {
            return Ok(self.analyst_reply.clone());
        }
        if system == prompts::SYNTHESIZER {
            return Ok(format!("synthesis of {} chars", user.len()));
        }

        *self.specialist_calls.lock().unwrap() += 1;
        if let Some(role) = &self.failing_role {
            if system.contains(role.as_str()) {
                return Err(GenerationError::Text(format!("{} is offline", role)));
            }
        }
        Ok(format!("{} considered the problem", system))
    }

    async fn generate_embedding(&self, _text: &str) -> GenerationResult<Vec<f32>> {
        if self.embeddings {
            Ok(vec![1.0, 0.0])
        } else {
            Err(GenerationError::Embedding("no vectors today".to_string()))
        }
    }
}

fn cycles(n: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        max_cycles: n,
        ..OrchestratorConfig::default()
    }
}

fn drain(rx: &mut mpsc::Receiver<CycleEvent>) -> Vec<CycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn unparseable_analysis_fails_before_any_cycle() {
    let mut generator = ScriptedGenerator::new(&[]);
    generator.analyst_reply = "I would rather not say.".to_string();
    let generator = Arc::new(generator);

    let (tx, mut rx) = mpsc::channel(256);
    let mut orchestrator =
        Orchestrator::new(cycles(5), WorkspaceConfig::default(), generator.clone())
            .with_event_channel(tx);

    let err = orchestrator.run("Plan a city park").await.unwrap_err();

    assert!(matches!(err, OrchestratorError::FatalDefinition(_)));
    assert_eq!(orchestrator.state().phase, RunPhase::Failed);
    assert_eq!(orchestrator.state().cycles_completed, 0);
    assert_eq!(generator.specialist_calls(), 0);

    let events = drain(&mut rx);
    assert_eq!(events.first().map(|e| e.kind), Some(CycleEventKind::RunStarted));
    assert_eq!(events.last().map(|e| e.kind), Some(CycleEventKind::RunFailed));
    assert!(events
        .iter()
        .all(|e| e.kind != CycleEventKind::CycleCompleted));
}

#[tokio::test]
async fn one_failing_specialist_does_not_stop_the_cycle() {
    let generator = Arc::new(ScriptedGenerator::new(&["Architect", "Skeptic", "Broken"]).failing("Broken"));
    let mut orchestrator = Orchestrator::new(cycles(1), WorkspaceConfig::default(), generator.clone());

    let result = orchestrator.run("Plan a city park").await.unwrap();

    assert_eq!(result.cycles_executed, 1);
    assert_eq!(generator.specialist_calls(), 3);
    assert_eq!(result.stats.total_agents, 4);
    assert_eq!(result.stats.agent_failures, 1);

    // the prompt plus the two surviving contributions
    assert_eq!(result.thoughts.len(), 3);
    let prompt = &result.thoughts[0];
    assert_eq!(prompt.source_id, USER_SOURCE);
    for chunk in &result.thoughts[1..] {
        assert_eq!(chunk.parent_ids, vec![prompt.id.clone()]);
        assert!(!chunk.content.contains("Broken"));
    }

    let failed: Vec<_> = result
        .events
        .iter()
        .filter(|e| e.kind == CycleEventKind::AgentFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].cycle, Some(1));

    // decay ran after the fan-out
    assert!((prompt.activation_energy - 9.0).abs() < 1e-9);
    assert!(result
        .events
        .iter()
        .any(|e| e.kind == CycleEventKind::CycleCompleted && e.cycle == Some(1)));
}

#[tokio::test]
async fn energy_builds_up_until_a_broadcast_fires() {
    let generator = Arc::new(ScriptedGenerator::new(&["Architect", "Skeptic"]));
    let (tx, mut rx) = mpsc::channel(256);
    let mut orchestrator = Orchestrator::new(cycles(3), WorkspaceConfig::default(), generator)
        .with_event_channel(tx);

    let result = orchestrator.run("Plan a city park").await.unwrap();
    assert_eq!(result.cycles_executed, 3);
    assert!(orchestrator.state().is_success());

    // The lineage cluster only crosses the default threshold in cycle 3
    assert_eq!(result.broadcasts.len(), 1);
    assert_eq!(result.final_broadcast, result.broadcasts[0]);
    assert!(result.final_broadcast.starts_with("synthesis of"));

    let events = drain(&mut rx);
    let produced: Vec<_> = events
        .iter()
        .filter(|e| e.kind == CycleEventKind::BroadcastProduced)
        .collect();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].cycle, Some(3));

    let completed: Vec<_> = events
        .iter()
        .filter(|e| e.kind == CycleEventKind::CycleCompleted)
        .filter_map(|e| e.cycle)
        .collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert_eq!(events.last().map(|e| e.kind), Some(CycleEventKind::RunCompleted));

    let broadcast = result
        .thoughts
        .iter()
        .find(|c| c.is_broadcast())
        .expect("broadcast chunk");
    assert!(broadcast.activation_energy > orchestrator.config().broadcast_boost);
    assert!(!broadcast.parent_ids.is_empty());
    // 1 prompt + 2 specialists × 3 cycles + 1 broadcast
    assert_eq!(result.thoughts.len(), 8);
}

#[tokio::test]
async fn missing_embeddings_are_not_fatal() {
    let generator = Arc::new(ScriptedGenerator::new(&["Architect"]).without_embeddings());
    let mut orchestrator = Orchestrator::new(cycles(2), WorkspaceConfig::default(), generator);

    let result = orchestrator.run("Plan a city park").await.unwrap();

    assert_eq!(result.cycles_executed, 2);
    assert_eq!(result.thoughts.len(), 3);
    assert!(result.thoughts.iter().all(|c| c.embedding.is_none()));
    assert_eq!(result.stats.agent_failures, 0);

    let embedding_failures = result
        .events
        .iter()
        .filter(|e| e.kind == CycleEventKind::EmbeddingFailed)
        .count();
    assert_eq!(embedding_failures, 2);
}

#[tokio::test]
async fn embedded_chunks_are_mirrored_into_the_index() {
    let generator = Arc::new(ScriptedGenerator::new(&["Architect", "Skeptic"]));
    let index = Arc::new(SqliteThoughtIndex::open_in_memory().unwrap());
    let mut orchestrator = Orchestrator::new(cycles(2), WorkspaceConfig::default(), generator)
        .with_thought_index(index.clone());

    let result = orchestrator.run("Plan a city park").await.unwrap();

    let embedded = result
        .thoughts
        .iter()
        .filter(|c| c.embedding.is_some())
        .count();
    assert_eq!(embedded, 4);
    assert_eq!(index.len().unwrap(), embedded);

    let hits = index.query(&[1.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.source_id.starts_with("specialist-")));
}

#[tokio::test]
async fn stalled_observer_does_not_block_the_run() {
    let generator = Arc::new(ScriptedGenerator::new(&["Architect", "Skeptic"]));
    // Room for one event, and nobody ever reads it
    let (tx, mut rx) = mpsc::channel(1);
    let mut orchestrator = Orchestrator::new(cycles(3), WorkspaceConfig::default(), generator)
        .with_event_channel(tx);

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.run("Plan a city park"))
        .await
        .expect("run stalled on its observer")
        .unwrap();

    assert_eq!(result.cycles_executed, 3);
    assert_eq!(
        result.events.last().map(|e| e.kind),
        Some(CycleEventKind::RunCompleted)
    );
    assert!(result.events.len() > 1);

    let delivered = drain(&mut rx);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, CycleEventKind::RunStarted);
}

/// Specialists answer after a delay picked by role
struct StaggeredGenerator {
    roles: Vec<(&'static str, u64)>,
}

#[async_trait]
impl Generator for StaggeredGenerator {
    async fn generate_text(&self, system: &str, _user: &str) -> GenerationResult<String> {
        if system == prompts::ANALYST {
            let records: Vec<_> = self
                .roles
                .iter()
                .map(|(r, _)| serde_json::json!({ "role": r, "systemPrompt": format!("You are {}.", r) }))
                .collect();
            return Ok(serde_json::Value::Array(records).to_string());
        }
        if system == prompts::SYNTHESIZER {
            return Ok("synthesis".to_string());
        }
        let delay = self
            .roles
            .iter()
            .find(|(r, _)| system.contains(r))
            .map_or(0, |(_, ms)| *ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(format!("{} weighed in", system))
    }

    async fn generate_embedding(&self, _text: &str) -> GenerationResult<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

#[tokio::test]
async fn specialists_run_concurrently_and_decay_waits_for_the_slowest() {
    let generator = Arc::new(StaggeredGenerator {
        roles: vec![("Quick", 100), ("Steady", 200), ("Slow", 600)],
    });
    let mut orchestrator = Orchestrator::new(cycles(2), WorkspaceConfig::default(), generator);

    let started = Instant::now();
    let result = orchestrator.run("Plan a city park").await.unwrap();
    let elapsed = started.elapsed();

    // Two cycles bounded by the slowest specialist, not by the sum of all three
    assert!(elapsed >= Duration::from_millis(1200), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1700), "took {:?}", elapsed);

    let energies = |cycle: u32| -> Vec<f64> {
        result
            .events
            .iter()
            .filter(|e| e.kind == CycleEventKind::AgentCompleted && e.cycle == Some(cycle))
            .filter_map(|e| e.data.as_ref()?.get("energy")?.as_f64())
            .collect()
    };

    // Cycle 1: the only parent is the unembedded prompt, so no resonance
    let first = energies(1);
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|e| (e - 1.0).abs() < 1e-9));

    // Cycle 2: parents decayed once (1.0 -> 0.9), never twice, even for the
    // slowest specialist: 1.0 + 0.9 * 2.0
    let second = energies(2);
    assert_eq!(second.len(), 3);
    assert!(second.iter().all(|e| (e - 2.8).abs() < 1e-9), "{:?}", second);
}
