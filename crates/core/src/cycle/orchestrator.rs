//! # Cognitive Cycle Orchestrator
//!
//! Drives one run from the user prompt to the final broadcast. Cycles run
//! strictly in sequence; inside a cycle every specialist runs concurrently.
//!
//! Specialist tasks share the workspace behind a mutex and only ever insert
//! their own chunk. Resonance is computed at insert time against whatever
//! parent state is visible then, so a specialist's starting energy may or may
//! not reflect a sibling that landed first in the same cycle. That ordering
//! race is intentional and is not serialized away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;

use super::events::{CycleEvent, CycleEventKind};
use super::phase::{RunPhase, RunState};
use crate::agents::{parse_specialist_definitions, prompts, Agent, Roster, ANALYST_ID};
use crate::error::{ContributionError, GenerationError, OrchestratorError};
use crate::gateway::Generator;
use crate::memory::ThoughtIndex;
use crate::workspace::{ThoughtChunk, Workspace, WorkspaceConfig, BROADCAST_SOURCE};

/// Recorded as the cycle's broadcast when synthesis itself fails
pub const BROADCAST_FAILURE_SENTINEL: &str = "[broadcast synthesis failed]";

const ORCHESTRATOR_ID: &str = "orchestrator";

/// Run parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Number of cognitive cycles per run
    pub max_cycles: u32,
    /// How many of the most active chunks each specialist sees
    pub active_chunk_limit: usize,
    /// Energy of the initial user prompt chunk
    pub initial_prompt_energy: f64,
    /// Energy added to every broadcast chunk after creation
    pub broadcast_boost: f64,
    /// Upper bound on the roster size; extra definitions are dropped
    pub max_specialists: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_cycles: 5,
            active_chunk_limit: 10,
            initial_prompt_energy: 10.0,
            broadcast_boost: 5.0,
            max_specialists: 8,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.active_chunk_limit == 0 {
            anyhow::bail!("active_chunk_limit must be at least 1");
        }
        if self.max_specialists == 0 {
            anyhow::bail!("max_specialists must be at least 1");
        }
        if !(self.initial_prompt_energy >= 0.0) {
            anyhow::bail!(
                "initial_prompt_energy must be >= 0, got {}",
                self.initial_prompt_energy
            );
        }
        if !(self.broadcast_boost >= 0.0) {
            anyhow::bail!("broadcast_boost must be >= 0, got {}", self.broadcast_boost);
        }
        Ok(())
    }
}

/// Run statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Specialists plus the analyst
    pub total_agents: usize,
    /// Specialist turns that produced no chunk
    pub agent_failures: usize,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Last broadcast produced, or empty if none ever was
    pub final_broadcast: String,
    /// Every broadcast in cycle order (sentinel included on synthesis failure)
    pub broadcasts: Vec<String>,
    pub cycles_executed: u32,
    /// All chunks in creation order
    pub thoughts: Vec<ThoughtChunk>,
    pub stats: RunStats,
    pub specialists: Vec<Agent>,
    pub events: Vec<CycleEvent>,
}

/// One specialist's chunk for the current cycle
#[derive(Debug)]
struct Contribution {
    chunk: ThoughtChunk,
    /// Set when the chunk had to be created without an embedding
    embedding_error: Option<GenerationError>,
}

/// Per-cycle tallies
#[derive(Debug, Default)]
struct CycleOutcome {
    broadcast: Option<String>,
    contributions: usize,
    failures: usize,
}

/// The cycle engine
pub struct Orchestrator {
    config: OrchestratorConfig,
    workspace_config: WorkspaceConfig,
    generator: Arc<dyn Generator>,
    index: Option<Arc<dyn ThoughtIndex>>,
    state: RunState,
    events: Vec<CycleEvent>,
    event_tx: Option<mpsc::Sender<CycleEvent>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        workspace_config: WorkspaceConfig,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let max_cycles = config.max_cycles;
        Self {
            config,
            workspace_config,
            generator,
            index: None,
            state: RunState::new(max_cycles),
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<CycleEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Mirror every embedded chunk into a persistent index
    pub fn with_thought_index(mut self, index: Arc<dyn ThoughtIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Record an event and offer it to the observer without waiting.
    /// A full or closed channel drops the event for the observer only.
    fn emit(&mut self, event: CycleEvent) {
        self.events.push(event.clone());
        let Some(tx) = &self.event_tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(kind = ?event.kind, "Event observer is not keeping up, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Run the full cognitive loop on a user prompt
    #[tracing::instrument(skip(self), fields(prompt_preview = %prompt.chars().take(50).collect::<String>()))]
    pub async fn run(&mut self, prompt: &str) -> Result<RunResult, OrchestratorError> {
        let start_time = Utc::now();
        self.state = RunState::new(self.config.max_cycles);
        self.events.clear();

        self.emit(
            CycleEvent::new(CycleEventKind::RunStarted, ORCHESTRATOR_ID)
                .with_data(serde_json::json!({ "max_cycles": self.config.max_cycles })),
        );

        let mut workspace = Workspace::new(self.workspace_config.clone());
        let initial = ThoughtChunk::user_prompt(prompt, self.config.initial_prompt_energy);
        workspace.add_chunk(initial.clone())?;
        self.state.advance();

        let roster = match self.define_specialists(&initial).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::error!("Run aborted: {}", e);
                self.state.fail();
                self.emit(
                    CycleEvent::new(CycleEventKind::RunFailed, ANALYST_ID)
                        .with_data(serde_json::json!({ "error": e.to_string() })),
                );
                return Err(e);
            }
        };

        self.emit(
            CycleEvent::new(CycleEventKind::SpecialistsDefined, ANALYST_ID).with_data(
                serde_json::json!({
                    "count": roster.len(),
                    "roles": roster.iter().map(|a| a.role.as_str()).collect::<Vec<_>>(),
                }),
            ),
        );
        tracing::info!("Defined {} specialists", roster.len());

        let workspace = Arc::new(Mutex::new(workspace));
        let mut broadcasts = Vec::new();
        let mut agent_failures = 0;

        self.state.advance();
        while let Some(cycle) = self.state.current_cycle() {
            let outcome = self.run_cycle(cycle, &workspace, &roster).await?;
            agent_failures += outcome.failures;
            if let Some(broadcast) = outcome.broadcast {
                broadcasts.push(broadcast);
            }
            self.state.advance();
        }

        let thoughts = lock(&workspace)?.get_all_chunks().to_vec();
        let final_broadcast = broadcasts.last().cloned().unwrap_or_default();

        self.emit(
            CycleEvent::new(CycleEventKind::RunCompleted, ORCHESTRATOR_ID).with_data(
                serde_json::json!({
                    "cycles": self.state.cycles_completed,
                    "broadcasts": broadcasts.len(),
                    "thoughts": thoughts.len(),
                }),
            ),
        );

        debug_assert_eq!(self.state.phase, RunPhase::Completed);
        Ok(RunResult {
            final_broadcast,
            broadcasts,
            cycles_executed: self.state.cycles_completed,
            thoughts,
            stats: RunStats {
                start_time,
                end_time: Utc::now(),
                total_agents: roster.len() + 1,
                agent_failures,
            },
            specialists: roster.agents().to_vec(),
            events: self.events.clone(),
        })
    }

    /// Ask the analyst for the roster. Any failure here is fatal for the run.
    async fn define_specialists(&self, initial: &ThoughtChunk) -> Result<Roster, OrchestratorError> {
        let analyst = Agent::analyst();
        let text = analyst
            .process(self.generator.as_ref(), std::slice::from_ref(initial))
            .await
            .map_err(|e| OrchestratorError::FatalDefinition(e.to_string()))?;

        let mut definitions = parse_specialist_definitions(&text).ok_or_else(|| {
            OrchestratorError::FatalDefinition(
                "analyst output contained no valid specialist definitions".to_string(),
            )
        })?;

        if definitions.len() > self.config.max_specialists {
            tracing::warn!(
                "Analyst proposed {} specialists, keeping the first {}",
                definitions.len(),
                self.config.max_specialists
            );
            definitions.truncate(self.config.max_specialists);
        }

        Ok(Roster::from_definitions(&definitions))
    }

    /// One cognitive cycle: fan out, decay, cluster check, broadcast.
    async fn run_cycle(
        &mut self,
        cycle: u32,
        workspace: &Arc<Mutex<Workspace>>,
        roster: &Roster,
    ) -> Result<CycleOutcome, OrchestratorError> {
        let active = lock(workspace)?.get_most_active_chunks(self.config.active_chunk_limit);

        if active.is_empty() {
            tracing::debug!(cycle, "No active chunks, skipping cycle");
            self.emit(
                CycleEvent::new(CycleEventKind::CycleCompleted, ORCHESTRATOR_ID)
                    .with_cycle(cycle)
                    .with_data(serde_json::json!({ "active": 0 })),
            );
            return Ok(CycleOutcome::default());
        }

        let parent_ids: Vec<String> = active.iter().map(|c| c.id.clone()).collect();
        let active = Arc::new(active);

        // SCATTER: one task per specialist
        let mut join_set = JoinSet::new();
        for agent in roster.iter() {
            let agent = agent.clone();
            let generator = Arc::clone(&self.generator);
            let workspace = Arc::clone(workspace);
            let active = Arc::clone(&active);
            let parent_ids = parent_ids.clone();

            join_set.spawn(async move {
                let result =
                    contribute(&agent, generator.as_ref(), &workspace, &active, parent_ids).await;
                (agent, result)
            });
        }

        // GATHER: every task finishes before decay
        let mut outcome = CycleOutcome::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((agent, Ok(contribution))) => {
                    outcome.contributions += 1;
                    self.record_contribution(cycle, &agent, contribution);
                }
                Ok((_, Err(ContributionError::Poisoned))) => {
                    return Err(OrchestratorError::Internal(
                        "workspace lock poisoned".to_string(),
                    ));
                }
                Ok((agent, Err(e))) => {
                    outcome.failures += 1;
                    match &e {
                        ContributionError::Workspace(_) => {
                            tracing::error!(agent = %agent.id, "Chunk creation failed: {}", e);
                        }
                        _ => {
                            tracing::warn!(agent = %agent.id, role = %agent.role, "Specialist failed: {}", e);
                        }
                    }
                    self.emit(
                        CycleEvent::new(CycleEventKind::AgentFailed, &agent.id)
                            .with_cycle(cycle)
                            .with_data(serde_json::json!({ "error": e.to_string() })),
                    );
                }
                Err(e) => {
                    outcome.failures += 1;
                    tracing::error!("Specialist task panicked: {}", e);
                    self.emit(
                        CycleEvent::new(CycleEventKind::AgentFailed, ORCHESTRATOR_ID)
                            .with_cycle(cycle)
                            .with_data(
                                serde_json::json!({ "error": format!("Task panicked: {}", e) }),
                            ),
                    );
                }
            }
        }

        let (cluster, total_energy) = {
            let mut ws = lock(workspace)?;
            ws.decay_activations();
            (ws.find_high_energy_cluster(), ws.total_energy())
        };

        if !cluster.is_empty() {
            outcome.broadcast = Some(self.synthesize_broadcast(cycle, workspace, &cluster).await?);
        }

        tracing::info!(
            cycle,
            contributions = outcome.contributions,
            failures = outcome.failures,
            broadcast = outcome.broadcast.is_some(),
            total_energy,
            "Cycle completed"
        );
        self.emit(
            CycleEvent::new(CycleEventKind::CycleCompleted, ORCHESTRATOR_ID)
                .with_cycle(cycle)
                .with_data(serde_json::json!({
                    "active": active.len(),
                    "contributions": outcome.contributions,
                    "failures": outcome.failures,
                    "broadcast": outcome.broadcast.is_some(),
                    "total_energy": total_energy,
                })),
        );

        Ok(outcome)
    }

    fn record_contribution(&mut self, cycle: u32, agent: &Agent, contribution: Contribution) {
        let Contribution {
            chunk,
            embedding_error,
        } = contribution;

        if let Some(e) = embedding_error {
            tracing::warn!(agent = %agent.id, "Embedding failed, chunk has no vector: {}", e);
            self.emit(
                CycleEvent::new(CycleEventKind::EmbeddingFailed, &agent.id)
                    .with_cycle(cycle)
                    .with_data(serde_json::json!({ "chunk_id": chunk.id, "error": e.to_string() })),
            );
        }

        self.emit(
            CycleEvent::new(CycleEventKind::AgentCompleted, &agent.id)
                .with_cycle(cycle)
                .with_data(serde_json::json!({
                    "role": agent.role,
                    "chunk_id": chunk.id,
                    "energy": chunk.activation_energy,
                })),
        );

        self.index_chunk(cycle, &chunk);
    }

    /// Summarize a cluster into a boosted broadcast chunk.
    ///
    /// Generation failure yields [`BROADCAST_FAILURE_SENTINEL`] instead of an
    /// error so one bad synthesis never ends the run.
    async fn synthesize_broadcast(
        &mut self,
        cycle: u32,
        workspace: &Arc<Mutex<Workspace>>,
        cluster: &[ThoughtChunk],
    ) -> Result<String, OrchestratorError> {
        let request = prompts::broadcast_request(cluster);
        let text = match self
            .generator
            .generate_text(prompts::SYNTHESIZER, &request)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(cycle, "Broadcast synthesis failed: {}", e);
                self.emit(
                    CycleEvent::new(CycleEventKind::BroadcastFailed, BROADCAST_SOURCE)
                        .with_cycle(cycle)
                        .with_data(serde_json::json!({ "error": e.to_string() })),
                );
                return Ok(BROADCAST_FAILURE_SENTINEL.to_string());
            }
        };

        let embedding = match self.generator.generate_embedding(&text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                tracing::warn!(cycle, "Broadcast embedding failed: {}", e);
                self.emit(
                    CycleEvent::new(CycleEventKind::EmbeddingFailed, BROADCAST_SOURCE)
                        .with_cycle(cycle)
                        .with_data(serde_json::json!({ "error": e.to_string() })),
                );
                None
            }
        };

        let parent_ids = cluster.iter().map(|c| c.id.clone()).collect();
        let created = {
            let mut ws = lock(workspace)?;
            ws.create_chunk(text.clone(), embedding, BROADCAST_SOURCE, parent_ids)
                .map(|mut chunk| {
                    if let Some(energy) = ws.boost_chunk(&chunk.id, self.config.broadcast_boost) {
                        chunk.activation_energy = energy;
                    }
                    chunk
                })
        };

        match created {
            Ok(chunk) => {
                self.emit(
                    CycleEvent::new(CycleEventKind::BroadcastProduced, BROADCAST_SOURCE)
                        .with_cycle(cycle)
                        .with_data(serde_json::json!({
                            "text": text,
                            "chunk_id": chunk.id,
                            "energy": chunk.activation_energy,
                            "cluster_size": cluster.len(),
                        })),
                );
                self.index_chunk(cycle, &chunk);
            }
            // The text still counts as this cycle's broadcast, it just has no chunk
            Err(e) => {
                tracing::error!(cycle, "Broadcast chunk creation failed: {}", e);
                self.emit(
                    CycleEvent::new(CycleEventKind::BroadcastProduced, BROADCAST_SOURCE)
                        .with_cycle(cycle)
                        .with_data(serde_json::json!({
                            "text": text,
                            "chunk_id": null,
                            "cluster_size": cluster.len(),
                            "error": e.to_string(),
                        })),
                );
            }
        }

        Ok(text)
    }

    /// Mirror an embedded chunk into the index, if one is attached
    fn index_chunk(&mut self, cycle: u32, chunk: &ThoughtChunk) {
        let Some(index) = self.index.clone() else {
            return;
        };
        if chunk.embedding.is_none() {
            return;
        }
        if let Err(e) = index.upsert(chunk) {
            tracing::warn!(chunk_id = %chunk.id, "Failed to index thought: {:#}", e);
            self.emit(
                CycleEvent::new(CycleEventKind::IndexFailed, &chunk.source_id)
                    .with_cycle(cycle)
                    .with_data(serde_json::json!({ "chunk_id": chunk.id, "error": format!("{:#}", e) })),
            );
        }
    }
}

fn lock(workspace: &Mutex<Workspace>) -> Result<MutexGuard<'_, Workspace>, OrchestratorError> {
    workspace
        .lock()
        .map_err(|e| OrchestratorError::Internal(format!("Lock error: {}", e)))
}

/// One specialist turn: text, then embedding, then insert.
async fn contribute(
    agent: &Agent,
    generator: &dyn Generator,
    workspace: &Mutex<Workspace>,
    active: &[ThoughtChunk],
    parent_ids: Vec<String>,
) -> Result<Contribution, ContributionError> {
    let text = agent.process(generator, active).await?;

    let (embedding, embedding_error) = match generator.generate_embedding(&text).await {
        Ok(embedding) => (Some(embedding), None),
        Err(e) => (None, Some(e)),
    };

    let mut ws = workspace.lock().map_err(|_| ContributionError::Poisoned)?;
    let chunk = ws.create_chunk(text, embedding, agent.id.clone(), parent_ids)?;

    Ok(Contribution {
        chunk,
        embedding_error,
    })
}
