//! # Workspace Store
//!
//! Sole owner of chunk state and of the numeric and graph algorithms over it:
//! resonance on creation, per-cycle decay, salience ranking and lineage
//! clustering.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::chunk::ThoughtChunk;
use super::similarity::cosine_similarity;
use crate::error::{WorkspaceError, WorkspaceResult};

/// Numeric model parameters, fixed for the duration of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Multiplier applied to every chunk once per cycle, in (0, 1]
    pub decay_rate: f64,
    /// Total cluster energy needed to trigger a broadcast
    pub activation_threshold: f64,
    /// Energy every created chunk starts with before resonance
    pub base_activation_energy: f64,
    /// Scale applied to the averaged weighted parent similarity
    pub max_resonance_factor: f64,
    /// How many of the most active chunks are considered for clustering
    pub cluster_candidate_limit: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.9,
            activation_threshold: 15.0,
            base_activation_energy: 1.0,
            max_resonance_factor: 2.0,
            cluster_candidate_limit: 30,
        }
    }
}

impl WorkspaceConfig {
    /// Check the parameter ranges
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            anyhow::bail!("decay_rate must be in (0, 1], got {}", self.decay_rate);
        }
        if !(self.activation_threshold > 0.0) {
            anyhow::bail!(
                "activation_threshold must be > 0, got {}",
                self.activation_threshold
            );
        }
        if !(self.base_activation_energy >= 0.0) {
            anyhow::bail!(
                "base_activation_energy must be >= 0, got {}",
                self.base_activation_energy
            );
        }
        if !(self.max_resonance_factor >= 0.0) {
            anyhow::bail!(
                "max_resonance_factor must be >= 0, got {}",
                self.max_resonance_factor
            );
        }
        if self.cluster_candidate_limit == 0 {
            anyhow::bail!("cluster_candidate_limit must be at least 1");
        }
        Ok(())
    }
}

/// The set of all thought chunks in a run
///
/// Chunks are kept in insertion order so that ranking ties resolve
/// deterministically. Nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    config: WorkspaceConfig,
    chunks: Vec<ThoughtChunk>,
    positions: HashMap<String, usize>,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Insert a fully formed chunk as-is
    pub fn add_chunk(&mut self, chunk: ThoughtChunk) -> WorkspaceResult<()> {
        if self.positions.contains_key(&chunk.id) {
            return Err(WorkspaceError::DuplicateChunk(chunk.id));
        }
        self.positions.insert(chunk.id.clone(), self.chunks.len());
        self.chunks.push(chunk);
        Ok(())
    }

    /// Build a chunk whose starting energy is the base energy plus its
    /// resonance with `parent_ids`, insert it, and return a copy.
    pub fn create_chunk(
        &mut self,
        content: impl Into<String>,
        embedding: Option<Vec<f32>>,
        source_id: impl Into<String>,
        parent_ids: Vec<String>,
    ) -> WorkspaceResult<ThoughtChunk> {
        let resonance = self.resonance(embedding.as_deref(), &parent_ids)?;
        let energy = self.config.base_activation_energy + resonance;
        let chunk = ThoughtChunk::new(content, embedding, energy, source_id, parent_ids);
        self.add_chunk(chunk.clone())?;
        Ok(chunk)
    }

    /// Energy bonus from similarity to energetic parents.
    ///
    /// Each parent with an embedding contributes `similarity * parent_energy`;
    /// contributions are averaged over those parents only and scaled by
    /// `max_resonance_factor`. Parents that are missing or carry no embedding
    /// are skipped.
    pub fn resonance(
        &self,
        embedding: Option<&[f32]>,
        parent_ids: &[String],
    ) -> WorkspaceResult<f64> {
        let Some(embedding) = embedding else {
            return Ok(0.0);
        };

        let mut weighted_sum = 0.0;
        let mut contributors = 0usize;
        for parent in parent_ids.iter().filter_map(|id| self.get_chunk(id)) {
            let Some(parent_embedding) = parent.embedding.as_deref() else {
                continue;
            };
            let similarity = cosine_similarity(embedding, parent_embedding)?;
            weighted_sum += similarity * parent.activation_energy;
            contributors += 1;
        }

        if contributors == 0 {
            return Ok(0.0);
        }
        Ok(weighted_sum / contributors as f64 * self.config.max_resonance_factor)
    }

    /// Apply the configured decay to every chunk
    pub fn decay_activations(&mut self) {
        let rate = self.config.decay_rate;
        for chunk in &mut self.chunks {
            chunk.decay(rate);
        }
    }

    /// Add `amount` to one chunk's energy. Returns the new energy, or `None`
    /// if no chunk has that id.
    pub fn boost_chunk(&mut self, id: &str, amount: f64) -> Option<f64> {
        let position = *self.positions.get(id)?;
        let chunk = &mut self.chunks[position];
        chunk.boost(amount);
        Some(chunk.activation_energy)
    }

    /// Chunks by descending energy, at most `limit` of them.
    /// Equal energies keep insertion order.
    pub fn get_most_active_chunks(&self, limit: usize) -> Vec<ThoughtChunk> {
        self.ranked(limit).into_iter().cloned().collect()
    }

    fn ranked(&self, limit: usize) -> Vec<&ThoughtChunk> {
        let mut ranked: Vec<&ThoughtChunk> = self.chunks.iter().collect();
        ranked.sort_by(|a, b| b.activation_energy.total_cmp(&a.activation_energy));
        ranked.truncate(limit);
        ranked
    }

    /// The most energetic lineage-connected group among the top candidates,
    /// if its total energy reaches the activation threshold.
    ///
    /// Two candidates are adjacent when one lists the other as a parent.
    /// Only candidate-to-candidate edges count. At most one cluster is
    /// returned; an empty vector means nothing crossed the threshold.
    pub fn find_high_energy_cluster(&self) -> Vec<ThoughtChunk> {
        let candidates = self.ranked(self.config.cluster_candidate_limit);
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); candidates.len()];
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                if candidates[i].has_parent(&candidates[j].id)
                    || candidates[j].has_parent(&candidates[i].id)
                {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }

        let mut visited = vec![false; candidates.len()];
        let mut best: Option<(f64, Vec<usize>)> = None;
        for start in 0..candidates.len() {
            if visited[start] {
                continue;
            }
            let component = bfs_component(start, &adjacency, &mut visited);
            let total: f64 = component
                .iter()
                .map(|&i| candidates[i].activation_energy)
                .sum();
            if best.as_ref().map_or(true, |(best_total, _)| total > *best_total) {
                best = Some((total, component));
            }
        }

        match best {
            Some((total, members)) if total >= self.config.activation_threshold => {
                tracing::debug!(
                    size = members.len(),
                    total_energy = total,
                    "High-energy cluster found"
                );
                members.into_iter().map(|i| candidates[i].clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn get_chunk(&self, id: &str) -> Option<&ThoughtChunk> {
        self.positions.get(id).map(|&i| &self.chunks[i])
    }

    /// All chunks in insertion order
    pub fn get_all_chunks(&self) -> &[ThoughtChunk] {
        &self.chunks
    }

    /// Sum of all chunk energies
    pub fn total_energy(&self) -> f64 {
        self.chunks.iter().map(|c| c.activation_energy).sum()
    }
}

fn bfs_component(start: usize, adjacency: &[Vec<usize>], visited: &mut [bool]) -> Vec<usize> {
    let mut component = Vec::new();
    let mut queue = VecDeque::from([start]);
    visited[start] = true;
    while let Some(node) = queue.pop_front() {
        component.push(node);
        for &next in &adjacency[node] {
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    component
}
