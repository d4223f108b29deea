//! # Run Phases
//!
//! The state machine of a single run.
//!
//! ```text
//! Initializing → DefiningSpecialists → Cycling(1) → … → Cycling(max) → Completed
//!                        └──────────────▶ Failed
//! ```

use serde::{Deserialize, Serialize};

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "cycle", rename_all = "snake_case")]
pub enum RunPhase {
    /// Building the workspace and ingesting the prompt
    Initializing,
    /// Asking the analyst for the roster (exactly once)
    DefiningSpecialists,
    /// Running cognitive cycle `k` (1-based)
    Cycling(u32),
    /// All cycles ran
    Completed,
    /// Specialist definition failed; no cycles ran
    Failed,
}

/// Phase plus cycle bookkeeping
#[derive(Debug, Clone)]
pub struct RunState {
    pub phase: RunPhase,
    pub max_cycles: u32,
    /// Cycles that have finished, including ones that found nothing to do
    pub cycles_completed: u32,
}

impl RunState {
    pub fn new(max_cycles: u32) -> Self {
        Self {
            phase: RunPhase::Initializing,
            max_cycles,
            cycles_completed: 0,
        }
    }

    /// Move to the next phase
    pub fn advance(&mut self) {
        self.phase = match self.phase {
            RunPhase::Initializing => RunPhase::DefiningSpecialists,
            RunPhase::DefiningSpecialists if self.max_cycles == 0 => RunPhase::Completed,
            RunPhase::DefiningSpecialists => RunPhase::Cycling(1),
            RunPhase::Cycling(k) => {
                self.cycles_completed = k;
                if k >= self.max_cycles {
                    RunPhase::Completed
                } else {
                    RunPhase::Cycling(k + 1)
                }
            }
            RunPhase::Completed => RunPhase::Completed,
            RunPhase::Failed => RunPhase::Failed,
        };
    }

    pub fn fail(&mut self) {
        self.phase = RunPhase::Failed;
    }

    /// The cycle being run, if any
    pub fn current_cycle(&self) -> Option<u32> {
        match self.phase {
            RunPhase::Cycling(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.phase == RunPhase::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_advance() {
        let mut state = RunState::new(2);
        assert_eq!(state.phase, RunPhase::Initializing);

        state.advance();
        assert_eq!(state.phase, RunPhase::DefiningSpecialists);

        state.advance();
        assert_eq!(state.current_cycle(), Some(1));
        assert_eq!(state.cycles_completed, 0);

        state.advance();
        assert_eq!(state.phase, RunPhase::Cycling(2));
        assert_eq!(state.cycles_completed, 1);

        state.advance();
        assert_eq!(state.phase, RunPhase::Completed);
        assert_eq!(state.cycles_completed, 2);
        assert!(state.is_success());

        // Terminal
        state.advance();
        assert_eq!(state.phase, RunPhase::Completed);
    }

    #[test]
    fn test_zero_cycles_skip_to_completed() {
        let mut state = RunState::new(0);
        state.advance();
        state.advance();
        assert_eq!(state.phase, RunPhase::Completed);
        assert_eq!(state.current_cycle(), None);
        assert_eq!(state.cycles_completed, 0);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut state = RunState::new(3);
        state.advance();
        state.fail();
        assert_eq!(state.phase, RunPhase::Failed);
        assert!(!state.is_success());

        state.advance();
        assert_eq!(state.phase, RunPhase::Failed);
        assert_eq!(state.cycles_completed, 0);
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&RunPhase::Cycling(3)).unwrap();
        assert_eq!(json, r#"{"phase":"cycling","cycle":3}"#);
        let json = serde_json::to_string(&RunPhase::Completed).unwrap();
        assert_eq!(json, r#"{"phase":"completed"}"#);
    }
}
