//! # Cognitive Cycle
//!
//! The run state machine and the engine that drives it.
//!
//! ```text
//! prompt ─▶ Analyst ─▶ Roster
//!                        │
//!          ┌─────────────▼─────────────┐
//!          │ top-N active chunks        │
//!          │   ├─▶ Specialist × N (par) │
//!          │ decay                      │  × max_cycles
//!          │ cluster ≥ threshold?       │
//!          │   └─▶ broadcast (boosted)  │
//!          └────────────────────────────┘
//! ```

pub mod events;
pub mod orchestrator;
pub mod phase;

pub use events::{CycleEvent, CycleEventKind};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, RunResult, RunStats, BROADCAST_FAILURE_SENTINEL,
};
pub use phase::{RunPhase, RunState};
