// src/engine/mod.rs

//! Orchestration engine for goalweaver.
//!
//! This module ties together:
//! - the goal graph and adaptive planner
//! - the shared state store
//! - the registered agents
//!
//! The pure loop-decision state machine lives in [`core`]; the async shell
//! driving it is [`orchestrator`], and per-goal execution is in [`dispatch`].

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::OrchestratorSection;
use crate::types::GoalId;

pub mod core;
pub mod dispatch;
pub mod events;
pub mod orchestrator;

pub use self::core::{LoopCore, LoopDecision};
pub use dispatch::{DispatchContext, GoalRunResult};
pub use events::EventLog;
pub use orchestrator::Orchestrator;

/// Knobs for [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum goals dispatched per iteration.
    pub batch_size: usize,
    /// Where the `goals` + `logs` snapshot is written.
    pub snapshot_path: PathBuf,
    /// Consecutive empty batches tolerated before declaring a stall.
    pub max_idle_loops: u32,
    /// Sleep between empty-batch iterations.
    pub poll_interval: Duration,
    /// Apply planner rewrites after batches with failures.
    pub adapt_on_failure: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&OrchestratorSection::default())
    }
}

impl From<&OrchestratorSection> for RunOptions {
    fn from(section: &OrchestratorSection) -> Self {
        Self {
            batch_size: section.batch_size.max(1),
            snapshot_path: PathBuf::from(&section.state_path),
            max_idle_loops: section.max_idle_loops,
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            adapt_on_failure: section.adapt_on_failure,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every goal reached DONE or FAILED on its own.
    Completed,
    /// Nothing became READY within the idle budget; these goals were forced
    /// to FAILED.
    Stalled { failed: Vec<GoalId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Loop iterations, including idle ones.
    pub iterations: u64,
    /// Goals handed to agents.
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Batch size in effect at the end, after any plan rewrites.
    pub batch_size: usize,
}
