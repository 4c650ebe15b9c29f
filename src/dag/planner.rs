// src/dag/planner.rs

use std::cmp::Reverse;

use serde_json::{Map, Value};
use tracing::debug;

use crate::dag::graph::GoalGraph;
use crate::types::{Goal, PlanRewrite, PlanSignal};

/// Chooses the next batch of goals and proposes plan changes after failures.
///
/// Ordering heuristic: higher priority first, then fewer dependencies, then
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct AdaptivePlanner;

impl AdaptivePlanner {
    pub fn new() -> Self {
        Self
    }

    /// Up to `k` READY goals, best first. Runs the graph's readiness pass.
    pub fn next_batch(&self, graph: &mut GoalGraph, k: usize) -> Vec<Goal> {
        let mut ready = graph.ready_goals();
        // Stable sort keeps insertion order for full ties.
        ready.sort_by_key(|g| (Reverse(g.priority), g.dependencies.len()));
        ready.truncate(k);

        debug!(
            k,
            selected = ready.len(),
            "planner selected next batch"
        );
        ready
    }

    /// Propose configuration changes in response to a signal.
    ///
    /// Failures halve the batch size (never below 1); otherwise no change.
    pub fn rewrite(&self, signal: &PlanSignal) -> PlanRewrite {
        let reason = if signal.reason.is_empty() {
            "unknown"
        } else {
            signal.reason.as_str()
        };
        let rationale = format!("Rewrite triggered by signal: {reason}");

        let mut changes = Map::new();
        if signal.failures > 0 && signal.batch_size > 1 {
            changes.insert(
                "batch_size".to_string(),
                Value::from((signal.batch_size / 2).max(1)),
            );
        }

        PlanRewrite { rationale, changes }
    }
}
