// src/engine/dispatch.rs

//! Per-goal execution: one call of [`run_goal`] drives a single goal through
//! its agent (act, reflect, result bookkeeping, subgoal folding).
//!
//! Everything a batch slot needs is bundled in [`DispatchContext`] so each
//! slot can run as its own Tokio task. The graph lock is only ever taken for
//! short synchronous sections and is never held across an `.await`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentContext, AgentRegistry};
use crate::dag::GoalGraph;
use crate::engine::events::EventLog;
use crate::store::SharedStore;
use crate::types::{EventType, Goal, GoalId, GoalStatus, StepResult};

/// Shared handles for one orchestrator, cloned into every batch slot.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub graph: Arc<Mutex<GoalGraph>>,
    pub store: Arc<SharedStore>,
    pub agents: Arc<AgentRegistry>,
    pub events: Arc<EventLog>,
    pub snapshot_path: PathBuf,
}

/// What one batch slot reports back to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalRunResult {
    pub goal_id: GoalId,
    pub success: bool,
    /// Ids of subgoals that were accepted into the graph.
    pub subgoals: Vec<GoalId>,
}

impl DispatchContext {
    /// Write `goals` + `logs` to the snapshot file. Best-effort.
    pub async fn write_snapshot(&self) {
        let views = self.graph.lock().snapshot();
        let goals = match serde_json::to_value(views) {
            Ok(goals) => goals,
            Err(err) => {
                warn!(error = %err, "failed to serialize goal snapshot; skipping write");
                return;
            }
        };
        self.store.write_snapshot(&self.snapshot_path, goals).await;
    }

    /// Record `goal_id` as FAILED without an agent having produced a result.
    ///
    /// Returns `false`, and records nothing, when the goal already reached a
    /// terminal state.
    pub(crate) async fn fail_unattended(&self, goal_id: &str, note: String) -> bool {
        let marked = self.graph.lock().mark_done(goal_id, false);
        match marked {
            Ok(true) => {}
            Ok(false) => {
                debug!(goal = %goal_id, %note, "goal already finished; not failing it again");
                return false;
            }
            Err(err) => {
                warn!(goal = %goal_id, error = %err, "could not mark goal failed");
                return false;
            }
        }
        self.events.emit(
            EventType::GoalUpdated,
            json!({"id": goal_id, "status": "failed", "note": note}),
        );
        self.store
            .append_log(json!({
                "goal": goal_id,
                "agent": "orchestrator",
                "success": false,
                "note": note,
            }))
            .await;
        self.store.bump_metric("goals_failed", 1).await;
        true
    }

    /// Whether `goal_id` currently sits in the graph as DONE.
    pub(crate) fn is_done(&self, goal_id: &str) -> bool {
        self.graph
            .lock()
            .get(goal_id)
            .map(|g| g.status == GoalStatus::Done)
            .unwrap_or(false)
    }

    fn resolve_agent(&self, goal: &Goal) -> Option<Arc<dyn Agent>> {
        match goal.owner_agent.as_deref() {
            Some(name) => self.agents.get(name),
            None => self.agents.first(),
        }
    }

    /// Insert proposed subgoals under one graph lock. Rejected ones are
    /// logged and skipped.
    fn fold_subgoals(&self, parent: &Goal, subgoals: Vec<Goal>) -> Vec<GoalId> {
        if subgoals.is_empty() {
            return Vec::new();
        }

        let mut added = Vec::with_capacity(subgoals.len());
        let mut graph = self.graph.lock();
        for sub in subgoals {
            let id = sub.id.clone();
            let deps = sub.dependencies.clone();
            let payload = serde_json::to_value(&sub).unwrap_or(Value::Null);

            if let Err(err) = graph.add_goal(sub) {
                warn!(parent = %parent.id, goal = %id, error = %err, "rejected proposed subgoal");
                continue;
            }
            let present: Vec<GoalId> = deps.into_iter().filter(|d| graph.contains(d)).collect();
            for dep in &present {
                if let Err(err) = graph.add_dependency(&id, dep) {
                    warn!(goal = %id, dependency = %dep, error = %err, "could not wire subgoal dependency");
                }
            }

            self.events.emit(EventType::GoalAdded, payload);
            added.push(id);
        }
        drop(graph);

        if !added.is_empty() {
            debug!(parent = %parent.id, count = added.len(), "subgoals folded into graph");
            self.events.emit(
                EventType::SubgoalsAdded,
                json!({"parent": parent.id, "goals": added}),
            );
        }
        added
    }
}

/// Drive one goal through its agent.
///
/// Agent errors from `act` become a failed [`StepResult`]; errors from
/// `reflect` or `propose_subgoals` are logged and otherwise ignored.
pub async fn run_goal(ctx: DispatchContext, mut goal: Goal) -> GoalRunResult {
    let goal_id = goal.id.clone();

    let Some(agent) = ctx.resolve_agent(&goal) else {
        let note = match goal.owner_agent.as_deref() {
            Some(name) => format!("no agent registered as '{name}'"),
            None => "no agents registered".to_string(),
        };
        warn!(goal = %goal_id, %note, "goal has no agent to run it");
        ctx.fail_unattended(&goal_id, note).await;
        ctx.write_snapshot().await;
        return GoalRunResult {
            goal_id,
            success: false,
            subgoals: Vec::new(),
        };
    };
    let agent_name = agent.name().to_string();

    {
        let mut graph = ctx.graph.lock();
        if goal.owner_agent.is_none() {
            if let Err(err) = graph.set_owner(&goal_id, &agent_name) {
                warn!(goal = %goal_id, error = %err, "could not record owner");
            }
            goal.owner_agent = Some(agent_name.clone());
        }
        if let Err(err) = graph.mark_in_progress(&goal_id) {
            warn!(goal = %goal_id, error = %err, "could not mark goal in progress");
        }
    }
    ctx.events.emit(
        EventType::GoalUpdated,
        json!({"id": goal_id, "status": "in_progress", "owner": agent_name}),
    );
    ctx.write_snapshot().await;

    let world = ctx.store.get("world", json!({})).await;
    let agent_ctx = AgentContext { world };

    info!(goal = %goal_id, agent = %agent_name, title = %goal.title, "dispatching goal");
    let started = Instant::now();
    let mut result = match agent.act(&goal, &agent_ctx).await {
        Ok(result) => result,
        Err(err) => {
            warn!(goal = %goal_id, agent = %agent_name, error = %err, "agent act failed");
            StepResult::failure(&goal, &agent_name, format!("agent error: {err}"))
        }
    };
    if result.latency_ms == 0 {
        result.latency_ms = started.elapsed().as_millis() as u64;
    }

    if let Err(err) = agent.reflect(&goal, &result).await {
        warn!(goal = %goal_id, agent = %agent_name, error = %err, "agent reflect failed");
    }

    let success = result.success;
    if let Err(err) = ctx.graph.lock().mark_done(&goal_id, success) {
        warn!(goal = %goal_id, error = %err, "could not record goal outcome");
    }
    let status = if success { "done" } else { "failed" };
    ctx.events.emit(
        EventType::GoalUpdated,
        json!({"id": goal_id, "status": status}),
    );
    debug!(goal = %goal_id, agent = %agent_name, success, latency_ms = result.latency_ms, "goal finished");

    ctx.store
        .append_log(json!({"goal": goal_id, "agent": agent_name, "success": success}))
        .await;
    let artifact = serde_json::to_value(&result).unwrap_or(Value::Null);
    ctx.store
        .record_artifact(&format!("result:{goal_id}"), artifact.clone())
        .await;
    let metric = if success {
        "goals_succeeded"
    } else {
        "goals_failed"
    };
    ctx.store.bump_metric(metric, 1).await;
    ctx.write_snapshot().await;

    let proposed = match agent.propose_subgoals(&goal, &result).await {
        Ok(proposed) => proposed,
        Err(err) => {
            warn!(goal = %goal_id, agent = %agent_name, error = %err, "agent subgoal proposal failed");
            Vec::new()
        }
    };
    let subgoals = ctx.fold_subgoals(&goal, proposed);

    ctx.events.emit(EventType::ResultEmitted, artifact);

    GoalRunResult {
        goal_id,
        success,
        subgoals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{GoalweaverError, Result};
    use crate::fs::mock::MockFileSystem;
    use async_trait::async_trait;

    struct Flaky;

    #[async_trait]
    impl Agent for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn act(&self, _goal: &Goal, _ctx: &AgentContext) -> Result<StepResult> {
            Err(GoalweaverError::ToolFailed {
                tool: "web_search".into(),
                message: "offline".into(),
            })
        }

        async fn propose_subgoals(&self, goal: &Goal, _result: &StepResult) -> Result<Vec<Goal>> {
            Ok(vec![Goal::new(format!("Retry: {}", goal.title)).with_owner("flaky")])
        }
    }

    fn context(agents: AgentRegistry) -> (MockFileSystem, DispatchContext) {
        let fs = MockFileSystem::new();
        let store = Arc::new(SharedStore::with_fs(Arc::new(fs.clone()), "state.json"));
        let ctx = DispatchContext {
            graph: Arc::new(Mutex::new(GoalGraph::new())),
            store,
            agents: Arc::new(agents),
            events: Arc::new(EventLog::new()),
            snapshot_path: PathBuf::from("state.json"),
        };
        (fs, ctx)
    }

    #[tokio::test]
    async fn act_error_becomes_failed_result() {
        let mut agents = AgentRegistry::new();
        agents.register(Arc::new(Flaky)).unwrap();
        let (fs, ctx) = context(agents);

        let goal = Goal::new("fetch");
        ctx.graph.lock().add_goal(goal.clone()).unwrap();

        let outcome = run_goal(ctx.clone(), goal.clone()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.subgoals.len(), 1);

        let graph = ctx.graph.lock();
        assert_eq!(graph.get(&goal.id).unwrap().status.as_str(), "failed");
        assert_eq!(graph.get(&goal.id).unwrap().owner_agent.as_deref(), Some("flaky"));
        assert_eq!(graph.len(), 2);
        drop(graph);

        let artifact = ctx.store.artifact(&format!("result:{}", goal.id)).await.unwrap();
        assert!(artifact["content"].as_str().unwrap().contains("offline"));
        assert_eq!(ctx.store.metric("goals_failed").await, 1);
        assert_eq!(ctx.events.count(EventType::SubgoalsAdded), 1);

        let doc: Value = serde_json::from_str(&fs.contents("state.json").unwrap()).unwrap();
        let views = doc["goals"].as_array().unwrap();
        let view = views.iter().find(|v| v["id"] == json!(goal.id)).unwrap();
        assert_eq!(view["status"], json!("failed"));
        assert_eq!(doc["artifacts"].as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_owner_fails_without_dispatch() {
        let (_fs, ctx) = context(AgentRegistry::new());
        let goal = Goal::new("orphan").with_owner("ghost");
        ctx.graph.lock().add_goal(goal.clone()).unwrap();

        let outcome = run_goal(ctx.clone(), goal.clone()).await;
        assert!(!outcome.success);

        let logs = ctx.store.export_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["agent"], json!("orchestrator"));
        assert!(logs[0]["note"].as_str().unwrap().contains("ghost"));
    }
}
