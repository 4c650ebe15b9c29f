// src/engine/orchestrator.rs

//! Async shell around [`LoopCore`].
//!
//! Each iteration: recompute readiness, snapshot, plan a batch, then either
//! finish, wait one poll interval, stall, or dispatch the batch as concurrent
//! Tokio tasks and wait for all of them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::agent::AgentRegistry;
use crate::dag::{AdaptivePlanner, GoalGraph};
use crate::engine::dispatch::{self, DispatchContext, GoalRunResult};
use crate::engine::events::EventLog;
use crate::engine::{LoopCore, LoopDecision, RunOptions, RunOutcome, RunReport};
use crate::errors::Result;
use crate::store::SharedStore;
use crate::types::{Event, EventType, Goal, GoalId, PlanSignal};

pub struct Orchestrator {
    graph: Arc<Mutex<GoalGraph>>,
    planner: AdaptivePlanner,
    store: Arc<SharedStore>,
    agents: Arc<AgentRegistry>,
    events: Arc<EventLog>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(store: Arc<SharedStore>, agents: AgentRegistry, options: RunOptions) -> Self {
        Self {
            graph: Arc::new(Mutex::new(GoalGraph::new())),
            planner: AdaptivePlanner::new(),
            store,
            agents: Arc::new(agents),
            events: Arc::new(EventLog::new()),
            options,
        }
    }

    pub fn add_goal(&self, goal: Goal) -> Result<()> {
        let payload = serde_json::to_value(&goal)?;
        self.graph.lock().add_goal(goal)?;
        self.events.emit(EventType::GoalAdded, payload);
        Ok(())
    }

    pub fn add_dependency(&self, goal_id: &str, depends_on_id: &str) -> Result<()> {
        self.graph.lock().add_dependency(goal_id, depends_on_id)?;
        self.events.emit(
            EventType::GoalAdded,
            json!({"id": goal_id, "dependency_added": depends_on_id}),
        );
        Ok(())
    }

    /// All goals in insertion order.
    pub fn goals(&self) -> Vec<Goal> {
        self.graph.lock().goals()
    }

    pub fn goal(&self, goal_id: &str) -> Result<Goal> {
        self.graph.lock().get(goal_id).cloned()
    }

    /// READY goals after a fresh readiness pass.
    pub fn ready_goals(&self) -> Vec<Goal> {
        self.graph.lock().ready_goals()
    }

    /// Goals in dependency order, as written to the snapshot.
    pub fn ordered_goals(&self) -> Vec<Goal> {
        self.graph.lock().goals_in_order()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.snapshot()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    fn dispatch_context(&self) -> DispatchContext {
        DispatchContext {
            graph: Arc::clone(&self.graph),
            store: Arc::clone(&self.store),
            agents: Arc::clone(&self.agents),
            events: Arc::clone(&self.events),
            snapshot_path: self.options.snapshot_path.clone(),
        }
    }

    /// Write `goals` + `logs` to the snapshot file. Best-effort.
    pub async fn write_snapshot(&self) {
        self.dispatch_context().write_snapshot().await;
    }

    /// Run until every goal is DONE or FAILED, or until nothing becomes
    /// READY within the idle budget.
    pub async fn run(&self) -> Result<RunReport> {
        let ctx = self.dispatch_context();
        let mut core = LoopCore::new(self.options.max_idle_loops);
        let mut batch_size = self.options.batch_size.max(1);
        let mut report = RunReport {
            outcome: RunOutcome::Completed,
            iterations: 0,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            batch_size,
        };

        info!(
            goals = self.graph.lock().len(),
            agents = self.agents.len(),
            batch_size,
            "orchestrator run started"
        );

        loop {
            report.iterations += 1;

            self.graph.lock().recompute_readiness();
            ctx.write_snapshot().await;

            let (unfinished, batch) = {
                let mut graph = self.graph.lock();
                let unfinished = graph.unfinished();
                let batch = if unfinished.is_empty() {
                    Vec::new()
                } else {
                    self.planner.next_batch(&mut graph, batch_size)
                };
                (unfinished, batch)
            };

            match core.step(unfinished.len(), batch.len()) {
                LoopDecision::Finish => {
                    self.store.bump_metric("runs_completed", 1).await;
                    ctx.write_snapshot().await;
                    break;
                }
                LoopDecision::Wait { idle_loops } => {
                    debug!(
                        idle_loops,
                        unfinished = unfinished.len(),
                        "no goal ready; waiting"
                    );
                    tokio::time::sleep(self.options.poll_interval).await;
                }
                LoopDecision::Stall => {
                    warn!(
                        remaining = unfinished.len(),
                        idle_loops = core.idle_loops(),
                        "no goal became ready within the idle budget; failing the rest"
                    );
                    for goal_id in &unfinished {
                        if ctx
                            .fail_unattended(goal_id, "stalled/blocked".to_string())
                            .await
                        {
                            report.failed += 1;
                        }
                    }
                    self.store.bump_metric("runs_stalled", 1).await;
                    ctx.write_snapshot().await;
                    report.outcome = RunOutcome::Stalled { failed: unfinished };
                    break;
                }
                LoopDecision::Dispatch => {
                    {
                        let mut graph = self.graph.lock();
                        for goal in &batch {
                            graph.mark_in_progress(&goal.id)?;
                        }
                    }
                    ctx.write_snapshot().await;

                    debug!(
                        batch = ?batch.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(),
                        "dispatching batch"
                    );
                    report.dispatched += batch.len();
                    let results = dispatch_batch(&ctx, batch).await;

                    let failures = results.iter().filter(|r| !r.success).count();
                    report.succeeded += results.len() - failures;
                    report.failed += failures;

                    if failures > 0 && self.options.adapt_on_failure {
                        batch_size = self.adapt(batch_size, failures);
                    }
                }
            }
        }

        report.batch_size = batch_size;
        info!(
            outcome = ?report.outcome,
            iterations = report.iterations,
            dispatched = report.dispatched,
            succeeded = report.succeeded,
            failed = report.failed,
            "orchestrator run finished"
        );
        Ok(report)
    }

    /// Ask the planner for a rewrite after a failing batch and apply any
    /// batch-size change that does not grow the batch.
    fn adapt(&self, batch_size: usize, failures: usize) -> usize {
        let signal = PlanSignal {
            reason: format!("{failures} goal(s) failed in the last batch"),
            failures,
            batch_size,
        };
        let rewrite = self.planner.rewrite(&signal);

        let next = rewrite
            .batch_size()
            .map(|proposed| proposed.clamp(1, batch_size))
            .unwrap_or(batch_size);
        if next != batch_size {
            info!(from = batch_size, to = next, rationale = %rewrite.rationale, "plan rewritten");
        }

        match serde_json::to_value(&rewrite) {
            Ok(payload) => self.events.emit(EventType::PlanRewritten, payload),
            Err(err) => warn!(error = %err, "failed to serialize plan rewrite"),
        }
        next
    }
}

/// Spawn one task per goal and wait for all of them. A panicking slot is
/// recorded as a failed goal.
async fn dispatch_batch(ctx: &DispatchContext, batch: Vec<Goal>) -> Vec<GoalRunResult> {
    let mut set = JoinSet::new();
    let mut slots: HashMap<tokio::task::Id, GoalId> = HashMap::with_capacity(batch.len());

    for goal in batch {
        let goal_id = goal.id.clone();
        let handle = set.spawn(dispatch::run_goal(ctx.clone(), goal));
        slots.insert(handle.id(), goal_id);
    }

    let mut results = Vec::with_capacity(slots.len());
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((_, result)) => results.push(result),
            Err(err) => {
                let Some(goal_id) = slots.remove(&err.id()) else {
                    error!(error = %err, "batch slot aborted for an untracked task");
                    continue;
                };
                error!(goal = %goal_id, error = %err, "goal dispatch aborted");
                ctx.fail_unattended(&goal_id, format!("dispatch aborted: {err}"))
                    .await;
                // A slot that panics after recording its outcome keeps it.
                let success = ctx.is_done(&goal_id);
                results.push(GoalRunResult {
                    goal_id,
                    success,
                    subgoals: Vec::new(),
                });
            }
        }
    }
    results
}
