// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{GoalweaverError, Result};
use crate::types::{Goal, GoalId, GoalStatus};

/// Minimal per-goal projection written to the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalView {
    pub id: GoalId,
    pub title: String,
    pub status: GoalStatus,
    pub dependencies: Vec<GoalId>,
}

/// DAG of goals.
///
/// Edges are oriented `dependency -> goal`. Nodes are never removed, so node
/// index order is insertion order.
///
/// A goal's `dependencies` list is the authority for readiness. Edges exist
/// for every declared dependency that has been inserted; ids that are not in
/// the graph yet are "dangling" and keep the goal pending.
#[derive(Debug, Clone, Default)]
pub struct GoalGraph {
    graph: DiGraph<Goal, ()>,
    index: HashMap<GoalId, NodeIndex>,
}

impl GoalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a goal.
    ///
    /// Edges are wired to every declared dependency already present, and from
    /// the new goal to every present goal that declared it. If that wiring
    /// would close a cycle the goal is rejected and the graph is unchanged.
    pub fn add_goal(&mut self, mut goal: Goal) -> Result<()> {
        if self.index.contains_key(&goal.id) {
            return Err(GoalweaverError::DuplicateGoal(goal.id));
        }

        let mut seen = Vec::with_capacity(goal.dependencies.len());
        goal.dependencies.retain(|d| {
            if seen.contains(d) {
                false
            } else {
                seen.push(d.clone());
                true
            }
        });

        if goal.dependencies.contains(&goal.id) {
            return Err(GoalweaverError::CycleDetected {
                goal: goal.id.clone(),
                depends_on: goal.id,
            });
        }

        let upstream: Vec<NodeIndex> = goal
            .dependencies
            .iter()
            .filter_map(|d| self.index.get(d).copied())
            .collect();
        let downstream: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].dependencies.contains(&goal.id))
            .collect();

        // New node: dep -> new -> dependent. A cycle exists iff some dependent
        // already reaches some dependency.
        for &down in &downstream {
            for &up in &upstream {
                if has_path_connecting(&self.graph, down, up, None) {
                    return Err(GoalweaverError::CycleDetected {
                        goal: self.graph[down].id.clone(),
                        depends_on: goal.id,
                    });
                }
            }
        }

        let id = goal.id.clone();
        let idx = self.graph.add_node(goal);
        for up in upstream {
            self.graph.add_edge(up, idx, ());
        }
        for down in downstream {
            self.graph.add_edge(idx, down, ());
        }
        self.index.insert(id.clone(), idx);

        debug!(goal = %id, nodes = self.graph.node_count(), "goal inserted");
        Ok(())
    }

    /// Record that `goal_id` requires `depends_on_id` (edge `depends_on -> goal`).
    ///
    /// Idempotent for an existing edge. Rejects cycles without mutating.
    pub fn add_dependency(&mut self, goal_id: &str, depends_on_id: &str) -> Result<()> {
        let goal_idx = self.index_of(goal_id)?;
        let dep_idx = self.index_of(depends_on_id)?;

        if goal_idx == dep_idx || has_path_connecting(&self.graph, goal_idx, dep_idx, None) {
            return Err(GoalweaverError::CycleDetected {
                goal: goal_id.to_string(),
                depends_on: depends_on_id.to_string(),
            });
        }

        if self.graph.find_edge(dep_idx, goal_idx).is_none() {
            self.graph.add_edge(dep_idx, goal_idx, ());
        }

        let goal = &mut self.graph[goal_idx];
        if !goal.dependencies.iter().any(|d| d == depends_on_id) {
            goal.dependencies.push(depends_on_id.to_string());
            goal.updated_at = chrono::Utc::now();
        }

        debug!(goal = %goal_id, depends_on = %depends_on_id, "dependency added");
        Ok(())
    }

    /// Idempotent readiness pass.
    ///
    /// Every goal not in {IN_PROGRESS, DONE, FAILED} becomes READY iff all of
    /// its declared dependencies are present and DONE, otherwise PENDING.
    pub fn recompute_readiness(&mut self) {
        for idx in self.topological_order() {
            if self.graph[idx].status.is_settled() {
                continue;
            }

            let satisfied = self.graph[idx].dependencies.iter().all(|dep| {
                self.index
                    .get(dep)
                    .is_some_and(|&d| self.graph[d].status == GoalStatus::Done)
            });

            let next = if satisfied {
                GoalStatus::Ready
            } else {
                GoalStatus::Pending
            };
            self.graph[idx].set_status(next);
        }
    }

    /// Recompute readiness, then return the READY goals in insertion order.
    pub fn ready_goals(&mut self) -> Vec<Goal> {
        self.recompute_readiness();
        self.graph
            .node_weights()
            .filter(|g| g.status == GoalStatus::Ready)
            .cloned()
            .collect()
    }

    /// Move a goal to IN_PROGRESS unless it has already finished.
    pub fn mark_in_progress(&mut self, goal_id: &str) -> Result<()> {
        let idx = self.index_of(goal_id)?;
        let goal = &mut self.graph[idx];
        if !goal.status.is_terminal() {
            goal.set_status(GoalStatus::InProgress);
        }
        Ok(())
    }

    /// Record the final outcome. Terminal states never change afterwards.
    ///
    /// Returns `false` when the goal was already DONE or FAILED.
    pub fn mark_done(&mut self, goal_id: &str, success: bool) -> Result<bool> {
        let idx = self.index_of(goal_id)?;
        let goal = &mut self.graph[idx];
        if goal.status.is_terminal() {
            warn!(
                goal = %goal_id,
                status = %goal.status,
                "ignoring completion for goal already in a terminal state"
            );
            return Ok(false);
        }
        goal.set_status(if success {
            GoalStatus::Done
        } else {
            GoalStatus::Failed
        });
        Ok(true)
    }

    pub fn set_owner(&mut self, goal_id: &str, owner: &str) -> Result<()> {
        let idx = self.index_of(goal_id)?;
        self.graph[idx].owner_agent = Some(owner.to_string());
        Ok(())
    }

    /// All goals in insertion order.
    pub fn goals(&self) -> Vec<Goal> {
        self.graph.node_weights().cloned().collect()
    }

    pub fn get(&self, goal_id: &str) -> Result<&Goal> {
        let idx = self.index_of(goal_id)?;
        Ok(&self.graph[idx])
    }

    pub fn contains(&self, goal_id: &str) -> bool {
        self.index.contains_key(goal_id)
    }

    /// Direct dependency ids of a goal, including ones not inserted yet.
    pub fn dependencies_of(&self, goal_id: &str) -> Result<&[GoalId]> {
        Ok(self.get(goal_id)?.dependencies.as_slice())
    }

    /// Ids of goals that are neither DONE nor FAILED, in insertion order.
    pub fn unfinished(&self) -> Vec<GoalId> {
        self.graph
            .node_weights()
            .filter(|g| !g.status.is_terminal())
            .map(|g| g.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Topologically sorted projection for the snapshot file.
    pub fn snapshot(&self) -> Vec<GoalView> {
        self.topological_order()
            .into_iter()
            .map(|idx| {
                let g = &self.graph[idx];
                GoalView {
                    id: g.id.clone(),
                    title: g.title.clone(),
                    status: g.status,
                    dependencies: g.dependencies.clone(),
                }
            })
            .collect()
    }

    /// Full goals in topological order.
    pub fn goals_in_order(&self) -> Vec<Goal> {
        self.topological_order()
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Goals in a dependency-respecting order.
    pub fn topological_order(&self) -> Vec<NodeIndex> {
        match toposort(&self.graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                // Unreachable while insertion keeps the graph acyclic.
                warn!(
                    goal = %self.graph[cycle.node_id()].id,
                    "goal graph contains a cycle; falling back to insertion order"
                );
                self.graph.node_indices().collect()
            }
        }
    }

    fn index_of(&self, goal_id: &str) -> Result<NodeIndex> {
        self.index
            .get(goal_id)
            .copied()
            .ok_or_else(|| GoalweaverError::UnknownGoal(goal_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(graph: &GoalGraph, id: &str) -> GoalStatus {
        graph.get(id).map(|g| g.status).unwrap()
    }

    #[test]
    fn dependency_readiness_follows_completion() {
        let mut graph = GoalGraph::new();
        let a = Goal::new("A");
        let b = Goal::new("B");
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        graph.add_goal(a).unwrap();
        graph.add_goal(b).unwrap();
        graph.add_dependency(&b_id, &a_id).unwrap();

        graph.recompute_readiness();
        assert_eq!(status(&graph, &a_id), GoalStatus::Ready);
        assert_eq!(status(&graph, &b_id), GoalStatus::Pending);

        graph.mark_done(&a_id, true).unwrap();
        graph.recompute_readiness();
        assert_eq!(status(&graph, &b_id), GoalStatus::Ready);
    }

    #[test]
    fn rejected_cycle_leaves_graph_unchanged() {
        let mut graph = GoalGraph::new();
        let a = Goal::new("A");
        let b = Goal::new("B").depends_on(a.id.clone());
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        graph.add_goal(a).unwrap();
        graph.add_goal(b).unwrap();
        assert_eq!(graph.edge_count(), 1);

        let err = graph.add_dependency(&a_id, &b_id).unwrap_err();
        assert!(matches!(err, GoalweaverError::CycleDetected { .. }));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.dependencies_of(&a_id).unwrap().is_empty());

        let err = graph.add_dependency(&a_id, &a_id).unwrap_err();
        assert!(matches!(err, GoalweaverError::CycleDetected { .. }));
    }

    #[test]
    fn duplicate_and_unknown_goals_are_errors() {
        let mut graph = GoalGraph::new();
        let a = Goal::new("A");
        graph.add_goal(a.clone()).unwrap();
        assert!(matches!(
            graph.add_goal(a.clone()),
            Err(GoalweaverError::DuplicateGoal(_))
        ));
        assert!(matches!(
            graph.add_dependency(&a.id, "missing"),
            Err(GoalweaverError::UnknownGoal(_))
        ));
        assert!(matches!(graph.get("missing"), Err(GoalweaverError::UnknownGoal(_))));
    }

    #[test]
    fn sibling_inserted_later_is_wired_in() {
        let mut graph = GoalGraph::new();
        let impl_goal = Goal::new("impl");
        let review = Goal::new("review").depends_on(impl_goal.id.clone());
        let review_id = review.id.clone();

        graph.add_goal(review).unwrap();
        assert_eq!(graph.edge_count(), 0);
        graph.recompute_readiness();
        assert_eq!(status(&graph, &review_id), GoalStatus::Pending);

        graph.add_goal(impl_goal).unwrap();
        assert_eq!(graph.edge_count(), 1);
        let order: Vec<_> = graph.snapshot().into_iter().map(|v| v.title).collect();
        assert_eq!(order, vec!["impl".to_string(), "review".to_string()]);
    }

    #[test]
    fn late_insertion_closing_a_cycle_is_rejected() {
        let mut graph = GoalGraph::new();
        let x_id = "x".to_string();
        let a = Goal::new("A").depends_on(x_id.clone());
        let a_id = a.id.clone();
        graph.add_goal(a).unwrap();

        let mut x = Goal::new("X").depends_on(a_id.clone());
        x.id = x_id;
        let err = graph.add_goal(x).unwrap_err();
        assert!(matches!(err, GoalweaverError::CycleDetected { .. }));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut graph = GoalGraph::new();
        let a = Goal::new("A");
        let id = a.id.clone();
        graph.add_goal(a).unwrap();

        assert!(graph.mark_done(&id, false).unwrap());
        graph.mark_in_progress(&id).unwrap();
        assert!(!graph.mark_done(&id, true).unwrap());
        graph.recompute_readiness();
        assert_eq!(status(&graph, &id), GoalStatus::Failed);
    }
}
