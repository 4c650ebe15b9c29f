// tests/graph_properties.rs

use std::collections::HashMap;

use proptest::prelude::*;

use goalweaver::dag::{AdaptivePlanner, GoalGraph};
use goalweaver::errors::GoalweaverError;
use goalweaver::types::{Goal, GoalStatus};

// Acyclic by construction: goal N may only depend on goals 0..N-1.
fn dag_strategy(max_goals: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_goals).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut deps: Vec<usize> =
                            deps.into_iter().filter(|_| i > 0).map(|d| d % i.max(1)).collect();
                        deps.sort_unstable();
                        deps.dedup();
                        deps
                    })
                    .collect()
            },
        )
    })
}

fn build(deps: &[Vec<usize>]) -> (GoalGraph, Vec<String>) {
    let mut graph = GoalGraph::new();
    let mut ids: Vec<String> = Vec::with_capacity(deps.len());
    for (i, ds) in deps.iter().enumerate() {
        let mut goal = Goal::new(format!("goal_{i}"));
        for &d in ds {
            goal = goal.depends_on(ids[d].clone());
        }
        ids.push(goal.id.clone());
        graph.add_goal(goal).unwrap();
    }
    (graph, ids)
}

fn statuses(graph: &GoalGraph) -> Vec<GoalStatus> {
    graph.goals().iter().map(|g| g.status).collect()
}

proptest! {
    #[test]
    fn rejected_edges_leave_graph_unchanged(
        deps in dag_strategy(12),
        extra in proptest::collection::vec((any::<usize>(), any::<usize>()), 1..20),
    ) {
        let (mut graph, ids) = build(&deps);

        for (a, b) in extra {
            let a = &ids[a % ids.len()];
            let b = &ids[b % ids.len()];
            let nodes = graph.len();
            let edges = graph.edge_count();
            let before = graph.dependencies_of(a).unwrap().to_vec();

            match graph.add_dependency(a, b) {
                Ok(()) => prop_assert!(graph.edge_count() >= edges),
                Err(GoalweaverError::CycleDetected { .. }) => {
                    prop_assert_eq!(graph.len(), nodes);
                    prop_assert_eq!(graph.edge_count(), edges);
                    prop_assert_eq!(graph.dependencies_of(a).unwrap(), before.as_slice());
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }

        // Still a DAG: every dependency precedes its dependent.
        let order: HashMap<String, usize> = graph
            .goals_in_order()
            .iter()
            .enumerate()
            .map(|(pos, g)| (g.id.clone(), pos))
            .collect();
        for goal in graph.goals() {
            for dep in &goal.dependencies {
                prop_assert!(order[dep] < order[&goal.id]);
            }
        }
    }

    #[test]
    fn readiness_is_idempotent(
        deps in dag_strategy(12),
        done in proptest::collection::vec(any::<bool>(), 12),
    ) {
        let (mut graph, ids) = build(&deps);
        for (i, id) in ids.iter().enumerate() {
            if done[i] {
                graph.mark_done(id, true).unwrap();
            }
        }

        graph.recompute_readiness();
        let first = statuses(&graph);
        graph.recompute_readiness();
        prop_assert_eq!(first, statuses(&graph));

        // READY exactly when every dependency is DONE.
        for goal in graph.goals() {
            if goal.status.is_terminal() {
                continue;
            }
            let satisfied = goal
                .dependencies
                .iter()
                .all(|d| graph.get(d).map(|g| g.status == GoalStatus::Done).unwrap_or(false));
            prop_assert_eq!(goal.status == GoalStatus::Ready, satisfied);
        }
    }

    #[test]
    fn batches_never_exceed_k_and_are_ready(deps in dag_strategy(12), k in 1usize..5) {
        let (mut graph, _ids) = build(&deps);
        let batch = AdaptivePlanner::new().next_batch(&mut graph, k);
        prop_assert!(batch.len() <= k);
        prop_assert!(!batch.is_empty());
        for goal in &batch {
            prop_assert_eq!(goal.status, GoalStatus::Ready);
        }
    }
}

#[test]
fn readiness_follows_dependency_completion() {
    let mut graph = GoalGraph::new();
    let a = Goal::new("A");
    let b = Goal::new("B").depends_on(a.id.clone());
    graph.add_goal(a.clone()).unwrap();
    graph.add_goal(b.clone()).unwrap();

    let ready: Vec<String> = graph.ready_goals().into_iter().map(|g| g.id).collect();
    assert_eq!(ready, vec![a.id.clone()]);
    assert_eq!(graph.get(&b.id).unwrap().status, GoalStatus::Pending);

    graph.mark_in_progress(&a.id).unwrap();
    graph.mark_done(&a.id, true).unwrap();
    graph.recompute_readiness();
    assert_eq!(graph.get(&b.id).unwrap().status, GoalStatus::Ready);
}

#[test]
fn failed_dependency_keeps_dependent_pending() {
    let mut graph = GoalGraph::new();
    let a = Goal::new("A");
    let b = Goal::new("B").depends_on(a.id.clone());
    graph.add_goal(a.clone()).unwrap();
    graph.add_goal(b.clone()).unwrap();

    graph.mark_done(&a.id, false).unwrap();
    graph.recompute_readiness();
    assert_eq!(graph.get(&b.id).unwrap().status, GoalStatus::Pending);
    assert_eq!(graph.unfinished(), vec![b.id]);
}
