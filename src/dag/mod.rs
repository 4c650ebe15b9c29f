// src/dag/mod.rs

//! Goal graph and batch planning.
//!
//! - [`graph`] holds the acyclic goal graph and its readiness pass.
//! - [`planner`] picks the next bounded batch of READY goals and proposes
//!   plan rewrites after failures.

pub mod graph;
pub mod planner;

pub use graph::{GoalGraph, GoalView};
pub use planner::AdaptivePlanner;
