// src/agent/mod.rs

//! Worker collaborators.
//!
//! The orchestrator only talks to workers through the [`Agent`] trait, and
//! resolves them by name through an [`AgentRegistry`]. Workers reach their
//! capabilities through [`tools::ToolRegistry`].
//!
//! - [`tools`] defines the `Tool` trait, the registry and built-in tools.
//! - [`research`] is a small demo team used by the `goalweaver` binary.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{GoalweaverError, Result};
use crate::types::{Goal, StepResult};

pub mod research;
pub mod tools;

/// Read-only context handed to [`Agent::act`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentContext {
    /// Contents of the store's `world` slot at dispatch time.
    pub world: Value,
}

/// A worker able to make progress on goals.
///
/// A goal that could not be achieved should be reported as a `StepResult`
/// with `success = false`. Returning `Err` is reserved for unexpected faults;
/// the orchestrator fails only that goal's batch slot.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn act(&self, goal: &Goal, ctx: &AgentContext) -> Result<StepResult>;

    /// Post-step hook for side effects such as logging.
    async fn reflect(&self, _goal: &Goal, _result: &StepResult) -> Result<()> {
        Ok(())
    }

    /// New goals to fold into the graph. Their `dependencies` may reference
    /// existing goals or siblings from the same proposal.
    async fn propose_subgoals(&self, _goal: &Goal, _result: &StepResult) -> Result<Vec<Goal>> {
        Ok(Vec::new())
    }
}

/// Name-indexed agents, remembering registration order.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
    by_name: HashMap<String, usize>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        let name = agent.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(GoalweaverError::DuplicateAgent(name));
        }
        self.by_name.insert(name, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.agents[i]))
    }

    /// First registered agent; the fallback owner for unassigned goals.
    pub fn first(&self) -> Option<Arc<dyn Agent>> {
        self.agents.first().cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
