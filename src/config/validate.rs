// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{GoalweaverError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = GoalweaverError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.orchestrator, raw.goal))
    }
}

/// Validate an already-built config again, e.g. after CLI overrides.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_raw_config(&RawConfigFile {
        orchestrator: cfg.orchestrator.clone(),
        goal: cfg.goal.clone(),
    })
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_orchestrator(cfg)?;
    validate_goal_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn validate_orchestrator(cfg: &RawConfigFile) -> Result<()> {
    let o = &cfg.orchestrator;
    if o.batch_size == 0 {
        return Err(GoalweaverError::ConfigError(
            "[orchestrator].batch_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if o.max_idle_loops == 0 {
        return Err(GoalweaverError::ConfigError(
            "[orchestrator].max_idle_loops must be >= 1 (got 0)".to_string(),
        ));
    }
    if o.poll_interval_ms == 0 {
        return Err(GoalweaverError::ConfigError(
            "[orchestrator].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if o.state_path.trim().is_empty() {
        return Err(GoalweaverError::ConfigError(
            "[orchestrator].state_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_goal_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (key, goal) in cfg.goal.iter() {
        if goal.title.trim().is_empty() {
            return Err(GoalweaverError::ConfigError(format!(
                "goal '{key}' has an empty title"
            )));
        }
        for dep in goal.after.iter() {
            if dep == key {
                return Err(GoalweaverError::ConfigError(format!(
                    "goal '{key}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.goal.contains_key(dep) {
                return Err(GoalweaverError::ConfigError(format!(
                    "goal '{key}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> goal, same as the runtime goal graph.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for key in cfg.goal.keys() {
        graph.add_node(key.as_str());
    }
    for (key, goal) in cfg.goal.iter() {
        for dep in goal.after.iter() {
            graph.add_edge(dep.as_str(), key.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(GoalweaverError::DagCycle(format!(
            "cycle detected in goal DAG involving goal '{}'",
            cycle.node_id()
        ))),
    }
}
