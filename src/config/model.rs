// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{Goal, GoalId, Priority};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [orchestrator]
/// batch_size = 3
/// state_path = "state.json"
///
/// [goal.survey]
/// title = "Survey recent RAG optimizations"
/// owner = "researcher"
/// priority = "high"
///
/// [goal.write]
/// title = "Write the survey"
/// owner = "writer"
/// after = ["survey"]
/// ```
///
/// All sections are optional and have defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,

    /// Goals from `[goal.<key>]`. Keys are only used to express `after`
    /// references; goals get fresh ids when seeded.
    #[serde(default)]
    pub goal: BTreeMap<String, GoalConfig>,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub orchestrator: OrchestratorSection,
    pub goal: BTreeMap<String, GoalConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        orchestrator: OrchestratorSection,
        goal: BTreeMap<String, GoalConfig>,
    ) -> Self {
        Self { orchestrator, goal }
    }

    /// One [`Goal`] per `[goal.<key>]`, paired with its key, with `after`
    /// keys translated to goal ids.
    pub fn build_goals(&self) -> Vec<(String, Goal)> {
        let mut goals: Vec<(String, Goal)> = self
            .goal
            .iter()
            .map(|(key, cfg)| {
                let mut goal = Goal::new(cfg.title.clone())
                    .with_description(cfg.description.clone())
                    .with_priority(cfg.priority);
                if let Some(owner) = &cfg.owner {
                    goal = goal.with_owner(owner.clone());
                }
                for (k, v) in cfg.metadata_json() {
                    goal = goal.with_metadata(k, v);
                }
                (key.clone(), goal)
            })
            .collect();

        let ids: BTreeMap<String, GoalId> = goals
            .iter()
            .map(|(key, goal)| (key.clone(), goal.id.clone()))
            .collect();

        for (key, goal) in goals.iter_mut() {
            for id in self.goal[key.as_str()].after.iter().filter_map(|d| ids.get(d)) {
                if !goal.dependencies.contains(id) {
                    goal.dependencies.push(id.clone());
                }
            }
        }
        goals
    }
}

/// `[orchestrator]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorSection {
    /// Maximum goals dispatched per iteration.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Snapshot and store file.
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Consecutive empty iterations before the run is declared stalled.
    #[serde(default = "default_max_idle_loops")]
    pub max_idle_loops: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Let the planner shrink the batch after failures.
    #[serde(default = "default_adapt_on_failure")]
    pub adapt_on_failure: bool,
}

fn default_batch_size() -> usize {
    3
}

fn default_state_path() -> String {
    "state.json".to_string()
}

fn default_max_idle_loops() -> u32 {
    200
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_adapt_on_failure() -> bool {
    true
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            state_path: default_state_path(),
            max_idle_loops: default_max_idle_loops(),
            poll_interval_ms: default_poll_interval_ms(),
            adapt_on_failure: default_adapt_on_failure(),
        }
    }
}

/// `[goal.<key>]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalConfig {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Agent name; unset means "first registered agent".
    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// Keys of goals this one waits for.
    #[serde(default)]
    pub after: Vec<String>,

    /// Free-form table, carried into the goal's metadata as JSON.
    #[serde(default)]
    pub metadata: toml::Table,
}

impl GoalConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            owner: None,
            priority: Priority::default(),
            after: Vec::new(),
            metadata: toml::Table::new(),
        }
    }

    /// `metadata` converted to JSON values.
    pub fn metadata_json(&self) -> Map<String, Value> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.clone(), toml_to_json(v)))
            .collect()
    }
}

fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}
