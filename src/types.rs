// src/types.rs

//! Core data model: goals, their status machine, step results and events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Canonical goal identifier type used throughout the crate.
pub type GoalId = String;

/// Goal urgency. Declaration order is the sort order: `Critical` is highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!(
                "invalid priority: {other} (expected low, medium, high or critical)"
            )),
        }
    }
}

/// Lifecycle state of a goal.
///
/// ```text
/// PENDING <-> READY -> IN_PROGRESS -> DONE | FAILED
/// ```
///
/// `Ready` is only produced by the readiness pass, `InProgress` only by
/// dispatch. `Done` and `Failed` are terminal. Any non-terminal state may be
/// forced to `Failed` when a run stalls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Pending,
    Ready,
    InProgress,
    /// Declared for snapshot compatibility; never produced by this crate.
    Blocked,
    Done,
    Failed,
}

impl GoalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GoalStatus::Done | GoalStatus::Failed)
    }

    /// States the readiness pass must leave untouched.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            GoalStatus::InProgress | GoalStatus::Done | GoalStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Pending => "pending",
            GoalStatus::Ready => "ready",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Blocked => "blocked",
            GoalStatus::Done => "done",
            GoalStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work in the goal graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Worker responsible for this goal. Filled in at dispatch if unset.
    #[serde(default)]
    pub owner_agent: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: GoalStatus,
    /// Ids that must be `Done` before this goal may run. May name goals that
    /// have not been inserted yet.
    #[serde(default)]
    pub dependencies: Vec<GoalId>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// New pending goal with a fresh v4 UUID.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            owner_agent: None,
            priority: Priority::default(),
            status: GoalStatus::Pending,
            dependencies: Vec::new(),
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_agent = Some(owner.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, id: impl Into<GoalId>) -> Self {
        let id = id.into();
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub(crate) fn set_status(&mut self, status: GoalStatus) {
        if self.status != status {
            self.status = status;
            self.updated_at = Utc::now();
        }
    }
}

/// Outcome of one `act` call for a goal. A failure is data, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub goal_id: GoalId,
    pub agent: String,
    pub success: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub artifacts: Map<String, Value>,
    #[serde(default)]
    pub cost_tokens: u64,
    #[serde(default)]
    pub latency_ms: u64,
}

impl StepResult {
    pub fn success(goal: &Goal, agent: &str, content: impl Into<String>) -> Self {
        Self::new(goal, agent, true, content)
    }

    pub fn failure(goal: &Goal, agent: &str, content: impl Into<String>) -> Self {
        Self::new(goal, agent, false, content)
    }

    fn new(goal: &Goal, agent: &str, success: bool, content: impl Into<String>) -> Self {
        Self {
            goal_id: goal.id.clone(),
            agent: agent.to_string(),
            success,
            content: content.into(),
            artifacts: Map::new(),
            cost_tokens: 0,
            latency_ms: 0,
        }
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: Value) -> Self {
        self.artifacts.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    GoalAdded,
    GoalUpdated,
    ResultEmitted,
    SubgoalsAdded,
    PlanRewritten,
}

/// In-memory orchestration event for external observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventType, payload: Value) -> Self {
        Self {
            kind,
            payload,
            ts: Utc::now(),
        }
    }
}

/// Input to [`crate::dag::AdaptivePlanner::rewrite`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSignal {
    pub reason: String,
    /// Failed goals observed since the last rewrite.
    pub failures: usize,
    /// Batch size currently in effect.
    pub batch_size: usize,
}

/// Planner proposal. Applying `changes` is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRewrite {
    pub rationale: String,
    pub changes: Map<String, Value>,
}

impl PlanRewrite {
    /// Proposed batch size, if the rewrite carries one.
    pub fn batch_size(&self) -> Option<usize> {
        self.changes
            .get("batch_size")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    }
}
