// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::GoalId;

#[derive(Error, Debug)]
pub enum GoalweaverError {
    #[error("Duplicate goal: {0}")]
    DuplicateGoal(GoalId),

    #[error("Unknown goal: {0}")]
    UnknownGoal(GoalId),

    /// Graph-layer rejection; the graph is left exactly as it was.
    #[error("Cycle detected: goal '{goal}' cannot depend on '{depends_on}'")]
    CycleDetected { goal: GoalId, depends_on: GoalId },

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidToolArgs { tool: String, message: String },

    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Key '{0}' is a reserved store namespace")]
    ReservedKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in goal config: {0}")]
    DagCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GoalweaverError>;
