#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use goalweaver::config::{ConfigFile, GoalConfig, OrchestratorSection, RawConfigFile};
use goalweaver::engine::RunOptions;
use goalweaver::types::Priority;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                orchestrator: OrchestratorSection::default(),
                goal: Default::default(),
            },
        }
    }

    pub fn with_goal(mut self, key: &str, goal: GoalConfig) -> Self {
        self.config.goal.insert(key.to_string(), goal);
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.orchestrator.batch_size = n;
        self
    }

    pub fn state_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.orchestrator.state_path = path.as_ref().display().to_string();
        self
    }

    pub fn max_idle_loops(mut self, n: u32) -> Self {
        self.config.orchestrator.max_idle_loops = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.orchestrator.poll_interval_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `GoalConfig`.
pub struct GoalConfigBuilder {
    goal: GoalConfig,
}

impl GoalConfigBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            goal: GoalConfig::new(title),
        }
    }

    pub fn after(mut self, key: &str) -> Self {
        self.goal.after.push(key.to_string());
        self
    }

    pub fn owner(mut self, agent: &str) -> Self {
        self.goal.owner = Some(agent.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.goal.priority = priority;
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.goal.description = text.to_string();
        self
    }

    pub fn build(self) -> GoalConfig {
        self.goal
    }
}

/// Run options tuned for fast tests: short poll interval and idle budget.
pub fn fast_run_options(state_path: impl AsRef<Path>, batch_size: usize) -> RunOptions {
    RunOptions {
        batch_size,
        snapshot_path: state_path.as_ref().to_path_buf(),
        max_idle_loops: 5,
        poll_interval: Duration::from_millis(5),
        adapt_on_failure: true,
    }
}
