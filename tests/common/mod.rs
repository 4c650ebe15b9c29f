#![allow(dead_code)]

use std::path::Path;

use serde_json::Value;

pub use goalweaver_test_utils::builders;
pub use goalweaver_test_utils::scripted_agent::ScriptedAgent;
pub use goalweaver_test_utils::{init_tracing, with_timeout};

/// Parse the state file written by a run.
pub fn read_state(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("state file should exist");
    serde_json::from_str(&text).expect("state file should be valid JSON")
}

/// Status of `goal_id` in the snapshot's `goals` list.
pub fn snapshot_status(doc: &Value, goal_id: &str) -> Option<String> {
    doc["goals"]
        .as_array()?
        .iter()
        .find(|g| g["id"] == Value::String(goal_id.to_string()))
        .and_then(|g| g["status"].as_str())
        .map(str::to_string)
}
