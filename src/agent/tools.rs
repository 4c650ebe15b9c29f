// src/agent/tools.rs

//! Tool capabilities invoked by agents (never by the orchestrator).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::errors::{GoalweaverError, Result};

/// Keyword arguments for a tool call.
pub type ToolArgs = Map<String, Value>;

/// A named, callable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(&self, args: ToolArgs) -> Result<Value>;
}

/// Required string argument, or `InvalidToolArgs`.
pub fn required_str<'a>(tool: &str, args: &'a ToolArgs, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GoalweaverError::InvalidToolArgs {
            tool: tool.to_string(),
            message: format!("requires string argument '{key}'"),
        })
}

/// Tools keyed by lower-cased name. Lookup of an unknown name is an error.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let key = tool.name().to_lowercase();
        if self.tools.contains_key(&key) {
            return Err(GoalweaverError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.insert(key, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| GoalweaverError::ToolNotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Look up `name` and invoke it.
    pub async fn call(&self, name: &str, args: ToolArgs) -> Result<Value> {
        let tool = self.get(name)?;
        debug!(tool = %name, "invoking tool");
        tool.invoke(args).await
    }
}

/// Offline search stand-in returning canned results.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    latency: Duration,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(50),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Lightweight demo search"
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value> {
        let query = required_str(self.name(), &args, "query")?;
        let top_k = args.get("top_k").and_then(Value::as_u64).unwrap_or(3);

        tokio::time::sleep(self.latency).await;

        let results: Vec<Value> = (1..=top_k)
            .map(|i| Value::String(format!("Result {i} for '{query}'")))
            .collect();
        Ok(Value::Array(results))
    }
}

/// Writes `{"content": ...}` as pretty JSON to `path`, creating parent dirs.
#[derive(Debug, Clone, Default)]
pub struct JsonWriteTool {
    root: Option<PathBuf>,
}

impl JsonWriteTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root` instead of the working directory.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[async_trait]
impl Tool for JsonWriteTool {
    fn name(&self) -> &str {
        "json_write"
    }

    fn description(&self) -> &str {
        "Write JSON file"
    }

    async fn invoke(&self, args: ToolArgs) -> Result<Value> {
        let rel = required_str(self.name(), &args, "path")?;
        let content = args.get("content").and_then(Value::as_str).unwrap_or("");

        let path = match &self.root {
            Some(root) => root.join(rel),
            None => PathBuf::from(rel),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let body = serde_json::to_vec_pretty(&json!({ "content": content }))?;
        tokio::fs::write(&path, body).await?;

        Ok(Value::String(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> ToolArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn registry_is_case_insensitive_and_fails_closed() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(WebSearchTool::with_latency(Duration::ZERO)))
            .unwrap();
        registry.register(Arc::new(JsonWriteTool::new())).unwrap();

        assert_eq!(registry.list(), vec!["json_write", "web_search"]);
        assert!(registry.get("WEB_SEARCH").is_ok());
        assert!(matches!(
            registry.get("shell"),
            Err(GoalweaverError::ToolNotFound(_))
        ));
        assert!(matches!(
            registry.register(Arc::new(WebSearchTool::new())),
            Err(GoalweaverError::DuplicateTool(_))
        ));

        let out = registry
            .call("web_search", args(&[("query", json!("rag")), ("top_k", json!(2))]))
            .await
            .unwrap();
        assert_eq!(out, json!(["Result 1 for 'rag'", "Result 2 for 'rag'"]));
    }

    #[tokio::test]
    async fn missing_arguments_are_reported() {
        let tool = WebSearchTool::with_latency(Duration::ZERO);
        let err = tool.invoke(ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, GoalweaverError::InvalidToolArgs { .. }));
    }

    #[tokio::test]
    async fn json_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let tool = JsonWriteTool::rooted(dir.path());

        let out = tool
            .invoke(args(&[("path", json!("artifacts/draft.json")), ("content", json!("hi"))]))
            .await
            .unwrap();

        let written = std::fs::read_to_string(out.as_str().unwrap()).unwrap();
        let doc: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(doc, json!({"content": "hi"}));
    }
}
