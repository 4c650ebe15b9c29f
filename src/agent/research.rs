// src/agent/research.rs

//! Demo research team: `researcher` -> `writer` -> `critic`.
//!
//! Each researched topic spawns a writing goal, each draft spawns a review
//! goal. Used by the `goalweaver` binary when no config file is given.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::agent::tools::{JsonWriteTool, ToolArgs, ToolRegistry, WebSearchTool};
use crate::agent::{Agent, AgentContext, AgentRegistry};
use crate::errors::Result;
use crate::store::SharedStore;
use crate::types::{Goal, Priority, StepResult};

/// Appends a reflection record to the store, if the agent has one.
async fn log_reflection(
    store: Option<&SharedStore>,
    agent: &str,
    goal: &Goal,
    result: &StepResult,
) {
    if let Some(store) = store {
        store
            .append_log(json!({
                "agent": agent,
                "goal": goal.id,
                "note": format!("Reflection: success={}", result.success),
            }))
            .await;
    }
}

fn args(pairs: [(&str, Value); 2]) -> ToolArgs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub struct Researcher {
    tools: ToolRegistry,
    store: Option<Arc<SharedStore>>,
}

#[async_trait]
impl Agent for Researcher {
    fn name(&self) -> &str {
        "researcher"
    }

    async fn act(&self, goal: &Goal, _ctx: &AgentContext) -> Result<StepResult> {
        let found = self
            .tools
            .call("web_search", args([("query", json!(goal.title)), ("top_k", json!(2))]))
            .await?;

        let content = found
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Ok(StepResult::success(goal, self.name(), content))
    }

    async fn reflect(&self, goal: &Goal, result: &StepResult) -> Result<()> {
        log_reflection(self.store.as_deref(), self.name(), goal, result).await;
        Ok(())
    }

    async fn propose_subgoals(&self, goal: &Goal, result: &StepResult) -> Result<Vec<Goal>> {
        let write = Goal::new(format!("Write: {}", goal.title))
            .with_description(result.content.clone())
            .with_owner("writer")
            .with_priority(Priority::High);
        Ok(vec![write])
    }
}

pub struct Writer {
    tools: ToolRegistry,
    store: Option<Arc<SharedStore>>,
}

#[async_trait]
impl Agent for Writer {
    fn name(&self) -> &str {
        "writer"
    }

    async fn act(&self, goal: &Goal, _ctx: &AgentContext) -> Result<StepResult> {
        let draft: String = goal.description.chars().take(500).collect();
        let path = self
            .tools
            .call(
                "json_write",
                args([
                    ("path", json!(format!("artifacts/draft-{}.json", goal.id))),
                    ("content", json!(draft)),
                ]),
            )
            .await?;

        let path = path.as_str().unwrap_or_default().to_string();
        Ok(StepResult::success(goal, self.name(), format!("Draft at {path}"))
            .with_artifact("draft_path", json!(path)))
    }

    async fn reflect(&self, goal: &Goal, result: &StepResult) -> Result<()> {
        log_reflection(self.store.as_deref(), self.name(), goal, result).await;
        Ok(())
    }

    async fn propose_subgoals(&self, goal: &Goal, result: &StepResult) -> Result<Vec<Goal>> {
        let review = Goal::new(format!("Review: {}", goal.title))
            .with_description(result.content.clone())
            .with_owner("critic");
        Ok(vec![review])
    }
}

pub struct Critic {
    store: Option<Arc<SharedStore>>,
}

#[async_trait]
impl Agent for Critic {
    fn name(&self) -> &str {
        "critic"
    }

    async fn act(&self, goal: &Goal, _ctx: &AgentContext) -> Result<StepResult> {
        Ok(StepResult::success(
            goal,
            self.name(),
            "Looks coherent; add references.",
        ))
    }

    async fn reflect(&self, goal: &Goal, result: &StepResult) -> Result<()> {
        log_reflection(self.store.as_deref(), self.name(), goal, result).await;
        Ok(())
    }
}

/// Tools used by the research team, with drafts written under `workdir`.
pub fn research_tools(workdir: impl Into<std::path::PathBuf>) -> Result<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(WebSearchTool::new()))?;
    tools.register(Arc::new(JsonWriteTool::rooted(workdir)))?;
    Ok(tools)
}

/// Register `researcher`, `writer` and `critic`, in that order.
pub fn build_research_team(
    tools: &ToolRegistry,
    store: Option<Arc<SharedStore>>,
) -> Result<AgentRegistry> {
    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(Researcher {
        tools: tools.clone(),
        store: store.clone(),
    }))?;
    agents.register(Arc::new(Writer {
        tools: tools.clone(),
        store: store.clone(),
    }))?;
    agents.register(Arc::new(Critic { store }))?;
    Ok(agents)
}

/// Seed goals for the demo run.
pub fn seed_goals() -> Vec<Goal> {
    vec![
        Goal::new("Contrastive learning for multimodal retrieval")
            .with_owner("researcher")
            .with_priority(Priority::Critical),
        Goal::new("Survey recent RAG optimizations")
            .with_owner("researcher")
            .with_priority(Priority::High),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[tokio::test]
    async fn researcher_proposes_writing_goal() {
        let dir = tempfile::tempdir().unwrap();
        let tools = research_tools(dir.path()).unwrap();
        let store = Arc::new(SharedStore::with_fs(
            Arc::new(MockFileSystem::new()),
            "state.json",
        ));
        let team = build_research_team(&tools, Some(store.clone())).unwrap();
        assert_eq!(team.names(), vec!["researcher", "writer", "critic"]);

        let researcher = team.get("researcher").unwrap();
        let goal = seed_goals().remove(1);
        let result = researcher.act(&goal, &AgentContext::default()).await.unwrap();
        assert!(result.success);
        assert!(result.content.contains("Result 1 for 'Survey recent RAG optimizations'"));

        researcher.reflect(&goal, &result).await.unwrap();
        assert_eq!(store.export_logs().await.len(), 1);

        let subs = researcher.propose_subgoals(&goal, &result).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].owner_agent.as_deref(), Some("writer"));
        assert_eq!(subs[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn writer_drafts_into_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let tools = research_tools(dir.path()).unwrap();
        let team = build_research_team(&tools, None).unwrap();

        let goal = Goal::new("Write: topic").with_description("body text");
        let result = team
            .get("writer")
            .unwrap()
            .act(&goal, &AgentContext::default())
            .await
            .unwrap();

        let path = result.artifacts["draft_path"].as_str().unwrap().to_string();
        assert!(path.starts_with(&dir.path().display().to_string()));
        assert!(std::path::Path::new(&path).exists());
    }
}
