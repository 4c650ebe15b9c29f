// src/lib.rs

pub mod agent;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod store;
pub mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::agent::research::{build_research_team, research_tools, seed_goals};
use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::{ConfigFile, OrchestratorSection};
use crate::config::validate::validate_config;
use crate::engine::{Orchestrator, RunOptions, RunOutcome};
use crate::store::SharedStore;
use crate::types::GoalId;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (or the built-in demo)
/// - the shared store at `state_path`
/// - the research agent team and its tools
/// - the orchestrator and its seed goals
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    let state_path = PathBuf::from(&cfg.orchestrator.state_path);
    let store = Arc::new(SharedStore::open(&state_path));
    let tools = research_tools(state_root_dir(&state_path))?;
    let agents = build_research_team(&tools, Some(Arc::clone(&store)))?;
    let orchestrator = Orchestrator::new(
        store,
        agents,
        RunOptions::from(&cfg.orchestrator),
    );

    let seeded = seed(&orchestrator, cfg.config())?;
    info!(goals = seeded.len(), "goals seeded");

    if args.dry_run {
        print_dry_run(&orchestrator, &cfg.orchestrator);
        return Ok(());
    }

    let report = orchestrator.run().await?;
    println!(
        "goalweaver: {} after {} iteration(s); dispatched {}, succeeded {}, failed {}",
        match report.outcome {
            RunOutcome::Completed => "completed",
            RunOutcome::Stalled { .. } => "stalled",
        },
        report.iterations,
        report.dispatched,
        report.succeeded,
        report.failed,
    );
    println!("state written to {}", state_path.display());
    Ok(())
}

/// Config plus CLI overrides, or the demo defaults when no config is found.
///
/// `cfg` is `None` for the demo, which seeds the research topics instead of
/// `[goal.*]` sections.
struct ResolvedConfig {
    orchestrator: OrchestratorSection,
    cfg: Option<ConfigFile>,
}

impl ResolvedConfig {
    fn config(&self) -> Option<&ConfigFile> {
        self.cfg.as_ref()
    }
}

fn resolve_config(args: &CliArgs) -> Result<ResolvedConfig> {
    let path = match &args.config {
        Some(p) => Some(PathBuf::from(p)),
        None => Some(default_config_path()).filter(|p| p.exists()),
    };

    let mut cfg = match path {
        Some(path) => {
            let cfg = load_and_validate(&path)
                .with_context(|| format!("loading config {}", path.display()))?;
            debug!(path = %path.display(), goals = cfg.goal.len(), "config loaded");
            Some(cfg)
        }
        None => {
            debug!("no config file; using the built-in research demo");
            None
        }
    };

    let mut orchestrator = cfg
        .as_ref()
        .map(|c| c.orchestrator.clone())
        .unwrap_or_default();
    if let Some(state_file) = &args.state_file {
        orchestrator.state_path = state_file.clone();
    }
    if let Some(batch_size) = args.batch_size {
        orchestrator.batch_size = batch_size;
    }

    if let Some(cfg) = cfg.as_mut() {
        cfg.orchestrator = orchestrator.clone();
        validate_config(cfg)?;
    } else if orchestrator.batch_size == 0 {
        anyhow::bail!("--batch-size must be >= 1");
    }

    Ok(ResolvedConfig { orchestrator, cfg })
}

/// Seed goals from the config, or the demo topics without one. Returns the
/// config key (or title for demo goals) to goal id mapping.
fn seed(orchestrator: &Orchestrator, cfg: Option<&ConfigFile>) -> Result<BTreeMap<String, GoalId>> {
    let goals = match cfg {
        Some(cfg) => cfg.build_goals(),
        None => seed_goals()
            .into_iter()
            .map(|g| (g.title.clone(), g))
            .collect(),
    };

    let mut seeded = BTreeMap::new();
    for (key, goal) in goals {
        let id = goal.id.clone();
        orchestrator
            .add_goal(goal)
            .with_context(|| format!("seeding goal '{key}'"))?;
        seeded.insert(key, id);
    }
    Ok(seeded)
}

/// Tool output (drafts) lands next to the state file.
fn state_root_dir(state_path: &Path) -> PathBuf {
    match state_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Print the seeded goals in dependency order without dispatching.
fn print_dry_run(orchestrator: &Orchestrator, section: &OrchestratorSection) {
    println!("goalweaver dry-run");
    println!("  orchestrator.batch_size = {}", section.batch_size);
    println!("  orchestrator.state_path = {}", section.state_path);
    println!("  orchestrator.max_idle_loops = {}", section.max_idle_loops);
    println!("  orchestrator.poll_interval_ms = {}", section.poll_interval_ms);
    println!();

    let goals = orchestrator.ordered_goals();
    println!("goals ({}):", goals.len());
    for goal in &goals {
        println!("  - {} [{}]", goal.title, goal.id);
        println!("      priority: {:?}", goal.priority);
        if let Some(owner) = &goal.owner_agent {
            println!("      owner: {owner}");
        }
        if !goal.dependencies.is_empty() {
            println!("      after: {:?}", goal.dependencies);
        }
    }

    debug!("dry-run complete (no dispatch)");
}
