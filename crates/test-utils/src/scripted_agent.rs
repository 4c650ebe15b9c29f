use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use goalweaver::agent::{Agent, AgentContext};
use goalweaver::errors::{GoalweaverError, Result};
use goalweaver::types::{Goal, StepResult};

/// A fake agent that:
/// - records which goals it acted on (by title)
/// - optionally sleeps inside `act`, tracking peak concurrency
/// - fails, errors or panics for scripted titles (in `act`, or after it)
/// - proposes scripted subgoals (owned by itself) after acting, optionally
///   depending on a sibling from the same proposal
pub struct ScriptedAgent {
    name: String,
    delay: Duration,
    fail_titles: HashSet<String>,
    error_titles: HashSet<String>,
    panic_titles: HashSet<String>,
    late_panic_titles: HashSet<String>,
    /// parent title -> (child title, optional sibling title it waits for)
    subgoals: HashMap<String, Vec<(String, Option<String>)>>,
    acted: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            fail_titles: HashSet::new(),
            error_titles: HashSet::new(),
            panic_titles: HashSet::new(),
            late_panic_titles: HashSet::new(),
            subgoals: HashMap::new(),
            acted: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `act` returns an unsuccessful result for this title.
    pub fn failing_on(mut self, title: &str) -> Self {
        self.fail_titles.insert(title.to_string());
        self
    }

    /// `act` returns `Err` for this title.
    pub fn erroring_on(mut self, title: &str) -> Self {
        self.error_titles.insert(title.to_string());
        self
    }

    /// `act` panics for this title.
    pub fn panicking_on(mut self, title: &str) -> Self {
        self.panic_titles.insert(title.to_string());
        self
    }

    /// `act` succeeds for this title, then `propose_subgoals` panics.
    pub fn panicking_after_act_on(mut self, title: &str) -> Self {
        self.late_panic_titles.insert(title.to_string());
        self
    }

    /// After acting on `parent`, propose a subgoal titled `child`.
    pub fn proposing(mut self, parent: &str, child: &str) -> Self {
        self.subgoals
            .entry(parent.to_string())
            .or_default()
            .push((child.to_string(), None));
        self
    }

    /// Like [`proposing`](Self::proposing), but `child` depends on the
    /// sibling titled `after`, which must be proposed for the same parent
    /// before it.
    pub fn proposing_after(mut self, parent: &str, child: &str, after: &str) -> Self {
        self.subgoals
            .entry(parent.to_string())
            .or_default()
            .push((child.to_string(), Some(after.to_string())));
        self
    }

    /// Titles acted on, in call order.
    pub fn acted(&self) -> Vec<String> {
        self.acted.lock().unwrap().clone()
    }

    /// Highest number of simultaneous `act` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn act(&self, goal: &Goal, _ctx: &AgentContext) -> Result<StepResult> {
        self.acted.lock().unwrap().push(goal.title.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_titles.contains(&goal.title) {
            panic!("scripted panic for '{}'", goal.title);
        }
        if self.error_titles.contains(&goal.title) {
            return Err(GoalweaverError::ToolFailed {
                tool: "scripted".to_string(),
                message: format!("scripted error for '{}'", goal.title),
            });
        }
        if self.fail_titles.contains(&goal.title) {
            return Ok(StepResult::failure(goal, &self.name, "scripted failure"));
        }
        Ok(StepResult::success(
            goal,
            &self.name,
            format!("done: {}", goal.title),
        ))
    }

    async fn propose_subgoals(&self, goal: &Goal, _result: &StepResult) -> Result<Vec<Goal>> {
        if self.late_panic_titles.contains(&goal.title) {
            panic!("scripted panic while proposing for '{}'", goal.title);
        }
        let Some(children) = self.subgoals.get(&goal.title) else {
            return Ok(Vec::new());
        };

        let mut proposed: Vec<Goal> = Vec::with_capacity(children.len());
        for (title, after) in children {
            let mut sub = Goal::new(title.clone()).with_owner(self.name.clone());
            if let Some(after) = after {
                let sibling = proposed
                    .iter()
                    .find(|g| &g.title == after)
                    .unwrap_or_else(|| panic!("'{after}' must be proposed before '{title}'"));
                sub = sub.depends_on(sibling.id.clone());
            }
            proposed.push(sub);
        }
        Ok(proposed)
    }
}
