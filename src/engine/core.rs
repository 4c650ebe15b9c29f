// src/engine/core.rs

//! Pure loop-decision state machine.
//!
//! Given what the async shell observed in one iteration (unfinished goals,
//! size of the planned batch) the core decides whether to finish, dispatch,
//! wait one poll interval, or declare a stall. It owns the idle counter and
//! nothing else, so it can be unit tested without Tokio or a graph.

/// What the orchestrator loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDecision {
    /// No unfinished goals remain.
    Finish,
    /// Dispatch the planned batch.
    Dispatch,
    /// Work remains but nothing is READY yet; sleep and retry.
    Wait { idle_loops: u32 },
    /// The idle budget is exhausted; fail what remains and stop.
    Stall,
}

#[derive(Debug, Clone)]
pub struct LoopCore {
    idle_loops: u32,
    max_idle_loops: u32,
}

impl LoopCore {
    pub fn new(max_idle_loops: u32) -> Self {
        Self {
            idle_loops: 0,
            max_idle_loops: max_idle_loops.max(1),
        }
    }

    pub fn idle_loops(&self) -> u32 {
        self.idle_loops
    }

    pub fn step(&mut self, unfinished: usize, batch_len: usize) -> LoopDecision {
        if unfinished == 0 {
            return LoopDecision::Finish;
        }

        if batch_len > 0 {
            self.idle_loops = 0;
            return LoopDecision::Dispatch;
        }

        self.idle_loops += 1;
        if self.idle_loops >= self.max_idle_loops {
            LoopDecision::Stall
        } else {
            LoopDecision::Wait {
                idle_loops: self.idle_loops,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_when_nothing_remains() {
        let mut core = LoopCore::new(3);
        assert_eq!(core.step(0, 0), LoopDecision::Finish);
    }

    #[test]
    fn stalls_after_budget_and_resets_on_dispatch() {
        let mut core = LoopCore::new(3);
        assert_eq!(core.step(2, 0), LoopDecision::Wait { idle_loops: 1 });
        assert_eq!(core.step(2, 0), LoopDecision::Wait { idle_loops: 2 });
        assert_eq!(core.step(2, 1), LoopDecision::Dispatch);
        assert_eq!(core.idle_loops(), 0);

        assert_eq!(core.step(1, 0), LoopDecision::Wait { idle_loops: 1 });
        assert_eq!(core.step(1, 0), LoopDecision::Wait { idle_loops: 2 });
        assert_eq!(core.step(1, 0), LoopDecision::Stall);
    }

    #[test]
    fn zero_budget_is_clamped_to_one() {
        let mut core = LoopCore::new(0);
        assert_eq!(core.step(1, 0), LoopDecision::Stall);
    }
}
