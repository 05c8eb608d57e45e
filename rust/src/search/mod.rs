//! State-space search for minimum-makespan schedules.
//!
//! States are [`ScheduleState`] values expanded one placement at a time. Two
//! exploration orders are provided over the same state space:
//! - A* (best-first, open heap plus closed signature map), for small and medium graphs
//! - depth-first branch-and-bound (explicit stack, greedy incumbent), when A* would
//!   not fit in memory
//!
//! Both run single-threaded or, with `parallelism > 1`, on a pool of workers sharing
//! one frontier. [`Scheduler`] picks the strategy and turns the outcome into a
//! [`crate::Schedule`] or a [`SchedulerError`].

mod astar;
mod branch_bound;
mod budget;
mod engine;
pub mod heuristic;
mod parallel;
mod state;
mod types;

pub use budget::{CancellationToken, ExhaustionReason};
pub use engine::{Scheduler, SchedulerError, SchedulerStatus};
pub use state::{PlacementError, ScheduleState};
pub use types::{Placement, StateSignature, TaskMask};

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering as AtomicOrdering};

use crate::config::SearchConfig;
use crate::graph::Graph;
use crate::models::Time;

use budget::Budget;

/// Expansions between two progress log lines.
const PROGRESS_LOG_INTERVAL: u64 = 100_000;

/// Everything a search procedure borrows for one run.
pub(crate) struct SearchContext<'a> {
    pub graph: &'a Graph,
    pub config: &'a SearchConfig,
    pub budget: &'a Budget,
    pub progress: &'a SearchProgress,
}

/// How a search procedure ended.
#[derive(Debug)]
pub(crate) enum Termination {
    /// Proven optimal complete state.
    Solved(ScheduleState),
    /// Stopped early; `lower_bound` is the smallest `f` left unexplored.
    Exhausted {
        reason: ExhaustionReason,
        lower_bound: Time,
        incumbent: ScheduleState,
    },
}

/// Ordering key of a state: `max(cost so far, estimate)`, never below the parent's.
pub(crate) fn f_value(graph: &Graph, state: &ScheduleState, parent_f: Time) -> Time {
    let g = state.cost_so_far();
    let h = heuristic::estimate(graph, state).saturating_sub(g);
    (g + h).max(parent_f)
}

/// Frontier entry.
#[derive(Debug)]
pub(crate) struct SearchNode {
    pub f: Time,
    pub state: ScheduleState,
    pub signature: StateSignature,
}

impl SearchNode {
    pub(crate) fn new(f: Time, state: ScheduleState) -> Self {
        let signature = state.signature();
        Self {
            f,
            state,
            signature,
        }
    }
}

/// `BinaryHeap` pops the greatest node, so "greater" means "expand first": lower `f`,
/// then higher cost so far, then more tasks placed, then the smaller signature.
impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.state.cost_so_far().cmp(&other.state.cost_so_far()))
            .then_with(|| self.state.placed_count().cmp(&other.state.placed_count()))
            .then_with(|| other.signature.cmp(&self.signature))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

/// Live counters, readable from other threads while a search runs.
#[derive(Debug, Default)]
pub(crate) struct SearchProgress {
    expanded: AtomicU64,
    generated: AtomicU64,
    pruned: AtomicU64,
    duplicates: AtomicU64,
    status: AtomicU8,
}

/// Counter values at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProgressSnapshot {
    pub expanded: u64,
    pub generated: u64,
    pub pruned: u64,
    pub duplicates: u64,
}

impl SearchProgress {
    /// Count one expansion; returns the new total.
    pub(crate) fn expanded(&self) -> u64 {
        self.expanded.fetch_add(1, AtomicOrdering::Relaxed) + 1
    }

    pub(crate) fn generated(&self, count: u64) {
        self.generated.fetch_add(count, AtomicOrdering::Relaxed);
    }

    pub(crate) fn pruned(&self, count: u64) {
        self.pruned.fetch_add(count, AtomicOrdering::Relaxed);
    }

    pub(crate) fn duplicates(&self, count: u64) {
        self.duplicates.fetch_add(count, AtomicOrdering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            expanded: self.expanded.load(AtomicOrdering::Relaxed),
            generated: self.generated.load(AtomicOrdering::Relaxed),
            pruned: self.pruned.load(AtomicOrdering::Relaxed),
            duplicates: self.duplicates.load(AtomicOrdering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.expanded,
            &self.generated,
            &self.pruned,
            &self.duplicates,
        ] {
            counter.store(0, AtomicOrdering::Relaxed);
        }
    }

    pub(crate) fn status(&self) -> SchedulerStatus {
        SchedulerStatus::from_u8(self.status.load(AtomicOrdering::Acquire))
    }

    pub(crate) fn set_status(&self, status: SchedulerStatus) {
        self.status.store(status as u8, AtomicOrdering::Release);
    }
}

/// Log expansion counters every `PROGRESS_LOG_INTERVAL` expansions.
pub(crate) fn log_progress(ctx: &SearchContext<'_>, expanded: u64, bound: Time, incumbent: Time) {
    if expanded % PROGRESS_LOG_INTERVAL == 0 {
        let counters = ctx.progress.snapshot();
        crate::log_checks!(
            ctx.config.verbosity,
            "expanded={} generated={} pruned={} duplicates={} bound={} incumbent={}",
            counters.expanded,
            counters.generated,
            counters.pruned,
            counters.duplicates,
            bound,
            incumbent
        );
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{EdgeSpec, TaskSpec};

    pub(crate) fn make_graph(tasks: &[(&str, Time)], edges: &[(&str, &str, Time)]) -> Graph {
        let tasks: Vec<TaskSpec> = tasks.iter().map(|(l, c)| TaskSpec::new(*l, *c)).collect();
        let edges: Vec<EdgeSpec> = edges
            .iter()
            .map(|(s, d, c)| EdgeSpec::new(*s, *d, *c))
            .collect();
        Graph::build(&tasks, &edges).unwrap()
    }

    /// Optimal makespan by trying every placement order.
    pub(crate) fn brute_force_makespan(graph: &Graph, state: &ScheduleState) -> Time {
        if state.is_complete() {
            return state.makespan();
        }
        state
            .successors(graph)
            .iter()
            .map(|child| brute_force_makespan(graph, child))
            .min()
            .unwrap_or(Time::MAX)
    }

    /// Fork-join graph used across the engine tests.
    pub(crate) fn make_fork_join() -> Graph {
        make_graph(
            &[
                ("src", 2),
                ("left", 3),
                ("mid", 3),
                ("right", 2),
                ("sink", 2),
            ],
            &[
                ("src", "left", 1),
                ("src", "mid", 2),
                ("src", "right", 4),
                ("left", "sink", 1),
                ("mid", "sink", 1),
                ("right", "sink", 3),
            ],
        )
    }
}
