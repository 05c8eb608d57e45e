//! Optimal scheduling of task graphs onto identical processors.
//!
//! Tasks form a DAG whose edges carry a communication cost, paid only when the two
//! ends run on different processors. [`schedule`] returns a minimum-makespan
//! placement, found by A* (or depth-first branch-and-bound for larger graphs) over
//! partial schedules, with duplicate detection that treats processors as
//! interchangeable.
//!
//! ```no_run
//! use optsched_rust::{schedule, EdgeSpec, Graph, SearchConfig, TaskSpec};
//!
//! let graph = Graph::build(
//!     &[TaskSpec::new("load", 3), TaskSpec::new("train", 4)],
//!     &[EdgeSpec::new("load", "train", 10)],
//! )?;
//! let outcome = schedule(&graph, &SearchConfig::new(2))?;
//! assert_eq!(outcome.makespan(), 7);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Allow clippy warning triggered by PyO3 macro expansion
#![cfg_attr(feature = "python", allow(clippy::useless_conversion))]

pub mod config;
pub mod extract;
pub mod graph;
pub mod greedy;
mod interner;
pub mod logging;
pub mod models;
#[cfg(feature = "python")]
mod python;
pub mod search;

pub use config::{SearchConfig, SearchStrategy};
pub use extract::{extract, ScheduleViolation};
pub use graph::{Dependency, Graph, GraphError};
pub use interner::TaskId;
pub use models::{
    EdgeSpec, ProcessorTimeline, Schedule, ScheduledTask, SearchOutcome, SearchStats, TaskSpec,
    Time,
};
pub use search::{
    CancellationToken, ExhaustionReason, PlacementError, ScheduleState, Scheduler,
    SchedulerError, SchedulerStatus,
};

/// Find a minimum-makespan schedule of `graph` under `config`.
///
/// Use [`Scheduler`] directly to cancel a run or watch its progress.
pub fn schedule(graph: &Graph, config: &SearchConfig) -> Result<SearchOutcome, SchedulerError> {
    Scheduler::new(graph, config.clone())?.schedule()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_entry_point() {
        let graph = Graph::build(
            &[
                TaskSpec::new("load", 3),
                TaskSpec::new("train", 4),
                TaskSpec::new("report", 1),
            ],
            &[
                EdgeSpec::new("load", "train", 10),
                EdgeSpec::new("load", "report", 0),
            ],
        )
        .unwrap();

        let outcome = schedule(&graph, &SearchConfig::new(2)).unwrap();
        assert_eq!(outcome.makespan(), 7);
        assert!(outcome.schedule.validate(&graph).is_ok());
    }

    #[test]
    fn test_graph_errors_convert() {
        let err: SchedulerError = Graph::build(&[TaskSpec::new("a", 1)], &[EdgeSpec::new("a", "a", 0)])
            .unwrap_err()
            .into();
        assert!(matches!(err, SchedulerError::InvalidGraph(GraphError::SelfLoop(_))));
        assert!(err.to_string().starts_with("Invalid graph"));
    }
}
