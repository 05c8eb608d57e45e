//! Plain value types crossing the crate boundary.
//!
//! Inputs (`TaskSpec`, `EdgeSpec`) are handed to [`crate::Graph::build`] by whatever
//! parses the task graph; outputs (`Schedule`, `SearchOutcome`) are what the caller
//! writes back out.

use std::time::Duration;

use crate::config::SearchStrategy;

/// Durations, start times and communication costs, in abstract integer time units.
pub type Time = u64;

/// A task as declared in the input graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSpec {
    pub label: String,
    pub cost: Time,
}

impl TaskSpec {
    pub fn new(label: impl Into<String>, cost: Time) -> Self {
        Self {
            label: label.into(),
            cost,
        }
    }
}

/// A dependency edge as declared in the input graph.
///
/// `comm_cost` is only paid when `source` and `destination` end up on different
/// processors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeSpec {
    pub source: String,
    pub destination: String,
    pub comm_cost: Time,
}

impl EdgeSpec {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, comm_cost: Time) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            comm_cost,
        }
    }
}

/// A task that has been placed on a processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledTask {
    pub task_id: u32,
    pub label: String,
    pub processor: usize,
    pub start: Time,
    pub finish: Time,
}

/// Everything placed on one processor, ordered by start time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessorTimeline {
    pub processor: usize,
    pub tasks: Vec<ScheduledTask>,
}

impl ProcessorTimeline {
    /// Finish time of the last task on this processor (0 when idle).
    pub fn finish_time(&self) -> Time {
        self.tasks.last().map(|t| t.finish).unwrap_or(0)
    }
}

/// Processor-indexed timeline produced from a terminal search state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    pub processors: Vec<ProcessorTimeline>,
    pub makespan: Time,
}

impl Schedule {
    /// Number of placed tasks across all processors.
    pub fn task_count(&self) -> usize {
        self.processors.iter().map(|p| p.tasks.len()).sum()
    }

    /// Iterate over every placed task, processor by processor.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.processors.iter().flat_map(|p| p.tasks.iter())
    }

    /// Look up the placement of a task by label.
    pub fn find(&self, label: &str) -> Option<&ScheduledTask> {
        self.iter().find(|t| t.label == label)
    }
}

/// Counters describing a search run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// States popped and expanded.
    pub expanded: u64,
    /// Successor states generated.
    pub generated: u64,
    /// States discarded because their bound could not beat the incumbent.
    pub pruned: u64,
    /// States discarded because an equivalent state was already recorded.
    pub duplicates: u64,
    /// Strategy that produced the result.
    pub strategy: SearchStrategy,
    /// Whether A* ran out of memory budget and branch-and-bound took over.
    pub fell_back: bool,
    pub elapsed: Duration,
}

/// Result of a successful scheduling run.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub schedule: Schedule,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn makespan(&self) -> Time {
        self.schedule.makespan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(task_id: u32, label: &str, processor: usize, start: Time, finish: Time) -> ScheduledTask {
        ScheduledTask {
            task_id,
            label: label.to_string(),
            processor,
            start,
            finish,
        }
    }

    #[test]
    fn test_schedule_lookup() {
        let schedule = Schedule {
            processors: vec![
                ProcessorTimeline {
                    processor: 0,
                    tasks: vec![placed(0, "a", 0, 0, 3), placed(1, "b", 0, 3, 7)],
                },
                ProcessorTimeline {
                    processor: 1,
                    tasks: vec![],
                },
            ],
            makespan: 7,
        };

        assert_eq!(schedule.task_count(), 2);
        assert_eq!(schedule.find("b").map(|t| t.start), Some(3));
        assert!(schedule.find("c").is_none());
        assert_eq!(schedule.processors[0].finish_time(), 7);
        assert_eq!(schedule.processors[1].finish_time(), 0);
    }

    #[test]
    fn test_input_constructors() {
        let task = TaskSpec::new("a", 5);
        let edge = EdgeSpec::new("a", "b", 2);
        assert_eq!(task.label, "a");
        assert_eq!(task.cost, 5);
        assert_eq!(edge.destination, "b");
        assert_eq!(edge.comm_cost, 2);
    }
}
