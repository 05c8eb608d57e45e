//! Conversion of search states into processor timelines, and independent checking of
//! finished schedules.

use rustc_hash::FxHashMap;

use crate::graph::Graph;
use crate::models::{ProcessorTimeline, Schedule, ScheduledTask, Time};
use crate::search::ScheduleState;

/// Project a state onto per-processor timelines ordered by start time.
///
/// Every processor gets a timeline, empty or not. Partial states yield only their
/// placed tasks.
pub fn extract(graph: &Graph, state: &ScheduleState) -> Schedule {
    let processors = (0..state.processor_count())
        .map(|processor| {
            let mut tasks: Vec<ScheduledTask> = state
                .sequence(processor)
                .iter()
                .filter_map(|&task| {
                    state.placement(task).map(|placement| ScheduledTask {
                        task_id: task,
                        label: graph.label(task).to_string(),
                        processor,
                        start: placement.start,
                        finish: placement.finish,
                    })
                })
                .collect();
            tasks.sort_by_key(|t| t.start);
            ProcessorTimeline { processor, tasks }
        })
        .collect();

    Schedule {
        processors,
        makespan: state.makespan(),
    }
}

/// Reason a schedule is not a valid schedule of a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleViolation {
    MissingTask(String),
    UnknownTask(String),
    DuplicateTask(String),
    /// The task is listed under a timeline with a different processor index.
    Misplaced { task: String, processor: usize },
    WrongDuration { task: String, expected: Time, actual: Time },
    Overlap {
        processor: usize,
        first: String,
        second: String,
    },
    /// The task starts before its predecessor's data can reach it.
    PrecedenceViolated {
        task: String,
        predecessor: String,
        available_at: Time,
        start: Time,
    },
    MakespanMismatch { reported: Time, actual: Time },
}

impl std::fmt::Display for ScheduleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleViolation::MissingTask(task) => write!(f, "Task '{}' is not scheduled", task),
            ScheduleViolation::UnknownTask(task) => {
                write!(f, "Task '{}' is not part of the graph", task)
            }
            ScheduleViolation::DuplicateTask(task) => {
                write!(f, "Task '{}' is scheduled more than once", task)
            }
            ScheduleViolation::Misplaced { task, processor } => write!(
                f,
                "Task '{}' listed on processor {} but claims another processor",
                task, processor
            ),
            ScheduleViolation::WrongDuration {
                task,
                expected,
                actual,
            } => write!(
                f,
                "Task '{}' runs for {} but costs {}",
                task, actual, expected
            ),
            ScheduleViolation::Overlap {
                processor,
                first,
                second,
            } => write!(
                f,
                "Tasks '{}' and '{}' overlap on processor {}",
                first, second, processor
            ),
            ScheduleViolation::PrecedenceViolated {
                task,
                predecessor,
                available_at,
                start,
            } => write!(
                f,
                "Task '{}' starts at {} but data from '{}' arrives at {}",
                task, start, predecessor, available_at
            ),
            ScheduleViolation::MakespanMismatch { reported, actual } => write!(
                f,
                "Reported makespan {} but last task finishes at {}",
                reported, actual
            ),
        }
    }
}

impl std::error::Error for ScheduleViolation {}

impl Schedule {
    /// Check that this is a complete, feasible schedule of `graph`: every task exactly
    /// once with its own duration, no overlap on a processor, and every task starting
    /// after its predecessors' data is available.
    pub fn validate(&self, graph: &Graph) -> Result<(), ScheduleViolation> {
        let mut by_label: FxHashMap<&str, &ScheduledTask> =
            FxHashMap::with_capacity_and_hasher(graph.task_count(), Default::default());

        for timeline in &self.processors {
            for entry in &timeline.tasks {
                let Some(task) = graph.task_id(&entry.label) else {
                    return Err(ScheduleViolation::UnknownTask(entry.label.clone()));
                };
                if entry.processor != timeline.processor {
                    return Err(ScheduleViolation::Misplaced {
                        task: entry.label.clone(),
                        processor: timeline.processor,
                    });
                }
                let expected = graph.cost(task);
                if entry.finish < entry.start || entry.finish - entry.start != expected {
                    return Err(ScheduleViolation::WrongDuration {
                        task: entry.label.clone(),
                        expected,
                        actual: entry.finish.saturating_sub(entry.start),
                    });
                }
                if by_label.insert(entry.label.as_str(), entry).is_some() {
                    return Err(ScheduleViolation::DuplicateTask(entry.label.clone()));
                }
            }

            let mut ordered: Vec<&ScheduledTask> = timeline.tasks.iter().collect();
            ordered.sort_by_key(|t| (t.start, t.finish));
            for pair in ordered.windows(2) {
                if pair[1].start < pair[0].finish {
                    return Err(ScheduleViolation::Overlap {
                        processor: timeline.processor,
                        first: pair[0].label.clone(),
                        second: pair[1].label.clone(),
                    });
                }
            }
        }

        for task in graph.task_ids() {
            let label = graph.label(task);
            let Some(entry) = by_label.get(label) else {
                return Err(ScheduleViolation::MissingTask(label.to_string()));
            };
            for dep in graph.predecessors(task) {
                let predecessor_label = graph.label(dep.task);
                let Some(predecessor) = by_label.get(predecessor_label) else {
                    return Err(ScheduleViolation::MissingTask(predecessor_label.to_string()));
                };
                let available_at = if predecessor.processor == entry.processor {
                    predecessor.finish
                } else {
                    predecessor.finish.saturating_add(dep.comm_cost)
                };
                if entry.start < available_at {
                    return Err(ScheduleViolation::PrecedenceViolated {
                        task: label.to_string(),
                        predecessor: predecessor_label.to_string(),
                        available_at,
                        start: entry.start,
                    });
                }
            }
        }

        let actual = self.iter().map(|t| t.finish).max().unwrap_or(0);
        if actual != self.makespan {
            return Err(ScheduleViolation::MakespanMismatch {
                reported: self.makespan,
                actual,
            });
        }

        Ok(())
    }
}
