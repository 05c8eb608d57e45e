//! Schedule state: an immutable partial assignment of tasks to processors.
//!
//! Every placement goes through [`ScheduleState::place`], which returns a new state and
//! keeps the cached bookkeeping (processor finish times, ready set, makespan, idle time,
//! remaining work) in step, so the heuristic never has to rescan the assignment.

use crate::graph::Graph;
use crate::interner::TaskId;
use crate::models::Time;

use super::types::{Placement, StateSignature, TaskMask};

/// Error returned when a placement would break the schedule's invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// The task still has unplaced predecessors.
    NotReady { task: TaskId },
    /// The task already has a placement.
    AlreadyPlaced { task: TaskId },
    /// The processor index is outside `0..processor_count`.
    ProcessorOutOfRange {
        processor: usize,
        processor_count: usize,
    },
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::NotReady { task } => {
                write!(f, "Task {} placed before all of its predecessors", task)
            }
            PlacementError::AlreadyPlaced { task } => {
                write!(f, "Task {} is already placed", task)
            }
            PlacementError::ProcessorOutOfRange {
                processor,
                processor_count,
            } => write!(
                f,
                "Processor {} out of range (processor count {})",
                processor, processor_count
            ),
        }
    }
}

impl std::error::Error for PlacementError {}

/// Partial or complete schedule.
///
/// Cloned on every expansion; all vectors are sized by task or processor count.
#[derive(Clone, Debug)]
pub struct ScheduleState {
    placements: Vec<Option<Placement>>,
    /// Task order on each processor
    sequences: Vec<Vec<TaskId>>,
    processor_finish: Vec<Time>,
    placed: TaskMask,
    ready: TaskMask,
    placed_count: usize,
    makespan: Time,
    /// Gaps left on processors by waiting for data
    idle_time: Time,
    remaining_work: Time,
}

impl ScheduleState {
    /// Empty schedule: nothing placed, every source task ready.
    pub fn initial(graph: &Graph, processor_count: usize) -> Self {
        let task_count = graph.task_count();
        let mut ready = TaskMask::new(task_count);
        for task in graph.task_ids() {
            if graph.predecessors(task).is_empty() {
                ready.insert(task);
            }
        }

        Self {
            placements: vec![None; task_count],
            sequences: vec![Vec::new(); processor_count],
            processor_finish: vec![0; processor_count],
            placed: TaskMask::new(task_count),
            ready,
            placed_count: 0,
            makespan: 0,
            idle_time: 0,
            remaining_work: graph.total_work(),
        }
    }

    pub fn processor_count(&self) -> usize {
        self.processor_finish.len()
    }

    pub fn task_count(&self) -> usize {
        self.placements.len()
    }

    /// Tasks whose predecessors are all placed, in ascending id order.
    pub fn ready_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.ready.iter()
    }

    pub fn is_ready(&self, task: TaskId) -> bool {
        self.ready.contains(task)
    }

    pub fn is_placed(&self, task: TaskId) -> bool {
        self.placed.contains(task)
    }

    pub fn placement(&self, task: TaskId) -> Option<Placement> {
        self.placements.get(task as usize).copied().flatten()
    }

    pub fn placed_count(&self) -> usize {
        self.placed_count
    }

    pub fn is_complete(&self) -> bool {
        self.placed_count == self.placements.len()
    }

    /// Finish time of the last placed task (0 for the empty schedule).
    pub fn makespan(&self) -> Time {
        self.makespan
    }

    /// Cost accumulated so far. Never decreases along an expansion path.
    pub fn cost_so_far(&self) -> Time {
        self.makespan
    }

    pub fn idle_time(&self) -> Time {
        self.idle_time
    }

    /// Cost of every task not placed yet.
    pub fn remaining_work(&self) -> Time {
        self.remaining_work
    }

    pub fn processor_finish(&self, processor: usize) -> Time {
        self.processor_finish[processor]
    }

    pub fn processor_finish_times(&self) -> &[Time] {
        &self.processor_finish
    }

    /// Tasks on `processor`, in placement (and start time) order.
    pub fn sequence(&self, processor: usize) -> &[TaskId] {
        &self.sequences[processor]
    }

    /// Processors a task may be put on without generating a symmetric duplicate:
    /// every busy processor, plus the lowest-indexed empty one.
    pub fn candidate_processors(&self) -> impl Iterator<Item = usize> + '_ {
        let first_empty = self.sequences.iter().position(|s| s.is_empty());
        self.sequences
            .iter()
            .enumerate()
            .filter(move |(index, sequence)| !sequence.is_empty() || Some(*index) == first_empty)
            .map(|(index, _)| index)
    }

    /// Earliest time `task` could start on `processor`, given what is placed.
    ///
    /// Unplaced predecessors are ignored; only meaningful for ready tasks.
    pub fn earliest_start(&self, graph: &Graph, task: TaskId, processor: usize) -> Time {
        graph
            .predecessors(task)
            .iter()
            .filter_map(|dep| {
                self.placement(dep.task).map(|p| {
                    if p.processor == processor {
                        p.finish
                    } else {
                        p.finish + dep.comm_cost
                    }
                })
            })
            .fold(self.processor_finish[processor], Time::max)
    }

    /// New state with `task` appended to `processor` at its earliest start.
    pub fn place(
        &self,
        graph: &Graph,
        task: TaskId,
        processor: usize,
    ) -> Result<ScheduleState, PlacementError> {
        if processor >= self.processor_count() {
            return Err(PlacementError::ProcessorOutOfRange {
                processor,
                processor_count: self.processor_count(),
            });
        }
        if self.is_placed(task) {
            return Err(PlacementError::AlreadyPlaced { task });
        }
        if !self.is_ready(task) {
            return Err(PlacementError::NotReady { task });
        }

        let start = self.earliest_start(graph, task, processor);
        let cost = graph.cost(task);
        let finish = start + cost;

        let mut next = self.clone();
        next.idle_time += start - self.processor_finish[processor];
        next.processor_finish[processor] = finish;
        next.sequences[processor].push(task);
        next.placements[task as usize] = Some(Placement {
            processor,
            start,
            finish,
        });
        next.placed.insert(task);
        next.ready.remove(task);
        next.placed_count += 1;
        next.makespan = next.makespan.max(finish);
        next.remaining_work -= cost;

        for succ in graph.successors(task) {
            if graph
                .predecessors(succ.task)
                .iter()
                .all(|p| next.placed.contains(p.task))
            {
                next.ready.insert(succ.task);
            }
        }

        Ok(next)
    }

    /// All children of this state: each ready task on each candidate processor.
    ///
    /// Ordered by task id, then processor index.
    pub fn successors(&self, graph: &Graph) -> Vec<ScheduleState> {
        let processors: Vec<usize> = self.candidate_processors().collect();
        let mut children = Vec::with_capacity(self.ready.len() * processors.len());
        for task in self.ready_tasks() {
            for &processor in &processors {
                // Only ready tasks on in-range processors reach here
                if let Ok(child) = self.place(graph, task, processor) {
                    children.push(child);
                }
            }
        }
        children
    }

    /// Canonical identity, invariant under relabelling processors.
    pub fn signature(&self) -> StateSignature {
        StateSignature::from_sequences(&self.sequences)
    }
}
