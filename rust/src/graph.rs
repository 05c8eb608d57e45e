//! Immutable task graph with the static per-task metrics the search relies on.
//!
//! `Graph::build` validates the input (unique labels, edges between declared tasks,
//! no self loops or parallel edges, acyclicity) and precomputes, once:
//! - a deterministic topological order,
//! - computation-only bottom and top levels (admissible, communication can always be
//!   avoided by co-locating tasks),
//! - communication-inclusive bottom levels, used only as a static priority,
//! - the critical path length and the total work.
//!
//! Construction also rejects weights whose sum does not fit in [`Time`]: every
//! start and finish time the search computes is bounded by [`Graph::horizon`].

use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::interner::{TaskId, TaskIdInterner};
use crate::models::{EdgeSpec, TaskSpec, Time};

/// Error types for graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two tasks share a label.
    DuplicateTask(String),
    /// An edge references a label that was never declared as a task.
    DanglingEdge { source: String, destination: String },
    /// The same (source, destination) pair appears twice.
    DuplicateEdge { source: String, destination: String },
    /// An edge from a task to itself.
    SelfLoop(String),
    /// Circular dependency detected; carries the labels that could not be ordered.
    CircularDependency(Vec<String>),
    /// Total task and communication cost does not fit in [`Time`].
    WeightOverflow,
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::DuplicateTask(label) => write!(f, "Duplicate task '{}'", label),
            GraphError::DanglingEdge {
                source,
                destination,
            } => write!(
                f,
                "Edge {} -> {} references an undeclared task",
                source, destination
            ),
            GraphError::DuplicateEdge {
                source,
                destination,
            } => write!(f, "Duplicate edge {} -> {}", source, destination),
            GraphError::SelfLoop(label) => write!(f, "Task '{}' depends on itself", label),
            GraphError::CircularDependency(labels) => write!(
                f,
                "Circular dependency detected in task graph involving: {}",
                labels.join(", ")
            ),
            GraphError::WeightOverflow => {
                write!(f, "Sum of task and communication costs overflows")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// One side of an edge, seen from the task that owns the adjacency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// The task at the other end of the edge.
    pub task: TaskId,
    /// Communication cost, paid only across processors.
    pub comm_cost: Time,
}

#[derive(Debug, Clone)]
struct TaskNode {
    cost: Time,
    predecessors: Vec<Dependency>,
    successors: Vec<Dependency>,
}

/// Validated task DAG. Read-only after construction and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Graph {
    interner: TaskIdInterner,
    nodes: Vec<TaskNode>,
    edge_count: usize,
    topological_order: Vec<TaskId>,
    bottom_levels: Vec<Time>,
    communication_bottom_levels: Vec<Time>,
    top_levels: Vec<Time>,
    critical_path_length: Time,
    total_work: Time,
    horizon: Time,
}

impl Graph {
    /// Build and validate a graph. Task ids follow the order of `tasks`.
    pub fn build(tasks: &[TaskSpec], edges: &[EdgeSpec]) -> Result<Self, GraphError> {
        let mut interner = TaskIdInterner::with_capacity(tasks.len());
        let mut nodes = Vec::with_capacity(tasks.len());

        for spec in tasks {
            if interner.insert_new(&spec.label).is_none() {
                return Err(GraphError::DuplicateTask(spec.label.clone()));
            }
            nodes.push(TaskNode {
                cost: spec.cost,
                predecessors: Vec::new(),
                successors: Vec::new(),
            });
        }

        let mut seen_edges: FxHashSet<(TaskId, TaskId)> =
            FxHashSet::with_capacity_and_hasher(edges.len(), Default::default());

        for edge in edges {
            let (Some(source), Some(destination)) =
                (interner.get(&edge.source), interner.get(&edge.destination))
            else {
                return Err(GraphError::DanglingEdge {
                    source: edge.source.clone(),
                    destination: edge.destination.clone(),
                });
            };
            if source == destination {
                return Err(GraphError::SelfLoop(edge.source.clone()));
            }
            if !seen_edges.insert((source, destination)) {
                return Err(GraphError::DuplicateEdge {
                    source: edge.source.clone(),
                    destination: edge.destination.clone(),
                });
            }
            nodes[source as usize].successors.push(Dependency {
                task: destination,
                comm_cost: edge.comm_cost,
            });
            nodes[destination as usize].predecessors.push(Dependency {
                task: source,
                comm_cost: edge.comm_cost,
            });
        }

        for node in &mut nodes {
            node.predecessors.sort_by_key(|d| d.task);
            node.successors.sort_by_key(|d| d.task);
        }

        let topological_order = topological_sort(&nodes, &interner)?;
        let total_work = checked_sum(nodes.iter().map(|n| n.cost))?;
        let total_comm = checked_sum(edges.iter().map(|e| e.comm_cost))?;
        let horizon = total_work
            .checked_add(total_comm)
            .ok_or(GraphError::WeightOverflow)?;

        let mut graph = Self {
            interner,
            nodes,
            edge_count: seen_edges.len(),
            topological_order,
            bottom_levels: Vec::new(),
            communication_bottom_levels: Vec::new(),
            top_levels: Vec::new(),
            critical_path_length: 0,
            total_work,
            horizon,
        };
        graph.compute_levels();
        Ok(graph)
    }

    // Every level is the length of some path, so none exceeds `horizon`.
    fn compute_levels(&mut self) {
        let n = self.nodes.len();
        let mut bottom: Vec<Time> = vec![0; n];
        let mut comm_bottom: Vec<Time> = vec![0; n];
        let mut top: Vec<Time> = vec![0; n];

        // Sinks first
        for &task in self.topological_order.iter().rev() {
            let node = &self.nodes[task as usize];
            let mut longest: Time = 0;
            let mut longest_with_comm: Time = 0;
            for succ in &node.successors {
                longest = longest.max(bottom[succ.task as usize]);
                longest_with_comm =
                    longest_with_comm.max(succ.comm_cost + comm_bottom[succ.task as usize]);
            }
            bottom[task as usize] = node.cost + longest;
            comm_bottom[task as usize] = node.cost + longest_with_comm;
        }

        // Sources first
        for &task in &self.topological_order {
            let node = &self.nodes[task as usize];
            top[task as usize] = node
                .predecessors
                .iter()
                .map(|p| top[p.task as usize] + self.nodes[p.task as usize].cost)
                .max()
                .unwrap_or(0);
        }

        self.critical_path_length = bottom.iter().copied().max().unwrap_or(0);
        self.bottom_levels = bottom;
        self.communication_bottom_levels = comm_bottom;
        self.top_levels = top;
    }

    pub fn task_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All task ids, in declaration order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> {
        0..self.nodes.len() as TaskId
    }

    pub fn task_id(&self, label: &str) -> Option<TaskId> {
        self.interner.get(label)
    }

    /// Label of `task` (empty for an id this graph never issued).
    pub fn label(&self, task: TaskId) -> &str {
        self.interner.label(task).unwrap_or_default()
    }

    #[inline]
    pub fn cost(&self, task: TaskId) -> Time {
        self.nodes[task as usize].cost
    }

    /// Direct predecessors, ordered by task id.
    #[inline]
    pub fn predecessors(&self, task: TaskId) -> &[Dependency] {
        &self.nodes[task as usize].predecessors
    }

    /// Direct successors, ordered by task id.
    #[inline]
    pub fn successors(&self, task: TaskId) -> &[Dependency] {
        &self.nodes[task as usize].successors
    }

    /// Communication cost of the edge `source -> destination`, if it exists.
    pub fn comm_cost(&self, source: TaskId, destination: TaskId) -> Option<Time> {
        self.successors(source)
            .binary_search_by_key(&destination, |d| d.task)
            .ok()
            .map(|i| self.successors(source)[i].comm_cost)
    }

    /// Longest computation-only path from `task` to a sink, including `task`'s own cost.
    #[inline]
    pub fn bottom_level(&self, task: TaskId) -> Time {
        self.bottom_levels[task as usize]
    }

    /// Like [`Graph::bottom_level`] but also summing the communication cost of every
    /// edge on the path. Not a lower bound; used as a scheduling priority.
    #[inline]
    pub fn communication_bottom_level(&self, task: TaskId) -> Time {
        self.communication_bottom_levels[task as usize]
    }

    /// Longest computation-only path from a source up to, excluding, `task`.
    #[inline]
    pub fn top_level(&self, task: TaskId) -> Time {
        self.top_levels[task as usize]
    }

    /// Tasks ordered so that every task follows all of its predecessors.
    /// Ties are broken by smallest id.
    pub fn topological_order(&self) -> &[TaskId] {
        &self.topological_order
    }

    pub fn critical_path_length(&self) -> Time {
        self.critical_path_length
    }

    pub fn total_work(&self) -> Time {
        self.total_work
    }

    /// Sum of every task and communication cost. No schedule that starts each task
    /// as early as its processor and inputs allow can finish later.
    pub fn horizon(&self) -> Time {
        self.horizon
    }

    /// `max(critical path, ceil(total work / processors))`, a lower bound on any makespan.
    pub fn makespan_lower_bound(&self, processor_count: usize) -> Time {
        let processors = processor_count.max(1) as Time;
        self.critical_path_length
            .max(self.total_work.div_ceil(processors))
    }
}

fn checked_sum(mut weights: impl Iterator<Item = Time>) -> Result<Time, GraphError> {
    weights.try_fold(0, |acc: Time, w| {
        acc.checked_add(w).ok_or(GraphError::WeightOverflow)
    })
}

/// Kahn's algorithm over the predecessor counts; the min-heap keeps the order stable.
fn topological_sort(
    nodes: &[TaskNode],
    interner: &TaskIdInterner,
) -> Result<Vec<TaskId>, GraphError> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.predecessors.len()).collect();
    let mut queue: BinaryHeap<Reverse<TaskId>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(id, _)| Reverse(id as TaskId))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(task)) = queue.pop() {
        order.push(task);
        for succ in &nodes[task as usize].successors {
            let degree = &mut in_degree[succ.task as usize];
            *degree -= 1;
            if *degree == 0 {
                queue.push(Reverse(succ.task));
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree > 0)
            .filter_map(|(id, _)| interner.label(id as TaskId))
            .map(str::to_string)
            .collect();
        return Err(GraphError::CircularDependency(stuck));
    }

    Ok(order)
}
