//! Greedy list scheduling.
//!
//! Produces a valid complete schedule in one forward pass. The search uses its
//! makespan as the initial upper bound: branch-and-bound starts with it as the
//! incumbent, A* prunes children that cannot beat it.

use crate::graph::Graph;
use crate::interner::TaskId;
use crate::search::{PlacementError, ScheduleState};

/// Schedule every task by repeatedly taking the ready task with the highest
/// communication-inclusive bottom level (lowest id on ties) and putting it on the
/// processor where it starts earliest (lowest index on ties).
pub fn list_schedule(graph: &Graph, processor_count: usize) -> Result<ScheduleState, PlacementError> {
    let mut state = ScheduleState::initial(graph, processor_count);

    while !state.is_complete() {
        let Some(task) = next_task(graph, &state) else {
            break;
        };
        let processor = state
            .candidate_processors()
            .min_by_key(|&processor| (state.earliest_start(graph, task, processor), processor))
            .ok_or(PlacementError::ProcessorOutOfRange {
                processor: 0,
                processor_count,
            })?;
        state = state.place(graph, task, processor)?;
    }

    Ok(state)
}

/// Highest-priority ready task.
fn next_task(graph: &Graph, state: &ScheduleState) -> Option<TaskId> {
    state.ready_tasks().min_by(|&a, &b| {
        graph
            .communication_bottom_level(b)
            .cmp(&graph.communication_bottom_level(a))
            .then(a.cmp(&b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::make_graph;

    #[test]
    fn test_single_processor_is_serial() {
        let graph = make_graph(&[("a", 2), ("b", 3), ("c", 4)], &[("a", "c", 9)]);
        let state = list_schedule(&graph, 1).unwrap();

        assert!(state.is_complete());
        assert_eq!(state.makespan(), 9);
        assert_eq!(state.idle_time(), 0);
    }

    #[test]
    fn test_priority_order_and_processor_choice() {
        // a -> c is the longer chain, so a goes first; b opens the second processor
        let graph = make_graph(&[("a", 2), ("b", 3), ("c", 4)], &[("a", "c", 1)]);
        let state = list_schedule(&graph, 2).unwrap();

        assert_eq!(state.sequence(0), &[0, 2]);
        assert_eq!(state.sequence(1), &[1]);
        assert_eq!(state.makespan(), 6);
    }

    #[test]
    fn test_avoids_expensive_communication() {
        let graph = make_graph(&[("a", 3), ("b", 4)], &[("a", "b", 10)]);
        let state = list_schedule(&graph, 2).unwrap();

        assert_eq!(state.makespan(), 7);
        assert_eq!(state.sequence(0), &[0, 1]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = make_graph(&[], &[]);
        let state = list_schedule(&graph, 3).unwrap();
        assert!(state.is_complete());
        assert_eq!(state.makespan(), 0);
    }
}
