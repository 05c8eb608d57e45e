//! Admissible lower bounds on the makespan reachable from a schedule state.
//!
//! Each bound on its own never exceeds the best achievable makespan, so neither
//! does their maximum.

use crate::graph::Graph;
use crate::models::Time;

use super::state::ScheduleState;

/// Lower bound on the final makespan of any completion of `state`.
pub fn estimate(graph: &Graph, state: &ScheduleState) -> Time {
    idle_time_bound(graph, state)
        .max(critical_path_bound(graph, state))
        .max(data_ready_bound(graph, state))
}

/// Work already committed (including idle gaps) plus remaining work, spread perfectly
/// over all processors.
///
/// Each finish time fits in [`Time`] but their sum may not, so it is taken in `u128`.
/// The quotient never exceeds the latest finish plus the remaining work.
pub fn idle_time_bound(_graph: &Graph, state: &ScheduleState) -> Time {
    let committed: u128 = state
        .processor_finish_times()
        .iter()
        .map(|&finish| u128::from(finish))
        .sum();
    let processors = state.processor_count().max(1) as u128;
    let bound = (committed + u128::from(state.remaining_work())).div_ceil(processors);
    Time::try_from(bound).unwrap_or(Time::MAX)
}

/// Longest remaining dependency chain, starting each unplaced task no earlier than
/// it could possibly start.
///
/// Start estimates are propagated in topological order. A placed predecessor `p` on
/// processor `q` delays its successor until `min(finish(q), finish(p) + comm)`: either
/// the successor shares `q` and waits for it to drain, or it pays the communication.
pub fn critical_path_bound(graph: &Graph, state: &ScheduleState) -> Time {
    if state.is_complete() {
        return state.makespan();
    }

    let earliest_free = state
        .processor_finish_times()
        .iter()
        .copied()
        .min()
        .unwrap_or(0);
    let mut earliest_start: Vec<Time> = vec![0; graph.task_count()];
    let mut bound: Time = 0;

    for &task in graph.topological_order() {
        if state.is_placed(task) {
            continue;
        }
        let mut start = earliest_free;
        for dep in graph.predecessors(task) {
            let arrival = match state.placement(dep.task) {
                Some(p) => state
                    .processor_finish(p.processor)
                    .min(p.finish + dep.comm_cost),
                None => earliest_start[dep.task as usize] + graph.cost(dep.task),
            };
            start = start.max(arrival);
        }
        earliest_start[task as usize] = start;
        bound = bound.max(start + graph.bottom_level(task));
    }

    bound
}

/// For each ready task, its best start over the candidate processors plus its
/// bottom level.
pub fn data_ready_bound(graph: &Graph, state: &ScheduleState) -> Time {
    let processors: Vec<usize> = state.candidate_processors().collect();
    state
        .ready_tasks()
        .map(|task| {
            let best_start = processors
                .iter()
                .map(|&processor| state.earliest_start(graph, task, processor))
                .min()
                .unwrap_or(0);
            best_start + graph.bottom_level(task)
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::make_graph;
    use super::*;

    #[test]
    fn test_initial_estimate_matches_static_bounds() {
        let graph = make_graph(
            &[("a", 2), ("b", 3), ("c", 4), ("d", 2)],
            &[("a", "b", 1), ("a", "c", 5), ("b", "d", 1), ("c", "d", 1)],
        );
        let state = ScheduleState::initial(&graph, 2);

        assert_eq!(idle_time_bound(&graph, &state), 6);
        assert_eq!(critical_path_bound(&graph, &state), 8);
        assert_eq!(data_ready_bound(&graph, &state), 8);
        assert_eq!(estimate(&graph, &state), 8);
    }

    #[test]
    fn test_communication_not_charged_when_colocation_possible() {
        // Scenario: a(3) -> b(4) with comm 10; optimum serialises both on one processor
        let graph = make_graph(&[("a", 3), ("b", 4)], &[("a", "b", 10)]);
        let state = ScheduleState::initial(&graph, 2);
        let state = state.place(&graph, 0, 0).unwrap();

        assert_eq!(critical_path_bound(&graph, &state), 7);
        assert_eq!(data_ready_bound(&graph, &state), 7);
        assert_eq!(estimate(&graph, &state), 7);
    }

    #[test]
    fn test_data_ready_prefers_colocation() {
        // x(1) -> z(1) comm 5, y(6) independent
        let graph = make_graph(&[("x", 1), ("y", 6), ("z", 1)], &[("x", "z", 5)]);
        let state = ScheduleState::initial(&graph, 2);
        let state = state
            .place(&graph, 1, 0)
            .and_then(|s| s.place(&graph, 0, 1))
            .unwrap();
        // z on processor 1 starts at 1, on processor 0 at 6
        assert_eq!(data_ready_bound(&graph, &state), 2);

        let state = state.place(&graph, 2, 0).unwrap();
        assert!(state.is_complete());
        assert_eq!(estimate(&graph, &state), 7);
    }

    #[test]
    fn test_idle_bound_with_finish_times_near_limit() {
        // Processor finishes sum to Time::MAX + 1 although every time fits
        let big = Time::MAX / 3;
        let graph = make_graph(&[("a", big), ("b", 1), ("c", 1)], &[("a", "b", big)]);
        let state = ScheduleState::initial(&graph, 2)
            .place(&graph, 0, 0)
            .and_then(|s| s.place(&graph, 2, 1))
            .and_then(|s| s.place(&graph, 1, 1))
            .unwrap();

        assert_eq!(state.makespan(), 2 * big + 1);
        assert_eq!(idle_time_bound(&graph, &state), 1 << 63);
        assert_eq!(estimate(&graph, &state), 2 * big + 1);
    }

    #[test]
    fn test_complete_state_estimate_is_makespan() {
        let graph = make_graph(&[("a", 3), ("b", 4)], &[]);
        let state = ScheduleState::initial(&graph, 1);
        let state = state
            .place(&graph, 0, 0)
            .and_then(|s| s.place(&graph, 1, 0))
            .unwrap();
        assert_eq!(estimate(&graph, &state), 7);
    }
}
