//! Sequential A* over schedule states.

use rustc_hash::FxHashMap;
use std::collections::BinaryHeap;

use crate::models::Time;
use crate::{log_changes, log_debug};

use super::budget::ExhaustionReason;
use super::state::ScheduleState;
use super::types::StateSignature;
use super::{f_value, log_progress, SearchContext, SearchNode, Termination};

/// Best-first search from the empty schedule.
///
/// Children whose `f` is not below the incumbent's makespan are dropped: they cannot
/// lead to a strictly better schedule. If that empties the open heap, the incumbent
/// itself is optimal.
pub(crate) fn search(ctx: &SearchContext<'_>, incumbent: ScheduleState) -> Termination {
    let graph = ctx.graph;
    let verbosity = ctx.config.verbosity;
    let upper_bound = incumbent.makespan();

    let root = ScheduleState::initial(graph, ctx.config.processor_count);
    let root_f = f_value(graph, &root, 0);
    log_changes!(
        verbosity,
        "A*: {} tasks on {} processors, root bound {}, incumbent {}",
        graph.task_count(),
        ctx.config.processor_count,
        root_f,
        upper_bound
    );
    if root_f >= upper_bound {
        return Termination::Solved(incumbent);
    }

    let mut open: BinaryHeap<SearchNode> = BinaryHeap::new();
    let mut closed: FxHashMap<StateSignature, Time> = FxHashMap::default();
    let root = SearchNode::new(root_f, root);
    closed.insert(root.signature.clone(), root.state.cost_so_far());
    open.push(root);

    while let Some(node) = open.pop() {
        if let Some(reason) = ctx.budget.check() {
            return Termination::Exhausted {
                reason,
                lower_bound: node.f,
                incumbent,
            };
        }

        let expanded = ctx.progress.expanded();
        log_progress(ctx, expanded, node.f, upper_bound);

        if node.state.is_complete() {
            log_changes!(
                verbosity,
                "A*: optimal makespan {} after {} expansions",
                node.state.makespan(),
                expanded
            );
            return Termination::Solved(node.state);
        }

        let children = node.state.successors(graph);
        ctx.progress.generated(children.len() as u64);
        log_debug!(
            verbosity,
            "A*: expand f={} g={} placed={} children={}",
            node.f,
            node.state.cost_so_far(),
            node.state.placed_count(),
            children.len()
        );

        for child in children {
            let f = f_value(graph, &child, node.f);
            if f >= upper_bound {
                ctx.progress.pruned(1);
                continue;
            }
            let child = SearchNode::new(f, child);
            let cost = child.state.cost_so_far();
            match closed.get(&child.signature) {
                Some(&seen) if seen <= cost => {
                    ctx.progress.duplicates(1);
                    continue;
                }
                _ => {}
            }
            closed.insert(child.signature.clone(), cost);
            open.push(child);
        }

        if open.len() + closed.len() > ctx.config.max_open_states {
            let lower_bound = open.peek().map(|n| n.f).unwrap_or(node.f).min(upper_bound);
            log_changes!(
                verbosity,
                "A*: state limit {} reached, lower bound {}",
                ctx.config.max_open_states,
                lower_bound
            );
            return Termination::Exhausted {
                reason: ExhaustionReason::StateLimit,
                lower_bound,
                incumbent,
            };
        }
    }

    // Every remaining path was pruned against the incumbent
    log_changes!(verbosity, "A*: incumbent {} is optimal", upper_bound);
    Termination::Solved(incumbent)
}

#[cfg(test)]
mod tests {
    use super::super::budget::{Budget, CancellationToken};
    use super::super::test_support::*;
    use super::super::SearchProgress;
    use super::*;
    use crate::config::SearchConfig;
    use crate::graph::Graph;
    use crate::greedy::list_schedule;

    fn run(graph: &Graph, config: &SearchConfig) -> (Termination, SearchProgress) {
        let budget = Budget::new(config.time_limit, CancellationToken::new());
        let progress = SearchProgress::default();
        let incumbent = list_schedule(graph, config.processor_count).unwrap();
        let termination = {
            let ctx = SearchContext {
                graph,
                config,
                budget: &budget,
                progress: &progress,
            };
            search(&ctx, incumbent)
        };
        (termination, progress)
    }

    #[test]
    fn test_finds_optimum_on_fork_join() {
        let graph = make_fork_join();
        for processors in 1..=3 {
            let config = SearchConfig::new(processors);
            let (termination, _) = run(&graph, &config);
            let expected = brute_force_makespan(&graph, &ScheduleState::initial(&graph, processors));
            match termination {
                Termination::Solved(state) => {
                    assert!(state.is_complete());
                    assert_eq!(state.makespan(), expected, "processors={}", processors);
                }
                other => panic!("expected a solution, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_greedy_optimal_short_circuits() {
        // Independent equal tasks: greedy already meets the load bound
        let graph = make_graph(&[("a", 2), ("b", 2)], &[]);
        let (termination, progress) = run(&graph, &SearchConfig::new(2));

        assert!(matches!(termination, Termination::Solved(ref s) if s.makespan() == 2));
        assert_eq!(progress.snapshot().expanded, 0);
    }

    #[test]
    fn test_state_limit_reports_bounds() {
        let graph = make_graph(
            &[("a", 3), ("b", 3), ("c", 2), ("d", 2), ("e", 2), ("f", 1)],
            &[("a", "f", 4), ("b", "f", 4)],
        );
        let config = SearchConfig::new(3).with_max_open_states(1);
        let (termination, _) = run(&graph, &config);

        match termination {
            Termination::Solved(state) => {
                // Pruning against the incumbent may settle it before the limit bites
                assert!(state.is_complete());
            }
            Termination::Exhausted {
                reason,
                lower_bound,
                incumbent,
            } => {
                assert_eq!(reason, ExhaustionReason::StateLimit);
                assert!(lower_bound <= incumbent.makespan());
                assert!(incumbent.is_complete());
            }
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let graph = make_fork_join();
        let config = SearchConfig::new(2);
        let token = CancellationToken::new();
        token.cancel();
        let budget = Budget::new(None, token);
        let progress = SearchProgress::default();
        let incumbent = list_schedule(&graph, 2).unwrap();
        let incumbent_makespan = incumbent.makespan();
        let ctx = SearchContext {
            graph: &graph,
            config: &config,
            budget: &budget,
            progress: &progress,
        };

        match search(&ctx, incumbent) {
            // Greedy may already be provably optimal at the root
            Termination::Solved(state) => assert_eq!(state.makespan(), incumbent_makespan),
            Termination::Exhausted {
                reason, incumbent, ..
            } => {
                assert_eq!(reason, ExhaustionReason::Cancelled);
                assert_eq!(incumbent.makespan(), incumbent_makespan);
            }
        }
    }
}
