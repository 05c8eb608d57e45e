//! Depth-first branch-and-bound with an explicit stack.
//!
//! Memory stays proportional to depth times branching factor, plus a capped table of
//! visited signatures. Used when the graph is too large for A* or when A* runs out of
//! state budget.

use rustc_hash::FxHashSet;

use crate::models::Time;
use crate::{log_changes, log_checks, log_debug};

use super::state::ScheduleState;
use super::types::StateSignature;
use super::{f_value, log_progress, SearchContext, Termination};

/// Explore every state whose bound is below the best makespan found so far, starting
/// from `incumbent` as the best.
pub(crate) fn search(ctx: &SearchContext<'_>, incumbent: ScheduleState) -> Termination {
    let graph = ctx.graph;
    let verbosity = ctx.config.verbosity;
    let visited_cap = ctx.config.max_visited_states;

    let mut best = incumbent;
    let root = ScheduleState::initial(graph, ctx.config.processor_count);
    let root_f = f_value(graph, &root, 0);
    log_changes!(
        verbosity,
        "branch-and-bound: {} tasks on {} processors, root bound {}, incumbent {}",
        graph.task_count(),
        ctx.config.processor_count,
        root_f,
        best.makespan()
    );

    let mut stack: Vec<(Time, ScheduleState)> = vec![(root_f, root)];
    let mut visited: FxHashSet<StateSignature> = FxHashSet::default();
    let mut visited_full_logged = false;

    while let Some((f, state)) = stack.pop() {
        if let Some(reason) = ctx.budget.check() {
            let lower_bound = stack
                .iter()
                .map(|(f, _)| *f)
                .fold(f, Time::min)
                .min(best.makespan());
            return Termination::Exhausted {
                reason,
                lower_bound,
                incumbent: best,
            };
        }

        // The incumbent may have improved since this entry was pushed
        if f >= best.makespan() {
            ctx.progress.pruned(1);
            continue;
        }

        let expanded = ctx.progress.expanded();
        log_progress(ctx, expanded, f, best.makespan());

        if state.is_complete() {
            log_changes!(
                verbosity,
                "branch-and-bound: new incumbent {} (was {})",
                state.makespan(),
                best.makespan()
            );
            best = state;
            continue;
        }

        let children = state.successors(graph);
        ctx.progress.generated(children.len() as u64);

        let mut kept: Vec<(Time, ScheduleState)> = Vec::with_capacity(children.len());
        for child in children {
            let child_f = f_value(graph, &child, f);
            if child_f >= best.makespan() {
                ctx.progress.pruned(1);
                continue;
            }
            let signature = child.signature();
            if visited.contains(&signature) {
                ctx.progress.duplicates(1);
                continue;
            }
            if visited.len() < visited_cap {
                visited.insert(signature);
            } else if !visited_full_logged {
                log_checks!(
                    verbosity,
                    "branch-and-bound: visited table full at {} states",
                    visited_cap
                );
                visited_full_logged = true;
            }
            kept.push((child_f, child));
        }

        log_debug!(
            verbosity,
            "branch-and-bound: expand f={} placed={} kept={}",
            f,
            state.placed_count(),
            kept.len()
        );

        // Most promising child on top of the stack; stable sort keeps id order on ties
        kept.sort_by(|a, b| b.0.cmp(&a.0));
        stack.extend(kept);
    }

    log_changes!(
        verbosity,
        "branch-and-bound: optimal makespan {}",
        best.makespan()
    );
    Termination::Solved(best)
}

#[cfg(test)]
mod tests {
    use super::super::budget::{Budget, CancellationToken, ExhaustionReason};
    use super::super::test_support::*;
    use super::super::SearchProgress;
    use super::*;
    use crate::config::SearchConfig;
    use crate::graph::Graph;
    use crate::greedy::list_schedule;
    use std::time::Duration;

    fn run(graph: &Graph, config: &SearchConfig, token: CancellationToken) -> Termination {
        let budget = Budget::new(config.time_limit, token);
        let progress = SearchProgress::default();
        let ctx = SearchContext {
            graph,
            config,
            budget: &budget,
            progress: &progress,
        };
        let incumbent = list_schedule(graph, config.processor_count).unwrap();
        search(&ctx, incumbent)
    }

    fn solved_makespan(termination: Termination) -> Time {
        match termination {
            Termination::Solved(state) => {
                assert!(state.is_complete());
                state.makespan()
            }
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_matches_brute_force() {
        let graph = make_fork_join();
        for processors in 1..=3 {
            let expected =
                brute_force_makespan(&graph, &ScheduleState::initial(&graph, processors));
            let makespan = solved_makespan(run(
                &graph,
                &SearchConfig::new(processors),
                CancellationToken::new(),
            ));
            assert_eq!(makespan, expected, "processors={}", processors);
        }
    }

    #[test]
    fn test_tiny_visited_table_stays_optimal() {
        let graph = make_fork_join();
        let config = SearchConfig::new(2).with_max_visited_states(1);

        let expected = brute_force_makespan(&graph, &ScheduleState::initial(&graph, 2));
        assert_eq!(
            solved_makespan(run(&graph, &config, CancellationToken::new())),
            expected
        );
    }

    #[test]
    fn test_improves_on_greedy() {
        // Greedy puts the heavy-communication child away from its parent first
        let graph = make_graph(
            &[("a", 1), ("b", 1), ("c", 5), ("d", 5)],
            &[("a", "c", 6), ("a", "d", 6), ("b", "d", 0)],
        );
        let greedy = list_schedule(&graph, 2).unwrap().makespan();
        let optimal = brute_force_makespan(&graph, &ScheduleState::initial(&graph, 2));
        let found = solved_makespan(run(&graph, &SearchConfig::new(2), CancellationToken::new()));

        assert_eq!(found, optimal);
        assert!(found <= greedy);
    }

    #[test]
    fn test_time_limit_returns_incumbent() {
        let graph = make_fork_join();
        let config = SearchConfig::new(2).with_time_limit(Duration::ZERO);
        let greedy = list_schedule(&graph, 2).unwrap().makespan();

        match run(&graph, &config, CancellationToken::new()) {
            Termination::Exhausted {
                reason,
                lower_bound,
                incumbent,
            } => {
                assert_eq!(reason, ExhaustionReason::TimeLimit);
                assert_eq!(incumbent.makespan(), greedy);
                assert!(lower_bound <= greedy);
            }
            Termination::Solved(state) => panic!("unexpected solution {}", state.makespan()),
        }
    }
}
