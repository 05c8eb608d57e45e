//! Multi-threaded state expansion.
//!
//! Workers pop from one shared frontier (a heap for A*, a stack for
//! branch-and-bound), expand outside the lock and push the surviving children back.
//! Duplicate detection goes through a sharded signature map; the best makespan found
//! so far is a single atomic that only ever decreases, so a stale read can only make
//! pruning less aggressive, never wrong.
//!
//! A complete state popped by one worker does not end the search while others are
//! still expanding cheaper states. The run ends once no worker is busy and nothing
//! left on the frontier can beat the incumbent.

use rustc_hash::{FxHashMap, FxHasher};
use std::collections::BinaryHeap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::models::Time;
use crate::{log_changes, log_debug};

use super::budget::ExhaustionReason;
use super::state::ScheduleState;
use super::types::StateSignature;
use super::{f_value, log_progress, SearchContext, SearchNode, Termination};

const CLOSED_SHARDS: usize = 64;

/// Exploration order of the shared frontier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrontierKind {
    /// A*: lowest `f` first; the closed map is bounded by `max_open_states`.
    BestFirst,
    /// Branch-and-bound: newest first; the closed map stops growing at
    /// `max_visited_states`.
    DepthFirst,
}

enum Frontier {
    BestFirst(BinaryHeap<SearchNode>),
    DepthFirst(Vec<SearchNode>),
}

impl Frontier {
    fn new(kind: FrontierKind) -> Self {
        match kind {
            FrontierKind::BestFirst => Frontier::BestFirst(BinaryHeap::new()),
            FrontierKind::DepthFirst => Frontier::DepthFirst(Vec::new()),
        }
    }

    fn push(&mut self, node: SearchNode) {
        match self {
            Frontier::BestFirst(heap) => heap.push(node),
            Frontier::DepthFirst(stack) => stack.push(node),
        }
    }

    fn pop(&mut self) -> Option<SearchNode> {
        match self {
            Frontier::BestFirst(heap) => heap.pop(),
            Frontier::DepthFirst(stack) => stack.pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Frontier::BestFirst(heap) => heap.len(),
            Frontier::DepthFirst(stack) => stack.len(),
        }
    }

    fn min_f(&self) -> Option<Time> {
        match self {
            Frontier::BestFirst(heap) => heap.peek().map(|n| n.f),
            Frontier::DepthFirst(stack) => stack.iter().map(|n| n.f).min(),
        }
    }

    /// Drop everything left once the minimum can no longer beat `bound`.
    /// Returns how many nodes were dropped.
    fn prune_all_if_hopeless(&mut self, bound: Time) -> usize {
        match self {
            Frontier::BestFirst(heap) if heap.peek().is_some_and(|n| n.f >= bound) => {
                let dropped = heap.len();
                heap.clear();
                dropped
            }
            _ => 0,
        }
    }
}

/// Signature -> cost map split across independently locked shards.
struct ClosedSet {
    shards: Vec<Mutex<FxHashMap<StateSignature, Time>>>,
    len: AtomicUsize,
    capacity: usize,
}

impl ClosedSet {
    fn new(capacity: usize) -> Self {
        Self {
            shards: (0..CLOSED_SHARDS)
                .map(|_| Mutex::new(FxHashMap::default()))
                .collect(),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    fn shard(&self, signature: &StateSignature) -> MutexGuard<'_, FxHashMap<StateSignature, Time>> {
        let mut hasher = FxHasher::default();
        signature.hash(&mut hasher);
        let index = hasher.finish() as usize % self.shards.len();
        lock(&self.shards[index])
    }

    /// Record a state reached at `cost`. Returns `false` if it was already reached at
    /// an equal or lower cost and should be skipped.
    fn record(&self, signature: &StateSignature, cost: Time) -> bool {
        let mut shard = self.shard(signature);
        match shard.get_mut(signature) {
            Some(seen) if *seen <= cost => false,
            Some(seen) => {
                *seen = cost;
                true
            }
            None => {
                if self.len.load(Ordering::Relaxed) < self.capacity {
                    shard.insert(signature.clone(), cost);
                    self.len.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
        }
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

struct Pool {
    frontier: Frontier,
    in_flight: usize,
    finished: bool,
    stopped: Option<ExhaustionReason>,
}

impl Pool {
    fn stop(&mut self, reason: ExhaustionReason) {
        self.stopped.get_or_insert(reason);
        self.finished = true;
    }
}

struct Shared<'a, 'c> {
    ctx: &'a SearchContext<'c>,
    kind: FrontierKind,
    pool: Mutex<Pool>,
    work_available: Condvar,
    closed: ClosedSet,
    best_makespan: AtomicU64,
    incumbent: Mutex<ScheduleState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run the search on `ctx.config.parallelism` worker threads.
pub(crate) fn search(
    ctx: &SearchContext<'_>,
    kind: FrontierKind,
    incumbent: ScheduleState,
) -> Termination {
    let graph = ctx.graph;
    let verbosity = ctx.config.verbosity;
    let workers = ctx.config.parallelism.max(1);

    let root = ScheduleState::initial(graph, ctx.config.processor_count);
    let root_f = f_value(graph, &root, 0);
    log_changes!(
        verbosity,
        "parallel {:?}: {} workers, root bound {}, incumbent {}",
        kind,
        workers,
        root_f,
        incumbent.makespan()
    );
    if root_f >= incumbent.makespan() {
        return Termination::Solved(incumbent);
    }

    let capacity = match kind {
        FrontierKind::BestFirst => usize::MAX,
        FrontierKind::DepthFirst => ctx.config.max_visited_states,
    };
    let root = SearchNode::new(root_f, root);
    let closed = ClosedSet::new(capacity);
    closed.record(&root.signature, root.state.cost_so_far());
    let mut frontier = Frontier::new(kind);
    frontier.push(root);

    let shared = Shared {
        ctx,
        kind,
        pool: Mutex::new(Pool {
            frontier,
            in_flight: 0,
            finished: false,
            stopped: None,
        }),
        work_available: Condvar::new(),
        closed,
        best_makespan: AtomicU64::new(incumbent.makespan()),
        incumbent: Mutex::new(incumbent),
    };

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| shared.run_worker());
        }
    });

    let best = shared.best_makespan.load(Ordering::Acquire);
    let pool = shared
        .pool
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    let incumbent = shared
        .incumbent
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);

    match pool.stopped {
        Some(reason) => Termination::Exhausted {
            reason,
            lower_bound: pool.frontier.min_f().unwrap_or(best).min(best),
            incumbent,
        },
        None => {
            log_changes!(
                verbosity,
                "parallel {:?}: optimal makespan {}",
                kind,
                incumbent.makespan()
            );
            Termination::Solved(incumbent)
        }
    }
}

impl Shared<'_, '_> {
    fn run_worker(&self) {
        while let Some(node) = self.next_node() {
            let children = self.expand(node);
            self.complete(children);
        }
    }

    /// Block until there is a node worth expanding, or the search is over.
    fn next_node(&self) -> Option<SearchNode> {
        let mut pool = lock(&self.pool);
        loop {
            if pool.finished {
                return None;
            }
            if let Some(reason) = self.ctx.budget.check() {
                pool.stop(reason);
                self.work_available.notify_all();
                return None;
            }

            let best = self.best_makespan.load(Ordering::Acquire);
            let dropped = pool.frontier.prune_all_if_hopeless(best);
            self.ctx.progress.pruned(dropped as u64);
            while let Some(node) = pool.frontier.pop() {
                if node.f >= best {
                    self.ctx.progress.pruned(1);
                    continue;
                }
                pool.in_flight += 1;
                return Some(node);
            }

            if pool.in_flight == 0 {
                pool.finished = true;
                self.work_available.notify_all();
                return None;
            }
            pool = self
                .work_available
                .wait(pool)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn expand(&self, node: SearchNode) -> Vec<SearchNode> {
        let graph = self.ctx.graph;
        let best = self.best_makespan.load(Ordering::Acquire);
        let expanded = self.ctx.progress.expanded();
        log_progress(self.ctx, expanded, node.f, best);

        if node.state.is_complete() {
            self.offer_incumbent(node.state);
            return Vec::new();
        }

        let children = node.state.successors(graph);
        self.ctx.progress.generated(children.len() as u64);

        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            let f = f_value(graph, &child, node.f);
            if f >= best {
                self.ctx.progress.pruned(1);
                continue;
            }
            let child = SearchNode::new(f, child);
            if !self
                .closed
                .record(&child.signature, child.state.cost_so_far())
            {
                self.ctx.progress.duplicates(1);
                continue;
            }
            kept.push(child);
        }

        log_debug!(
            self.ctx.config.verbosity,
            "parallel: expand f={} placed={} kept={}",
            node.f,
            node.state.placed_count(),
            kept.len()
        );

        if self.kind == FrontierKind::DepthFirst {
            kept.sort_by(|a, b| b.f.cmp(&a.f));
        }
        kept
    }

    fn complete(&self, children: Vec<SearchNode>) {
        let mut pool = lock(&self.pool);
        for child in children {
            pool.frontier.push(child);
        }
        pool.in_flight -= 1;

        if self.kind == FrontierKind::BestFirst
            && pool.frontier.len() + self.closed.len() > self.ctx.config.max_open_states
        {
            log_changes!(
                self.ctx.config.verbosity,
                "parallel A*: state limit {} reached",
                self.ctx.config.max_open_states
            );
            pool.stop(ExhaustionReason::StateLimit);
        }
        self.work_available.notify_all();
    }

    fn offer_incumbent(&self, state: ScheduleState) {
        let makespan = state.makespan();
        if self.best_makespan.fetch_min(makespan, Ordering::AcqRel) > makespan {
            let mut incumbent = lock(&self.incumbent);
            if makespan < incumbent.makespan() {
                log_changes!(
                    self.ctx.config.verbosity,
                    "parallel: new incumbent {} (was {})",
                    makespan,
                    incumbent.makespan()
                );
                *incumbent = state;
            }
        }
    }
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

    fn run(
        graph: &Graph,
        config: &SearchConfig,
        kind: FrontierKind,
        token: CancellationToken,
    ) -> Termination {
        let budget = Budget::new(config.time_limit, token);
        let progress = SearchProgress::default();
        let ctx = SearchContext {
            graph,
            config,
            budget: &budget,
            progress: &progress,
        };
        let incumbent = list_schedule(graph, config.processor_count).unwrap();
        search(&ctx, kind, incumbent)
    }

    #[test]
    fn test_both_frontiers_match_brute_force() {
        let graph = make_fork_join();
        for processors in 1..=3 {
            let expected =
                brute_force_makespan(&graph, &ScheduleState::initial(&graph, processors));
            let config = SearchConfig::new(processors).with_parallelism(4);
            for kind in [FrontierKind::BestFirst, FrontierKind::DepthFirst] {
                match run(&graph, &config, kind, CancellationToken::new()) {
                    Termination::Solved(state) => {
                        assert!(state.is_complete());
                        assert_eq!(state.makespan(), expected, "{:?} p={}", kind, processors);
                    }
                    other => panic!("expected a solution, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_cancelled_workers_report_frontier_bound() {
        // Greedy finds 4, the root estimate is 3
        let graph = make_graph(&[("a", 2), ("b", 2), ("c", 2)], &[]);
        let config = SearchConfig::new(2).with_parallelism(3);
        let token = CancellationToken::new();
        token.cancel();

        for kind in [FrontierKind::BestFirst, FrontierKind::DepthFirst] {
            match run(&graph, &config, kind, token.clone()) {
                Termination::Exhausted {
                    reason,
                    lower_bound,
                    incumbent,
                } => {
                    assert_eq!(reason, ExhaustionReason::Cancelled, "{:?}", kind);
                    assert_eq!(lower_bound, 3, "{:?}", kind);
                    assert_eq!(incumbent.makespan(), 4);
                }
                other => panic!("expected exhaustion, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_best_first_stops_at_state_limit() {
        let graph = make_graph(&[("a", 2), ("b", 2), ("c", 2)], &[]);
        let config = SearchConfig::new(2)
            .with_parallelism(2)
            .with_max_open_states(1);

        match run(&graph, &config, FrontierKind::BestFirst, CancellationToken::new()) {
            Termination::Exhausted {
                reason,
                lower_bound,
                incumbent,
            } => {
                assert_eq!(reason, ExhaustionReason::StateLimit);
                assert!((3..=4).contains(&lower_bound));
                assert_eq!(incumbent.makespan(), 4);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_first_ignores_open_state_limit() {
        let graph = make_graph(&[("a", 2), ("b", 2), ("c", 2)], &[]);
        let config = SearchConfig::new(2)
            .with_parallelism(2)
            .with_max_open_states(1);

        match run(&graph, &config, FrontierKind::DepthFirst, CancellationToken::new()) {
            Termination::Solved(state) => assert_eq!(state.makespan(), 4),
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_closed_set_keeps_cheapest() {
        let closed = ClosedSet::new(usize::MAX);
        let signature = StateSignature::from_sequences(&[vec![0, 1]]);

        assert!(closed.record(&signature, 5));
        assert!(!closed.record(&signature, 5));
        assert!(!closed.record(&signature, 7));
        assert!(closed.record(&signature, 3));
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn test_closed_set_capacity() {
        let closed = ClosedSet::new(1);
        let first = StateSignature::from_sequences(&[vec![0]]);
        let second = StateSignature::from_sequences(&[vec![1]]);

        assert!(closed.record(&first, 1));
        // Not recorded, so never reported as a duplicate
        assert!(closed.record(&second, 1));
        assert!(closed.record(&second, 1));
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn test_frontier_min_f() {
        let graph = make_graph(&[("a", 1)], &[]);
        let state = ScheduleState::initial(&graph, 1);
        for kind in [FrontierKind::BestFirst, FrontierKind::DepthFirst] {
            let mut frontier = Frontier::new(kind);
            assert_eq!(frontier.min_f(), None);
            frontier.push(SearchNode::new(4, state.clone()));
            frontier.push(SearchNode::new(2, state.clone()));
            assert_eq!(frontier.min_f(), Some(2));
            assert_eq!(frontier.len(), 2);
        }
    }
}
