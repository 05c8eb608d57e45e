//! Scheduler entry point: strategy selection, fallback and result reporting.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{SearchConfig, SearchStrategy};
use crate::extract::extract;
use crate::graph::{Graph, GraphError};
use crate::greedy;
use crate::models::{Schedule, SearchOutcome, SearchStats, Time};
use crate::log_changes;

use super::budget::{Budget, CancellationToken, ExhaustionReason};
use super::parallel::{self, FrontierKind};
use super::state::{PlacementError, ScheduleState};
use super::{astar, branch_bound, SearchContext, SearchProgress, Termination};

/// Errors that can occur during scheduling.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid graph: {0}")]
    InvalidGraph(#[from] GraphError),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A placement broke the precedence invariant. Indicates a bug in the search.
    #[error("Precedence violation: {0}")]
    PrecedenceViolation(#[from] PlacementError),
    #[error(
        "Search exhausted ({reason}) before proving optimality: best makespan {best_makespan}, lower bound {lower_bound}"
    )]
    SearchExhausted {
        reason: ExhaustionReason,
        /// Makespan of `incumbent`.
        best_makespan: Time,
        /// No schedule can finish earlier than this.
        lower_bound: Time,
        /// Best complete schedule seen; the greedy one at worst.
        incumbent: Box<Schedule>,
    },
}

/// Lifecycle of a [`Scheduler`], observable from other threads.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulerStatus {
    #[default]
    Idle = 0,
    Running = 1,
    Finished = 2,
}

impl SchedulerStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerStatus::Running,
            2 => SchedulerStatus::Finished,
            _ => SchedulerStatus::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct RunInfo {
    started: Option<Instant>,
    elapsed: Option<Duration>,
    strategy: SearchStrategy,
    fell_back: bool,
}

/// Optimal scheduler over one graph.
///
/// `schedule` takes `&self`, so another thread holding a reference can watch
/// [`Scheduler::progress`] and [`Scheduler::status`] or cancel through the token.
pub struct Scheduler<'g> {
    graph: &'g Graph,
    config: SearchConfig,
    cancellation: CancellationToken,
    progress: SearchProgress,
    run: Mutex<RunInfo>,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g Graph, config: SearchConfig) -> Result<Self, SchedulerError> {
        config
            .validate()
            .map_err(SchedulerError::InvalidConfiguration)?;
        Ok(Self {
            graph,
            config,
            cancellation: CancellationToken::new(),
            progress: SearchProgress::default(),
            run: Mutex::new(RunInfo::default()),
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn status(&self) -> SchedulerStatus {
        self.progress.status()
    }

    /// Counters of the current or last run.
    pub fn progress(&self) -> SearchStats {
        let counters = self.progress.snapshot();
        let run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = run
            .elapsed
            .or_else(|| run.started.map(|s| s.elapsed()))
            .unwrap_or_default();
        SearchStats {
            expanded: counters.expanded,
            generated: counters.generated,
            pruned: counters.pruned,
            duplicates: counters.duplicates,
            strategy: run.strategy,
            fell_back: run.fell_back,
            elapsed,
        }
    }

    /// Strategy a run starts with; `Auto` resolves by graph size.
    pub fn initial_strategy(&self) -> SearchStrategy {
        match self.config.strategy {
            SearchStrategy::Auto if self.graph.task_count() <= self.config.astar_task_limit => {
                SearchStrategy::AStar
            }
            SearchStrategy::Auto => SearchStrategy::BranchAndBound,
            explicit => explicit,
        }
    }

    /// Find a minimum-makespan schedule.
    pub fn schedule(&self) -> Result<SearchOutcome, SchedulerError> {
        let started = Instant::now();
        self.progress.reset();
        self.progress.set_status(SchedulerStatus::Running);
        self.update_run(|run| {
            *run = RunInfo {
                started: Some(started),
                elapsed: None,
                strategy: self.initial_strategy(),
                fell_back: false,
            }
        });

        let result = self.run_search();

        self.update_run(|run| run.elapsed = Some(started.elapsed()));
        self.progress.set_status(SchedulerStatus::Finished);

        let state = result?;
        let schedule = extract(self.graph, &state);
        debug_assert!(schedule.validate(self.graph).is_ok());
        Ok(SearchOutcome {
            schedule,
            stats: self.progress(),
        })
    }

    fn update_run(&self, update: impl FnOnce(&mut RunInfo)) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut run);
    }

    fn run_search(&self) -> Result<ScheduleState, SchedulerError> {
        let graph = self.graph;
        let verbosity = self.config.verbosity;
        let processor_count = self.config.processor_count;

        let incumbent = greedy::list_schedule(graph, processor_count)?;
        let lower_bound = graph.makespan_lower_bound(processor_count);
        log_changes!(
            verbosity,
            "greedy makespan {}, static lower bound {}",
            incumbent.makespan(),
            lower_bound
        );
        if incumbent.makespan() <= lower_bound {
            log_changes!(verbosity, "greedy schedule meets the lower bound");
            return Ok(incumbent);
        }

        let budget = Budget::new(self.config.time_limit, self.cancellation.clone());
        let ctx = SearchContext {
            graph,
            config: &self.config,
            budget: &budget,
            progress: &self.progress,
        };

        let strategy = self.initial_strategy();
        log_changes!(verbosity, "search strategy: {}", strategy);
        let termination = match strategy {
            SearchStrategy::BranchAndBound => self.run_branch_and_bound(&ctx, incumbent),
            _ => match self.run_astar(&ctx, incumbent) {
                Termination::Exhausted {
                    reason: ExhaustionReason::StateLimit,
                    incumbent,
                    ..
                } if self.config.strategy == SearchStrategy::Auto => {
                    log_changes!(
                        verbosity,
                        "A* exceeded {} states, falling back to branch-and-bound",
                        self.config.max_open_states
                    );
                    self.update_run(|run| {
                        run.strategy = SearchStrategy::BranchAndBound;
                        run.fell_back = true;
                    });
                    self.run_branch_and_bound(&ctx, incumbent)
                }
                other => other,
            },
        };

        match termination {
            Termination::Solved(state) => Ok(state),
            Termination::Exhausted {
                reason,
                lower_bound,
                incumbent,
            } => {
                log_changes!(
                    verbosity,
                    "search stopped ({}): incumbent {}, lower bound {}",
                    reason,
                    incumbent.makespan(),
                    lower_bound
                );
                Err(SchedulerError::SearchExhausted {
                    reason,
                    best_makespan: incumbent.makespan(),
                    lower_bound,
                    incumbent: Box::new(extract(graph, &incumbent)),
                })
            }
        }
    }

    fn run_astar(&self, ctx: &SearchContext<'_>, incumbent: ScheduleState) -> Termination {
        if self.config.parallelism > 1 {
            parallel::search(ctx, FrontierKind::BestFirst, incumbent)
        } else {
            astar::search(ctx, incumbent)
        }
    }

    fn run_branch_and_bound(&self, ctx: &SearchContext<'_>, incumbent: ScheduleState) -> Termination {
        if self.config.parallelism > 1 {
            parallel::search(ctx, FrontierKind::DepthFirst, incumbent)
        } else {
            branch_bound::search(ctx, incumbent)
        }
    }
}
