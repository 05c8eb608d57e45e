//! Configuration for the schedule search.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which search procedure drives the exploration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchStrategy {
    /// A* for graphs up to `astar_task_limit` tasks, falling back to
    /// branch-and-bound when the A* state budget runs out; branch-and-bound otherwise.
    #[default]
    Auto,
    /// Best-first search only. Running out of state budget is an error.
    AStar,
    /// Depth-first branch-and-bound only.
    BranchAndBound,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Auto => "auto",
            SearchStrategy::AStar => "astar",
            SearchStrategy::BranchAndBound => "branch_and_bound",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SearchStrategy::Auto),
            "astar" | "a*" => Ok(SearchStrategy::AStar),
            "branch_and_bound" | "bnb" | "dfbnb" => Ok(SearchStrategy::BranchAndBound),
            other => Err(format!("Unknown search strategy: '{}'", other)),
        }
    }
}

/// Knobs for one scheduling run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Number of identical processors to schedule onto (>= 1).
    pub processor_count: usize,
    /// Worker threads used for state expansion (>= 1). 1 runs the sequential search.
    pub parallelism: usize,
    pub strategy: SearchStrategy,
    /// Wall-clock budget; `None` searches until optimal.
    pub time_limit: Option<Duration>,
    /// Open plus closed states A* may hold before giving up.
    pub max_open_states: usize,
    /// Largest graph `Auto` hands to A*.
    pub astar_task_limit: usize,
    /// Cap on the branch-and-bound duplicate table. Once full, new states are
    /// explored without being recorded.
    pub max_visited_states: usize,
    /// Logging verbosity (0=silent, 1=changes, 2=checks, 3=debug).
    pub verbosity: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            processor_count: 1,
            parallelism: 1,
            strategy: SearchStrategy::Auto,
            time_limit: None,
            max_open_states: 2_000_000,
            astar_task_limit: 64,
            max_visited_states: 4_000_000,
            verbosity: 0,
        }
    }
}

impl SearchConfig {
    pub fn new(processor_count: usize) -> Self {
        Self {
            processor_count,
            ..Self::default()
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    pub fn with_max_open_states(mut self, max_open_states: usize) -> Self {
        self.max_open_states = max_open_states;
        self
    }

    pub fn with_astar_task_limit(mut self, astar_task_limit: usize) -> Self {
        self.astar_task_limit = astar_task_limit;
        self
    }

    pub fn with_max_visited_states(mut self, max_visited_states: usize) -> Self {
        self.max_visited_states = max_visited_states;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.processor_count == 0 {
            return Err("processor count must be at least 1".to_string());
        }
        if self.parallelism == 0 {
            return Err("parallelism must be at least 1".to_string());
        }
        if self.max_open_states == 0 {
            return Err("max_open_states must be at least 1".to_string());
        }
        Ok(())
    }
}
