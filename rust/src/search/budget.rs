//! Time limit and external cancellation, checked between expansions.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a search stopped before proving optimality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExhaustionReason {
    TimeLimit,
    StateLimit,
    Cancelled,
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustionReason::TimeLimit => write!(f, "time limit reached"),
            ExhaustionReason::StateLimit => write!(f, "state limit reached"),
            ExhaustionReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Shared flag a caller can flip from any thread to stop a running search.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Only every `CLOCK_INTERVAL`-th check reads the clock.
const CLOCK_INTERVAL: u64 = 256;

/// Per-run budget shared by all workers.
#[derive(Debug)]
pub(crate) struct Budget {
    deadline: Option<Instant>,
    token: CancellationToken,
    expired: AtomicBool,
    checks: AtomicU64,
}

impl Budget {
    pub(crate) fn new(time_limit: Option<Duration>, token: CancellationToken) -> Self {
        Self {
            deadline: time_limit.map(|limit| Instant::now() + limit),
            token,
            expired: AtomicBool::new(false),
            checks: AtomicU64::new(0),
        }
    }

    /// `Some(reason)` once the search must stop.
    pub(crate) fn check(&self) -> Option<ExhaustionReason> {
        if self.token.is_cancelled() {
            return Some(ExhaustionReason::Cancelled);
        }
        let deadline = self.deadline?;
        if self.expired.load(Ordering::Relaxed) {
            return Some(ExhaustionReason::TimeLimit);
        }
        let count = self.checks.fetch_add(1, Ordering::Relaxed);
        if count % CLOCK_INTERVAL == 0 && Instant::now() >= deadline {
            self.expired.store(true, Ordering::Relaxed);
            return Some(ExhaustionReason::TimeLimit);
        }
        None
    }
}
