//! Logging macros for the search engine with verbosity level control.
//!
//! Messages are gated by the caller's configured verbosity first, then forwarded to
//! `tracing`, so nothing is formatted when verbosity is 0 and the embedding
//! application's subscriber decides where output goes.
//! - 0: SILENT (only errors surface, through `Result`)
//! - 1: CHANGES (strategy decisions, incumbent improvements, fallbacks)
//! - 2: CHECKS (pruning and duplicate detection summaries)
//! - 3: DEBUG (per-expansion internals)

#[doc(hidden)]
pub use tracing;

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: strategy selection, new incumbents, A* to branch-and-bound fallback.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            $crate::logging::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: pruning decisions, closed-set hits, budget checks.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            $crate::logging::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: individual expansions and heuristic values.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            $crate::logging::tracing::trace!($($arg)*);
        }
    };
}
