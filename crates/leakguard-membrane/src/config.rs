//! Build-time configuration.
//!
//! Behavior is selected with cargo features only; there is deliberately no
//! environment variable or config file:
//! - `thread-safe` (default): the process-wide tracker serializes registry
//!   mutations behind a `parking_lot::Mutex`.
//! - `no-color`: diagnostic tags are printed without ANSI escapes.

use std::time::Duration;

/// Tag prefixed to every diagnostic line.
pub const TAG: &str = "[LEAKGUARD]";

/// ANSI yellow, wrapped around [`TAG`] when color is enabled.
pub(crate) const TAG_COLOR: &str = "\x1b[33m";
pub(crate) const COLOR_RESET: &str = "\x1b[0m";

/// Bucket count of the table allocated on first insert.
pub const INITIAL_CAPACITY: usize = 1024;

/// Grow when `live > capacity * LOAD_FACTOR_NUM / LOAD_FACTOR_DEN`.
pub const LOAD_FACTOR_NUM: usize = 3;
pub const LOAD_FACTOR_DEN: usize = 4;

/// Whether the `thread-safe` feature is compiled in.
pub const THREAD_SAFE: bool = cfg!(feature = "thread-safe");

/// Whether diagnostics are colored by default.
pub const COLOR_ENABLED: bool = !cfg!(feature = "no-color");

/// How long the fault path waits for the registry lock before giving up on
/// the report. A fault raised while the faulting thread itself holds the lock
/// would otherwise deadlock the handler.
pub const FAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Per-instance tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Bucket count allocated on first insert. Rounded up to at least 1.
    pub initial_capacity: usize,
    /// Wrap the diagnostic tag in ANSI color.
    pub color: bool,
}

impl TrackerConfig {
    /// Settings implied by the compiled feature set.
    #[must_use]
    pub const fn from_features() -> Self {
        Self {
            initial_capacity: INITIAL_CAPACITY,
            color: COLOR_ENABLED,
        }
    }

    #[must_use]
    pub const fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = if initial_capacity == 0 {
            1
        } else {
            initial_capacity
        };
        self
    }

    #[must_use]
    pub const fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_features()
    }
}

/// Grow threshold for a table of `capacity` buckets.
#[must_use]
pub const fn grow_threshold(capacity: usize) -> usize {
    capacity * LOAD_FACTOR_NUM / LOAD_FACTOR_DEN
}
