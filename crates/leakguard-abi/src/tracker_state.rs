//! The process-wide tracker.
//!
//! A plain `static`: every part of it is `const`-constructible, so there is
//! no lazy initialization to race with (or recurse into) from the first
//! allocation or from a signal handler.

use leakguard_membrane::{DefaultGuard, Registry, StderrSink, SystemAllocator, Tracker};

static GLOBAL_TRACKER: Tracker = Tracker::from_parts(
    SystemAllocator,
    DefaultGuard::const_new(Registry::new()),
    StderrSink::from_features(),
);

/// The tracker behind every drop-in and hook in this crate.
#[must_use]
pub fn global() -> &'static Tracker {
    &GLOBAL_TRACKER
}
