//! Mutual exclusion around the registry.
//!
//! [`Serialized`] puts the registry behind a `parking_lot::Mutex`, making
//! every insert/remove/resize/drain linearizable across threads.
//! [`Unsynchronized`] takes no lock at all and only promises program order.
//! It still refuses overlapping access (the losing operation goes untracked)
//! so a misconfigured multi-threaded program cannot alias the table.
//!
//! Neither guard covers the underlying allocator call or report printing.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::registry::Registry;

/// Exclusive access to a [`Registry`].
pub trait Guard: Send + Sync {
    /// Wrap `registry`.
    fn new(registry: Registry) -> Self
    where
        Self: Sized;

    /// Run `f` with exclusive access. `None` means access was refused and
    /// nothing ran.
    fn with<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> Option<R>;

    /// Like [`Guard::with`], but give up after `timeout`.
    fn with_timeout<R>(&self, timeout: Duration, f: impl FnOnce(&mut Registry) -> R)
    -> Option<R>;
}

/// Lock-based guard.
#[derive(Debug)]
pub struct Serialized {
    registry: Mutex<Registry>,
}

impl Serialized {
    #[must_use]
    pub const fn const_new(registry: Registry) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }
}

impl Guard for Serialized {
    fn new(registry: Registry) -> Self {
        Self::const_new(registry)
    }

    fn with<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
        let mut registry = self.registry.lock();
        Some(f(&mut registry))
    }

    fn with_timeout<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut Registry) -> R,
    ) -> Option<R> {
        let mut registry = self.registry.try_lock_for(timeout)?;
        Some(f(&mut registry))
    }
}

/// Lock-free guard for single-threaded programs.
#[derive(Debug)]
pub struct Unsynchronized {
    busy: AtomicBool,
    registry: UnsafeCell<Registry>,
}

// SAFETY: `registry` is only reached through `with`, which hands out the
// mutable reference while `busy` is held and refuses entry otherwise.
unsafe impl Sync for Unsynchronized {}

impl Unsynchronized {
    #[must_use]
    pub const fn const_new(registry: Registry) -> Self {
        Self {
            busy: AtomicBool::new(false),
            registry: UnsafeCell::new(registry),
        }
    }
}

struct BusyFlag<'a>(&'a AtomicBool);

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Guard for Unsynchronized {
    fn new(registry: Registry) -> Self {
        Self::const_new(registry)
    }

    fn with<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
        if self.busy.swap(true, Ordering::Acquire) {
            return None;
        }
        let _flag = BusyFlag(&self.busy);
        // SAFETY: `busy` was false and is now ours until `_flag` drops, so no
        // other reference to the registry exists.
        let registry = unsafe { &mut *self.registry.get() };
        Some(f(registry))
    }

    fn with_timeout<R>(
        &self,
        _timeout: Duration,
        f: impl FnOnce(&mut Registry) -> R,
    ) -> Option<R> {
        self.with(f)
    }
}

/// Guard used by the process-wide tracker, selected by the `thread-safe`
/// feature.
#[cfg(feature = "thread-safe")]
pub type DefaultGuard = Serialized;
#[cfg(not(feature = "thread-safe"))]
pub type DefaultGuard = Unsynchronized;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AllocKind;
    use crate::site::CallSite;
    use std::sync::Arc;
    use std::thread;

    const SITE: CallSite = CallSite::new("guard.rs", 1);

    #[test]
    fn serialized_runs_closure() {
        let guard = Serialized::new(Registry::new());
        let inserted = guard.with(|r| r.insert(0x10, 4, SITE, AllocKind::Fresh).is_ok());
        assert_eq!(inserted, Some(true));
        assert_eq!(guard.with(|r| r.len()), Some(1));
    }

    #[test]
    fn serialized_timeout_gives_up_while_locked() {
        let guard = Arc::new(Serialized::new(Registry::new()));
        let held = guard.registry.lock();
        let other = Arc::clone(&guard);
        let result = thread::spawn(move || {
            other.with_timeout(Duration::from_millis(20), |r| r.len())
        })
        .join()
        .expect("thread");
        assert_eq!(result, None);
        drop(held);
        assert_eq!(guard.with_timeout(Duration::from_millis(20), |r| r.len()), Some(0));
    }

    #[test]
    fn default_guard_follows_thread_safe_feature() {
        let name = std::any::type_name::<DefaultGuard>();
        assert_eq!(name.ends_with("Serialized"), crate::config::THREAD_SAFE);
        assert_eq!(name.ends_with("Unsynchronized"), !crate::config::THREAD_SAFE);
    }

    #[test]
    fn unsynchronized_refuses_reentry() {
        let guard = Unsynchronized::new(Registry::new());
        let nested = guard.with(|_| guard.with(|r| r.len()));
        assert_eq!(nested, Some(None));
        assert_eq!(guard.with(|r| r.len()), Some(0));
    }

    #[test]
    fn unsynchronized_releases_flag_after_panic() {
        let guard = Unsynchronized::new(Registry::new());
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            guard.with(|_| panic!("boom"));
        }));
        assert!(caught.is_err());
        assert_eq!(guard.with(|r| r.len()), Some(0));
    }
}
