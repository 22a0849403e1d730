//! Process-exit and fatal-signal hooks.
//!
//! [`init`] registers an `atexit` callback that prints the leak report and
//! installs handlers for `SIGSEGV`, `SIGABRT`, `SIGILL` and `SIGFPE`. A
//! handler announces the signal, reports, restores the default disposition
//! and raises the signal again so the process still dies the way it would
//! have without the tracker.
//!
//! The handlers replace the runtime's own `SIGSEGV` handler, so a stack
//! overflow after [`init`] prints the leak report instead of the runtime's
//! overflow message before the process dies.

use std::ffi::c_int;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};

use leakguard_membrane::Diagnostic;
use leakguard_membrane::DiagnosticSink;
use leakguard_membrane::config::FAULT_LOCK_TIMEOUT;
use thiserror::Error;

use crate::tracker_state::global;

/// Signals that trigger a report before the process terminates.
pub const FATAL_SIGNALS: [c_int; 4] = [libc::SIGSEGV, libc::SIGABRT, libc::SIGILL, libc::SIGFPE];

const STATE_UNINIT: u8 = 0;
const STATE_INSTALLING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_FAILED: u8 = 3;

static HOOK_STATE: AtomicU8 = AtomicU8::new(STATE_UNINIT);

#[derive(Debug, Error)]
pub enum HookError {
    #[error("atexit registration failed")]
    ExitHook,
    #[error("installing handler for signal {signal} failed: {source}")]
    FaultHook {
        signal: c_int,
        #[source]
        source: io::Error,
    },
    #[error("an earlier hook installation failed")]
    PreviouslyFailed,
}

/// Install the exit report and the fatal-signal hooks.
///
/// Idempotent: the first caller installs, everyone else (including a caller
/// racing the first) returns `Ok(())` without touching process state. A
/// failed installation is not retried; later calls return
/// [`HookError::PreviouslyFailed`].
pub fn init() -> Result<(), HookError> {
    match HOOK_STATE.compare_exchange(
        STATE_UNINIT,
        STATE_INSTALLING,
        Ordering::SeqCst,
        Ordering::Acquire,
    ) {
        Ok(_) => {}
        Err(STATE_FAILED) => return Err(HookError::PreviouslyFailed),
        Err(_) => return Ok(()),
    }

    let installed = install_exit_hook().and_then(|()| install_fault_hooks());
    let next = if installed.is_ok() {
        STATE_READY
    } else {
        STATE_FAILED
    };
    HOOK_STATE.store(next, Ordering::Release);
    installed
}

/// Whether [`init`] has completed successfully.
#[must_use]
pub fn hooks_installed() -> bool {
    HOOK_STATE.load(Ordering::Acquire) == STATE_READY
}

fn install_exit_hook() -> Result<(), HookError> {
    // SAFETY: `report_at_exit` is a plain `extern "C" fn()` with static
    // lifetime.
    let rc = unsafe { libc::atexit(report_at_exit) };
    if rc != 0 {
        return Err(HookError::ExitHook);
    }
    Ok(())
}

fn install_fault_hooks() -> Result<(), HookError> {
    for signal in FATAL_SIGNALS {
        // SAFETY: a zeroed sigaction is a valid "no flags, empty mask" value.
        let mut act = unsafe { std::mem::zeroed::<libc::sigaction>() };
        act.sa_sigaction = on_fatal_signal as extern "C" fn(c_int) as libc::sighandler_t;
        // Let the re-raise inside the handler take effect immediately, and
        // run on the alternate stack the runtime sets up so a stack overflow
        // still reaches the handler.
        act.sa_flags = libc::SA_NODEFER | libc::SA_ONSTACK;
        // SAFETY: `act` is fully initialized; no old action is requested.
        let rc = unsafe { libc::sigaction(signal, &act, std::ptr::null_mut()) };
        if rc != 0 {
            return Err(HookError::FaultHook {
                signal,
                source: io::Error::last_os_error(),
            });
        }
    }
    Ok(())
}

extern "C" fn report_at_exit() {
    let _ = global().report_leaks();
}

extern "C" fn on_fatal_signal(signal: c_int) {
    let tracker = global();
    tracker.sink().emit(&Diagnostic::Fault { signal });
    // Bounded wait: the fault may have hit while this thread held the lock.
    let _ = tracker.report_leaks_within(FAULT_LOCK_TIMEOUT);
    restore_default_and_raise(signal);
}

fn restore_default_and_raise(signal: c_int) {
    // SAFETY: resetting to SIG_DFL and raising are async-signal-safe.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
}
