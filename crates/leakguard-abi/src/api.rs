//! Rust drop-ins for the C allocation functions.
//!
//! Each entry point records the caller's source location via
//! `#[track_caller]`, so `leakguard_abi::malloc(n)` at `src/main.rs:12`
//! attributes the block to `src/main.rs:12`.

use std::ffi::c_void;

use leakguard_membrane::{AllocationRecord, LeakSummary, RegistryStats};

use crate::tracker_state::global;

/// Tracked `malloc`.
#[track_caller]
#[must_use]
pub fn malloc(size: usize) -> *mut c_void {
    global().malloc(size)
}

/// Tracked `calloc`. Returns null if `nmemb * size` overflows.
#[track_caller]
#[must_use]
pub fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    global().calloc(nmemb, size)
}

/// Tracked `realloc`.
///
/// # Safety
///
/// `ptr` must be null or a pointer obtained from this crate's allocation
/// functions that has not been released since.
#[track_caller]
pub unsafe fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    // SAFETY: forwarded caller contract.
    unsafe { global().realloc(ptr, size) }
}

/// Tracked `free`. Untracked pointers are reported and never forwarded.
///
/// # Safety
///
/// If `ptr` is tracked, no live reference into its block may outlive this
/// call.
#[track_caller]
pub unsafe fn free(ptr: *mut c_void) {
    // SAFETY: forwarded caller contract.
    unsafe { global().free(ptr) }
}

/// Print the leak report now instead of at exit. Later reports, including
/// the exit hook's, are suppressed.
pub fn report_now() -> Option<LeakSummary> {
    global().report_leaks()
}

#[must_use]
pub fn stats() -> Option<RegistryStats> {
    global().stats()
}

/// The record tracked for `ptr`, if any.
#[must_use]
pub fn lookup(ptr: *const c_void) -> Option<AllocationRecord> {
    global().record(ptr)
}
