//! The tracker: allocator + guarded registry + diagnostic sink.
//!
//! Every allocation-family method forwards to the underlying allocator first
//! and only then notifies the registry, so the guard never covers the
//! allocator call. Call sites come from `#[track_caller]`; the `*_at`
//! variants take an explicit site for callers that already have one (C
//! entrypoints, wrappers).
//!
//! Lifecycle: construct (or `const`-construct for a `static`), use, then
//! [`Tracker::report_leaks`] exactly once. Later reports are no-ops.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::alloc::{RawAllocator, SystemAllocator};
use crate::config::TrackerConfig;
use crate::diag::{Diagnostic, DiagnosticSink, StderrSink};
use crate::guard::{DefaultGuard, Guard};
use crate::record::{AllocKind, AllocationRecord};
use crate::registry::{Registry, RegistryStats, ResizeOutcome};
use crate::report::{LeakSummary, emit_report};
use crate::site::CallSite;

/// Allocation tracker context.
pub struct Tracker<A = SystemAllocator, G = DefaultGuard, S = StderrSink>
where
    A: RawAllocator,
    G: Guard,
    S: DiagnosticSink,
{
    allocator: A,
    guard: G,
    sink: S,
    reported: AtomicBool,
}

impl<A, G, S> Tracker<A, G, S>
where
    A: RawAllocator,
    G: Guard,
    S: DiagnosticSink,
{
    /// Assemble a tracker from ready-made parts. Usable in `static` items.
    pub const fn from_parts(allocator: A, guard: G, sink: S) -> Self {
        Self {
            allocator,
            guard,
            sink,
            reported: AtomicBool::new(false),
        }
    }

    pub fn new(allocator: A, sink: S, config: TrackerConfig) -> Self {
        Self::from_parts(
            allocator,
            G::new(Registry::with_initial_capacity(config.initial_capacity)),
            sink,
        )
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// `malloc` with call-site capture.
    #[track_caller]
    pub fn malloc(&self, size: usize) -> *mut c_void {
        self.malloc_at(size, CallSite::caller())
    }

    /// `calloc` with call-site capture.
    #[track_caller]
    pub fn calloc(&self, nmemb: usize, size: usize) -> *mut c_void {
        self.calloc_at(nmemb, size, CallSite::caller())
    }

    /// `realloc` with call-site capture.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a block from this tracker's allocator.
    #[track_caller]
    pub unsafe fn realloc(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        // SAFETY: forwarded caller contract.
        unsafe { self.realloc_at(ptr, size, CallSite::caller()) }
    }

    /// `free` with call-site capture.
    ///
    /// # Safety
    ///
    /// If `ptr` is tracked it must not be in use anywhere else.
    #[track_caller]
    pub unsafe fn free(&self, ptr: *mut c_void) {
        // SAFETY: forwarded caller contract.
        unsafe { self.free_at(ptr, CallSite::caller()) }
    }

    pub fn malloc_at(&self, size: usize, site: CallSite) -> *mut c_void {
        // SAFETY: plain malloc, no preconditions.
        let ptr = unsafe { self.allocator.malloc(size) };
        self.track(ptr, size, site, AllocKind::Fresh);
        ptr
    }

    /// Returns null without touching the allocator when `nmemb * size`
    /// overflows.
    pub fn calloc_at(&self, nmemb: usize, size: usize, site: CallSite) -> *mut c_void {
        let Some(total) = nmemb.checked_mul(size) else {
            return std::ptr::null_mut();
        };
        // SAFETY: plain calloc, no preconditions.
        let ptr = unsafe { self.allocator.calloc(nmemb, size) };
        self.track(ptr, total, site, AllocKind::Zeroed);
        ptr
    }

    /// Reallocate a tracked block.
    ///
    /// - null `ptr` behaves like `malloc`;
    /// - `size == 0` releases `ptr` and returns null;
    /// - an untracked `ptr` is reported as an invalid free and left alone
    ///   (null is returned, the allocator is not called);
    /// - on failure the old record stays live and null is returned.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a block from this tracker's allocator.
    pub unsafe fn realloc_at(&self, ptr: *mut c_void, size: usize, site: CallSite) -> *mut c_void {
        let old = ptr as usize;
        if old != 0 && size == 0 {
            // SAFETY: forwarded caller contract.
            unsafe { self.free_at(ptr, site) };
            return std::ptr::null_mut();
        }

        if old != 0 {
            if let Some(Err(invalid)) = self.guard.with(|r| r.expect_live(old, site)) {
                self.sink.emit(&invalid.into());
                return std::ptr::null_mut();
            }
        }

        // SAFETY: `ptr` is null or tracked as live.
        let new_ptr = unsafe { self.allocator.realloc(ptr, size) };
        let new = new_ptr as usize;
        if let Some(Ok(ResizeOutcome::Adopted(invalid))) =
            self.guard.with(|r| r.resize(old, new, size, site))
        {
            // Released by another thread between the check and the resize.
            self.sink.emit(&invalid.into());
        }
        new_ptr
    }

    /// Release a block. Null is a no-op; an untracked address is reported
    /// and never reaches the allocator.
    ///
    /// # Safety
    ///
    /// If `ptr` is tracked it must not be in use anywhere else.
    pub unsafe fn free_at(&self, ptr: *mut c_void, site: CallSite) {
        let addr = ptr as usize;
        if addr == 0 {
            return;
        }
        match self.guard.with(|r| r.remove(addr, site)) {
            Some(Ok(_)) | None => {
                // SAFETY: the block was live (or the guard refused access
                // and the caller's word is all we have).
                unsafe { self.allocator.free(ptr) };
            }
            Some(Err(invalid)) => self.sink.emit(&invalid.into()),
        }
    }

    fn track(&self, ptr: *mut c_void, size: usize, site: CallSite, kind: AllocKind) {
        if ptr.is_null() {
            return;
        }
        // A refused guard or a bookkeeping failure leaves the block untracked.
        let _ = self.guard.with(|r| r.insert(ptr as usize, size, site, kind));
    }

    /// Drain the registry and print the leak report. Runs once per tracker;
    /// later calls return `None` without printing.
    ///
    /// If the guard refuses access, `registry busy, leak report skipped` is
    /// emitted, `None` is returned and the report stays pending, so a later
    /// call (for example the exit hook) can still print it.
    pub fn report_leaks(&self) -> Option<LeakSummary> {
        self.report_with(|guard| guard.with(Registry::drain))
    }

    /// [`Tracker::report_leaks`] for contexts that must not block
    /// indefinitely, such as a fault handler.
    pub fn report_leaks_within(&self, timeout: Duration) -> Option<LeakSummary> {
        self.report_with(|guard| guard.with_timeout(timeout, Registry::drain))
    }

    fn report_with(
        &self,
        drain: impl FnOnce(&G) -> Option<crate::registry::RegistrySnapshot>,
    ) -> Option<LeakSummary> {
        if self.reported.swap(true, Ordering::AcqRel) {
            return None;
        }
        let Some(snapshot) = drain(&self.guard) else {
            self.sink.emit(&Diagnostic::ReportUnavailable);
            self.reported.store(false, Ordering::Release);
            return None;
        };
        let summary = emit_report(&snapshot, &self.sink);
        drop(snapshot);
        Some(summary)
    }

    #[must_use]
    pub fn has_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    /// Live and cumulative counters, or `None` if the guard refused access.
    pub fn stats(&self) -> Option<RegistryStats> {
        self.guard.with(|r| r.stats())
    }

    pub fn record(&self, ptr: *const c_void) -> Option<AllocationRecord> {
        self.guard.with(|r| r.get(ptr as usize)).flatten()
    }

    /// Live record count (0 if the guard refused access).
    pub fn live_count(&self) -> usize {
        self.guard.with(|r| r.len()).unwrap_or(0)
    }

    /// Run `f` against the registry under the guard.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
        self.guard.with(f)
    }
}

impl<G: Guard> Tracker<SystemAllocator, G, StderrSink> {
    /// System allocator, stderr diagnostics.
    pub fn with_config(config: TrackerConfig) -> Self {
        Self::new(SystemAllocator, StderrSink::new(config.color), config)
    }
}

impl<G: Guard> Default for Tracker<SystemAllocator, G, StderrSink> {
    fn default() -> Self {
        Self::with_config(TrackerConfig::default())
    }
}
