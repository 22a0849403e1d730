// The C entrypoints take raw pointers straight from C callers; their contract
// is the C allocator's contract.
#![allow(clippy::missing_safety_doc)]
//! # leakguard-abi
//!
//! Process-wide leak tracking on top of `leakguard-membrane`.
//!
//! This crate owns the one global [`Tracker`](leakguard_membrane::Tracker)
//! and exposes it three ways:
//!
//! - Rust drop-ins ([`malloc`], [`calloc`], [`realloc`], [`free`]) that
//!   capture the caller's location with `#[track_caller]`;
//! - `extern "C"` entrypoints (`leakguard_malloc` and friends) taking an
//!   explicit `__FILE__` / `__LINE__` pair, built into a `cdylib`;
//! - [`init`], which prints the report at process exit and on fatal signals.
//!
//! ```text
//! caller -> drop-in / C entry -> Tracker (guard + registry) -> system allocator
//!                                   |
//!            atexit / SIGSEGV ... --+--> leak report on stderr
//! ```

pub mod api;
pub mod hooks;
pub mod malloc_abi;
mod tracker_state;

pub use api::{calloc, free, lookup, malloc, realloc, report_now, stats};
pub use hooks::{FATAL_SIGNALS, HookError, hooks_installed, init};
pub use tracker_state::global;
