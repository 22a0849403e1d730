//! # leakguard-membrane
//!
//! Allocation tracking core: a chained hash table of live blocks keyed by
//! address, the guard that serializes access to it, and the one-shot leak
//! report that drains it.
//!
//! # Architecture
//!
//! ```text
//! caller -> Tracker::{malloc,calloc,realloc,free}
//!             |-> RawAllocator (libc)          outside the guard
//!             |-> Guard -> Registry            insert / remove / resize
//!             `-> DiagnosticSink               invalid frees
//! exit/fault -> Tracker::report_leaks
//!             |-> Guard -> Registry::drain     detach table
//!             `-> emit_report -> sink          outside the guard
//! ```
//!
//! The process-wide instance and the exit/fault hooks live in
//! `leakguard-abi`; everything here works on explicit [`Tracker`] values so
//! tests can build independent instances.
#![allow(clippy::missing_safety_doc)]

pub mod alloc;
pub mod config;
pub mod diag;
pub mod error;
pub mod guard;
pub mod record;
pub mod registry;
pub mod report;
pub mod site;
pub mod tracker;

pub use alloc::{RawAllocator, SystemAllocator};
pub use config::TrackerConfig;
pub use diag::{CaptureSink, Diagnostic, DiagnosticSink, JsonlSink, StderrSink};
pub use error::{BookkeepingFailure, InvalidDeallocation};
pub use guard::{DefaultGuard, Guard, Serialized, Unsynchronized};
pub use record::{AllocKind, AllocationRecord};
pub use registry::{InsertOutcome, Registry, RegistrySnapshot, RegistryStats, ResizeOutcome};
pub use report::LeakSummary;
pub use site::CallSite;
pub use tracker::Tracker;
