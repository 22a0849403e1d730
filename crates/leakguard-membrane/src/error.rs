//! Tracker error types.
//!
//! None of these are fatal. They exist so the registry can hand the outcome
//! back to its caller, which turns them into diagnostics.

use thiserror::Error;

use crate::site::CallSite;

/// A release (or resize) targeted an address with no live record.
///
/// Covers both "never allocated" and "already released"; the registry cannot
/// tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid free at {addr:#x} ({site})")]
pub struct InvalidDeallocation {
    pub addr: usize,
    pub site: CallSite,
}

/// The registry could not reserve storage for its own metadata.
///
/// The affected block is left untracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("registry bookkeeping allocation failed for {addr:#x}")]
pub struct BookkeepingFailure {
    pub addr: usize,
}
