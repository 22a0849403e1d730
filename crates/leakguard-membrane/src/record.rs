//! Per-allocation metadata owned by the registry.

use serde::Serialize;

use crate::site::CallSite;

/// How a tracked block came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocKind {
    /// `malloc`.
    Fresh,
    /// `calloc`.
    Zeroed,
    /// Produced or updated by `realloc`.
    Resized,
}

/// One live allocation.
///
/// `addr` is an identity only; the registry never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    pub addr: usize,
    pub size: usize,
    pub site: CallSite,
    pub kind: AllocKind,
}

impl AllocationRecord {
    #[must_use]
    pub const fn new(addr: usize, size: usize, site: CallSite, kind: AllocKind) -> Self {
        Self {
            addr,
            size,
            site,
            kind,
        }
    }
}
