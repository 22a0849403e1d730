//! Leak report rendering.
//!
//! The report works on a [`RegistrySnapshot`] that was detached under the
//! guard, so printing never races with allocations made meanwhile.

use serde::Serialize;

use crate::diag::{Diagnostic, DiagnosticSink};
use crate::registry::RegistrySnapshot;

/// Totals printed at the end of a report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeakSummary {
    pub count: usize,
    pub bytes: usize,
}

impl LeakSummary {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.count == 0
    }
}

/// Emit one `Leak` line per record in address order, then the summary (or
/// `NoLeaks` for an empty snapshot).
pub fn emit_report(snapshot: &RegistrySnapshot, sink: &dyn DiagnosticSink) -> LeakSummary {
    let mut summary = LeakSummary::default();
    for record in snapshot.sorted_records() {
        sink.emit(&Diagnostic::from(&record));
        summary.count += 1;
        summary.bytes += record.size;
    }

    if summary.is_clean() {
        sink.emit(&Diagnostic::NoLeaks);
    } else {
        sink.emit(&Diagnostic::Summary {
            count: summary.count,
            bytes: summary.bytes,
        });
    }
    summary
}
