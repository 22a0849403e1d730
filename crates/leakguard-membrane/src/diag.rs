//! Diagnostic events and where they are written.
//!
//! Provides:
//! - [`Diagnostic`]: the event vocabulary. `Display` renders the untagged
//!   text line, `Serialize` renders a JSONL record.
//! - [`DiagnosticSink`]: destination trait.
//! - [`StderrSink`]: tagged text lines on the process error stream.
//! - [`JsonlSink`]: one JSON object per line on any writer.
//! - [`CaptureSink`]: in-memory buffer, for tests and embedders.
//!
//! Diagnostics are advisory, so sinks swallow their own write errors.

use std::fmt;
use std::io::{self, Write};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{COLOR_ENABLED, COLOR_RESET, TAG, TAG_COLOR};
use crate::error::InvalidDeallocation;
use crate::record::AllocationRecord;
use crate::site::CallSite;

/// One diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Release of an address with no live record.
    InvalidFree { addr: usize, site: CallSite },
    /// A block still live when the report ran.
    Leak {
        addr: usize,
        size: usize,
        site: CallSite,
    },
    /// Trailer of a non-empty report.
    Summary { count: usize, bytes: usize },
    /// Trailer of an empty report.
    NoLeaks,
    /// A fatal signal was caught; a report follows.
    Fault { signal: i32 },
    /// The registry was busy; the report was skipped and stays pending.
    ReportUnavailable,
}

impl From<InvalidDeallocation> for Diagnostic {
    fn from(err: InvalidDeallocation) -> Self {
        Self::InvalidFree {
            addr: err.addr,
            site: err.site,
        }
    }
}

impl From<&AllocationRecord> for Diagnostic {
    fn from(record: &AllocationRecord) -> Self {
        Self::Leak {
            addr: record.addr,
            size: record.size,
            site: record.site,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFree { addr, site } => write!(f, "invalid free at {addr:#x} ({site})"),
            Self::Leak { addr, size, site } => write!(f, "{size} bytes at {addr:#x} ({site})"),
            Self::Summary { count, bytes } => {
                write!(f, "total ({count}) leaks, ({bytes}) bytes")
            }
            Self::NoLeaks => f.write_str("no leaks"),
            Self::Fault { signal } => write!(f, "caught signal {signal}, dumping leaks..."),
            Self::ReportUnavailable => f.write_str("registry busy, leak report skipped"),
        }
    }
}

/// Destination for diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn emit(&self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for std::sync::Arc<S> {
    fn emit(&self, diagnostic: &Diagnostic) {
        (**self).emit(diagnostic);
    }
}

/// Render `diagnostic` as a full tagged line, without the newline.
#[must_use]
pub fn render_line(diagnostic: &Diagnostic, color: bool) -> String {
    if color {
        format!("{TAG_COLOR}{TAG}{COLOR_RESET} {diagnostic}")
    } else {
        format!("{TAG} {diagnostic}")
    }
}

/// Tagged text lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StderrSink {
    color: bool,
}

impl StderrSink {
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    /// Colored unless built with `no-color`.
    #[must_use]
    pub const fn from_features() -> Self {
        Self::new(COLOR_ENABLED)
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::from_features()
    }
}

impl DiagnosticSink for StderrSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        let line = render_line(diagnostic, self.color);
        // A fault notice starts on a fresh line, whatever was mid-print.
        let lead = if matches!(diagnostic, Diagnostic::Fault { .. }) {
            "\n"
        } else {
            ""
        };
        let _ = writeln!(io::stderr().lock(), "{lead}{line}");
    }
}

/// Structured log sink: one JSON object per diagnostic.
pub struct JsonlSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> DiagnosticSink for JsonlSink<W> {
    fn emit(&self, diagnostic: &Diagnostic) {
        let mut writer = self.writer.lock();
        if serde_json::to_writer(&mut *writer, diagnostic).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CaptureSink {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().clone()
    }

    /// Untagged text of every captured event.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events.lock().iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    #[must_use]
    pub fn invalid_frees(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, Diagnostic::InvalidFree { .. }))
            .copied()
            .collect()
    }
}

impl DiagnosticSink for CaptureSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.events.lock().push(*diagnostic);
    }
}
