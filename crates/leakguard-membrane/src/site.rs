//! Source locations attached to allocation events.

#![allow(unsafe_code)]

use std::ffi::{CStr, c_char, c_int};
use std::fmt;
use std::panic::Location;

use serde::Serialize;

/// File name used when a C caller passes a null or non-UTF-8 `__FILE__`.
pub const UNKNOWN_FILE: &str = "<unknown>";

/// The file and line of an allocation-family call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Location of the caller, propagated through every `#[track_caller]`
    /// frame between here and user code.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    /// Build a site from a C `__FILE__` / `__LINE__` pair.
    ///
    /// # Safety
    ///
    /// `file` must be null or point to a NUL-terminated string that lives for
    /// the rest of the process, which is what `__FILE__` literals do.
    #[must_use]
    pub unsafe fn from_c(file: *const c_char, line: c_int) -> Self {
        let file = if file.is_null() {
            UNKNOWN_FILE
        } else {
            // SAFETY: caller guarantees a static NUL-terminated string.
            let cstr: &'static CStr = unsafe { CStr::from_ptr(file) };
            cstr.to_str().unwrap_or(UNKNOWN_FILE)
        };
        Self {
            file,
            line: u32::try_from(line).unwrap_or(0),
        }
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn forwarded() -> CallSite {
        CallSite::caller()
    }

    #[test]
    fn caller_reports_this_file() {
        let line = line!() + 1;
        let site = CallSite::caller();
        assert!(site.file.ends_with("site.rs"), "file={}", site.file);
        assert_eq!(site.line, line);
    }

    #[test]
    fn caller_propagates_through_track_caller() {
        let line = line!() + 1;
        let site = forwarded();
        assert_eq!(site.line, line);
    }

    #[test]
    fn from_c_reads_literal() {
        // SAFETY: c-string literals are static and NUL-terminated.
        let site = unsafe { CallSite::from_c(c"main.c".as_ptr(), 42) };
        assert_eq!(site, CallSite::new("main.c", 42));
    }

    #[test]
    fn from_c_null_file_and_negative_line() {
        // SAFETY: null is explicitly allowed.
        let site = unsafe { CallSite::from_c(std::ptr::null(), -7) };
        assert_eq!(site, CallSite::new(UNKNOWN_FILE, 0));
    }

    #[test]
    fn display_is_file_colon_line() {
        assert_eq!(CallSite::new("a.rs", 9).to_string(), "a.rs:9");
    }
}
