//! `extern "C"` entrypoints.
//!
//! A C caller wraps these in macros that pass `__FILE__` and `__LINE__`:
//!
//! ```c
//! #define malloc(n)      leakguard_malloc((n), __FILE__, __LINE__)
//! #define calloc(n, s)   leakguard_calloc((n), (s), __FILE__, __LINE__)
//! #define realloc(p, n)  leakguard_realloc((p), (n), __FILE__, __LINE__)
//! #define free(p)        leakguard_free((p), __FILE__, __LINE__)
//! ```
//!
//! The file pointer must be null or point to a string that lives for the
//! rest of the process, which `__FILE__` does. Records keep it until the
//! report is printed.

use std::ffi::{c_char, c_int, c_long, c_void};

use leakguard_membrane::CallSite;

use crate::hooks;
use crate::tracker_state::global;

#[unsafe(no_mangle)]
pub unsafe extern "C" fn leakguard_malloc(
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: caller passes a static NUL-terminated string or null.
    let site = unsafe { CallSite::from_c(file, line) };
    global().malloc_at(size, site)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn leakguard_calloc(
    nmemb: usize,
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: as in `leakguard_malloc`.
    let site = unsafe { CallSite::from_c(file, line) };
    global().calloc_at(nmemb, size, site)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn leakguard_realloc(
    ptr: *mut c_void,
    size: usize,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: as in `leakguard_malloc`.
    let site = unsafe { CallSite::from_c(file, line) };
    // SAFETY: `ptr` comes from the same family of entrypoints or is null.
    unsafe { global().realloc_at(ptr, size, site) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn leakguard_free(ptr: *mut c_void, file: *const c_char, line: c_int) {
    // SAFETY: as in `leakguard_malloc`.
    let site = unsafe { CallSite::from_c(file, line) };
    // SAFETY: untracked pointers are never forwarded to the allocator.
    unsafe { global().free_at(ptr, site) }
}

/// Install the exit and fault hooks. Returns 0 on success, -1 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn leakguard_init() -> c_int {
    match hooks::init() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Print the leak report now. Returns the number of leaked blocks, or -1 if
/// a report was already printed or the registry was unavailable.
#[unsafe(no_mangle)]
pub extern "C" fn leakguard_report() -> c_long {
    match global().report_leaks() {
        Some(summary) => c_long::try_from(summary.count).unwrap_or(c_long::MAX),
        None => -1,
    }
}
