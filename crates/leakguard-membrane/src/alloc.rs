//! The allocator underneath the tracker.

#![allow(unsafe_code)]

use std::ffi::c_void;

/// The four C allocation primitives.
///
/// Implementations return null on exhaustion exactly like libc; the tracker
/// passes that straight back to its caller.
///
/// # Safety
///
/// Implementations must behave like the libc primitives of the same name:
/// a non-null result is a distinct live block until passed to `free` or a
/// successful `realloc`.
pub unsafe trait RawAllocator: Send + Sync {
    /// # Safety
    /// Same contract as libc `malloc`.
    unsafe fn malloc(&self, size: usize) -> *mut c_void;

    /// # Safety
    /// Same contract as libc `calloc`.
    unsafe fn calloc(&self, nmemb: usize, size: usize) -> *mut c_void;

    /// # Safety
    /// `ptr` must be null or a live block from this allocator.
    unsafe fn realloc(&self, ptr: *mut c_void, size: usize) -> *mut c_void;

    /// # Safety
    /// `ptr` must be null or a live block from this allocator.
    unsafe fn free(&self, ptr: *mut c_void);
}

/// The host libc allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SystemAllocator;

// SAFETY: forwards to libc.
unsafe impl RawAllocator for SystemAllocator {
    #[inline]
    unsafe fn malloc(&self, size: usize) -> *mut c_void {
        // SAFETY: direct call to libc allocator symbol.
        unsafe { libc::malloc(size) }
    }

    #[inline]
    unsafe fn calloc(&self, nmemb: usize, size: usize) -> *mut c_void {
        // SAFETY: direct call to libc allocator symbol.
        unsafe { libc::calloc(nmemb, size) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        // SAFETY: caller upholds the realloc contract.
        unsafe { libc::realloc(ptr, size) }
    }

    #[inline]
    unsafe fn free(&self, ptr: *mut c_void) {
        // SAFETY: caller upholds the free contract.
        unsafe { libc::free(ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_round_trip() {
        let alloc = SystemAllocator;
        // SAFETY: standard malloc/realloc/free sequence on our own block.
        unsafe {
            let p = alloc.calloc(4, 4).cast::<u8>();
            assert!(!p.is_null());
            assert!(std::slice::from_raw_parts(p, 16).iter().all(|&b| b == 0));
            let q = alloc.realloc(p.cast(), 64);
            assert!(!q.is_null());
            alloc.free(q);
        }
    }
}
