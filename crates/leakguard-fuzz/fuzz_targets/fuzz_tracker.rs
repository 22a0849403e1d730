#![no_main]
use std::ffi::c_void;

use leakguard_membrane::{
    CallSite, CaptureSink, Serialized, SystemAllocator, Tracker, TrackerConfig,
};
use libfuzzer_sys::fuzz_target;

const SLOTS: usize = 16;

fuzz_target!(|data: &[u8]| {
    // Each 4-byte chunk: op, slot, size (u16 little-endian).
    let tracker: Tracker<SystemAllocator, Serialized, CaptureSink> = Tracker::new(
        SystemAllocator,
        CaptureSink::new(),
        TrackerConfig::default().with_initial_capacity(2),
    );
    let mut slots = [std::ptr::null_mut::<c_void>(); SLOTS];
    let mut stale: Vec<*mut c_void> = Vec::new();

    for (step, chunk) in data.chunks_exact(4).enumerate() {
        let site = CallSite::new("fuzz", step as u32);
        let slot = chunk[1] as usize % SLOTS;
        let size = u16::from_le_bytes([chunk[2], chunk[3]]) as usize;

        match chunk[0] % 5 {
            0 if slots[slot].is_null() => {
                slots[slot] = tracker.malloc_at(size, site);
            }
            1 if slots[slot].is_null() => {
                slots[slot] = tracker.calloc_at(chunk[2] as usize, chunk[3] as usize, site);
            }
            2 => {
                // SAFETY: slot holds null or a live tracked pointer.
                let q = unsafe { tracker.realloc_at(slots[slot], size, site) };
                if size == 0 && !slots[slot].is_null() {
                    slots[slot] = std::ptr::null_mut();
                } else if !q.is_null() {
                    slots[slot] = q;
                }
            }
            3 if !slots[slot].is_null() => {
                // SAFETY: live tracked pointer.
                unsafe { tracker.free_at(slots[slot], site) };
                stale.push(slots[slot]);
                slots[slot] = std::ptr::null_mut();
            }
            4 => {
                // Double free of a stale pointer, unless the address was reused.
                if let Some(p) = stale.pop() {
                    if !slots.contains(&p) {
                        // SAFETY: untracked pointers are never forwarded.
                        unsafe { tracker.free_at(p, site) };
                    }
                }
            }
            _ => {}
        }

        let live = slots.iter().filter(|p| !p.is_null()).count();
        assert_eq!(tracker.live_count(), live);
    }

    let summary = tracker.report_leaks().expect("single report");
    assert_eq!(summary.count, slots.iter().filter(|p| !p.is_null()).count());
    for p in slots {
        // SAFETY: the drained pointers are still owned by the system allocator.
        unsafe { libc::free(p) };
    }
});
