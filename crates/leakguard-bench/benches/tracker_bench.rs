//! Tracker overhead versus the host allocator.

use std::ffi::c_void;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use leakguard_membrane::{
    CaptureSink, Serialized, SystemAllocator, Tracker, TrackerConfig, Unsynchronized,
};

fn bench_malloc_free(c: &mut Criterion) {
    let sizes: [usize; 4] = [16, 256, 4096, 65_536];
    let mut group = c.benchmark_group("malloc_free_cycle");

    let serialized: Tracker<SystemAllocator, Serialized, CaptureSink> =
        Tracker::new(SystemAllocator, CaptureSink::new(), TrackerConfig::default());
    let unsynchronized: Tracker<SystemAllocator, Unsynchronized, CaptureSink> =
        Tracker::new(SystemAllocator, CaptureSink::new(), TrackerConfig::default());

    for size in sizes {
        group.bench_with_input(BenchmarkId::new("host_libc", size), &size, |b, &sz| {
            b.iter(|| {
                // SAFETY: pointer comes straight from malloc.
                unsafe {
                    let p = libc::malloc(black_box(sz));
                    libc::free(black_box(p));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("serialized", size), &size, |b, &sz| {
            b.iter(|| {
                let p = serialized.malloc(black_box(sz));
                // SAFETY: pointer comes from the same tracker.
                unsafe { serialized.free(black_box(p)) };
            });
        });

        group.bench_with_input(BenchmarkId::new("unsynchronized", size), &size, |b, &sz| {
            b.iter(|| {
                let p = unsynchronized.malloc(black_box(sz));
                // SAFETY: pointer comes from the same tracker.
                unsafe { unsynchronized.free(black_box(p)) };
            });
        });

        group.bench_with_input(BenchmarkId::new("global_drop_in", size), &size, |b, &sz| {
            b.iter(|| {
                let p = leakguard_abi::malloc(black_box(sz));
                // SAFETY: pointer comes from the global tracker.
                unsafe { leakguard_abi::free(black_box(p)) };
            });
        });
    }

    group.finish();
}

fn bench_realloc_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("realloc_growth");
    let tracker: Tracker<SystemAllocator, Serialized, CaptureSink> =
        Tracker::new(SystemAllocator, CaptureSink::new(), TrackerConfig::default());

    group.bench_function("host_libc_16_to_64k", |b| {
        b.iter(|| {
            // SAFETY: every pointer is the latest result of malloc/realloc.
            unsafe {
                let mut p: *mut c_void = libc::malloc(16);
                let mut size = 16;
                while size < 65_536 {
                    size *= 2;
                    p = libc::realloc(p, size);
                }
                libc::free(black_box(p));
            }
        });
    });

    group.bench_function("tracked_16_to_64k", |b| {
        b.iter(|| {
            let mut p = tracker.malloc(16);
            let mut size = 16;
            while size < 65_536 {
                size *= 2;
                // SAFETY: `p` is the tracker's latest result.
                p = unsafe { tracker.realloc(p, size) };
            }
            // SAFETY: as above.
            unsafe { tracker.free(black_box(p)) };
        });
    });

    group.finish();
}

fn bench_live_set(c: &mut Criterion) {
    let live: [usize; 3] = [1_000, 10_000, 100_000];
    let mut group = c.benchmark_group("alloc_burst_then_release");

    for n in live {
        group.bench_with_input(BenchmarkId::new("serialized", n), &n, |b, &n| {
            b.iter(|| {
                let tracker: Tracker<SystemAllocator, Serialized, CaptureSink> =
                    Tracker::new(SystemAllocator, CaptureSink::new(), TrackerConfig::default());
                let ptrs: Vec<*mut c_void> = (0..n).map(|_| tracker.malloc(64)).collect();
                for p in ptrs {
                    // SAFETY: every pointer came from `tracker`.
                    unsafe { tracker.free(p) };
                }
                black_box(tracker.stats());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_malloc_free, bench_realloc_growth, bench_live_set);
criterion_main!(benches);
