#![no_main]
use std::collections::HashMap;

use leakguard_membrane::{AllocKind, CallSite, Registry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Each 3-byte chunk: op, key, size. Small key space forces collisions,
    // replacements and removals from the middle of chains.
    let mut registry = Registry::with_initial_capacity(1);
    let mut model: HashMap<usize, usize> = HashMap::new();
    let site = CallSite::new("fuzz", 0);

    for chunk in data.chunks_exact(3) {
        let addr = (chunk[1] as usize + 1) << 4;
        let size = chunk[2] as usize;
        match chunk[0] % 4 {
            0 => {
                if registry.insert(addr, size, site, AllocKind::Fresh).is_ok() {
                    model.insert(addr, size);
                }
            }
            1 => {
                let removed = registry.remove(addr, site).ok().map(|r| r.size);
                assert_eq!(removed, model.remove(&addr));
            }
            2 => {
                let to = (chunk[2] as usize + 1) << 4;
                if model.contains_key(&addr)
                    && registry.resize(addr, to, size, site).is_ok()
                {
                    model.remove(&addr);
                    model.insert(to, size);
                }
            }
            _ => {
                assert_eq!(registry.get(addr).map(|r| r.size), model.get(&addr).copied());
            }
        }
        assert_eq!(registry.len(), model.len());
        assert_eq!(registry.live_bytes(), model.values().sum::<usize>());
    }

    let snapshot = registry.drain();
    assert_eq!(snapshot.len(), model.len());
    assert!(registry.is_empty());
});
