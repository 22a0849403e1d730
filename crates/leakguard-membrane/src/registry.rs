//! Chained hash table of live allocations.
//!
//! Records live in a slot vector; buckets hold the index of the first slot in
//! their chain and every slot links to the next one. Vacant slots form an
//! intrusive free list, so a removal never allocates and an insert right
//! after a removal reuses the freed slot. Growing only rebuilds the bucket
//! array and relinks slots in place, so it cannot lose or duplicate a record.
//!
//! The registry itself is not synchronized; see [`crate::guard`].

use serde::Serialize;

use crate::config::{INITIAL_CAPACITY, grow_threshold};
use crate::error::{BookkeepingFailure, InvalidDeallocation};
use crate::record::{AllocKind, AllocationRecord};
use crate::site::CallSite;

/// Bucket index for `addr` in a table of `capacity` buckets.
#[inline]
#[must_use]
pub fn bucket_index(addr: usize, capacity: usize) -> usize {
    if capacity == 0 {
        return 0;
    }
    let mixed = (addr >> 4) ^ (addr << 5);
    mixed % capacity
}

#[derive(Debug)]
struct Node {
    record: AllocationRecord,
    next: Option<usize>,
}

#[derive(Debug)]
enum Slot {
    Live(Node),
    Vacant { next_free: Option<usize> },
}

/// Bucket array plus slot storage. Detached wholesale by [`Registry::drain`].
#[derive(Debug)]
struct Table {
    buckets: Vec<Option<usize>>,
    slots: Vec<Slot>,
    free_head: Option<usize>,
    live: usize,
    live_bytes: usize,
}

impl Table {
    const fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            slots: Vec::new(),
            free_head: None,
            live: 0,
            live_bytes: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn node(&self, idx: usize) -> &Node {
        match &self.slots[idx] {
            Slot::Live(node) => node,
            Slot::Vacant { .. } => unreachable!("bucket chain points at vacant slot {idx}"),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        match &mut self.slots[idx] {
            Slot::Live(node) => node,
            Slot::Vacant { .. } => unreachable!("bucket chain points at vacant slot {idx}"),
        }
    }

    /// Slot index holding `addr`, and the slot linking to it (`None` when it
    /// heads its bucket).
    fn find(&self, addr: usize) -> Option<(usize, Option<usize>)> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut prev = None;
        let mut cursor = self.buckets[bucket_index(addr, self.capacity())];
        while let Some(idx) = cursor {
            let node = self.node(idx);
            if node.record.addr == addr {
                return Some((idx, prev));
            }
            prev = Some(idx);
            cursor = node.next;
        }
        None
    }

    fn allocate_buckets(capacity: usize) -> Option<Vec<Option<usize>>> {
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(capacity).ok()?;
        buckets.resize(capacity, None);
        Some(buckets)
    }

    /// Take a vacant slot, reserving storage if the free list is empty.
    fn claim_slot(&mut self, addr: usize) -> Result<usize, BookkeepingFailure> {
        if let Some(idx) = self.free_head {
            if let Slot::Vacant { next_free } = self.slots[idx] {
                self.free_head = next_free;
            }
            return Ok(idx);
        }
        self.slots
            .try_reserve(1)
            .map_err(|_| BookkeepingFailure { addr })?;
        self.slots.push(Slot::Vacant { next_free: None });
        Ok(self.slots.len() - 1)
    }

    fn link(&mut self, idx: usize, record: AllocationRecord) {
        let bucket = bucket_index(record.addr, self.capacity());
        let next = self.buckets[bucket];
        self.slots[idx] = Slot::Live(Node { record, next });
        self.buckets[bucket] = Some(idx);
        self.live += 1;
        self.live_bytes += record.size;
    }

    fn unlink(&mut self, idx: usize, prev: Option<usize>) -> AllocationRecord {
        let next_free = self.free_head;
        let Slot::Live(node) = std::mem::replace(&mut self.slots[idx], Slot::Vacant { next_free })
        else {
            unreachable!("unlinking vacant slot {idx}");
        };
        match prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => {
                let bucket = bucket_index(node.record.addr, self.capacity());
                self.buckets[bucket] = node.next;
            }
        }
        self.free_head = Some(idx);
        self.live -= 1;
        self.live_bytes -= node.record.size;
        node.record
    }

    /// Relink every live slot into a bucket array of `new_capacity`.
    fn rehash(&mut self, new_capacity: usize) -> bool {
        let Some(mut buckets) = Self::allocate_buckets(new_capacity) else {
            return false;
        };
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Live(node) = slot {
                let bucket = bucket_index(node.record.addr, new_capacity);
                node.next = buckets[bucket];
                buckets[bucket] = Some(idx);
            }
        }
        self.buckets = buckets;
        true
    }

    fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Live(node) => Some(&node.record),
            Slot::Vacant { .. } => None,
        })
    }
}

/// Cumulative and live counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Records currently present.
    pub live: usize,
    /// Sum of sizes of records currently present.
    pub live_bytes: usize,
    /// Current bucket count (0 before the first insert and after a drain).
    pub capacity: usize,
    /// Records ever created.
    pub allocations: u64,
    /// Records ever removed by a release, a moving resize or a replacement.
    pub deallocations: u64,
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    /// Releases of addresses that had no record.
    pub invalid_frees: u64,
    /// Blocks left untracked because bookkeeping storage was unavailable.
    pub untracked: u64,
    /// Times the bucket array doubled.
    pub grows: u64,
}

/// Result of [`Registry::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Null address; nothing recorded.
    Null,
    Inserted,
    /// A record for the same address already existed and was overwritten.
    /// This happens when a block was released behind the tracker's back and
    /// the allocator handed the address out again.
    Replaced { previous: AllocationRecord },
}

/// Result of [`Registry::resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Previous address was null; the new block was recorded as fresh.
    Fresh,
    /// No new block was produced; nothing changed.
    Failed,
    /// The block moved: the old record was removed and a new one inserted.
    Moved { previous: AllocationRecord },
    /// The block stayed put; size and site were updated in place.
    InPlace { previous: AllocationRecord },
    /// The previous address had no record. The new block is recorded anyway.
    Adopted(InvalidDeallocation),
}

/// Drained registry contents, detached from the live table.
///
/// Dropping the snapshot releases only the registry's own nodes; the user
/// blocks the records describe are never touched.
#[derive(Debug)]
pub struct RegistrySnapshot {
    table: Table,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.live == 0
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.table.live_bytes
    }

    pub fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.table.records()
    }

    /// Records ordered by address.
    #[must_use]
    pub fn sorted_records(&self) -> Vec<AllocationRecord> {
        let mut records: Vec<AllocationRecord> = self.records().copied().collect();
        records.sort_unstable_by_key(|record| record.addr);
        records
    }
}

/// Live allocation table.
#[derive(Debug)]
pub struct Registry {
    table: Table,
    initial_capacity: usize,
    stats: RegistryStats,
}

impl Registry {
    /// An empty registry. No memory is reserved until the first insert.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_initial_capacity(INITIAL_CAPACITY)
    }

    #[must_use]
    pub const fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self {
            table: Table::empty(),
            initial_capacity: if initial_capacity == 0 {
                1
            } else {
                initial_capacity
            },
            stats: RegistryStats {
                live: 0,
                live_bytes: 0,
                capacity: 0,
                allocations: 0,
                deallocations: 0,
                bytes_allocated: 0,
                bytes_freed: 0,
                invalid_frees: 0,
                untracked: 0,
                grows: 0,
            },
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.live == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.table.live_bytes
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.table.live,
            live_bytes: self.table.live_bytes,
            capacity: self.table.capacity(),
            ..self.stats
        }
    }

    #[must_use]
    pub fn get(&self, addr: usize) -> Option<AllocationRecord> {
        let (idx, _) = self.table.find(addr)?;
        Some(self.table.node(idx).record)
    }

    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        self.table.find(addr).is_some()
    }

    pub fn records(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.table.records()
    }

    /// Record a new live block.
    ///
    /// # Errors
    ///
    /// [`BookkeepingFailure`] when neither the bucket array nor a slot could
    /// be reserved. The block is then untracked.
    pub fn insert(
        &mut self,
        addr: usize,
        size: usize,
        site: CallSite,
        kind: AllocKind,
    ) -> Result<InsertOutcome, BookkeepingFailure> {
        if addr == 0 {
            return Ok(InsertOutcome::Null);
        }
        let record = AllocationRecord::new(addr, size, site, kind);

        if let Some((idx, _)) = self.table.find(addr) {
            let node = self.table.node_mut(idx);
            let previous = std::mem::replace(&mut node.record, record);
            self.table.live_bytes = self.table.live_bytes - previous.size + size;
            self.note_freed(previous.size);
            self.note_allocated(size);
            return Ok(InsertOutcome::Replaced { previous });
        }

        if let Err(err) = self.insert_new(record) {
            self.stats.untracked += 1;
            return Err(err);
        }
        self.note_allocated(size);
        self.maybe_grow();
        Ok(InsertOutcome::Inserted)
    }

    /// Remove the record for `addr`.
    ///
    /// # Errors
    ///
    /// [`InvalidDeallocation`] when no record exists, which covers both
    /// never-allocated and already-released addresses.
    pub fn remove(
        &mut self,
        addr: usize,
        site: CallSite,
    ) -> Result<AllocationRecord, InvalidDeallocation> {
        let Some((idx, prev)) = self.table.find(addr) else {
            self.stats.invalid_frees += 1;
            return Err(InvalidDeallocation { addr, site });
        };
        let record = self.table.unlink(idx, prev);
        self.note_freed(record.size);
        Ok(record)
    }

    /// Look up `addr` ahead of an operation that requires a live record.
    ///
    /// # Errors
    ///
    /// [`InvalidDeallocation`] when no record exists; counted like a failed
    /// [`Registry::remove`].
    pub fn expect_live(
        &mut self,
        addr: usize,
        site: CallSite,
    ) -> Result<AllocationRecord, InvalidDeallocation> {
        match self.get(addr) {
            Some(record) => Ok(record),
            None => {
                self.stats.invalid_frees += 1;
                Err(InvalidDeallocation { addr, site })
            }
        }
    }

    /// Apply the outcome of a reallocation of `old` that produced `new`
    /// (zero when the reallocation failed).
    ///
    /// # Errors
    ///
    /// [`BookkeepingFailure`] when the new block could not be recorded.
    pub fn resize(
        &mut self,
        old: usize,
        new: usize,
        new_size: usize,
        site: CallSite,
    ) -> Result<ResizeOutcome, BookkeepingFailure> {
        if new == 0 {
            return Ok(ResizeOutcome::Failed);
        }
        if old == 0 {
            self.insert(new, new_size, site, AllocKind::Resized)?;
            return Ok(ResizeOutcome::Fresh);
        }

        if old == new {
            if let Some((idx, _)) = self.table.find(old) {
                let node = self.table.node_mut(idx);
                let previous = node.record;
                node.record.size = new_size;
                node.record.site = site;
                node.record.kind = AllocKind::Resized;
                self.table.live_bytes = self.table.live_bytes - previous.size + new_size;
                self.stats.bytes_freed += previous.size as u64;
                self.stats.bytes_allocated += new_size as u64;
                return Ok(ResizeOutcome::InPlace { previous });
            }
        }

        match self.remove(old, site) {
            Ok(previous) => {
                self.insert(new, new_size, site, AllocKind::Resized)?;
                Ok(ResizeOutcome::Moved { previous })
            }
            Err(invalid) => {
                self.insert(new, new_size, site, AllocKind::Resized)?;
                Ok(ResizeOutcome::Adopted(invalid))
            }
        }
    }

    /// Detach every record, leaving an empty registry behind.
    ///
    /// Live bookkeeping (count, bytes, capacity) resets to zero; cumulative
    /// counters are kept.
    pub fn drain(&mut self) -> RegistrySnapshot {
        RegistrySnapshot {
            table: std::mem::replace(&mut self.table, Table::empty()),
        }
    }

    fn insert_new(&mut self, record: AllocationRecord) -> Result<(), BookkeepingFailure> {
        if self.table.buckets.is_empty() {
            self.table.buckets = Table::allocate_buckets(self.initial_capacity)
                .ok_or(BookkeepingFailure { addr: record.addr })?;
        }
        let idx = self.table.claim_slot(record.addr)?;
        self.table.link(idx, record);
        Ok(())
    }

    fn maybe_grow(&mut self) {
        let capacity = self.table.capacity();
        if self.table.live > grow_threshold(capacity) && self.table.rehash(capacity * 2) {
            self.stats.grows += 1;
        }
    }

    fn note_allocated(&mut self, size: usize) {
        self.stats.allocations += 1;
        self.stats.bytes_allocated += size as u64;
    }

    fn note_freed(&mut self, size: usize) {
        self.stats.deallocations += 1;
        self.stats.bytes_freed += size as u64;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
