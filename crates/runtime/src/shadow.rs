// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shadow memory registry
//!
//! Tracks which address ranges the program may currently touch. Heap
//! allocations and globals each have a table keyed by start address; stack
//! locals live in the [`ScopeStack`], one table per active call.
//!
//! # Lookup
//!
//! [`ShadowMemory::is_valid`] is a range query: heap first, then globals,
//! then scope frames innermost to outermost. [`ShadowMemory::is_allocated`]
//! only matches the exact start of a live heap allocation, so freeing an
//! interior pointer is a miss.

use std::collections::HashMap;

use tracing::trace;

use crate::scope::ScopeStack;

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    pub start: usize,
    pub end: usize,
}

impl MemoryRange {
    /// Range of `size` bytes at `start`. Negative sizes give an empty range
    /// and the end saturates at the top of the address space.
    pub fn new(start: usize, size: i32) -> Self {
        let size = usize::try_from(size).unwrap_or(0);
        Self {
            start,
            end: start.saturating_add(size),
        }
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.start <= addr && addr < self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Ranges keyed by their start address. Re-registering a start replaces
/// the previous range.
pub type RangeTable = HashMap<usize, MemoryRange>;

pub(crate) fn table_contains(table: &RangeTable, addr: usize) -> bool {
    table.values().any(|range| range.contains(addr))
}

#[derive(Debug, Default)]
pub struct ShadowMemory {
    heap: RangeTable,
    globals: RangeTable,
    scopes: ScopeStack,
}

impl ShadowMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_global(&mut self, addr: usize, size: i32) {
        let range = MemoryRange::new(addr, size);
        trace!(addr, len = range.len(), "register global");
        self.globals.insert(addr, range);
    }

    pub fn register_heap_alloc(&mut self, addr: usize, size: i32) {
        let range = MemoryRange::new(addr, size);
        trace!(addr, len = range.len(), "register heap allocation");
        self.heap.insert(addr, range);
    }

    /// Forgets the heap allocation starting at `addr`, if any.
    pub fn release_heap_alloc(&mut self, addr: usize) {
        if self.heap.remove(&addr).is_some() {
            trace!(addr, "release heap allocation");
        }
    }

    /// Whether `addr` is the exact start of a live heap allocation.
    pub fn is_allocated(&self, addr: usize) -> bool {
        self.heap.contains_key(&addr)
    }

    /// Whether `addr` lies inside any tracked heap, global or local range.
    pub fn is_valid(&self, addr: usize) -> bool {
        table_contains(&self.heap, addr)
            || table_contains(&self.globals, addr)
            || self.scopes.contains(addr)
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }

    pub fn heap_allocations(&self) -> usize {
        self.heap.len()
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryRange, ShadowMemory};

    #[test]
    fn test_range_is_half_open() {
        let range = MemoryRange::new(0x1000, 16);
        assert!(range.contains(0x1000));
        assert!(range.contains(0x100f));
        assert!(!range.contains(0x1010));
        assert!(!range.contains(0x0fff));
        assert_eq!(range.len(), 16);
    }

    #[test]
    fn test_negative_size_is_empty() {
        let range = MemoryRange::new(0x1000, -4);
        assert!(range.is_empty());
        assert!(!range.contains(0x1000));
    }

    #[test]
    fn test_range_end_saturates() {
        let range = MemoryRange::new(usize::MAX - 2, 16);
        assert_eq!(range.end, usize::MAX);
        assert!(range.contains(usize::MAX - 1));
    }

    #[test]
    fn test_heap_allocation_lifecycle() {
        let mut shadow = ShadowMemory::new();
        let p = 0x2000_0000;
        shadow.register_heap_alloc(p, 16);

        for addr in p..p + 16 {
            assert!(shadow.is_valid(addr));
        }
        assert!(!shadow.is_valid(p + 16));
        assert!(!shadow.is_valid(p + 20));
        assert!(shadow.is_allocated(p));
        assert!(!shadow.is_allocated(p + 8));

        shadow.release_heap_alloc(p);
        assert!(!shadow.is_allocated(p));
        assert!(!shadow.is_valid(p));
        assert_eq!(shadow.heap_allocations(), 0);
    }

    #[test]
    fn test_release_only_affects_its_own_range() {
        let mut shadow = ShadowMemory::new();
        shadow.register_heap_alloc(0x100, 8);
        shadow.register_heap_alloc(0x200, 8);
        shadow.release_heap_alloc(0x100);
        assert!(!shadow.is_valid(0x104));
        assert!(shadow.is_valid(0x204));
    }

    #[test]
    fn test_release_unknown_address_is_noop() {
        let mut shadow = ShadowMemory::new();
        shadow.register_heap_alloc(0x100, 8);
        shadow.release_heap_alloc(0x104);
        assert!(shadow.is_allocated(0x100));
    }

    #[test]
    fn test_globals_and_locals_are_valid() {
        let mut shadow = ShadowMemory::new();
        shadow.register_global(0x1000_0000, 4);
        shadow.scopes_mut().enter();
        shadow.scopes_mut().register_local(0x7000_0000, 8);

        assert!(shadow.is_valid(0x1000_0003));
        assert!(shadow.is_valid(0x7000_0007));
        assert!(!shadow.is_allocated(0x1000_0000));

        shadow.scopes_mut().exit();
        assert!(!shadow.is_valid(0x7000_0007));
        assert!(shadow.is_valid(0x1000_0000));
    }

    #[test]
    fn test_null_is_never_valid() {
        let mut shadow = ShadowMemory::new();
        shadow.register_heap_alloc(0x10, 16);
        assert!(!shadow.is_valid(0));
        assert!(!shadow.is_allocated(0));
    }

    #[test]
    fn test_reregistering_overwrites() {
        let mut shadow = ShadowMemory::new();
        shadow.register_global(0x40, 16);
        shadow.register_global(0x40, 4);
        assert_eq!(shadow.global_count(), 1);
        assert!(!shadow.is_valid(0x48));
    }
}
