// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Flat byte-addressed memory for the interpreter
//!
//! Globals, heap and stack live in disjoint regions so that addresses are
//! easy to recognize in test failures. Unwritten bytes read as zero; nothing
//! here checks validity, which is the job of the instrumented program.

use std::collections::HashMap;

use tracing::trace;

pub const GLOBAL_BASE: u64 = 0x1000_0000;
pub const HEAP_BASE: u64 = 0x2000_0000;
pub const STACK_BASE: u64 = 0x7000_0000;
/// The heap grows up to the stack region and no further.
pub const HEAP_LIMIT: u64 = STACK_BASE;

const HEAP_ALIGN: u64 = 16;
const STACK_ALIGN: u64 = 8;

fn align_up(value: u64, align: u64) -> Option<u64> {
    value.checked_next_multiple_of(align)
}

#[derive(Debug, Clone)]
pub struct Memory {
    bytes: HashMap<u64, u8>,
    next_global: u64,
    next_heap: u64,
    stack_top: u64,
    /// Live heap chunks by start address, with their rounded size.
    live: HashMap<u64, u64>,
    /// Freed chunks, most recently freed last.
    freed: Vec<(u64, u64)>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            bytes: HashMap::new(),
            next_global: GLOBAL_BASE,
            next_heap: HEAP_BASE,
            stack_top: STACK_BASE,
            live: HashMap::new(),
            freed: Vec::new(),
        }
    }

    /// Reads `size` (at most 8) bytes at `addr` as a little-endian word.
    pub fn read(&self, addr: u64, size: u64) -> u64 {
        (0..size.min(8)).fold(0, |word, offset| {
            let byte = self
                .bytes
                .get(&addr.wrapping_add(offset))
                .copied()
                .unwrap_or(0);
            word | (u64::from(byte) << (8 * offset))
        })
    }

    /// Writes the low `size` (at most 8) bytes of `word` at `addr`.
    pub fn write(&mut self, addr: u64, size: u64, word: u64) {
        for offset in 0..size.min(8) {
            self.bytes
                .insert(addr.wrapping_add(offset), (word >> (8 * offset)) as u8);
        }
    }

    /// Zero-fills `size` bytes starting at `addr`.
    pub fn zero(&mut self, addr: u64, size: u64) {
        let end = addr.saturating_add(size);
        self.bytes.retain(|&byte, _| byte < addr || byte >= end);
    }

    pub fn alloc_global(&mut self, size: u64) -> u64 {
        let addr = self.next_global;
        self.next_global = align_up(addr.saturating_add(size.max(1)), STACK_ALIGN).unwrap_or(u64::MAX);
        addr
    }

    /// Allocates a heap chunk. A freed chunk of the same rounded size is
    /// handed out again, most recently freed first. Returns `None` when the
    /// request does not fit below [`HEAP_LIMIT`].
    pub fn heap_alloc(&mut self, size: u64) -> Option<u64> {
        let rounded = align_up(size.max(1), HEAP_ALIGN)?;
        let addr = match self.freed.iter().rposition(|&(_, len)| len == rounded) {
            Some(index) => self.freed.remove(index).0,
            None => {
                let addr = self.next_heap;
                self.next_heap = addr
                    .checked_add(rounded)
                    .filter(|&end| end <= HEAP_LIMIT)?;
                addr
            }
        };
        self.zero(addr, rounded);
        self.live.insert(addr, rounded);
        trace!(addr, size, "heap alloc");
        Some(addr)
    }

    /// Releases the chunk starting at `addr`. Returns `false` if `addr` is not
    /// the start of a live chunk, in which case nothing changes.
    pub fn heap_free(&mut self, addr: u64) -> bool {
        match self.live.remove(&addr) {
            Some(len) => {
                self.freed.push((addr, len));
                trace!(addr, "heap free");
                true
            }
            None => false,
        }
    }

    pub fn is_heap_chunk(&self, addr: u64) -> bool {
        self.live.contains_key(&addr)
    }

    /// Reserves `size` bytes on top of the stack; `None` if the address
    /// space is exhausted.
    pub fn stack_alloc(&mut self, size: u64) -> Option<u64> {
        let addr = self.stack_top;
        let end = addr
            .checked_add(size.max(1))
            .and_then(|end| align_up(end, STACK_ALIGN))?;
        self.stack_top = end;
        self.zero(addr, end - addr);
        Some(addr)
    }

    pub fn stack_mark(&self) -> u64 {
        self.stack_top
    }

    /// Pops every stack allocation made since `mark` was taken.
    pub fn stack_release(&mut self, mark: u64) {
        self.stack_top = mark.min(self.stack_top);
    }
}
