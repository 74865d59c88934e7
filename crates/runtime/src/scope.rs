// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-call stack frames of local ranges
//!
//! One frame is pushed when an instrumented function is entered and popped
//! on each of its returns, so the depth follows the instrumented call depth.
//! Locals of outer frames stay valid while inner calls run, which is what
//! lets a caller pass the address of its local to a callee.

use tracing::trace;

use crate::shadow::{table_contains, MemoryRange, RangeTable};

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<RangeTable>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an empty frame.
    pub fn enter(&mut self) {
        self.frames.push(RangeTable::new());
        trace!(depth = self.frames.len(), "enter scope");
    }

    /// Pops the innermost frame; popping an empty stack does nothing.
    pub fn exit(&mut self) {
        if self.frames.pop().is_some() {
            trace!(depth = self.frames.len(), "exit scope");
        }
    }

    /// Records a local in the innermost frame. Ignored outside any frame.
    pub fn register_local(&mut self, addr: usize, size: i32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(addr, MemoryRange::new(addr, size));
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Searches frames from the innermost outwards.
    pub fn contains(&self, addr: usize) -> bool {
        self.frames
            .iter()
            .rev()
            .any(|frame| table_contains(frame, addr))
    }
}
