// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime state behind the hooks
//!
//! [`Runtime`] bundles the shadow memory with the fault policy. It never
//! exits the process itself: reporters return the [`FaultAction`] and the
//! caller decides how to terminate. The C ABI layer exits; the test
//! interpreter turns termination into an exit outcome.
//!
//! A runtime starts in the build-time mode and switches once to the mode an
//! instrumented module recorded, when its entry function calls
//! [`Hook::InitMode`]. Only per-kind fault counts are kept.

use tracing::{debug, warn};

use crate::{
    config::configured_mode,
    policy::{AnalysisMode, FaultAction, FaultKind, FaultPolicy},
    protocol::Hook,
    shadow::ShadowMemory,
};

/// Value produced by [`Runtime::call_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    Unit,
    Bool(bool),
    Action(i32),
    /// The fault escalated; the program must exit with this status.
    Terminate(i32),
}

/// Returned by the dispatch hook for an unknown fault category.
pub const UNKNOWN_FAULT: i32 = -1;

#[derive(Debug)]
pub struct Runtime {
    shadow: ShadowMemory,
    policy: FaultPolicy,
    /// Set once a module's recorded mode has been adopted.
    mode_recorded: bool,
    fault_counts: [usize; FaultKind::ALL.len()],
}

impl Default for Runtime {
    /// A runtime running the mode compiled into this build.
    fn default() -> Self {
        Self::new(configured_mode())
    }
}

impl Runtime {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            shadow: ShadowMemory::new(),
            policy: FaultPolicy::new(mode),
            mode_recorded: false,
            fault_counts: [0; FaultKind::ALL.len()],
        }
    }

    /// Adopts the mode recorded in the instrumented module.
    ///
    /// The first valid code wins; later calls and unknown codes leave the
    /// current mode in place. Returns the mode in effect afterwards.
    pub fn init_mode(&mut self, code: i32) -> AnalysisMode {
        if self.mode_recorded {
            debug!(code, mode = %self.mode(), "mode already recorded, ignoring");
            return self.mode();
        }
        match AnalysisMode::from_code(code) {
            Some(mode) => {
                self.policy = FaultPolicy::new(mode);
                self.mode_recorded = true;
                debug!(%mode, "recorded mode adopted");
            }
            None => warn!(code, mode = %self.mode(), "unknown recorded mode, keeping current"),
        }
        self.mode()
    }

    pub fn mode(&self) -> AnalysisMode {
        self.policy.mode()
    }

    pub fn policy(&self) -> &FaultPolicy {
        &self.policy
    }

    pub fn shadow(&self) -> &ShadowMemory {
        &self.shadow
    }

    /// Number of faults of `kind` reported so far.
    pub fn fault_count(&self, kind: FaultKind) -> usize {
        self.fault_counts[kind as usize]
    }

    pub fn total_faults(&self) -> usize {
        self.fault_counts.iter().sum()
    }

    pub fn register_global(&mut self, addr: usize, size: i32) {
        self.shadow.register_global(addr, size);
    }

    pub fn register_heap_alloc(&mut self, addr: usize, size: i32) {
        self.shadow.register_heap_alloc(addr, size);
    }

    pub fn release_heap_alloc(&mut self, addr: usize) {
        self.shadow.release_heap_alloc(addr);
    }

    pub fn register_local(&mut self, addr: usize, size: i32) {
        self.shadow.scopes_mut().register_local(addr, size);
    }

    pub fn enter_scope(&mut self) {
        self.shadow.scopes_mut().enter();
    }

    pub fn exit_scope(&mut self) {
        self.shadow.scopes_mut().exit();
    }

    pub fn scope_depth(&self) -> usize {
        self.shadow.scopes().depth()
    }

    pub fn is_allocated(&self, addr: usize) -> bool {
        self.shadow.is_allocated(addr)
    }

    pub fn is_valid(&self, addr: usize) -> bool {
        self.shadow.is_valid(addr)
    }

    /// Prints the diagnostic for `kind` and decides what happens next.
    pub fn report(&mut self, kind: FaultKind) -> FaultAction {
        println!("{}", kind.message());
        let count = &mut self.fault_counts[kind as usize];
        *count = count.saturating_add(1);
        let action = self.policy.dispatch(kind);
        debug!(?kind, ?action, mode = %self.mode(), "fault reported");
        action
    }

    pub fn should_abort_function(&self) -> bool {
        self.policy.should_abort_function()
    }

    pub fn should_default_value(&self) -> bool {
        self.policy.should_default_value()
    }

    /// Runs `hook` with raw word arguments, the way compiled code passes
    /// them. Missing arguments read as zero.
    pub fn call_hook(&mut self, hook: Hook, args: &[usize]) -> HookResult {
        let ptr = |index: usize| args.get(index).copied().unwrap_or(0);
        let int = |index: usize| ptr(index) as u32 as i32;

        match hook {
            Hook::InitMode => {
                self.init_mode(int(0));
            }
            Hook::RegisterGlobal => self.register_global(ptr(0), int(1)),
            Hook::RegisterHeapAlloc => self.register_heap_alloc(ptr(0), int(1)),
            Hook::ReleaseHeapAlloc => self.release_heap_alloc(ptr(0)),
            Hook::RegisterLocal => self.register_local(ptr(0), int(1)),
            Hook::EnterScope => self.enter_scope(),
            Hook::ExitScope => self.exit_scope(),
            Hook::IsAllocated => return HookResult::Bool(self.is_allocated(ptr(0))),
            Hook::IsValid => return HookResult::Bool(self.is_valid(ptr(0))),
            Hook::ShouldAbortFunction => return HookResult::Bool(self.should_abort_function()),
            Hook::ShouldDefaultValue => return HookResult::Bool(self.should_default_value()),
            Hook::ReportDivideByZero
            | Hook::ReportInvalidRead
            | Hook::ReportInvalidWrite
            | Hook::ReportInvalidFree => {
                if let Some(kind) = hook.reported_kind() {
                    if let FaultAction::Terminate { status } = self.report(kind) {
                        return HookResult::Terminate(status);
                    }
                }
            }
            Hook::DispatchFault => {
                let Some(kind) = FaultKind::from_code(int(0)) else {
                    return HookResult::Action(UNKNOWN_FAULT);
                };
                return match self.report(kind) {
                    FaultAction::Terminate { status } => HookResult::Terminate(status),
                    action => HookResult::Action(action.code()),
                };
            }
        }
        HookResult::Unit
    }
}
