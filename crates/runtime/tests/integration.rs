// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the runtime crate
//!
//! Drives a [`Runtime`] through hook sequences shaped like the ones an
//! instrumented program issues, one scenario per test.

use runtime::{
    AnalysisMode, FaultAction, FaultKind, Hook, HookResult, Runtime, TERMINATION_STATUS,
};

const P: usize = 0x2000_0000;
const GLOBAL: usize = 0x1000_0000;
const CALLER_LOCAL: usize = 0x7000_0000;
const CALLEE_LOCAL: usize = 0x7000_0010;

fn hook(runtime: &mut Runtime, hook: Hook, args: &[usize]) -> HookResult {
    runtime.call_hook(hook, args)
}

fn is_valid(runtime: &mut Runtime, addr: usize) -> bool {
    hook(runtime, Hook::IsValid, &[addr]) == HookResult::Bool(true)
}

#[test]
fn test_every_byte_of_live_allocation_is_valid() {
    let mut runtime = Runtime::new(AnalysisMode::Strict);
    hook(&mut runtime, Hook::RegisterHeapAlloc, &[P, 16]);
    for addr in P..P + 16 {
        assert!(is_valid(&mut runtime, addr), "{addr:#x}");
    }
    assert!(!is_valid(&mut runtime, P + 16));
}

#[test]
fn test_sixteen_byte_allocation_scenario() {
    for mode in AnalysisMode::ALL {
        let mut runtime = Runtime::new(mode);
        hook(&mut runtime, Hook::RegisterHeapAlloc, &[P, 16]);
        assert!(is_valid(&mut runtime, P + 8));
        assert!(!is_valid(&mut runtime, P + 20));

        let result = hook(&mut runtime, Hook::ReportInvalidWrite, &[]);
        match mode {
            AnalysisMode::Strict => {
                assert_eq!(result, HookResult::Terminate(TERMINATION_STATUS))
            }
            _ => assert_eq!(result, HookResult::Unit),
        }
    }
}

#[test]
fn test_double_free_is_reported() {
    let mut runtime = Runtime::new(AnalysisMode::SemiStrict);
    hook(&mut runtime, Hook::RegisterHeapAlloc, &[P, 32]);

    assert_eq!(hook(&mut runtime, Hook::IsAllocated, &[P]), HookResult::Bool(true));
    hook(&mut runtime, Hook::ReleaseHeapAlloc, &[P]);

    assert_eq!(hook(&mut runtime, Hook::IsAllocated, &[P]), HookResult::Bool(false));
    assert_eq!(hook(&mut runtime, Hook::ReportInvalidFree, &[]), HookResult::Unit);
    assert_eq!(runtime.fault_count(FaultKind::InvalidFree), 1);
    assert_eq!(runtime.total_faults(), 1);
}

#[test]
fn test_interior_free_is_an_exact_match_miss() {
    let mut runtime = Runtime::new(AnalysisMode::Strict);
    hook(&mut runtime, Hook::RegisterHeapAlloc, &[P, 32]);
    assert!(is_valid(&mut runtime, P + 8));
    assert_eq!(
        hook(&mut runtime, Hook::IsAllocated, &[P + 8]),
        HookResult::Bool(false)
    );
}

#[test]
fn test_callee_local_invalid_after_return() {
    let mut runtime = Runtime::new(AnalysisMode::Strict);
    // main
    hook(&mut runtime, Hook::EnterScope, &[]);
    hook(&mut runtime, Hook::RegisterLocal, &[CALLER_LOCAL, 4]);
    // callee
    hook(&mut runtime, Hook::EnterScope, &[]);
    hook(&mut runtime, Hook::RegisterLocal, &[CALLEE_LOCAL, 4]);
    assert!(is_valid(&mut runtime, CALLER_LOCAL));
    assert!(is_valid(&mut runtime, CALLEE_LOCAL));
    hook(&mut runtime, Hook::ExitScope, &[]);

    assert!(is_valid(&mut runtime, CALLER_LOCAL));
    assert!(!is_valid(&mut runtime, CALLEE_LOCAL));
    hook(&mut runtime, Hook::ExitScope, &[]);
    assert_eq!(runtime.scope_depth(), 0);
}

#[test]
fn test_globals_outlive_every_scope() {
    let mut runtime = Runtime::new(AnalysisMode::Strict);
    hook(&mut runtime, Hook::RegisterGlobal, &[GLOBAL, 8]);
    for _ in 0..3 {
        hook(&mut runtime, Hook::EnterScope, &[]);
    }
    for _ in 0..5 {
        hook(&mut runtime, Hook::ExitScope, &[]);
    }
    assert!(is_valid(&mut runtime, GLOBAL + 7));
    assert_eq!(runtime.scope_depth(), 0);
}

#[test]
fn test_reused_heap_address_is_tracked_again() {
    let mut runtime = Runtime::new(AnalysisMode::Strict);
    hook(&mut runtime, Hook::RegisterHeapAlloc, &[P, 16]);
    hook(&mut runtime, Hook::ReleaseHeapAlloc, &[P]);
    assert!(!is_valid(&mut runtime, P));

    // The allocator hands the same address out again.
    hook(&mut runtime, Hook::RegisterHeapAlloc, &[P, 8]);
    assert!(is_valid(&mut runtime, P + 4));
    assert!(!is_valid(&mut runtime, P + 12));
}

#[test]
fn test_mode_table() {
    let terminate = FaultAction::Terminate {
        status: TERMINATION_STATUS,
    };
    let cases = [
        (AnalysisMode::Strict, FaultKind::DivideByZero, terminate),
        (AnalysisMode::Strict, FaultKind::InvalidFree, terminate),
        (AnalysisMode::SemiStrict, FaultKind::InvalidRead, terminate),
        (AnalysisMode::SemiStrict, FaultKind::InvalidWrite, FaultAction::Skip),
        (
            AnalysisMode::DefaultSubstitute,
            FaultKind::DivideByZero,
            FaultAction::Substitute,
        ),
        (
            AnalysisMode::DefaultSubstitute,
            FaultKind::InvalidWrite,
            FaultAction::Skip,
        ),
        (
            AnalysisMode::AbortFunction,
            FaultKind::InvalidRead,
            FaultAction::AbortFunction,
        ),
        (
            AnalysisMode::AbortFunction,
            FaultKind::InvalidFree,
            FaultAction::AbortFunction,
        ),
    ];
    for (mode, kind, expected) in cases {
        let mut runtime = Runtime::new(mode);
        assert_eq!(runtime.report(kind), expected, "{mode} / {kind:?}");
    }
}
