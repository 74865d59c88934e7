// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! C entry points linked into instrumented programs
//!
//! Each function here is exported under the symbol listed in
//! [`Hook`](crate::Hook) and forwards to a per-thread [`Runtime`]. The
//! runtime starts in the mode compiled into this build and switches to the
//! module's recorded mode when the entry function calls
//! `__tolerator_init_mode`.
//!
//! # Thread Safety
//!
//! Instrumented programs are assumed to be single-threaded. The state is kept
//! in a `thread_local!` so that the one thread running the program owns it
//! without locking; a second thread would see its own, empty registry.
//!
//! # Termination
//!
//! When a report escalates, the process exits immediately with the fault
//! status. No destructors run and tracked frames are not unwound.

use std::cell::RefCell;

use libc::{c_int, c_void};

use crate::{
    policy::{FaultAction, FaultKind},
    state::Runtime,
};

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::default());
}

fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|runtime| f(&mut runtime.borrow_mut()))
}

fn terminate(status: i32) -> ! {
    std::process::exit(status)
}

fn report(kind: FaultKind) -> FaultAction {
    let action = with_runtime(|runtime| runtime.report(kind));
    if let FaultAction::Terminate { status } = action {
        terminate(status);
    }
    action
}

/// Adopts the mode the module was instrumented for. Only the first call
/// with a valid code has an effect.
#[no_mangle]
pub extern "C" fn __tolerator_init_mode(mode: c_int) {
    with_runtime(|runtime| runtime.init_mode(mode));
}

#[no_mangle]
pub extern "C" fn __tolerator_register_global(ptr: *mut c_void, size: c_int) {
    with_runtime(|runtime| runtime.register_global(ptr as usize, size));
}

#[no_mangle]
pub extern "C" fn __tolerator_register_heap_alloc(ptr: *mut c_void, size: c_int) {
    with_runtime(|runtime| runtime.register_heap_alloc(ptr as usize, size));
}

#[no_mangle]
pub extern "C" fn __tolerator_release_heap_alloc(ptr: *mut c_void) {
    with_runtime(|runtime| runtime.release_heap_alloc(ptr as usize));
}

#[no_mangle]
pub extern "C" fn __tolerator_register_local(ptr: *mut c_void, size: c_int) {
    with_runtime(|runtime| runtime.register_local(ptr as usize, size));
}

#[no_mangle]
pub extern "C" fn __tolerator_enter_scope() {
    with_runtime(Runtime::enter_scope);
}

#[no_mangle]
pub extern "C" fn __tolerator_exit_scope() {
    with_runtime(Runtime::exit_scope);
}

#[no_mangle]
pub extern "C" fn __tolerator_is_allocated(ptr: *mut c_void) -> bool {
    with_runtime(|runtime| runtime.is_allocated(ptr as usize))
}

#[no_mangle]
pub extern "C" fn __tolerator_is_valid(ptr: *mut c_void) -> bool {
    with_runtime(|runtime| runtime.is_valid(ptr as usize))
}

#[no_mangle]
pub extern "C" fn __tolerator_report_divide_by_zero() {
    report(FaultKind::DivideByZero);
}

#[no_mangle]
pub extern "C" fn __tolerator_report_invalid_read() {
    report(FaultKind::InvalidRead);
}

#[no_mangle]
pub extern "C" fn __tolerator_report_invalid_write() {
    report(FaultKind::InvalidWrite);
}

#[no_mangle]
pub extern "C" fn __tolerator_report_invalid_free() {
    report(FaultKind::InvalidFree);
}

#[no_mangle]
pub extern "C" fn __tolerator_should_abort_function() -> bool {
    with_runtime(|runtime| runtime.should_abort_function())
}

#[no_mangle]
pub extern "C" fn __tolerator_should_default_value() -> bool {
    with_runtime(|runtime| runtime.should_default_value())
}

/// Reports fault `kind` and returns the [`FaultAction::code`] of the
/// resulting action. Unknown kinds return
/// [`UNKNOWN_FAULT`](crate::state::UNKNOWN_FAULT) without reporting.
#[no_mangle]
pub extern "C" fn __tolerator_dispatch_fault(kind: c_int) -> c_int {
    match FaultKind::from_code(kind) {
        Some(kind) => report(kind).code(),
        None => crate::state::UNKNOWN_FAULT,
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::*;
    use crate::{config::configured_mode, policy::AnalysisMode};

    fn addr(value: usize) -> *mut c_void {
        ptr::null_mut::<u8>().wrapping_add(value).cast()
    }

    #[test]
    fn test_heap_tracking_through_c_abi() {
        let p = addr(0x2000_0000);
        __tolerator_register_heap_alloc(p, 16);
        assert!(__tolerator_is_valid(addr(0x2000_0008)));
        assert!(!__tolerator_is_valid(addr(0x2000_0014)));
        assert!(__tolerator_is_allocated(p));
        __tolerator_release_heap_alloc(p);
        assert!(!__tolerator_is_allocated(p));
    }

    #[test]
    fn test_scopes_through_c_abi() {
        __tolerator_enter_scope();
        __tolerator_register_local(addr(0x7000_0000), 8);
        assert!(__tolerator_is_valid(addr(0x7000_0004)));
        __tolerator_exit_scope();
        __tolerator_exit_scope();
        assert!(!__tolerator_is_valid(addr(0x7000_0004)));
        assert_eq!(with_runtime(|runtime| runtime.scope_depth()), 0);
    }

    #[test]
    fn test_globals_through_c_abi() {
        __tolerator_register_global(addr(0x1000_0000), 4);
        assert!(__tolerator_is_valid(addr(0x1000_0000)));
        assert!(!__tolerator_is_allocated(addr(0x1000_0000)));
    }

    #[test]
    fn test_predicates_follow_recorded_mode() {
        __tolerator_init_mode(AnalysisMode::AbortFunction.code());
        assert!(__tolerator_should_abort_function());
        assert!(!__tolerator_should_default_value());

        // Only the first recorded mode counts.
        __tolerator_init_mode(AnalysisMode::DefaultSubstitute.code());
        assert!(__tolerator_should_abort_function());
        assert!(!__tolerator_should_default_value());
    }

    #[test]
    fn test_dispatch_follows_recorded_mode() {
        __tolerator_init_mode(AnalysisMode::DefaultSubstitute.code());
        assert!(__tolerator_should_default_value());
        assert_eq!(
            __tolerator_dispatch_fault(FaultKind::InvalidRead.code()),
            FaultAction::Substitute.code()
        );
        assert_eq!(
            __tolerator_dispatch_fault(FaultKind::InvalidWrite.code()),
            FaultAction::Skip.code()
        );
        assert_eq!(
            with_runtime(|runtime| runtime.fault_count(FaultKind::InvalidRead)),
            1
        );
    }

    #[test]
    fn test_predicates_use_configured_mode_before_init() {
        let mode = configured_mode();
        assert_eq!(
            __tolerator_should_abort_function(),
            mode == AnalysisMode::AbortFunction
        );
        assert_eq!(
            __tolerator_should_default_value(),
            mode == AnalysisMode::DefaultSubstitute
        );
    }

    #[test]
    fn test_unknown_fault_kind_is_not_reported() {
        assert_eq!(__tolerator_dispatch_fault(99), crate::state::UNKNOWN_FAULT);
        assert_eq!(with_runtime(|runtime| runtime.total_faults()), 0);
    }
}
