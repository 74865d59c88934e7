// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hook protocol shared with the instrumenter
//!
//! Every entry point the instrumented code may call is listed in [`Hook`],
//! together with its exported symbol and C signature. The instrumenter
//! declares hooks from this table and the C ABI layer exports exactly these
//! symbols, so the two sides cannot drift apart.

use crate::policy::FaultKind;

pub const SYMBOL_PREFIX: &str = "__tolerator_";

/// Name of the constant global the instrumenter adds to record the mode a
/// module was instrumented for. The entry function passes its value to
/// [`Hook::InitMode`] before anything else runs.
pub const MODE_GLOBAL: &str = "__tolerator_analysis_mode";

/// C type of a hook parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
    Ptr,
    I32,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    InitMode,
    RegisterGlobal,
    RegisterHeapAlloc,
    ReleaseHeapAlloc,
    RegisterLocal,
    EnterScope,
    ExitScope,
    IsAllocated,
    IsValid,
    ReportDivideByZero,
    ReportInvalidRead,
    ReportInvalidWrite,
    ReportInvalidFree,
    ShouldAbortFunction,
    ShouldDefaultValue,
    DispatchFault,
}

impl Hook {
    pub const ALL: [Hook; 16] = [
        Hook::InitMode,
        Hook::RegisterGlobal,
        Hook::RegisterHeapAlloc,
        Hook::ReleaseHeapAlloc,
        Hook::RegisterLocal,
        Hook::EnterScope,
        Hook::ExitScope,
        Hook::IsAllocated,
        Hook::IsValid,
        Hook::ReportDivideByZero,
        Hook::ReportInvalidRead,
        Hook::ReportInvalidWrite,
        Hook::ReportInvalidFree,
        Hook::ShouldAbortFunction,
        Hook::ShouldDefaultValue,
        Hook::DispatchFault,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            Hook::InitMode => "__tolerator_init_mode",
            Hook::RegisterGlobal => "__tolerator_register_global",
            Hook::RegisterHeapAlloc => "__tolerator_register_heap_alloc",
            Hook::ReleaseHeapAlloc => "__tolerator_release_heap_alloc",
            Hook::RegisterLocal => "__tolerator_register_local",
            Hook::EnterScope => "__tolerator_enter_scope",
            Hook::ExitScope => "__tolerator_exit_scope",
            Hook::IsAllocated => "__tolerator_is_allocated",
            Hook::IsValid => "__tolerator_is_valid",
            Hook::ReportDivideByZero => "__tolerator_report_divide_by_zero",
            Hook::ReportInvalidRead => "__tolerator_report_invalid_read",
            Hook::ReportInvalidWrite => "__tolerator_report_invalid_write",
            Hook::ReportInvalidFree => "__tolerator_report_invalid_free",
            Hook::ShouldAbortFunction => "__tolerator_should_abort_function",
            Hook::ShouldDefaultValue => "__tolerator_should_default_value",
            Hook::DispatchFault => "__tolerator_dispatch_fault",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        if !symbol.starts_with(SYMBOL_PREFIX) {
            return None;
        }
        Self::ALL.into_iter().find(|hook| hook.symbol() == symbol)
    }

    pub const fn params(self) -> &'static [AbiType] {
        match self {
            Hook::RegisterGlobal | Hook::RegisterHeapAlloc | Hook::RegisterLocal => {
                &[AbiType::Ptr, AbiType::I32]
            }
            Hook::ReleaseHeapAlloc | Hook::IsAllocated | Hook::IsValid => &[AbiType::Ptr],
            Hook::InitMode | Hook::DispatchFault => &[AbiType::I32],
            Hook::EnterScope
            | Hook::ExitScope
            | Hook::ReportDivideByZero
            | Hook::ReportInvalidRead
            | Hook::ReportInvalidWrite
            | Hook::ReportInvalidFree
            | Hook::ShouldAbortFunction
            | Hook::ShouldDefaultValue => &[],
        }
    }

    /// Result type, `None` for `void`.
    pub const fn returns(self) -> Option<AbiType> {
        match self {
            Hook::IsAllocated
            | Hook::IsValid
            | Hook::ShouldAbortFunction
            | Hook::ShouldDefaultValue => Some(AbiType::Bool),
            Hook::DispatchFault => Some(AbiType::I32),
            _ => None,
        }
    }

    /// Reporter hook for a fault category.
    pub const fn report(kind: FaultKind) -> Self {
        match kind {
            FaultKind::DivideByZero => Hook::ReportDivideByZero,
            FaultKind::InvalidRead => Hook::ReportInvalidRead,
            FaultKind::InvalidWrite => Hook::ReportInvalidWrite,
            FaultKind::InvalidFree => Hook::ReportInvalidFree,
        }
    }

    /// Fault category reported by this hook, if it is a reporter.
    pub const fn reported_kind(self) -> Option<FaultKind> {
        match self {
            Hook::ReportDivideByZero => Some(FaultKind::DivideByZero),
            Hook::ReportInvalidRead => Some(FaultKind::InvalidRead),
            Hook::ReportInvalidWrite => Some(FaultKind::InvalidWrite),
            Hook::ReportInvalidFree => Some(FaultKind::InvalidFree),
            _ => None,
        }
    }
}
