// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime hook declarations and call construction

use cfg::{Constant, Global, GlobalId, InstKind, Module, Type, Value};
use runtime::{AbiType, AnalysisMode, Hook, MODE_GLOBAL};

/// Hooks the rewrite may emit calls to.
///
/// Excludes [`Hook::DispatchFault`]: guards call the reporter for their own
/// fault kind and query the predicates. The combined entry point is only for
/// hand-written callers of the C ABI.
pub const EMITTED_HOOKS: [Hook; 15] = [
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
];

fn ir_type(ty: AbiType) -> Type {
    match ty {
        AbiType::Ptr => Type::Ptr,
        AbiType::I32 => Type::I32,
        AbiType::Bool => Type::I1,
    }
}

pub fn return_type(hook: Hook) -> Type {
    hook.returns().map(ir_type).unwrap_or(Type::Void)
}

/// Adds an external declaration for every emitted hook the module does not
/// declare yet.
pub fn declare_hooks(module: &mut Module) {
    for hook in EMITTED_HOOKS {
        let params = hook.params().iter().copied().map(ir_type).collect();
        module.declare_function(hook.symbol(), params, return_type(hook));
    }
}

/// Call instruction invoking `hook`.
pub fn hook_call(hook: Hook, args: Vec<Value>) -> InstKind {
    InstKind::Call {
        callee: hook.symbol().to_string(),
        args,
        ret: return_type(hook),
    }
}

/// Records `mode` in the module as an immutable `i32` global.
pub fn add_mode_global(module: &mut Module, mode: AnalysisMode) -> GlobalId {
    module.add_global(
        Global::new(MODE_GLOBAL, Type::I32, Constant::int(32, i64::from(mode.code()))).constant(),
    )
}

/// Mode recorded by [`add_mode_global`], if the module has been instrumented.
pub fn recorded_mode(module: &Module) -> Option<AnalysisMode> {
    let global = module.global(module.global_by_name(MODE_GLOBAL)?);
    match global.init {
        Some(Constant::Int { value, .. }) => AnalysisMode::from_code(value as i32),
        _ => None,
    }
}
