// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Guarded-access diamonds
//!
//! Each risky instruction is moved into its own block and reached only when a
//! runtime check passes. The fault path reports, then asks the runtime how to
//! continue. For a store through pointer `%p`:
//!
//! ```text
//! head:
//!   %ok = call i1 @__tolerator_is_valid(%p)
//!   br %ok, label %dowrite, label %invalidwrite
//! dowrite:
//!   store %v, %p
//!   br label %afterwrite
//! afterwrite:
//!   ; rest of the original block
//! invalidwrite:
//!   call void @__tolerator_report_invalid_write()
//!   %abort = call i1 @__tolerator_should_abort_function()
//!   br %abort, label %abortfn, label %afterwrite
//! abortfn:
//!   call void @__tolerator_exit_scope()
//!   ret <zero>
//! ```
//!
//! Loads and divisions produce a value, so their fault path has one more
//! step: when the runtime asks for a default the zero of the result type
//! flows into a phi at the continuation; otherwise control falls back to the
//! real operation.
//!
//! Everything here goes through [`CfgEditor`], so the diamonds can be built
//! on any graph representation that implements it.

use cfg::{BlockId, CfgEditor, FloatPredicate, InstId, InstKind, IntPredicate, Value};
use runtime::Hook;
use tracing::debug;

use crate::{
    error::{InstrumentError, InstrumentResult},
    hooks::hook_call,
};

/// Names of the blocks one diamond adds.
#[derive(Debug, Clone, Copy)]
pub struct DiamondNames {
    pub proceed: &'static str,
    pub after: &'static str,
    pub fault: &'static str,
}

pub const FREE_BLOCKS: DiamondNames = DiamondNames {
    proceed: "dofree",
    after: "afterfree",
    fault: "invalidfree",
};

pub const STORE_BLOCKS: DiamondNames = DiamondNames {
    proceed: "dowrite",
    after: "afterwrite",
    fault: "invalidwrite",
};

pub const LOAD_BLOCKS: DiamondNames = DiamondNames {
    proceed: "doread",
    after: "afterread",
    fault: "invalidread",
};

pub const DIV_BLOCKS: DiamondNames = DiamondNames {
    proceed: "dodiv",
    after: "afterdiv",
    fault: "divbyzero",
};

pub const ABORT_BLOCK: &str = "abortfn";
pub const FALLBACK_BLOCK: &str = "tryfallback";
pub const SUBSTITUTE_BLOCK: &str = "substitute";

/// Blocks created for one guarded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diamond {
    pub head: BlockId,
    pub proceed: BlockId,
    pub after: BlockId,
    pub fault: BlockId,
    pub abort: BlockId,
}

fn stale(editor: &impl CfgEditorName, inst: InstId, expected: &'static str) -> InstrumentError {
    InstrumentError::StaleReference {
        function: editor.function_name(),
        inst,
        expected,
    }
}

/// Editors that can name the function they edit, for error messages.
pub trait CfgEditorName {
    fn function_name(&self) -> String;
}

impl CfgEditorName for cfg::Function {
    fn function_name(&self) -> String {
        self.name().to_string()
    }
}

fn insert_call_before<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    anchor: InstId,
    hook: Hook,
    args: Vec<Value>,
) -> InstrumentResult<Value> {
    editor
        .insert_before(anchor, hook_call(hook, args))
        .map(Value::Inst)
        .ok_or_else(|| stale(editor, anchor, "placed instruction"))
}

fn append_call<E: CfgEditor>(editor: &mut E, block: BlockId, hook: Hook) -> Value {
    Value::Inst(editor.append(block, hook_call(hook, Vec::new())))
}

/// Moves `inst` into a block of its own: returns `(head, proceed, after)`
/// where `head` keeps what came before and `after` what came after.
fn isolate<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    inst: InstId,
    names: DiamondNames,
) -> InstrumentResult<(BlockId, BlockId, BlockId)> {
    let head = editor
        .block_of(inst)
        .ok_or_else(|| stale(editor, inst, "placed instruction"))?;
    let proceed = editor
        .split_before(inst, names.proceed)
        .ok_or_else(|| stale(editor, inst, "splittable instruction"))?;
    let next = editor
        .next_inst(inst)
        .ok_or_else(|| stale(editor, inst, "non-terminator"))?;
    let after = editor
        .split_before(next, names.after)
        .ok_or_else(|| stale(editor, inst, "non-terminator"))?;
    debug!(function = %editor.function_name(), ?inst, block = names.proceed, "guarded site");
    Ok((head, proceed, after))
}

/// Exits the current function with its zero or void default.
fn build_abort_block<E: CfgEditor>(editor: &mut E) -> BlockId {
    let abort = editor.append_block(ABORT_BLOCK);
    editor.append(abort, hook_call(Hook::ExitScope, Vec::new()));
    let ret = editor.return_type();
    let value = (!ret.is_void()).then(|| Value::zero(&ret));
    editor.set_return(abort, value);
    abort
}

/// Fault block shared by every diamond: report, then abort or continue at
/// `resume`.
fn build_fault_block<E: CfgEditor>(
    editor: &mut E,
    name: &str,
    report: Hook,
    resume: BlockId,
) -> (BlockId, BlockId) {
    let fault = editor.append_block(name);
    editor.append(fault, hook_call(report, Vec::new()));
    let should_abort = append_call(editor, fault, Hook::ShouldAbortFunction);
    let abort = build_abort_block(editor);
    editor.set_branch(fault, should_abort, abort, resume);
    (fault, abort)
}

/// Guards a deallocation call: the pointer must be the exact start of a live
/// heap allocation. A valid free is followed by releasing its range.
pub fn guard_free<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    inst: InstId,
) -> InstrumentResult<Diamond> {
    let ptr = match editor.kind(inst) {
        InstKind::Call { args, .. } if !args.is_empty() => args[0].clone(),
        _ => return Err(stale(editor, inst, "deallocation call")),
    };

    let allocated = insert_call_before(editor, inst, Hook::IsAllocated, vec![ptr.clone()])?;
    let (head, proceed, after) = isolate(editor, inst, FREE_BLOCKS)?;
    editor
        .insert_after(inst, hook_call(Hook::ReleaseHeapAlloc, vec![ptr]))
        .ok_or_else(|| stale(editor, inst, "placed instruction"))?;

    let (fault, abort) = build_fault_block(editor, FREE_BLOCKS.fault, Hook::ReportInvalidFree, after);
    editor.set_branch(head, allocated, proceed, fault);

    Ok(Diamond {
        head,
        proceed,
        after,
        fault,
        abort,
    })
}

/// Guards a store: the destination must lie in a tracked range. A skipped
/// store has no substitute.
pub fn guard_store<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    inst: InstId,
) -> InstrumentResult<Diamond> {
    let ptr = match editor.kind(inst) {
        InstKind::Store { ptr, .. } => ptr.clone(),
        _ => return Err(stale(editor, inst, "store")),
    };

    let valid = insert_call_before(editor, inst, Hook::IsValid, vec![ptr])?;
    let (head, proceed, after) = isolate(editor, inst, STORE_BLOCKS)?;
    let (fault, abort) =
        build_fault_block(editor, STORE_BLOCKS.fault, Hook::ReportInvalidWrite, after);
    editor.set_branch(head, valid, proceed, fault);

    Ok(Diamond {
        head,
        proceed,
        after,
        fault,
        abort,
    })
}

/// Diamond for a value-producing instruction whose uses must be rewired to
/// the merged result.
fn guard_value<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    inst: InstId,
    check: Value,
    fault_when_true: bool,
    names: DiamondNames,
    report: Hook,
) -> InstrumentResult<Diamond> {
    let ty = editor.kind(inst).result_type();
    let (head, proceed, after) = isolate(editor, inst, names)?;

    let fallback = editor.append_block(FALLBACK_BLOCK);
    let (fault, abort) = build_fault_block(editor, names.fault, report, fallback);

    let substitute = editor.append_block(SUBSTITUTE_BLOCK);
    editor.set_jump(substitute, after);
    let should_default = append_call(editor, fallback, Hook::ShouldDefaultValue);
    editor.set_branch(fallback, should_default, substitute, proceed);

    if fault_when_true {
        editor.set_branch(head, check, fault, proceed);
    } else {
        editor.set_branch(head, check, proceed, fault);
    }

    let merged = editor.prepend(
        after,
        InstKind::Phi {
            ty: ty.clone(),
            incoming: vec![(Value::Inst(inst), proceed), (Value::zero(&ty), substitute)],
        },
    );
    editor.replace_uses(&Value::Inst(inst), &Value::Inst(merged), Some(merged));

    Ok(Diamond {
        head,
        proceed,
        after,
        fault,
        abort,
    })
}

/// Guards a load: the source must lie in a tracked range.
pub fn guard_load<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    inst: InstId,
) -> InstrumentResult<Diamond> {
    let ptr = match editor.kind(inst) {
        InstKind::Load { ptr, .. } => ptr.clone(),
        _ => return Err(stale(editor, inst, "load")),
    };

    let valid = insert_call_before(editor, inst, Hook::IsValid, vec![ptr])?;
    guard_value(editor, inst, valid, false, LOAD_BLOCKS, Hook::ReportInvalidRead)
}

/// Guards a division or remainder: the denominator must be nonzero. Float
/// division compares with ordered equality, so a NaN denominator passes.
pub fn guard_division<E: CfgEditor + CfgEditorName>(
    editor: &mut E,
    inst: InstId,
) -> InstrumentResult<Diamond> {
    let (op, ty, rhs) = match editor.kind(inst) {
        InstKind::Binary { op, ty, rhs, .. } if op.is_division() => (*op, ty.clone(), rhs.clone()),
        _ => return Err(stale(editor, inst, "division")),
    };

    let compare = if op.is_float() {
        InstKind::FCmp {
            pred: FloatPredicate::Oeq,
            lhs: rhs,
            rhs: Value::zero(&ty),
        }
    } else {
        InstKind::ICmp {
            pred: IntPredicate::Eq,
            lhs: rhs,
            rhs: Value::zero(&ty),
        }
    };
    let is_zero = editor
        .insert_before(inst, compare)
        .map(Value::Inst)
        .ok_or_else(|| stale(editor, inst, "placed instruction"))?;

    guard_value(editor, inst, is_zero, true, DIV_BLOCKS, Hook::ReportDivideByZero)
}
