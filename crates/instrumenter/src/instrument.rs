// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tolerance instrumentation pass
//!
//! Rewrites a module so every memory access, deallocation and division is
//! checked against the runtime's shadow memory before it happens:
//!
//! - the entry function first loads the recorded mode and hands it to the
//!   runtime, then registers each defined global
//! - each heap allocation is registered right after it returns
//! - each stack slot is registered in the current scope right after the
//!   `alloca`; a scope is entered at every function entry and left before
//!   every return
//! - frees, stores, loads and divisions become guarded diamonds (see
//!   [`crate::guard`])
//!
//! The pass records the selected [`AnalysisMode`] in the module and refuses
//! to run twice on the same module.

use cfg::{
    verify_module, CastOp, CfgEditor, Function, GlobalId, InstId, InstKind, Module, Type, Value,
};
use runtime::{AnalysisMode, Hook, MODE_GLOBAL};
use tracing::{debug, info};

use crate::{
    classify::{classify, FunctionSites, SiteCounts, Targets},
    config::InstrumentConfig,
    error::{InstrumentError, InstrumentResult},
    guard::{guard_division, guard_free, guard_load, guard_store},
    hooks::{add_mode_global, declare_hooks, hook_call},
};

/// What one run of the pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentStats {
    pub mode: AnalysisMode,
    pub sites: SiteCounts,
    /// Blocks created by splits and fault paths across all functions.
    pub blocks_added: usize,
}

/// Instruments `module` in place.
///
/// Returns [`InstrumentError::AlreadyInstrumented`] without touching the
/// module if it already carries the mode marker.
pub fn instrument(
    module: &mut Module,
    config: &InstrumentConfig,
) -> InstrumentResult<InstrumentStats> {
    if module.global_by_name(MODE_GLOBAL).is_some() {
        return Err(InstrumentError::AlreadyInstrumented(module.name.clone()));
    }
    Instrumenter::new(module, config).run()
}

/// What only the entry function sets up.
struct EntrySetup<'a> {
    mode: GlobalId,
    /// `(global, size)` pairs to register.
    globals: &'a [(GlobalId, i32)],
}

struct Instrumenter<'a> {
    module: &'a mut Module,
    config: &'a InstrumentConfig,
    targets: Targets,
    blocks_added: usize,
}

impl<'a> Instrumenter<'a> {
    fn new(module: &'a mut Module, config: &'a InstrumentConfig) -> Self {
        let targets = classify(module, config);
        Self {
            module,
            config,
            targets,
            blocks_added: 0,
        }
    }

    fn run(mut self) -> InstrumentResult<InstrumentStats> {
        let sites = self.targets.summary();
        info!(module = %self.module.name, mode = %self.config.mode, "instrumenting: {sites}");

        declare_hooks(self.module);
        let mode = add_mode_global(self.module, self.config.mode);

        let registrations: Vec<(GlobalId, i32)> = self
            .targets
            .globals
            .iter()
            .map(|&id| (id, byte_size(&self.module.global(id).ty)))
            .collect();
        let entry = self.entry_function();

        let targets = std::mem::take(&mut self.targets.functions);
        for sites in &targets {
            let setup = (Some(sites.function) == entry).then(|| EntrySetup {
                mode,
                globals: &registrations,
            });
            self.instrument_function(sites, setup)?;
        }

        verify_module(self.module)?;

        info!(
            module = %self.module.name,
            blocks_added = self.blocks_added,
            "instrumentation complete"
        );
        Ok(InstrumentStats {
            mode: self.config.mode,
            sites,
            blocks_added: self.blocks_added,
        })
    }

    /// The configured entry point, or the first defined function.
    fn entry_function(&self) -> Option<cfg::FuncId> {
        let by_name = self
            .module
            .function_by_name(&self.config.entry_point)
            .filter(|&id| !self.module.function(id).is_declaration());
        by_name.or_else(|| self.targets.functions.first().map(|sites| sites.function))
    }

    fn instrument_function(
        &mut self,
        sites: &FunctionSites,
        entry: Option<EntrySetup<'_>>,
    ) -> InstrumentResult<()> {
        let func = self.module.function_mut(sites.function);
        let blocks_before = func.block_count();

        for &inst in &sites.heap_allocs {
            register_heap_alloc(func, inst)?;
        }
        for &inst in &sites.heap_frees {
            guard_free(func, inst)?;
        }
        for &inst in &sites.stores {
            guard_store(func, inst)?;
        }
        for &inst in &sites.loads {
            guard_load(func, inst)?;
        }
        for &inst in &sites.stack_allocs {
            register_local(func, inst)?;
        }
        for &inst in &sites.returns {
            func.insert_before(inst, hook_call(Hook::ExitScope, Vec::new()))
                .ok_or_else(|| stale(func, inst, "return"))?;
        }
        for &inst in &sites.divisions {
            guard_division(func, inst)?;
        }

        // Prepending puts each call at the head, so the mode hand-off goes
        // last to run first.
        let globals = entry.as_ref().map_or(&[][..], |setup| setup.globals);
        for &(global, size) in globals.iter().rev() {
            func.prepend(
                sites.entry_block,
                hook_call(Hook::RegisterGlobal, vec![Value::Global(global), Value::i32(size)]),
            );
        }
        func.prepend(sites.entry_block, hook_call(Hook::EnterScope, Vec::new()));
        if let Some(setup) = &entry {
            let mode = func.prepend(
                sites.entry_block,
                InstKind::Load {
                    ty: Type::I32,
                    ptr: Value::Global(setup.mode),
                },
            );
            func.insert_after(mode, hook_call(Hook::InitMode, vec![Value::Inst(mode)]))
                .ok_or_else(|| stale(func, mode, "placed instruction"))?;
        }

        let added = func.block_count() - blocks_before;
        debug!(
            function = func.name(),
            entry = entry.is_some(),
            globals = globals.len(),
            blocks_added = added,
            "instrumented function"
        );
        self.blocks_added += added;
        Ok(())
    }
}

fn stale(func: &Function, inst: InstId, expected: &'static str) -> InstrumentError {
    InstrumentError::StaleReference {
        function: func.name().to_string(),
        inst,
        expected,
    }
}

/// Size in bytes as the runtime's `i32` size argument.
fn byte_size(ty: &Type) -> i32 {
    i32::try_from(ty.alloc_size()).unwrap_or(i32::MAX)
}

/// Registers the block returned by an allocation call, sized by its first
/// argument narrowed or widened to `i32`.
fn register_heap_alloc(func: &mut Function, inst: InstId) -> InstrumentResult<()> {
    let size = match func.inst(inst) {
        InstKind::Call { args, .. } if !args.is_empty() => args[0].clone(),
        _ => return Err(stale(func, inst, "allocation call")),
    };

    let mut anchor = inst;
    let size = match func.operand_type(&size).int_bits() {
        Some(32) | None => size,
        Some(bits) => {
            let op = if bits > 32 { CastOp::Trunc } else { CastOp::ZExt };
            let cast = InstKind::Cast {
                op,
                value: size,
                ty: Type::I32,
            };
            anchor = func
                .insert_after(inst, cast)
                .ok_or_else(|| stale(func, inst, "placed instruction"))?;
            Value::Inst(anchor)
        }
    };

    func.insert_after(
        anchor,
        hook_call(Hook::RegisterHeapAlloc, vec![Value::Inst(inst), size]),
    )
    .ok_or_else(|| stale(func, inst, "placed instruction"))?;
    Ok(())
}

/// Registers a stack slot in the innermost scope.
fn register_local(func: &mut Function, inst: InstId) -> InstrumentResult<()> {
    let size = match func.inst(inst) {
        InstKind::Alloca { ty } => byte_size(ty),
        _ => return Err(stale(func, inst, "alloca")),
    };
    func.insert_after(
        inst,
        hook_call(Hook::RegisterLocal, vec![Value::Inst(inst), Value::i32(size)]),
    )
    .ok_or_else(|| stale(func, inst, "placed instruction"))?;
    Ok(())
}
