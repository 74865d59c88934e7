// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Instruction classification
//!
//! One read-only pass over the module that records every instruction the
//! rewrite will touch. The rewrite then works only from these lists, so the
//! blocks and calls it inserts are never themselves classified.

use std::fmt;

use cfg::{BlockId, FuncId, Function, GlobalId, InstId, InstKind, Module};

use crate::config::InstrumentConfig;

/// Sites of one defined function, each list in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSites {
    pub function: FuncId,
    pub entry_block: BlockId,
    pub heap_allocs: Vec<InstId>,
    pub heap_frees: Vec<InstId>,
    pub stack_allocs: Vec<InstId>,
    pub loads: Vec<InstId>,
    pub stores: Vec<InstId>,
    pub divisions: Vec<InstId>,
    pub returns: Vec<InstId>,
}

impl FunctionSites {
    fn new(function: FuncId, entry_block: BlockId) -> Self {
        Self {
            function,
            entry_block,
            heap_allocs: Vec::new(),
            heap_frees: Vec::new(),
            stack_allocs: Vec::new(),
            loads: Vec::new(),
            stores: Vec::new(),
            divisions: Vec::new(),
            returns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub functions: Vec<FunctionSites>,
    /// Defined, non-intrinsic globals.
    pub globals: Vec<GlobalId>,
}

/// Number of sites per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteCounts {
    pub functions: usize,
    pub globals: usize,
    pub heap_allocs: usize,
    pub heap_frees: usize,
    pub stack_allocs: usize,
    pub loads: usize,
    pub stores: usize,
    pub divisions: usize,
    pub returns: usize,
}

impl Targets {
    pub fn summary(&self) -> SiteCounts {
        self.functions.iter().fold(
            SiteCounts {
                functions: self.functions.len(),
                globals: self.globals.len(),
                ..SiteCounts::default()
            },
            |mut counts, sites| {
                counts.heap_allocs += sites.heap_allocs.len();
                counts.heap_frees += sites.heap_frees.len();
                counts.stack_allocs += sites.stack_allocs.len();
                counts.loads += sites.loads.len();
                counts.stores += sites.stores.len();
                counts.divisions += sites.divisions.len();
                counts.returns += sites.returns.len();
                counts
            },
        )
    }
}

impl fmt::Display for SiteCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} functions, {} globals, {} mallocs, {} frees, {} allocas, {} loads, {} stores, {} divisions, {} returns",
            self.functions,
            self.globals,
            self.heap_allocs,
            self.heap_frees,
            self.stack_allocs,
            self.loads,
            self.stores,
            self.divisions,
            self.returns
        )
    }
}

pub fn classify(module: &Module, config: &InstrumentConfig) -> Targets {
    let functions = module
        .functions()
        .filter_map(|(id, func)| classify_function(id, func, config))
        .collect();
    let globals = module
        .globals()
        .filter(|(_, global)| !global.is_declaration() && !global.is_intrinsic())
        .map(|(id, _)| id)
        .collect();
    Targets { functions, globals }
}

fn classify_function(id: FuncId, func: &Function, config: &InstrumentConfig) -> Option<FunctionSites> {
    let mut sites = FunctionSites::new(id, func.entry_block()?);

    for inst in func.insts() {
        match func.inst(inst) {
            InstKind::Call { callee, args, .. } if !args.is_empty() => {
                if config.is_allocator(callee) {
                    sites.heap_allocs.push(inst);
                } else if config.is_deallocator(callee) {
                    sites.heap_frees.push(inst);
                }
            }
            InstKind::Alloca { .. } => sites.stack_allocs.push(inst),
            InstKind::Load { .. } => sites.loads.push(inst),
            InstKind::Store { .. } => sites.stores.push(inst),
            InstKind::Binary { op, .. } if op.is_division() => sites.divisions.push(inst),
            InstKind::Ret { .. } => sites.returns.push(inst),
            _ => {}
        }
    }

    Some(sites)
}
