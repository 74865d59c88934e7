// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Functions and their basic blocks
//!
//! Instructions and blocks live in per-function arenas. Blocks hold ordered
//! lists of instruction ids and `layout` holds the block order, so edits move
//! ids around without invalidating any reference held by a caller.

use std::collections::HashMap;

use crate::{
    inst::InstKind,
    types::Type,
    value::{BlockId, InstId, Value},
};

/// An instruction together with the block it currently lives in.
#[derive(Debug, Clone)]
pub struct InstData {
    pub kind: InstKind,
    /// `None` once the instruction has been removed from the layout.
    pub(crate) block: Option<BlockId>,
}

#[derive(Debug, Clone)]
pub struct BlockData {
    pub name: String,
    pub(crate) insts: Vec<InstId>,
}

#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<Type>,
    ret: Type,
    pub(crate) insts: Vec<InstData>,
    pub(crate) blocks: Vec<BlockData>,
    /// Block order; the first block is the entry block.
    pub(crate) layout: Vec<BlockId>,
    block_names: HashMap<String, usize>,
}

impl Function {
    /// Creates a function without a body (a declaration).
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            insts: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
            block_names: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn ret(&self) -> &Type {
        &self.ret
    }

    /// A function with no blocks is an external declaration.
    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Iterate over blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.layout.iter().copied()
    }

    pub fn block_count(&self) -> usize {
        self.layout.len()
    }

    pub fn block_name(&self, block: BlockId) -> &str {
        &self.blocks[block.index()].name
    }

    /// Finds a block by its (unique) name.
    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.blocks().find(|&block| self.block_name(block) == name)
    }

    pub fn block_insts(&self, block: BlockId) -> &[InstId] {
        &self.blocks[block.index()].insts
    }

    pub fn inst(&self, inst: InstId) -> &InstKind {
        &self.insts[inst.index()].kind
    }

    pub fn inst_mut(&mut self, inst: InstId) -> &mut InstKind {
        &mut self.insts[inst.index()].kind
    }

    /// Block currently containing `inst`, or `None` if it was removed.
    pub fn inst_block(&self, inst: InstId) -> Option<BlockId> {
        self.insts.get(inst.index()).and_then(|data| data.block)
    }

    /// Iterate over all attached instructions in layout order.
    pub fn insts(&self) -> impl Iterator<Item = InstId> + '_ {
        self.blocks()
            .flat_map(move |block| self.block_insts(block).iter().copied())
    }

    /// The last instruction of `block` if it is a terminator.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.block_insts(block)
            .last()
            .copied()
            .filter(|&inst| self.inst(inst).is_terminator())
    }

    /// First instruction of `block` that is not a phi.
    pub fn first_non_phi(&self, block: BlockId) -> Option<InstId> {
        self.block_insts(block)
            .iter()
            .copied()
            .find(|&inst| !self.inst(inst).is_phi())
    }

    /// Type of an operand as seen from inside this function.
    pub fn value_type(&self, value: &Value) -> Type {
        match value {
            Value::Inst(inst) => self.inst(*inst).result_type(),
            Value::Param(index) => self
                .params
                .get(*index as usize)
                .cloned()
                .unwrap_or(Type::Void),
            Value::Global(_) => Type::Ptr,
            Value::Const(constant) => constant.ty(),
        }
    }

    pub(crate) fn position(&self, inst: InstId) -> Option<(BlockId, usize)> {
        let block = self.inst_block(inst)?;
        let index = self
            .block_insts(block)
            .iter()
            .position(|&candidate| candidate == inst)?;
        Some((block, index))
    }

    pub(crate) fn create_inst(&mut self, kind: InstKind, block: BlockId) -> InstId {
        let id = InstId::new(self.insts.len());
        self.insts.push(InstData {
            kind,
            block: Some(block),
        });
        id
    }

    /// Creates a detached block with a name unique within this function.
    pub(crate) fn create_block(&mut self, name: &str) -> BlockId {
        let name = self.unique_block_name(name);
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BlockData {
            name,
            insts: Vec::new(),
        });
        id
    }

    /// Uniquifies `base` LLVM-style: `base`, `base1`, `base2`, ...
    ///
    /// A candidate already used by another block is skipped, even when that
    /// block was created under a different base (`x1` before `x`).
    fn unique_block_name(&mut self, base: &str) -> String {
        let mut counter = self.block_names.get(base).copied().unwrap_or(0);
        let name = loop {
            let candidate = if counter == 0 {
                base.to_string()
            } else {
                format!("{base}{counter}")
            };
            counter += 1;
            if !self.blocks.iter().any(|block| block.name == candidate) {
                break candidate;
            }
        };
        self.block_names.insert(base.to_string(), counter);
        name
    }
}
