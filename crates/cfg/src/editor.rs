// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Graph editing capability
//!
//! [`CfgEditor`] is the minimal set of edits a rewriting pass needs:
//! splitting a block before an instruction, appending fresh blocks,
//! installing terminators, and inserting instructions next to existing
//! ones. Passes written against this trait do not depend on how the graph
//! is stored.
//!
//! # Contract
//!
//! - Instruction and block references handed out by the editor stay valid
//!   across every edit.
//! - [`CfgEditor::split_before`] keeps the head of the block in place, so the
//!   entry block of a function is still the entry block after any split.
//! - Installing a terminator replaces the block's current terminator, if any.

use crate::{
    function::Function,
    inst::InstKind,
    types::Type,
    value::{BlockId, InstId, Value},
};

pub trait CfgEditor {
    /// Moves `inst` and everything after it into a new block placed right
    /// after the original one, and ends the original block with a jump to it.
    ///
    /// Phis in successor blocks are updated to name the new block as their
    /// predecessor. Returns `None` if `inst` is not attached or is a phi.
    fn split_before(&mut self, inst: InstId, name: &str) -> Option<BlockId>;

    /// Appends an empty block at the end of the function.
    fn append_block(&mut self, name: &str) -> BlockId;

    /// Ends `block` with a two-way conditional branch.
    fn set_branch(&mut self, block: BlockId, cond: Value, then_block: BlockId, else_block: BlockId);

    /// Ends `block` with an unconditional jump.
    fn set_jump(&mut self, block: BlockId, target: BlockId);

    /// Ends `block` with a return.
    fn set_return(&mut self, block: BlockId, value: Option<Value>);

    /// Inserts a new instruction immediately before `anchor`.
    fn insert_before(&mut self, anchor: InstId, kind: InstKind) -> Option<InstId>;

    /// Inserts a new instruction immediately after `anchor`.
    fn insert_after(&mut self, anchor: InstId, kind: InstKind) -> Option<InstId>;

    /// Inserts a new instruction at the head of `block`, after any phis.
    fn prepend(&mut self, block: BlockId, kind: InstKind) -> InstId;

    /// Appends a new instruction at the end of `block`, before its
    /// terminator if it already has one.
    fn append(&mut self, block: BlockId, kind: InstKind) -> InstId;

    /// Rewrites every use of `from` to `to`, except inside `except`.
    fn replace_uses(&mut self, from: &Value, to: &Value, except: Option<InstId>);

    fn block_of(&self, inst: InstId) -> Option<BlockId>;

    /// The instruction following `inst` in its block.
    fn next_inst(&self, inst: InstId) -> Option<InstId>;

    fn kind(&self, inst: InstId) -> &InstKind;

    fn operand_type(&self, value: &Value) -> Type;

    fn return_type(&self) -> Type;
}

impl Function {
    fn set_terminator(&mut self, block: BlockId, kind: InstKind) {
        if let Some(old) = self.terminator(block) {
            self.blocks[block.index()].insts.pop();
            self.insts[old.index()].block = None;
        }
        let id = self.create_inst(kind, block);
        self.blocks[block.index()].insts.push(id);
    }

    fn insert_at(&mut self, block: BlockId, index: usize, kind: InstKind) -> InstId {
        let id = self.create_inst(kind, block);
        self.blocks[block.index()].insts.insert(index, id);
        id
    }

    /// Appends a block to the layout and returns it; used by the builder.
    pub(crate) fn push_block(&mut self, name: &str) -> BlockId {
        let block = self.create_block(name);
        self.layout.push(block);
        block
    }

    fn retarget_phis(&mut self, successor: BlockId, from: BlockId, to: BlockId) {
        let phis: Vec<InstId> = self
            .block_insts(successor)
            .iter()
            .copied()
            .take_while(|&inst| self.inst(inst).is_phi())
            .collect();
        for phi in phis {
            if let InstKind::Phi { incoming, .. } = self.inst_mut(phi) {
                for (_, pred) in incoming.iter_mut() {
                    if *pred == from {
                        *pred = to;
                    }
                }
            }
        }
    }
}

impl CfgEditor for Function {
    fn split_before(&mut self, inst: InstId, name: &str) -> Option<BlockId> {
        if self.inst(inst).is_phi() {
            return None;
        }
        let (head, index) = self.position(inst)?;
        let tail = self.create_block(name);

        let layout_pos = self.layout.iter().position(|&b| b == head)?;
        self.layout.insert(layout_pos + 1, tail);

        let moved = self.blocks[head.index()].insts.split_off(index);
        for &id in &moved {
            self.insts[id.index()].block = Some(tail);
        }
        self.blocks[tail.index()].insts = moved;

        if let Some(terminator) = self.terminator(tail) {
            for successor in self.inst(terminator).successors() {
                self.retarget_phis(successor, head, tail);
            }
        }

        self.set_terminator(head, InstKind::Br { target: tail });
        Some(tail)
    }

    fn append_block(&mut self, name: &str) -> BlockId {
        self.push_block(name)
    }

    fn set_branch(&mut self, block: BlockId, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.set_terminator(
            block,
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            },
        );
    }

    fn set_jump(&mut self, block: BlockId, target: BlockId) {
        self.set_terminator(block, InstKind::Br { target });
    }

    fn set_return(&mut self, block: BlockId, value: Option<Value>) {
        self.set_terminator(block, InstKind::Ret { value });
    }

    fn insert_before(&mut self, anchor: InstId, kind: InstKind) -> Option<InstId> {
        let (block, index) = self.position(anchor)?;
        Some(self.insert_at(block, index, kind))
    }

    fn insert_after(&mut self, anchor: InstId, kind: InstKind) -> Option<InstId> {
        let (block, index) = self.position(anchor)?;
        Some(self.insert_at(block, index + 1, kind))
    }

    fn prepend(&mut self, block: BlockId, kind: InstKind) -> InstId {
        let index = self
            .block_insts(block)
            .iter()
            .take_while(|&&inst| self.inst(inst).is_phi())
            .count();
        self.insert_at(block, index, kind)
    }

    fn append(&mut self, block: BlockId, kind: InstKind) -> InstId {
        let index = match self.terminator(block) {
            Some(_) => self.block_insts(block).len() - 1,
            None => self.block_insts(block).len(),
        };
        self.insert_at(block, index, kind)
    }

    fn replace_uses(&mut self, from: &Value, to: &Value, except: Option<InstId>) {
        for (index, data) in self.insts.iter_mut().enumerate() {
            if data.block.is_none() || except == Some(InstId::new(index)) {
                continue;
            }
            for operand in data.kind.operands_mut() {
                if operand == from {
                    *operand = to.clone();
                }
            }
        }
    }

    fn block_of(&self, inst: InstId) -> Option<BlockId> {
        self.inst_block(inst)
    }

    fn next_inst(&self, inst: InstId) -> Option<InstId> {
        let (block, index) = self.position(inst)?;
        self.block_insts(block).get(index + 1).copied()
    }

    fn kind(&self, inst: InstId) -> &InstKind {
        self.inst(inst)
    }

    fn operand_type(&self, value: &Value) -> Type {
        self.value_type(value)
    }

    fn return_type(&self) -> Type {
        self.ret().clone()
    }
}
