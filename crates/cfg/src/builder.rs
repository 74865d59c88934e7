// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Programmatic function construction
//!
//! [`FunctionBuilder`] appends instructions at the end of a current block,
//! the way front ends usually emit code. It creates the entry block on
//! construction, so a builder always has a valid insertion point.

use crate::{
    function::Function,
    inst::{BinaryOp, CastOp, FloatPredicate, InstKind, IntPredicate},
    types::Type,
    value::{BlockId, Value},
};

pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    current: BlockId,
}

impl<'f> FunctionBuilder<'f> {
    /// Starts a body for `func`, creating its `entry` block if it has none.
    pub fn new(func: &'f mut Function) -> Self {
        let current = match func.entry_block() {
            Some(entry) => entry,
            None => func.push_block("entry"),
        };
        Self { func, current }
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Appends a new block to the layout without moving the insertion point.
    pub fn create_block(&mut self, name: &str) -> BlockId {
        self.func.push_block(name)
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    fn push(&mut self, kind: InstKind) -> Value {
        let id = self.func.create_inst(kind, self.current);
        self.func.blocks[self.current.index()].insts.push(id);
        Value::Inst(id)
    }

    pub fn alloca(&mut self, ty: Type) -> Value {
        self.push(InstKind::Alloca { ty })
    }

    pub fn load(&mut self, ty: Type, ptr: Value) -> Value {
        self.push(InstKind::Load { ty, ptr })
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        self.push(InstKind::Store { value, ptr });
    }

    pub fn binary(&mut self, op: BinaryOp, ty: Type, lhs: Value, rhs: Value) -> Value {
        self.push(InstKind::Binary { op, ty, lhs, rhs })
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        self.push(InstKind::ICmp { pred, lhs, rhs })
    }

    pub fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        self.push(InstKind::FCmp { pred, lhs, rhs })
    }

    pub fn ptr_add(&mut self, ptr: Value, offset: Value) -> Value {
        self.push(InstKind::PtrAdd { ptr, offset })
    }

    pub fn cast(&mut self, op: CastOp, value: Value, ty: Type) -> Value {
        self.push(InstKind::Cast { op, value, ty })
    }

    pub fn call(&mut self, callee: &str, args: Vec<Value>, ret: Type) -> Value {
        self.push(InstKind::Call {
            callee: callee.to_string(),
            args,
            ret,
        })
    }

    pub fn phi(&mut self, ty: Type, incoming: Vec<(Value, BlockId)>) -> Value {
        self.push(InstKind::Phi { ty, incoming })
    }

    pub fn br(&mut self, target: BlockId) {
        self.push(InstKind::Br { target });
    }

    pub fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.push(InstKind::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(InstKind::Ret { value });
    }

    pub fn unreachable(&mut self) {
        self.push(InstKind::Unreachable);
    }
}
