// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Instruction set
//!
//! Terminators are ordinary instructions that must appear last in their
//! block, so a reference to a `ret` stays valid when its block is split.

use std::fmt;

use crate::{
    types::Type,
    value::{BlockId, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOp {
    /// Operations whose right operand must be nonzero.
    pub fn is_division(self) -> bool {
        matches!(
            self,
            BinaryOp::SDiv | BinaryOp::UDiv | BinaryOp::SRem | BinaryOp::URem | BinaryOp::FDiv
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SRem => "srem",
            BinaryOp::URem => "urem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
        }
    }
}

/// Ordered float comparisons (false when either side is NaN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// Reserves `ty.alloc_size()` bytes in the current stack frame.
    Alloca { ty: Type },
    Load { ty: Type, ptr: Value },
    Store { value: Value, ptr: Value },
    Binary {
        op: BinaryOp,
        ty: Type,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Byte offset from a pointer; `offset` is a signed integer.
    PtrAdd { ptr: Value, offset: Value },
    Cast { op: CastOp, value: Value, ty: Type },
    /// Direct call by symbol name.
    Call {
        callee: String,
        args: Vec<Value>,
        ret: Type,
    },
    Phi {
        ty: Type,
        incoming: Vec<(Value, BlockId)>,
    },
    Br { target: BlockId },
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret { value: Option<Value> },
    Unreachable,
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Ret { .. }
                | InstKind::Unreachable
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi { .. })
    }

    pub fn is_return(&self) -> bool {
        matches!(self, InstKind::Ret { .. })
    }

    /// Name of the directly called function, if this is a call.
    pub fn callee(&self) -> Option<&str> {
        match self {
            InstKind::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Type of the value this instruction defines (`Void` if none).
    pub fn result_type(&self) -> Type {
        match self {
            InstKind::Alloca { .. } | InstKind::PtrAdd { .. } => Type::Ptr,
            InstKind::Load { ty, .. }
            | InstKind::Binary { ty, .. }
            | InstKind::Cast { ty, .. }
            | InstKind::Phi { ty, .. } => ty.clone(),
            InstKind::ICmp { .. } | InstKind::FCmp { .. } => Type::I1,
            InstKind::Call { ret, .. } => ret.clone(),
            InstKind::Store { .. }
            | InstKind::Br { .. }
            | InstKind::CondBr { .. }
            | InstKind::Ret { .. }
            | InstKind::Unreachable => Type::Void,
        }
    }

    /// Pointer operand of a load or store.
    pub fn pointer_operand(&self) -> Option<&Value> {
        match self {
            InstKind::Load { ptr, .. } | InstKind::Store { ptr, .. } => Some(ptr),
            _ => None,
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            InstKind::Alloca { .. }
            | InstKind::Br { .. }
            | InstKind::Ret { value: None }
            | InstKind::Unreachable => Vec::new(),
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::PtrAdd { ptr, offset } => vec![ptr, offset],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Phi { incoming, .. } => incoming.iter().map(|(value, _)| value).collect(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Ret { value: Some(value) } => vec![value],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstKind::Alloca { .. }
            | InstKind::Br { .. }
            | InstKind::Ret { value: None }
            | InstKind::Unreachable => Vec::new(),
            InstKind::Load { ptr, .. } => vec![ptr],
            InstKind::Store { value, ptr } => vec![value, ptr],
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::PtrAdd { ptr, offset } => vec![ptr, offset],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Call { args, .. } => args.iter_mut().collect(),
            InstKind::Phi { incoming, .. } => {
                incoming.iter_mut().map(|(value, _)| value).collect()
            }
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Ret { value: Some(value) } => vec![value],
        }
    }

    /// Blocks this terminator may transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Br { target } => vec![*target],
            InstKind::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}

/// Mnemonic used by the textual printer.
impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
