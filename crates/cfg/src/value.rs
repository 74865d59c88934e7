// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Entity references and SSA values

use std::fmt;

use crate::types::Type;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

entity_id!(
    /// Stable reference to an instruction inside a [`Function`](crate::Function).
    ///
    /// Survives block splits and insertions: instructions are stored in an
    /// arena and blocks only hold ordered lists of ids.
    InstId
);
entity_id!(
    /// Stable reference to a basic block inside a [`Function`](crate::Function).
    BlockId
);
entity_id!(
    /// Reference to a global variable of a [`Module`](crate::Module).
    GlobalId
);
entity_id!(
    /// Reference to a function of a [`Module`](crate::Module).
    FuncId
);

/// Compile-time constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Integer constant; `value` is stored truncated to `bits`.
    Int { bits: u32, value: u64 },
    Float(f64),
    Null,
    /// All-zero bytes of an aggregate type.
    Zeroed(Type),
}

impl Constant {
    pub fn int(bits: u32, value: i64) -> Self {
        Constant::Int {
            bits,
            value: truncate(value as u64, bits),
        }
    }

    pub fn bool(value: bool) -> Self {
        Constant::int(1, i64::from(value))
    }

    /// The zero/null value of `ty`, used as the substituted default.
    pub fn zero(ty: &Type) -> Self {
        match ty {
            Type::Int(bits) => Constant::Int {
                bits: *bits,
                value: 0,
            },
            Type::F64 => Constant::Float(0.0),
            Type::Ptr => Constant::Null,
            other => Constant::Zeroed(other.clone()),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Float(_) => Type::F64,
            Constant::Null => Type::Ptr,
            Constant::Zeroed(ty) => ty.clone(),
        }
    }

    /// Raw word encoding: integers zero-extended, floats as IEEE bits.
    pub fn to_bits(&self) -> u64 {
        match self {
            Constant::Int { value, .. } => *value,
            Constant::Float(value) => value.to_bits(),
            Constant::Null | Constant::Zeroed(_) => 0,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { bits: 1, value } => write!(f, "{}", *value != 0),
            Constant::Int { bits, value } => write!(f, "{}", sign_extend(*value, *bits)),
            Constant::Float(value) => write!(f, "{value:?}"),
            Constant::Null => write!(f, "null"),
            Constant::Zeroed(_) => write!(f, "zeroinitializer"),
        }
    }
}

/// Operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of an instruction in the same function.
    Inst(InstId),
    /// Function parameter by position.
    Param(u32),
    /// Address of a global variable.
    Global(GlobalId),
    Const(Constant),
}

impl Value {
    pub fn i1(value: bool) -> Self {
        Value::Const(Constant::bool(value))
    }

    pub fn i32(value: i32) -> Self {
        Value::Const(Constant::int(32, i64::from(value)))
    }

    pub fn i64(value: i64) -> Self {
        Value::Const(Constant::int(64, value))
    }

    pub fn f64(value: f64) -> Self {
        Value::Const(Constant::Float(value))
    }

    pub fn null() -> Self {
        Value::Const(Constant::Null)
    }

    pub fn zero(ty: &Type) -> Self {
        Value::Const(Constant::zero(ty))
    }

    pub fn as_inst(&self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        Value::Const(constant)
    }
}

/// Keeps only the low `bits` bits of `value`.
pub fn truncate(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Interprets the low `bits` bits of `value` as a two's complement integer.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        value as i64
    } else {
        let shift = 64 - bits;
        ((value << shift) as i64) >> shift
    }
}
