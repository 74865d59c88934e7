// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! First-class types of the IR

use std::fmt;

/// Type of an IR value or memory object.
///
/// Pointers are opaque: a load or store names the accessed type itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Integer of the given bit width (1, 8, 16, 32 or 64).
    Int(u32),
    /// IEEE-754 double.
    F64,
    Ptr,
    /// Fixed-length array, only valid as the allocated type of a global or alloca.
    Array(Box<Type>, u64),
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    /// Number of bytes an object of this type occupies in memory,
    /// rounded up to the natural alignment of the type.
    pub fn alloc_size(&self) -> u64 {
        match self {
            Type::Void => 0,
            Type::Int(bits) => u64::from(bits.div_ceil(8).next_power_of_two()),
            Type::F64 | Type::Ptr => 8,
            Type::Array(elem, len) => elem.alloc_size().saturating_mul(*len),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F64)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    /// Returns the bit width of integer types.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Whether values of this type fit in a single register-sized word.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Int(_) | Type::F64 | Type::Ptr)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::F64 => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
            Type::Array(elem, len) => write!(f, "[{len} x {elem}]"),
        }
    }
}
