// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the cfg crate

use thiserror::Error;

use crate::value::{BlockId, InstId};

/// Structural problem found by [`verify_function`](crate::verify_function).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("function '{function}': block '{block}' is empty")]
    EmptyBlock { function: String, block: String },

    #[error("function '{function}': block '{block}' does not end with a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("function '{function}': terminator {inst:?} in the middle of block '{block}'")]
    MisplacedTerminator {
        function: String,
        block: String,
        inst: InstId,
    },

    #[error("function '{function}': phi {inst:?} after a non-phi in block '{block}'")]
    MisplacedPhi {
        function: String,
        block: String,
        inst: InstId,
    },

    #[error("function '{function}': branch to block {target:?} outside the layout")]
    UnknownBlock { function: String, target: BlockId },

    #[error("function '{function}': phi {inst:?} in block '{block}' does not match its predecessors")]
    PhiPredecessorMismatch {
        function: String,
        block: String,
        inst: InstId,
    },

    #[error("function '{function}': {user:?} uses {used:?}, which is not in the layout")]
    DetachedOperand {
        function: String,
        user: InstId,
        used: InstId,
    },

    #[error("function '{function}': parameter {index} out of range")]
    UnknownParam { function: String, index: u32 },

    #[error("function '{function}': return does not match the declared return type")]
    ReturnTypeMismatch { function: String },
}

/// Failure while interpreting a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("call to unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' expects {expected} arguments, got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("value {0:?} used before it was computed")]
    MissingValue(InstId),

    #[error("block '{block}' in '{function}' has no terminator")]
    MissingTerminator { function: String, block: String },

    #[error("phi in block '{block}' has no incoming value for the executed edge")]
    MissingIncoming { block: String },

    #[error("unreachable executed in '{function}'")]
    Unreachable { function: String },

    #[error("trap in '{function}': {reason}")]
    Trap { function: String, reason: String },

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
}

pub type ExecResult<T> = Result<T, ExecError>;
