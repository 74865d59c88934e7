// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Structural verification
//!
//! Checks the invariants every pass must preserve: each block is non-empty,
//! ends with exactly one terminator, keeps its phis at the head, and every
//! phi lists exactly the block's predecessors. Dominance is not checked.

use std::collections::HashSet;

use crate::{
    block_graph::BlockGraph,
    error::VerifyError,
    function::Function,
    inst::InstKind,
    module::Module,
    value::{BlockId, InstId, Value},
};

pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    module
        .functions()
        .filter(|(_, func)| !func.is_declaration())
        .try_for_each(|(_, func)| verify_function(func))
}

pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    for block in func.blocks() {
        verify_block_shape(func, block)?;
    }

    let graph = BlockGraph::build(func)?;

    for block in func.blocks() {
        let predecessors = graph.predecessors(block);
        for &inst in func.block_insts(block) {
            verify_operands(func, inst)?;
            match func.inst(inst) {
                InstKind::Phi { incoming, .. } => {
                    let sources: HashSet<BlockId> =
                        incoming.iter().map(|(_, pred)| *pred).collect();
                    if sources != predecessors || incoming.len() != predecessors.len() {
                        return Err(VerifyError::PhiPredecessorMismatch {
                            function: func.name().to_string(),
                            block: func.block_name(block).to_string(),
                            inst,
                        });
                    }
                }
                InstKind::Ret { value } => {
                    if value.is_some() == func.ret().is_void() {
                        return Err(VerifyError::ReturnTypeMismatch {
                            function: func.name().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn verify_block_shape(func: &Function, block: BlockId) -> Result<(), VerifyError> {
    let insts = func.block_insts(block);
    let block_name = || func.block_name(block).to_string();

    let Some((&last, body)) = insts.split_last() else {
        return Err(VerifyError::EmptyBlock {
            function: func.name().to_string(),
            block: block_name(),
        });
    };
    if !func.inst(last).is_terminator() {
        return Err(VerifyError::MissingTerminator {
            function: func.name().to_string(),
            block: block_name(),
        });
    }

    let mut seen_non_phi = false;
    for &inst in body {
        let kind = func.inst(inst);
        if kind.is_terminator() {
            return Err(VerifyError::MisplacedTerminator {
                function: func.name().to_string(),
                block: block_name(),
                inst,
            });
        }
        if kind.is_phi() && seen_non_phi {
            return Err(VerifyError::MisplacedPhi {
                function: func.name().to_string(),
                block: block_name(),
                inst,
            });
        }
        seen_non_phi |= !kind.is_phi();
    }
    Ok(())
}

fn verify_operands(func: &Function, user: InstId) -> Result<(), VerifyError> {
    for operand in func.inst(user).operands() {
        match operand {
            Value::Inst(used) if func.inst_block(*used).is_none() => {
                return Err(VerifyError::DetachedOperand {
                    function: func.name().to_string(),
                    user,
                    used: *used,
                });
            }
            Value::Param(index) if *index as usize >= func.params().len() => {
                return Err(VerifyError::UnknownParam {
                    function: func.name().to_string(),
                    index: *index,
                });
            }
            _ => {}
        }
    }
    Ok(())
}
