// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reference interpreter
//!
//! Executes a [`Module`] directly on the IR. Every value is a 64-bit word:
//! integers are kept truncated to their width, doubles as IEEE bits and
//! pointers as addresses into [`Memory`]. Calls to functions without a body
//! are forwarded to a [`Host`], which is how runtime hooks and libc are
//! provided.

use std::{collections::HashMap, rc::Rc};

use tracing::{debug, trace};

use crate::{
    error::{ExecError, ExecResult},
    function::Function,
    inst::{BinaryOp, CastOp, FloatPredicate, InstKind, IntPredicate},
    memory::Memory,
    module::Module,
    types::Type,
    value::{sign_extend, truncate, BlockId, FuncId, InstId, Value},
};

pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Result of a call handled by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Return(Option<u64>),
    /// The program terminated with this status; nothing after the call runs.
    Exit(i32),
}

/// Provider of functions the module only declares.
pub trait Host {
    fn call(&mut self, callee: &str, args: &[u64], memory: &mut Memory) -> ExecResult<HostCall>;
}

/// `malloc`, `free` and `exit` on top of [`Memory`]; `None` for anything else.
///
/// A request the heap cannot hold traps instead of returning null.
pub fn call_libc(callee: &str, args: &[u64], memory: &mut Memory) -> Option<ExecResult<HostCall>> {
    let arg = |index: usize| args.get(index).copied().unwrap_or(0);
    let call = match callee {
        "malloc" => match memory.heap_alloc(arg(0)) {
            Some(addr) => HostCall::Return(Some(addr)),
            None => {
                return Some(Err(ExecError::Trap {
                    function: callee.to_string(),
                    reason: format!("heap exhausted by a request of {} bytes", arg(0)),
                }))
            }
        },
        "free" => {
            memory.heap_free(arg(0));
            HostCall::Return(None)
        }
        "exit" => HostCall::Exit(arg(0) as i32),
        _ => return None,
    };
    Some(Ok(call))
}

/// Host that only knows [`call_libc`].
#[derive(Debug, Default)]
pub struct LibcHost;

impl Host for LibcHost {
    fn call(&mut self, callee: &str, args: &[u64], memory: &mut Memory) -> ExecResult<HostCall> {
        call_libc(callee, args, memory)
            .unwrap_or_else(|| Err(ExecError::UnknownFunction(callee.to_string())))
    }
}

/// How a top-level run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Returned(Option<u64>),
    Exited(i32),
}

enum Flow {
    Return(Option<u64>),
    Exit(i32),
}

pub struct Interpreter<'m, H> {
    module: &'m Module,
    host: H,
    memory: Memory,
    globals: Rc<[u64]>,
    steps: u64,
    step_limit: u64,
}

impl<'m, H: Host> Interpreter<'m, H> {
    /// Lays out and initializes every global of `module`.
    pub fn new(module: &'m Module, host: H) -> Self {
        let mut memory = Memory::new();
        let globals = module
            .globals()
            .map(|(_, global)| {
                let size = global.ty.alloc_size();
                let addr = memory.alloc_global(size);
                if let Some(init) = &global.init {
                    memory.write(addr, size, init.to_bits());
                }
                addr
            })
            .collect::<Vec<u64>>()
            .into();

        Self {
            module,
            host,
            memory,
            globals,
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn global_address(&self, name: &str) -> Option<u64> {
        let id = self.module.global_by_name(name)?;
        self.globals.get(id.index()).copied()
    }

    /// Calls `function` with `args` and runs until it returns or the
    /// program exits.
    pub fn run(&mut self, function: &str, args: &[u64]) -> ExecResult<Outcome> {
        let id = self
            .module
            .function_by_name(function)
            .filter(|&id| !self.module.function(id).is_declaration())
            .ok_or_else(|| ExecError::UnknownFunction(function.to_string()))?;
        Ok(match self.call_function(id, args)? {
            Flow::Return(value) => Outcome::Returned(value),
            Flow::Exit(status) => Outcome::Exited(status),
        })
    }

    fn call(&mut self, callee: &str, args: &[u64]) -> ExecResult<Flow> {
        let module = self.module;
        if let Some(id) = module
            .function_by_name(callee)
            .filter(|&id| !module.function(id).is_declaration())
        {
            return self.call_function(id, args);
        }

        debug!(callee, ?args, "host call");
        Ok(match self.host.call(callee, args, &mut self.memory)? {
            HostCall::Return(value) => Flow::Return(value),
            HostCall::Exit(status) => Flow::Exit(status),
        })
    }

    fn call_function(&mut self, id: FuncId, args: &[u64]) -> ExecResult<Flow> {
        let module = self.module;
        let func = module.function(id);
        if func.params().len() != args.len() {
            return Err(ExecError::ArityMismatch {
                function: func.name().to_string(),
                expected: func.params().len(),
                actual: args.len(),
            });
        }
        trace!(function = func.name(), "enter");

        let mark = self.memory.stack_mark();
        let result = self.execute(func, args);
        self.memory.stack_release(mark);
        result
    }

    fn execute(&mut self, func: &'m Function, args: &[u64]) -> ExecResult<Flow> {
        let mut frame = Frame {
            func,
            args,
            globals: Rc::clone(&self.globals),
            values: HashMap::new(),
        };
        let Some(mut block) = func.entry_block() else {
            return Err(ExecError::UnknownFunction(func.name().to_string()));
        };
        let mut previous: Option<BlockId> = None;

        loop {
            let insts = func.block_insts(block);
            let phi_count = insts
                .iter()
                .take_while(|&&inst| func.inst(inst).is_phi())
                .count();

            // Phis read their inputs before any of them is written.
            let mut phi_values = Vec::with_capacity(phi_count);
            for &inst in &insts[..phi_count] {
                let InstKind::Phi { incoming, .. } = func.inst(inst) else {
                    continue;
                };
                let value = incoming
                    .iter()
                    .find(|(_, pred)| Some(*pred) == previous)
                    .map(|(value, _)| value)
                    .ok_or_else(|| ExecError::MissingIncoming {
                        block: func.block_name(block).to_string(),
                    })?;
                phi_values.push((inst, frame.eval(value)?));
            }
            frame.values.extend(phi_values);

            let mut next = None;
            for &inst in &insts[phi_count..] {
                self.steps += 1;
                if self.steps > self.step_limit {
                    return Err(ExecError::StepLimit(self.step_limit));
                }

                match func.inst(inst) {
                    InstKind::Br { target } => {
                        next = Some(*target);
                        break;
                    }
                    InstKind::CondBr {
                        cond,
                        then_block,
                        else_block,
                    } => {
                        next = Some(if frame.eval(cond)? & 1 == 1 {
                            *then_block
                        } else {
                            *else_block
                        });
                        break;
                    }
                    InstKind::Ret { value } => {
                        let value = value.as_ref().map(|value| frame.eval(value)).transpose()?;
                        return Ok(Flow::Return(value));
                    }
                    InstKind::Unreachable => {
                        return Err(ExecError::Unreachable {
                            function: func.name().to_string(),
                        });
                    }
                    InstKind::Call { callee, args, ret } => {
                        let args = args
                            .iter()
                            .map(|arg| frame.eval(arg))
                            .collect::<ExecResult<Vec<u64>>>()?;
                        match self.call(callee, &args)? {
                            Flow::Exit(status) => return Ok(Flow::Exit(status)),
                            Flow::Return(value) => {
                                if !ret.is_void() {
                                    let word = value.unwrap_or(0);
                                    frame.values.insert(inst, normalize(ret, word));
                                }
                            }
                        }
                    }
                    InstKind::Alloca { ty } => {
                        let size = ty.alloc_size();
                        let addr = self.memory.stack_alloc(size).ok_or_else(|| {
                            frame.trap(format!("stack exhausted by a {size} byte alloca"))
                        })?;
                        frame.values.insert(inst, addr);
                    }
                    InstKind::Load { ty, ptr } => {
                        let addr = frame.eval(ptr)?;
                        let word = self.memory.read(addr, scalar_size(func, ty)?);
                        frame.values.insert(inst, normalize(ty, word));
                    }
                    InstKind::Store { value, ptr } => {
                        let ty = func.value_type(value);
                        let word = frame.eval(value)?;
                        let addr = frame.eval(ptr)?;
                        self.memory.write(addr, scalar_size(func, &ty)?, word);
                    }
                    kind => {
                        let word = frame.compute(kind)?;
                        frame.values.insert(inst, word);
                    }
                }
            }

            let Some(target) = next else {
                return Err(ExecError::MissingTerminator {
                    function: func.name().to_string(),
                    block: func.block_name(block).to_string(),
                });
            };
            previous = Some(block);
            block = target;
        }
    }
}

struct Frame<'a> {
    func: &'a Function,
    args: &'a [u64],
    globals: Rc<[u64]>,
    values: HashMap<InstId, u64>,
}

impl Frame<'_> {
    fn eval(&self, value: &Value) -> ExecResult<u64> {
        match value {
            Value::Inst(id) => self
                .values
                .get(id)
                .copied()
                .ok_or(ExecError::MissingValue(*id)),
            Value::Param(index) => self.args.get(*index as usize).copied().ok_or_else(|| {
                self.trap(format!("parameter {index} out of range"))
            }),
            Value::Global(id) => self
                .globals
                .get(id.index())
                .copied()
                .ok_or_else(|| self.trap(format!("unknown global {id:?}"))),
            Value::Const(constant) => Ok(constant.to_bits()),
        }
    }

    fn int_bits(&self, value: &Value) -> u32 {
        self.func.value_type(value).int_bits().unwrap_or(64)
    }

    fn trap(&self, reason: String) -> ExecError {
        ExecError::Trap {
            function: self.func.name().to_string(),
            reason,
        }
    }

    /// Evaluates instructions without side effects on memory or control flow.
    fn compute(&self, kind: &InstKind) -> ExecResult<u64> {
        match kind {
            InstKind::Binary { op, ty, lhs, rhs } => {
                let (lhs, rhs) = (self.eval(lhs)?, self.eval(rhs)?);
                if op.is_float() {
                    Ok(float_binary(*op, f64::from_bits(lhs), f64::from_bits(rhs)).to_bits())
                } else {
                    let bits = ty.int_bits().unwrap_or(64);
                    self.int_binary(*op, bits, lhs, rhs)
                        .map(|word| truncate(word, bits))
                }
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                let bits = self.int_bits(lhs);
                let (lhs, rhs) = (self.eval(lhs)?, self.eval(rhs)?);
                let (slhs, srhs) = (sign_extend(lhs, bits), sign_extend(rhs, bits));
                let result = match pred {
                    IntPredicate::Eq => lhs == rhs,
                    IntPredicate::Ne => lhs != rhs,
                    IntPredicate::Slt => slhs < srhs,
                    IntPredicate::Sle => slhs <= srhs,
                    IntPredicate::Sgt => slhs > srhs,
                    IntPredicate::Sge => slhs >= srhs,
                    IntPredicate::Ult => lhs < rhs,
                    IntPredicate::Ule => lhs <= rhs,
                    IntPredicate::Ugt => lhs > rhs,
                    IntPredicate::Uge => lhs >= rhs,
                };
                Ok(u64::from(result))
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                let lhs = f64::from_bits(self.eval(lhs)?);
                let rhs = f64::from_bits(self.eval(rhs)?);
                let result = match pred {
                    FloatPredicate::Oeq => lhs == rhs,
                    FloatPredicate::One => !lhs.is_nan() && !rhs.is_nan() && lhs != rhs,
                    FloatPredicate::Olt => lhs < rhs,
                    FloatPredicate::Ole => lhs <= rhs,
                    FloatPredicate::Ogt => lhs > rhs,
                    FloatPredicate::Oge => lhs >= rhs,
                };
                Ok(u64::from(result))
            }
            InstKind::PtrAdd { ptr, offset } => {
                let bits = self.int_bits(offset);
                let base = self.eval(ptr)?;
                let offset = sign_extend(self.eval(offset)?, bits);
                Ok(base.wrapping_add(offset as u64))
            }
            InstKind::Cast { op, value, ty } => {
                let from = self.int_bits(value);
                let to = ty.int_bits().unwrap_or(64);
                let word = self.eval(value)?;
                Ok(match op {
                    CastOp::Trunc | CastOp::ZExt => truncate(word, to),
                    CastOp::SExt => truncate(sign_extend(word, from) as u64, to),
                })
            }
            other => Err(self.trap(format!("cannot evaluate {other:?}"))),
        }
    }

    fn int_binary(&self, op: BinaryOp, bits: u32, lhs: u64, rhs: u64) -> ExecResult<u64> {
        let (slhs, srhs) = (sign_extend(lhs, bits), sign_extend(rhs, bits));
        if op.is_division() && rhs == 0 {
            return Err(self.trap(format!("{op} by zero")));
        }
        Ok(match op {
            BinaryOp::Add => lhs.wrapping_add(rhs),
            BinaryOp::Sub => lhs.wrapping_sub(rhs),
            BinaryOp::Mul => lhs.wrapping_mul(rhs),
            BinaryOp::SDiv => slhs.wrapping_div(srhs) as u64,
            BinaryOp::SRem => slhs.wrapping_rem(srhs) as u64,
            BinaryOp::UDiv => lhs / rhs,
            BinaryOp::URem => lhs % rhs,
            BinaryOp::And => lhs & rhs,
            BinaryOp::Or => lhs | rhs,
            BinaryOp::Xor => lhs ^ rhs,
            BinaryOp::Shl => lhs.wrapping_shl(rhs as u32),
            BinaryOp::LShr => lhs.wrapping_shr(rhs as u32),
            BinaryOp::AShr => slhs.wrapping_shr(rhs as u32) as u64,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv => {
                return Err(self.trap(format!("{op} on integers")));
            }
        })
    }
}

fn float_binary(op: BinaryOp, lhs: f64, rhs: f64) -> f64 {
    match op {
        BinaryOp::FAdd => lhs + rhs,
        BinaryOp::FSub => lhs - rhs,
        BinaryOp::FMul => lhs * rhs,
        _ => lhs / rhs,
    }
}

/// Keeps integer results at their declared width.
fn normalize(ty: &Type, word: u64) -> u64 {
    match ty {
        Type::Int(bits) => truncate(word, *bits),
        _ => word,
    }
}

fn scalar_size(func: &Function, ty: &Type) -> ExecResult<u64> {
    if ty.is_scalar() {
        Ok(ty.alloc_size())
    } else {
        Err(ExecError::Trap {
            function: func.name().to_string(),
            reason: format!("memory access of non-scalar type {ty}"),
        })
    }
}
