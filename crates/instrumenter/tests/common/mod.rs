// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host that links the interpreter to the real runtime state machine

use cfg::{call_libc, ExecError, ExecResult, Host, HostCall, Interpreter, Memory, Module, Outcome};
use instrumenter::{instrument, InstrumentConfig};
use runtime::{AnalysisMode, FaultKind, Hook, HookResult, Runtime};
use tracing_subscriber::EnvFilter;

/// Answers `__tolerator_*` calls from a [`Runtime`] and everything else from
/// libc emulation.
///
/// The runtime starts in the build's default mode, like the linked library
/// does, and picks up the module's mode from its entry function.
#[derive(Default)]
pub struct RuntimeHost {
    pub runtime: Runtime,
    /// Every reported fault in order.
    pub faults: Vec<FaultKind>,
}

impl RuntimeHost {
    fn record(&mut self, hook: Hook, args: &[usize]) {
        let kind = match hook {
            Hook::DispatchFault => args
                .first()
                .and_then(|&code| FaultKind::from_code(code as u32 as i32)),
            _ => hook.reported_kind(),
        };
        self.faults.extend(kind);
    }
}

impl Host for RuntimeHost {
    fn call(&mut self, callee: &str, args: &[u64], memory: &mut Memory) -> ExecResult<HostCall> {
        let Some(hook) = Hook::from_symbol(callee) else {
            return call_libc(callee, args, memory)
                .unwrap_or_else(|| Err(ExecError::UnknownFunction(callee.to_string())));
        };
        let args: Vec<usize> = args.iter().map(|&arg| arg as usize).collect();
        self.record(hook, &args);
        Ok(match self.runtime.call_hook(hook, &args) {
            HookResult::Unit => HostCall::Return(None),
            HookResult::Bool(value) => HostCall::Return(Some(u64::from(value))),
            HookResult::Action(code) => HostCall::Return(Some(u64::from(code as u32))),
            HookResult::Terminate(status) => HostCall::Exit(status),
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Instruments a copy of `module` for `mode`.
pub fn instrumented(module: &Module, mode: AnalysisMode) -> Module {
    init_tracing();
    let mut module = module.clone();
    instrument(&mut module, &InstrumentConfig::new(mode)).unwrap();
    module
}

/// Runs `function` of an instrumented module under the runtime.
pub fn run<'m>(module: &'m Module, function: &str) -> (Outcome, Interpreter<'m, RuntimeHost>) {
    let mut interp = Interpreter::new(module, RuntimeHost::default());
    let outcome = interp.run(function, &[]).unwrap();
    (outcome, interp)
}

pub fn run_main(module: &Module) -> (Outcome, Interpreter<'_, RuntimeHost>) {
    run(module, "main")
}

/// Low 32 bits of a returned word, as a signed integer.
pub fn returned_i32(outcome: Outcome) -> Option<i32> {
    match outcome {
        Outcome::Returned(Some(word)) => Some(word as u32 as i32),
        _ => None,
    }
}
