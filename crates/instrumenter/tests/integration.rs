// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for instrumenter
//!
//! Each test builds a small program, instruments it for one or more analysis
//! modes and executes it with the reference interpreter, answering hook calls
//! from a real [`runtime::Runtime`]. They verify that:
//!
//! 1. Instrumented modules still pass verification
//! 2. Faults are detected at the instruction that would commit them
//! 3. Each mode's recovery shows up in the program's observable result
//! 4. Scope bookkeeping balances on every exit path

mod common;

use cfg::{
    verify_module, BinaryOp, Constant, Function, FunctionBuilder, Global, InstKind, IntPredicate,
    Module, Outcome, Type, Value,
};
use common::{instrumented, returned_i32, run, run_main};
use indoc::indoc;
use instrumenter::{instrument, recorded_mode, InstrumentConfig, InstrumentError};
use runtime::{AnalysisMode, FaultKind, TERMINATION_STATUS};

const TERMINATED: Outcome = Outcome::Exited(TERMINATION_STATUS);

fn with_libc(name: &str) -> Module {
    let mut module = Module::new(name);
    module.declare_function("malloc", vec![Type::I64], Type::Ptr);
    module.declare_function("free", vec![Type::Ptr], Type::Void);
    module
}

/// `p = malloc(16); p[8] = 7; p[20] = 9; return p[8]`
fn heap_overflow_program() -> Module {
    let mut module = with_libc("heap_overflow");
    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let p = b.call("malloc", vec![Value::i64(16)], Type::Ptr);
    let inside = b.ptr_add(p.clone(), Value::i64(8));
    b.store(Value::i32(7), inside.clone());
    let outside = b.ptr_add(p, Value::i64(20));
    b.store(Value::i32(9), outside);
    let v = b.load(Type::I32, inside);
    b.ret(Some(v));
    module.add_function(main);
    module
}

/// `div(a, b) = a / b + 1; main() = div(10, 0) + 100`
fn divide_by_zero_program() -> Module {
    let mut module = Module::new("divide");
    let mut div = Function::new("div", vec![Type::I32, Type::I32], Type::I32);
    let mut b = FunctionBuilder::new(&mut div);
    let q = b.binary(BinaryOp::SDiv, Type::I32, Value::Param(0), Value::Param(1));
    let r = b.binary(BinaryOp::Add, Type::I32, q, Value::i32(1));
    b.ret(Some(r));
    module.add_function(div);

    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let r = b.call("div", vec![Value::i32(10), Value::i32(0)], Type::I32);
    let s = b.binary(BinaryOp::Add, Type::I32, r, Value::i32(100));
    b.ret(Some(s));
    module.add_function(main);
    module
}

#[test]
fn test_heap_overflow_per_mode() {
    let program = heap_overflow_program();
    for mode in AnalysisMode::ALL {
        let module = instrumented(&program, mode);
        let (outcome, interp) = run_main(&module);

        match mode {
            AnalysisMode::Strict => assert_eq!(outcome, TERMINATED),
            AnalysisMode::SemiStrict | AnalysisMode::DefaultSubstitute => {
                assert_eq!(returned_i32(outcome), Some(7), "{mode}")
            }
            AnalysisMode::AbortFunction => assert_eq!(returned_i32(outcome), Some(0)),
        }
        assert_eq!(interp.host().faults, [FaultKind::InvalidWrite], "{mode}");
        assert_eq!(interp.host().runtime.mode(), mode);
        // The out-of-bounds store never reaches memory.
        assert_eq!(interp.memory().read(0x2000_0000 + 20, 4), 0, "{mode}");
    }
}

#[test]
fn test_divide_by_zero_per_mode() {
    let program = divide_by_zero_program();
    for mode in AnalysisMode::ALL {
        let module = instrumented(&program, mode);
        let (outcome, interp) = run_main(&module);

        match mode {
            AnalysisMode::Strict | AnalysisMode::SemiStrict => assert_eq!(outcome, TERMINATED),
            AnalysisMode::DefaultSubstitute => assert_eq!(returned_i32(outcome), Some(101)),
            AnalysisMode::AbortFunction => assert_eq!(returned_i32(outcome), Some(100)),
        }
        assert_eq!(interp.host().faults, [FaultKind::DivideByZero]);
    }
}

#[test]
fn test_remainder_is_guarded() {
    let mut program = Module::new("rem");
    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let r = b.binary(BinaryOp::URem, Type::I32, Value::i32(7), Value::i32(0));
    b.ret(Some(r));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::DefaultSubstitute);
    let (outcome, _) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(0));
}

#[test]
fn test_float_division() {
    let mut program = Module::new("float");
    let mut main = Function::new("main", vec![], Type::F64);
    let mut b = FunctionBuilder::new(&mut main);
    let zero = b.binary(BinaryOp::FDiv, Type::F64, Value::f64(1.0), Value::f64(0.0));
    let quarter = b.binary(BinaryOp::FDiv, Type::F64, Value::f64(1.0), Value::f64(4.0));
    let sum = b.binary(BinaryOp::FAdd, Type::F64, zero, quarter);
    b.ret(Some(sum));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::DefaultSubstitute);
    let (outcome, interp) = run_main(&module);
    assert_eq!(outcome, Outcome::Returned(Some(0.25f64.to_bits())));
    assert_eq!(interp.host().faults, [FaultKind::DivideByZero]);
}

#[test]
fn test_wild_read() {
    let mut program = Module::new("wild");
    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let wild = b.ptr_add(Value::null(), Value::i64(0xdead_0000));
    let v = b.load(Type::I32, wild);
    let w = b.binary(BinaryOp::Add, Type::I32, v, Value::i32(5));
    b.ret(Some(w));
    program.add_function(main);

    for (mode, expected) in [
        (AnalysisMode::Strict, TERMINATED),
        (AnalysisMode::SemiStrict, TERMINATED),
        (AnalysisMode::DefaultSubstitute, Outcome::Returned(Some(5))),
        (AnalysisMode::AbortFunction, Outcome::Returned(Some(0))),
    ] {
        let module = instrumented(&program, mode);
        let (outcome, interp) = run_main(&module);
        assert_eq!(outcome, expected, "{mode}");
        assert_eq!(interp.host().faults, [FaultKind::InvalidRead]);
    }
}

#[test]
fn test_double_free() {
    let mut program = with_libc("double_free");
    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let p = b.call("malloc", vec![Value::i64(8)], Type::Ptr);
    b.call("free", vec![p.clone()], Type::Void);
    b.call("free", vec![p], Type::Void);
    b.ret(Some(Value::i32(0)));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::SemiStrict);
    let (outcome, interp) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(0));
    assert_eq!(interp.host().faults, [FaultKind::InvalidFree]);

    let module = instrumented(&program, AnalysisMode::Strict);
    assert_eq!(run_main(&module).0, TERMINATED);
}

#[test]
fn test_interior_free_keeps_allocation() {
    let mut program = with_libc("interior_free");
    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let p = b.call("malloc", vec![Value::i64(32)], Type::Ptr);
    let interior = b.ptr_add(p.clone(), Value::i64(4));
    b.call("free", vec![interior], Type::Void);
    b.store(Value::i32(3), p.clone());
    let v = b.load(Type::I32, p);
    b.ret(Some(v));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::DefaultSubstitute);
    let (outcome, interp) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(3));
    assert_eq!(interp.host().faults, [FaultKind::InvalidFree]);
    assert!(interp.host().runtime.is_allocated(0x2000_0000));
}

#[test]
fn test_caller_local_is_valid_in_callee() {
    let mut program = Module::new("locals");
    let mut set = Function::new("set", vec![Type::Ptr], Type::Void);
    let mut b = FunctionBuilder::new(&mut set);
    b.store(Value::i32(5), Value::Param(0));
    b.ret(None);
    program.add_function(set);

    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let slot = b.alloca(Type::I32);
    b.call("set", vec![slot.clone()], Type::Void);
    let v = b.load(Type::I32, slot);
    b.ret(Some(v));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::Strict);
    let (outcome, interp) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(5));
    assert!(interp.host().faults.is_empty());
    assert_eq!(interp.host().runtime.scope_depth(), 0);
}

#[test]
fn test_returned_callee_local_is_invalid() {
    let mut program = Module::new("dangling");
    let mut leak = Function::new("leak", vec![], Type::Ptr);
    let mut b = FunctionBuilder::new(&mut leak);
    let slot = b.alloca(Type::I32);
    b.ret(Some(slot));
    program.add_function(leak);

    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let p = b.call("leak", vec![], Type::Ptr);
    b.store(Value::i32(1), p);
    b.ret(Some(Value::i32(0)));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::SemiStrict);
    let (outcome, interp) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(0));
    assert_eq!(interp.host().faults, [FaultKind::InvalidWrite]);
}

#[test]
fn test_globals_are_valid_everywhere() {
    let mut program = Module::new("globals");
    let counter = program.add_global(Global::new("counter", Type::I32, Constant::int(32, 1)));

    let mut bump = Function::new("bump", vec![], Type::Void);
    let mut b = FunctionBuilder::new(&mut bump);
    let v = b.load(Type::I32, Value::Global(counter));
    let w = b.binary(BinaryOp::Add, Type::I32, v, Value::i32(41));
    b.store(w, Value::Global(counter));
    b.ret(None);
    program.add_function(bump);

    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    b.call("bump", vec![], Type::Void);
    let v = b.load(Type::I32, Value::Global(counter));
    b.ret(Some(v));
    program.add_function(main);

    let module = instrumented(&program, AnalysisMode::Strict);
    let (outcome, interp) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(42));
    assert!(interp.host().faults.is_empty());
    assert_eq!(interp.host().runtime.shadow().global_count(), 1);
}

#[test]
fn test_scopes_balance_after_abort() {
    let module = instrumented(&divide_by_zero_program(), AnalysisMode::AbortFunction);
    let (_, interp) = run_main(&module);
    assert_eq!(interp.host().runtime.scope_depth(), 0);
}

#[test]
fn test_instrumented_module_text() {
    let module = instrumented(&heap_overflow_program(), AnalysisMode::SemiStrict);
    verify_module(&module).unwrap();

    let text = module.to_string();
    assert!(text.starts_with("@__tolerator_analysis_mode = constant i32 1\n"), "{text}");
    assert!(text.contains("declare i1 @__tolerator_is_valid(ptr %arg0)"), "{text}");
    let fault_path = indoc! {"
        invalidwrite:
          call void @__tolerator_report_invalid_write()
    "};
    assert!(text.contains(fault_path), "{text}");
}

#[test]
fn test_instrumenting_twice_is_rejected() {
    let mut module = instrumented(&heap_overflow_program(), AnalysisMode::Strict);
    assert_eq!(
        instrument(&mut module, &InstrumentConfig::default()),
        Err(InstrumentError::AlreadyInstrumented("heap_overflow".to_string()))
    );
}

#[test]
fn test_runtime_adopts_recorded_mode() {
    for mode in AnalysisMode::ALL {
        let module = instrumented(&divide_by_zero_program(), mode);
        let (_, interp) = run_main(&module);
        assert_eq!(Some(interp.host().runtime.mode()), recorded_mode(&module));
        assert_eq!(
            interp.host().runtime.should_default_value(),
            mode == AnalysisMode::DefaultSubstitute
        );
        assert_eq!(
            interp.host().runtime.should_abort_function(),
            mode == AnalysisMode::AbortFunction
        );
    }
}

/// `release(p) { free(p + 4); flag = 9 }; main() { release(malloc(16)); return flag }`
fn interior_free_in_callee_program() -> Module {
    let mut module = with_libc("abort_free");
    let flag = module.add_global(Global::new("flag", Type::I32, Constant::int(32, 0)));

    let mut release = Function::new("release", vec![Type::Ptr], Type::Void);
    let mut b = FunctionBuilder::new(&mut release);
    let interior = b.ptr_add(Value::Param(0), Value::i64(4));
    b.call("free", vec![interior], Type::Void);
    b.store(Value::i32(9), Value::Global(flag));
    b.ret(None);
    module.add_function(release);

    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let p = b.call("malloc", vec![Value::i64(16)], Type::Ptr);
    b.call("release", vec![p], Type::Void);
    let v = b.load(Type::I32, Value::Global(flag));
    b.ret(Some(v));
    module.add_function(main);
    module
}

#[test]
fn test_invalid_free_aborts_function() {
    let program = interior_free_in_callee_program();

    let module = instrumented(&program, AnalysisMode::AbortFunction);
    let (outcome, interp) = run_main(&module);
    // The store after the free never runs.
    assert_eq!(returned_i32(outcome), Some(0));
    assert_eq!(interp.host().faults, [FaultKind::InvalidFree]);
    assert_eq!(interp.host().runtime.scope_depth(), 0);

    let module = instrumented(&program, AnalysisMode::SemiStrict);
    let (outcome, interp) = run_main(&module);
    assert_eq!(returned_i32(outcome), Some(9));
    assert_eq!(interp.host().faults, [FaultKind::InvalidFree]);
    assert_eq!(interp.host().runtime.scope_depth(), 0);
}

#[test]
fn test_globals_registered_in_first_function_without_main() {
    let mut program = Module::new("no_main");
    let answer = program.add_global(Global::new("answer", Type::I32, Constant::int(32, 42)));

    let mut start = Function::new("start", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut start);
    let v = b.load(Type::I32, Value::Global(answer));
    b.ret(Some(v));
    program.add_function(start);

    let mut other = Function::new("other", vec![], Type::Void);
    FunctionBuilder::new(&mut other).ret(None);
    program.add_function(other);

    let module = instrumented(&program, AnalysisMode::Strict);
    let text = module.to_string();
    assert_eq!(text.matches("call void @__tolerator_register_global(@answer, 4)").count(), 1);
    assert_eq!(text.matches("call void @__tolerator_init_mode(").count(), 1);

    let (outcome, interp) = run(&module, "start");
    assert_eq!(returned_i32(outcome), Some(42));
    assert!(interp.host().faults.is_empty());
    assert_eq!(interp.host().runtime.shadow().global_count(), 1);
}

/// Sums `p[0..4]` over a 12-byte buffer holding `1, 2, 3`; the last
/// iteration reads past the end.
fn loop_overrun_program() -> Module {
    let mut module = with_libc("loop_overrun");
    let mut main = Function::new("main", vec![], Type::I32);
    let mut b = FunctionBuilder::new(&mut main);
    let entry = b.current_block();
    let p = b.call("malloc", vec![Value::i64(12)], Type::Ptr);
    for (index, value) in [1, 2, 3].into_iter().enumerate() {
        let slot = b.ptr_add(p.clone(), Value::i64(4 * index as i64));
        b.store(Value::i32(value), slot);
    }
    let header = b.create_block("header");
    let body = b.create_block("body");
    let exit = b.create_block("exit");
    b.br(header);

    b.switch_to(header);
    let i = b.phi(Type::I64, vec![(Value::i64(0), entry)]);
    let acc = b.phi(Type::I32, vec![(Value::i32(0), entry)]);
    let more = b.icmp(IntPredicate::Slt, i.clone(), Value::i64(4));
    b.cond_br(more, body, exit);

    b.switch_to(body);
    let offset = b.binary(BinaryOp::Mul, Type::I64, i.clone(), Value::i64(4));
    let slot = b.ptr_add(p, offset);
    let v = b.load(Type::I32, slot);
    let acc_next = b.binary(BinaryOp::Add, Type::I32, acc.clone(), v);
    let i_next = b.binary(BinaryOp::Add, Type::I64, i.clone(), Value::i64(1));
    b.br(header);

    b.switch_to(exit);
    b.ret(Some(acc.clone()));

    for (phi, value) in [(&i, i_next), (&acc, acc_next)] {
        if let InstKind::Phi { incoming, .. } = main.inst_mut(phi.as_inst().unwrap()) {
            incoming.push((value, body));
        }
    }
    module.add_function(main);
    module
}

#[test]
fn test_loop_overrun_per_mode() {
    let program = loop_overrun_program();
    for (mode, expected) in [
        (AnalysisMode::Strict, TERMINATED),
        (AnalysisMode::SemiStrict, TERMINATED),
        (AnalysisMode::DefaultSubstitute, Outcome::Returned(Some(6))),
        (AnalysisMode::AbortFunction, Outcome::Returned(Some(0))),
    ] {
        let module = instrumented(&program, mode);
        verify_module(&module).unwrap();
        let (outcome, interp) = run_main(&module);
        assert_eq!(outcome, expected, "{mode}");
        assert_eq!(interp.host().faults, [FaultKind::InvalidRead], "{mode}");
        if mode != AnalysisMode::Strict && mode != AnalysisMode::SemiStrict {
            assert_eq!(interp.host().runtime.scope_depth(), 0, "{mode}");
        }
    }
}
