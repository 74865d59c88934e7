// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Textual form of the IR
//!
//! The output follows LLVM assembly closely enough to be read at a glance:
//! instruction results print as `%<arena index>`, parameters as `%arg<N>`,
//! globals as `@<name>` and blocks by their unique name.

use std::fmt::{self, Write};

use crate::{
    function::Function,
    inst::InstKind,
    module::{Global, Module},
    value::{BlockId, InstId, Value},
};

/// Renders one function; globals are named through `module` when given.
pub struct FunctionDisplay<'a> {
    func: &'a Function,
    module: Option<&'a Module>,
}

impl Function {
    pub fn display<'a>(&'a self, module: Option<&'a Module>) -> FunctionDisplay<'a> {
        FunctionDisplay { func: self, module }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display(None).fmt(f)
    }
}

impl<'a> FunctionDisplay<'a> {
    fn value(&self, value: &Value) -> String {
        match value {
            Value::Inst(id) => format!("%{}", id.index()),
            Value::Param(index) => format!("%arg{index}"),
            Value::Global(id) => match self.module {
                Some(module) => format!("@{}", module.global(*id).name),
                None => format!("@g{}", id.index()),
            },
            Value::Const(constant) => constant.to_string(),
        }
    }

    fn block(&self, block: BlockId) -> String {
        format!("%{}", self.func.block_name(block))
    }

    fn inst(&self, id: InstId) -> String {
        let kind = self.func.inst(id);
        let body = match kind {
            InstKind::Alloca { ty } => format!("alloca {ty}"),
            InstKind::Load { ty, ptr } => format!("load {ty}, {}", self.value(ptr)),
            InstKind::Store { value, ptr } => {
                format!("store {}, {}", self.value(value), self.value(ptr))
            }
            InstKind::Binary { op, ty, lhs, rhs } => {
                format!("{op} {ty} {}, {}", self.value(lhs), self.value(rhs))
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                format!("icmp {} {}, {}", pred.mnemonic(), self.value(lhs), self.value(rhs))
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                format!("fcmp {} {}, {}", pred.mnemonic(), self.value(lhs), self.value(rhs))
            }
            InstKind::PtrAdd { ptr, offset } => {
                format!("ptradd {}, {}", self.value(ptr), self.value(offset))
            }
            InstKind::Cast { op, value, ty } => {
                format!("{} {} to {ty}", op.mnemonic(), self.value(value))
            }
            InstKind::Call { callee, args, ret } => {
                let args: Vec<String> = args.iter().map(|arg| self.value(arg)).collect();
                format!("call {ret} @{callee}({})", args.join(", "))
            }
            InstKind::Phi { ty, incoming } => {
                let incoming: Vec<String> = incoming
                    .iter()
                    .map(|(value, pred)| format!("[ {}, {} ]", self.value(value), self.block(*pred)))
                    .collect();
                format!("phi {ty} {}", incoming.join(", "))
            }
            InstKind::Br { target } => format!("br label {}", self.block(*target)),
            InstKind::CondBr {
                cond,
                then_block,
                else_block,
            } => format!(
                "br {}, label {}, label {}",
                self.value(cond),
                self.block(*then_block),
                self.block(*else_block)
            ),
            InstKind::Ret { value: None } => "ret void".to_string(),
            InstKind::Ret { value: Some(value) } => format!("ret {}", self.value(value)),
            InstKind::Unreachable => "unreachable".to_string(),
        };

        if kind.result_type().is_void() {
            body
        } else {
            format!("%{} = {body}", id.index())
        }
    }

    fn signature(&self) -> String {
        let params: Vec<String> = self
            .func
            .params()
            .iter()
            .enumerate()
            .map(|(index, ty)| format!("{ty} %arg{index}"))
            .collect();
        format!("{} @{}({})", self.func.ret(), self.func.name(), params.join(", "))
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.func.is_declaration() {
            return writeln!(f, "declare {}", self.signature());
        }
        writeln!(f, "define {} {{", self.signature())?;
        for block in self.func.blocks() {
            writeln!(f, "{}:", self.func.block_name(block))?;
            for &inst in self.func.block_insts(block) {
                writeln!(f, "  {}", self.inst(inst))?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let linkage = if self.constant { "constant" } else { "global" };
        match &self.init {
            Some(init) => write!(f, "@{} = {linkage} {} {init}", self.name, self.ty),
            None => write!(f, "@{} = external {linkage} {}", self.name, self.ty),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = Vec::new();

        let mut globals = String::new();
        for (_, global) in self.globals() {
            writeln!(globals, "{global}")?;
        }
        if !globals.is_empty() {
            sections.push(globals);
        }

        for (_, func) in self.functions() {
            sections.push(func.display(Some(self)).to_string());
        }

        f.write_str(&sections.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{
        builder::FunctionBuilder, BinaryOp, Constant, Function, Global, IntPredicate, Module,
        Type, Value,
    };

    #[test]
    fn test_print_function() {
        let mut func = Function::new("abs", vec![Type::I32], Type::I32);
        let mut builder = FunctionBuilder::new(&mut func);
        let entry = builder.current_block();
        let negate = builder.create_block("negate");
        let done = builder.create_block("done");
        let is_neg = builder.icmp(IntPredicate::Slt, Value::Param(0), Value::i32(0));
        builder.cond_br(is_neg, negate, done);
        builder.switch_to(negate);
        let neg = builder.binary(BinaryOp::Sub, Type::I32, Value::i32(0), Value::Param(0));
        builder.br(done);
        builder.switch_to(done);
        let result = builder.phi(Type::I32, vec![(Value::Param(0), entry), (neg, negate)]);
        builder.ret(Some(result));

        assert_eq!(
            func.to_string(),
            indoc! {"
                define i32 @abs(i32 %arg0) {
                entry:
                  %0 = icmp slt %arg0, 0
                  br %0, label %negate, label %done
                negate:
                  %2 = sub i32 0, %arg0
                  br label %done
                done:
                  %4 = phi i32 [ %arg0, %entry ], [ %2, %negate ]
                  ret %4
                }
            "}
        );
    }

    #[test]
    fn test_print_module() {
        let mut module = Module::new("m");
        let counter = module.add_global(Global::new("counter", Type::I32, Constant::int(32, 7)));
        module.add_global(Global::new("mode", Type::I32, Constant::int(32, 2)).constant());
        module.declare_function("malloc", vec![Type::I64], Type::Ptr);

        let mut main = Function::new("main", vec![], Type::Void);
        let mut builder = FunctionBuilder::new(&mut main);
        builder.store(Value::i32(1), Value::Global(counter));
        builder.call("malloc", vec![Value::i64(16)], Type::Ptr);
        builder.ret(None);
        module.add_function(main);

        assert_eq!(
            module.to_string(),
            indoc! {"
                @counter = global i32 7
                @mode = constant i32 2

                declare ptr @malloc(i64 %arg0)

                define void @main() {
                entry:
                  store 1, @counter
                  %1 = call ptr @malloc(16)
                  ret void
                }
            "}
        );
    }
}
