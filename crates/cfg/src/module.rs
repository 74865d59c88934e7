// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Whole-program container

use crate::{
    function::Function,
    types::Type,
    value::{Constant, FuncId, GlobalId},
};

/// Prefix reserved for compiler intrinsics; such globals are never user data.
pub const INTRINSIC_PREFIX: &str = "llvm.";

#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    /// `None` for an external declaration defined in another unit.
    pub init: Option<Constant>,
    pub constant: bool,
}

impl Global {
    pub fn new(name: impl Into<String>, ty: Type, init: Constant) -> Self {
        Self {
            name: name.into(),
            ty,
            init: Some(init),
            constant: false,
        }
    }

    pub fn external(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            init: None,
            constant: false,
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn is_declaration(&self) -> bool {
        self.init.is_none()
    }

    pub fn is_intrinsic(&self) -> bool {
        self.name.starts_with(INTRINSIC_PREFIX)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    globals: Vec<Global>,
    functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        let id = GlobalId::new(self.globals.len());
        self.globals.push(global);
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|global| global.name == name)
            .map(GlobalId::new)
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(index, global)| (GlobalId::new(index), global))
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId::new(self.functions.len());
        self.functions.push(function);
        id
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|function| function.name() == name)
            .map(FuncId::new)
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(index, function)| (FuncId::new(index), function))
    }

    /// Returns the function named `name`, adding a declaration with the
    /// given signature if the module does not know it yet.
    pub fn declare_function(&mut self, name: &str, params: Vec<Type>, ret: Type) -> FuncId {
        match self.function_by_name(name) {
            Some(id) => id,
            None => self.add_function(Function::new(name, params, ret)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Global, Module};
    use crate::{Constant, Function, Type};

    #[test]
    fn test_declare_function_is_get_or_insert() {
        let mut module = Module::new("m");
        let first = module.declare_function("malloc", vec![Type::I64], Type::Ptr);
        let second = module.declare_function("malloc", vec![Type::I64], Type::Ptr);
        assert_eq!(first, second);
        assert_eq!(module.functions().count(), 1);
        assert!(module.function(first).is_declaration());
    }

    #[test]
    fn test_global_classification() {
        let defined = Global::new("counter", Type::I32, Constant::int(32, 0));
        let external = Global::external("errno", Type::I32);
        let intrinsic = Global::new("llvm.used", Type::Ptr, Constant::Null);

        assert!(!defined.is_declaration());
        assert!(external.is_declaration());
        assert!(intrinsic.is_intrinsic());
        assert!(!defined.is_intrinsic());
    }

    #[test]
    fn test_lookup_by_name() {
        let mut module = Module::new("m");
        let g = module.add_global(Global::new("g", Type::I64, Constant::int(64, 1)).constant());
        let f = module.add_function(Function::new("f", vec![], Type::Void));
        assert_eq!(module.global_by_name("g"), Some(g));
        assert_eq!(module.function_by_name("f"), Some(f));
        assert!(module.global(g).constant);
        assert_eq!(module.global_by_name("missing"), None);
    }
}
