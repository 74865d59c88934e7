// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SSA control flow graph for instrumentation passes
//!
//! This crate provides:
//! - **An in-memory IR**: modules, globals, functions, basic blocks and
//!   instructions, with terminators stored as ordinary trailing instructions
//! - **Stable references**: instructions and blocks live in per-function
//!   arenas, so an [`InstId`] collected before an edit still resolves after it
//! - **The editing capability** [`CfgEditor`] that passes are written against
//! - **Verification** of block shape and phi/predecessor agreement
//! - **A reference interpreter** that runs a module, forwarding calls to
//!   undefined functions to a [`Host`]
//!
//! # Modules
//!
//! - [`function`], [`module`]: IR containers
//! - [`inst`], [`value`], [`types`]: instruction set and operands
//! - [`builder`]: front-end style construction
//! - [`editor`]: block splitting and instruction insertion
//! - [`block_graph`]: petgraph view of the block successor relation
//! - [`verify`]: structural checks
//! - [`interp`], [`memory`]: execution

pub mod block_graph;
pub mod builder;
pub mod display;
pub mod editor;
pub mod error;
pub mod function;
pub mod inst;
pub mod interp;
pub mod memory;
pub mod module;
pub mod types;
pub mod value;
pub mod verify;

pub use block_graph::BlockGraph;
pub use builder::FunctionBuilder;
pub use editor::CfgEditor;
pub use error::{ExecError, ExecResult, VerifyError};
pub use function::Function;
pub use inst::{BinaryOp, CastOp, FloatPredicate, InstKind, IntPredicate};
pub use interp::{call_libc, Host, HostCall, Interpreter, LibcHost, Outcome};
pub use memory::Memory;
pub use module::{Global, Module};
pub use types::Type;
pub use value::{BlockId, Constant, FuncId, GlobalId, InstId, Value};
pub use verify::{verify_function, verify_module};
