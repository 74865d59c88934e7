// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Failure-tolerance instrumentation for the cfg IR
//!
//! This crate provides tools to:
//! - Classify the instructions of a module that may fault at run time
//! - Declare the runtime's hook functions in the module
//! - Rewrite each risky instruction into a guarded diamond that consults the
//!   runtime's shadow memory before executing it
//! - Record the analysis mode the instrumented program runs under
//!
//! The rewritten module stays valid IR: it passes [`cfg::verify_module`] and
//! links against the `runtime` crate's `__tolerator_*` symbols.

pub mod classify;
pub mod config;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod instrument;

pub use classify::{classify, FunctionSites, SiteCounts, Targets};
pub use config::{InstrumentConfig, DEFAULT_ENTRY_POINT, ENTRY_ENV};
pub use error::{InstrumentError, InstrumentResult};
pub use guard::{guard_division, guard_free, guard_load, guard_store, CfgEditorName, Diamond};
pub use hooks::{declare_hooks, recorded_mode, EMITTED_HOOKS};
pub use instrument::{instrument, InstrumentStats};
