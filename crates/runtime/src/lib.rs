// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shadow-memory runtime for guarded-access instrumentation
//!
//! This crate is linked into programs rewritten by the instrumenter. The
//! rewritten code calls into it to record which address ranges are valid and
//! to decide what happens when a guarded operation would fault.
//!
//! # Overview
//!
//! The runtime handles:
//! - Tracking heap allocations, globals and per-call stack locals
//! - Answering validity queries for loads, stores and frees
//! - Reporting faults and applying the configured [`AnalysisMode`]
//!
//! # Architecture
//!
//! ```text
//! extern "C" __tolerator_* (abi)
//!      ↓ thread-local
//! Runtime ── FaultPolicy (mode → action)
//!      ↓
//! ShadowMemory: heap table, global table, ScopeStack
//! ```
//!
//! # Protocol
//!
//! The instrumenter emits, around each risky operation:
//!
//! ```text
//! %ok = call i1 @__tolerator_is_valid(%ptr)
//! br %ok, label %doread, label %invalidread
//! invalidread:
//!   call void @__tolerator_report_invalid_read()   ; may exit(-1)
//!   %abort = call i1 @__tolerator_should_abort_function()
//!   ...
//! ```
//!
//! [`Hook`] lists every entry point with its symbol and signature.
//!
//! # Configuration
//!
//! An instrumented module records the mode it was built for in
//! [`MODE_GLOBAL`], and its entry function passes that value to
//! [`Hook::InitMode`] before any other hook runs. Until then, and for code
//! that never calls it, the runtime uses the mode compiled in from the
//! `TOLERATOR_MODE` environment variable (see [`configured_mode`]).
//! [`Runtime::new`] takes the mode explicitly so tests can run every mode in
//! one process.

mod abi;
mod config;
mod error;
mod policy;
mod protocol;
mod scope;
mod shadow;
mod state;

pub use config::{configured_mode, MODE_ENV};
pub use error::ModeParseError;
pub use policy::{AnalysisMode, FaultAction, FaultKind, FaultPolicy, TERMINATION_STATUS};
pub use protocol::{AbiType, Hook, MODE_GLOBAL, SYMBOL_PREFIX};
pub use scope::ScopeStack;
pub use shadow::{MemoryRange, RangeTable, ShadowMemory};
pub use state::{HookResult, Runtime, UNKNOWN_FAULT};
