// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation settings
//!
//! Settings can be built in code or read from the environment:
//! - `TOLERATOR_MODE`: the [`AnalysisMode`] recorded in the module. Unlike the
//!   runtime, an unknown name is an error here.
//! - `TOLERATOR_ENTRY`: the function that registers globals (default `main`).

use runtime::{AnalysisMode, MODE_ENV};

use crate::error::InstrumentResult;

pub const ENTRY_ENV: &str = "TOLERATOR_ENTRY";
pub const DEFAULT_ENTRY_POINT: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentConfig {
    pub mode: AnalysisMode,
    /// Function whose entry registers every global. When the module has no
    /// function of this name, the first defined function is used.
    pub entry_point: String,
    /// Callees treated as heap allocation; the first argument is the size.
    pub allocators: Vec<String>,
    /// Callees treated as heap release; the first argument is the pointer.
    pub deallocators: Vec<String>,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            allocators: vec!["malloc".to_string()],
            deallocators: vec!["free".to_string()],
        }
    }
}

impl InstrumentConfig {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn from_env() -> InstrumentResult<Self> {
        Self::from_vars(
            std::env::var(MODE_ENV).ok().as_deref(),
            std::env::var(ENTRY_ENV).ok().as_deref(),
        )
    }

    fn from_vars(mode: Option<&str>, entry: Option<&str>) -> InstrumentResult<Self> {
        let mut config = Self::default();
        if let Some(mode) = mode {
            config.mode = mode.parse()?;
        }
        if let Some(entry) = entry.filter(|entry| !entry.is_empty()) {
            config.entry_point = entry.to_string();
        }
        Ok(config)
    }

    pub fn is_allocator(&self, callee: &str) -> bool {
        self.allocators.iter().any(|name| name == callee)
    }

    pub fn is_deallocator(&self, callee: &str) -> bool {
        self.deallocators.iter().any(|name| name == callee)
    }
}
