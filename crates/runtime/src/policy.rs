// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fault policy oracle
//!
//! A detected fault is turned into a [`FaultAction`] by one table lookup on
//! the active [`AnalysisMode`]:
//!
//! | Mode              | divide / read          | write / free |
//! |-------------------|------------------------|--------------|
//! | Strict            | terminate              | terminate    |
//! | SemiStrict        | terminate              | skip         |
//! | DefaultSubstitute | substitute zero        | skip         |
//! | AbortFunction     | abort function         | abort function |
//!
//! The predicates the instrumented code branches on are projections of the
//! same table.

use std::{fmt, str::FromStr};

use crate::error::ModeParseError;

/// Exit status used when a fault terminates the program.
pub const TERMINATION_STATUS: i32 = -1;

/// Process-wide response to detected faults.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AnalysisMode {
    /// Every fault terminates the program.
    #[default]
    Strict = 0,
    /// Bad reads and divisions terminate; bad writes and frees are skipped.
    SemiStrict = 1,
    /// Bad reads and divisions yield zero; bad writes and frees are skipped.
    DefaultSubstitute = 2,
    /// The faulting function returns its zero or void default at once.
    AbortFunction = 3,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 4] = [
        AnalysisMode::Strict,
        AnalysisMode::SemiStrict,
        AnalysisMode::DefaultSubstitute,
        AnalysisMode::AbortFunction,
    ];

    /// Integer encoding stored in instrumented modules.
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            AnalysisMode::Strict => "strict",
            AnalysisMode::SemiStrict => "semi-strict",
            AnalysisMode::DefaultSubstitute => "default-substitute",
            AnalysisMode::AbortFunction => "abort-function",
        }
    }

    /// Parses a mode name (case-insensitive), its older alias, or its code.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "logging" | "0" => Some(AnalysisMode::Strict),
            "semi-strict" | "semistrict" | "ignoring" | "1" => Some(AnalysisMode::SemiStrict),
            "default" | "default-substitute" | "defaulting" | "2" => {
                Some(AnalysisMode::DefaultSubstitute)
            }
            "abort-function" | "bypassing" | "3" => Some(AnalysisMode::AbortFunction),
            _ => None,
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| ModeParseError(s.to_string()))
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of a detected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FaultKind {
    DivideByZero = 0,
    InvalidRead = 1,
    InvalidWrite = 2,
    InvalidFree = 3,
}

impl FaultKind {
    pub const ALL: [FaultKind; 4] = [
        FaultKind::DivideByZero,
        FaultKind::InvalidRead,
        FaultKind::InvalidWrite,
        FaultKind::InvalidFree,
    ];

    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Diagnostic line printed when the fault is reported.
    pub const fn message(self) -> &'static str {
        match self {
            FaultKind::DivideByZero => "FOUND: Division by zero",
            FaultKind::InvalidRead => "FOUND: Invalid read from memory",
            FaultKind::InvalidWrite => "FOUND: Invalid write to memory",
            FaultKind::InvalidFree => "FOUND: Invalid free of memory",
        }
    }

    /// Faults on operations that produce a value the program goes on to use.
    pub const fn produces_value(self) -> bool {
        matches!(self, FaultKind::DivideByZero | FaultKind::InvalidRead)
    }
}

/// What the program does after a fault has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultAction {
    Terminate { status: i32 },
    /// Continue without performing the faulting operation.
    Skip,
    /// Continue with the zero value in place of the operation's result.
    Substitute,
    /// Return the zero or void default from the enclosing function.
    AbortFunction,
}

impl FaultAction {
    /// Encoding returned by the `dispatch_fault` hook.
    pub const fn code(self) -> i32 {
        match self {
            FaultAction::Skip => 0,
            FaultAction::Substitute => 1,
            FaultAction::AbortFunction => 2,
            FaultAction::Terminate { .. } => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(FaultAction::Skip),
            1 => Some(FaultAction::Substitute),
            2 => Some(FaultAction::AbortFunction),
            3 => Some(FaultAction::Terminate {
                status: TERMINATION_STATUS,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    mode: AnalysisMode,
}

impl FaultPolicy {
    pub fn new(mode: AnalysisMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn dispatch(&self, kind: FaultKind) -> FaultAction {
        let terminate = FaultAction::Terminate {
            status: TERMINATION_STATUS,
        };
        match (self.mode, kind.produces_value()) {
            (AnalysisMode::Strict, _) => terminate,
            (AnalysisMode::SemiStrict, true) => terminate,
            (AnalysisMode::SemiStrict, false) => FaultAction::Skip,
            (AnalysisMode::DefaultSubstitute, true) => FaultAction::Substitute,
            (AnalysisMode::DefaultSubstitute, false) => FaultAction::Skip,
            (AnalysisMode::AbortFunction, _) => FaultAction::AbortFunction,
        }
    }

    /// Whether reporting `kind` ends the program.
    pub fn escalates(&self, kind: FaultKind) -> bool {
        matches!(self.dispatch(kind), FaultAction::Terminate { .. })
    }

    pub fn should_abort_function(&self) -> bool {
        FaultKind::ALL
            .into_iter()
            .any(|kind| self.dispatch(kind) == FaultAction::AbortFunction)
    }

    pub fn should_default_value(&self) -> bool {
        FaultKind::ALL
            .into_iter()
            .any(|kind| self.dispatch(kind) == FaultAction::Substitute)
    }
}
