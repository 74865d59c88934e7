// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for instrumentation.

use cfg::{InstId, VerifyError};
use runtime::ModeParseError;
use thiserror::Error;

/// Errors that can occur during instrumentation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentError {
    /// The module already carries the mode marker of an earlier run.
    #[error("module '{0}' is already instrumented")]
    AlreadyInstrumented(String),

    #[error(transparent)]
    UnknownMode(#[from] ModeParseError),

    /// A collected instruction no longer has the shape it was collected for.
    #[error("function '{function}': {inst:?} is no longer a {expected}")]
    StaleReference {
        function: String,
        inst: InstId,
        expected: &'static str,
    },

    #[error("instrumented code fails verification: {0}")]
    Verify(#[from] VerifyError),
}

pub type InstrumentResult<T> = Result<T, InstrumentError>;
