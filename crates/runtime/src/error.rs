// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the runtime crate

use thiserror::Error;

/// A mode name that matches none of the known spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "unknown analysis mode '{0}' (expected strict, semi-strict, default-substitute or abort-function)"
)]
pub struct ModeParseError(pub String);
