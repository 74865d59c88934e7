// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Build-time mode selection
//!
//! The mode a runtime starts in is taken from the `TOLERATOR_MODE`
//! environment variable when the runtime crate is compiled. Any spelling
//! accepted by [`AnalysisMode::from_str_loose`] works; an unset or unknown
//! value selects [`AnalysisMode::Strict`]. The value is resolved once and
//! never changes afterwards.
//!
//! This is only the fallback. An instrumented module records its own mode
//! and hands it to the runtime through `__tolerator_init_mode`, which takes
//! precedence.

use std::sync::OnceLock;

use tracing::warn;

use crate::policy::AnalysisMode;

pub const MODE_ENV: &str = "TOLERATOR_MODE";

static CONFIGURED_MODE: OnceLock<AnalysisMode> = OnceLock::new();

/// Mode compiled into this build of the runtime.
pub fn configured_mode() -> AnalysisMode {
    *CONFIGURED_MODE.get_or_init(|| resolve_mode(option_env!("TOLERATOR_MODE")))
}

fn resolve_mode(raw: Option<&str>) -> AnalysisMode {
    let Some(raw) = raw else {
        return AnalysisMode::default();
    };
    AnalysisMode::from_str_loose(raw).unwrap_or_else(|| {
        warn!(value = raw, "unknown {MODE_ENV}, falling back to strict");
        AnalysisMode::default()
    })
}
