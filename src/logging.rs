// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Structured logging to stderr.
//!
//! stdout carries the stdio MCP transport, so log lines must never go there. The filter comes from
//! `RUST_LOG`, else `LOG_LEVEL`, else `info`.

use std::env;
use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter directive from the two environment sources, most specific first.
///
/// `RUST_LOG` is passed through as written; only the bare `LOG_LEVEL` is lowercased.
pub fn filter_directive(rust_log: Option<&str>, log_level: Option<&str>) -> String {
    let non_blank: for<'a> fn(Option<&'a str>) -> Option<&'a str> = |value| value.map(str::trim).filter(|value| !value.is_empty());
    match (non_blank(rust_log), non_blank(log_level)) {
        (Some(directive), _) => directive.to_owned(),
        (None, Some(level)) => level.to_lowercase(),
        (None, None) => DEFAULT_DIRECTIVE.to_owned(),
    }
}

fn env_filter() -> EnvFilter {
    let rust_log = env::var("RUST_LOG").ok();
    let log_level = env::var("LOG_LEVEL").ok();
    let directive = filter_directive(rust_log.as_deref(), log_level.as_deref());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging() -> Result<(), TryInitError> {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(true);
    tracing_subscriber::registry().with(env_filter()).with(layer).try_init()
}
