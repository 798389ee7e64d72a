// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Process configuration: defaults, overridden by environment, overridden by CLI flags.

use std::env;
use std::time::Duration;

use crate::host::RetryPolicy;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 18811;
pub const DEFAULT_ROOT: &str = "/obj";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid { key: &'static str, expected: &'static str, value: String },
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Connection attempts per connect.
    pub max_retries: u32,
    /// First backoff pause; doubles per failed attempt.
    pub retry_delay: Duration,
    /// Bound on every host call except script execution.
    pub call_timeout: Duration,
    pub connect_timeout: Duration,
    /// Root used for execution diffs and as the default snapshot root.
    pub default_root: String,
    /// Zero keeps the node type catalogue until it is invalidated.
    pub node_type_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            default_root: DEFAULT_ROOT.to_owned(),
            node_type_ttl: Duration::ZERO,
        }
    }
}

impl Config {
    /// Defaults overridden by `HOUDINI_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOUDINI_HOST") {
            config.host = non_empty("HOUDINI_HOST", host)?;
        }
        if let Some(raw) = lookup("HOUDINI_PORT") {
            config.port = parse("HOUDINI_PORT", "a port number", raw)?;
        }
        if let Some(raw) = lookup("HOUDINI_MAX_RETRIES") {
            config.max_retries = parse("HOUDINI_MAX_RETRIES", "a non-negative integer", raw)?;
        }
        if let Some(raw) = lookup("HOUDINI_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(parse(
                "HOUDINI_RETRY_DELAY_MS",
                "a duration in milliseconds",
                raw,
            )?);
        }
        if let Some(raw) = lookup("HOUDINI_CALL_TIMEOUT_SECS") {
            const EXPECTED: &str = "a positive duration in seconds";
            let secs: u64 = parse("HOUDINI_CALL_TIMEOUT_SECS", EXPECTED, raw.clone())?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "HOUDINI_CALL_TIMEOUT_SECS",
                    expected: EXPECTED,
                    value: raw,
                });
            }
            config.call_timeout = Duration::from_secs(secs);
        }
        if let Some(root) = lookup("HOUDINI_ROOT") {
            let root = non_empty("HOUDINI_ROOT", root)?;
            if !root.starts_with('/') {
                return Err(ConfigError::Invalid {
                    key: "HOUDINI_ROOT",
                    expected: "an absolute node path",
                    value: root,
                });
            }
            config.default_root = root;
        }

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_retries: self.max_retries, base_delay: self.retry_delay }
    }
}

fn non_empty(key: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { key });
    }
    Ok(trimmed.to_owned())
}

fn parse<T: std::str::FromStr>(
    key: &'static str,
    expected: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid { key, expected, value })
}
