// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Houdini MCP: sandboxed script execution and scene diffs against a live Houdini session.
//!
//! The core is synchronous: [`host`] owns the session and wire protocol, [`snapshot`] and [`exec`]
//! build on it, and [`houdini::Houdini`] ties them together with the caches. [`mcp`] is the async
//! tool surface on top.

pub mod cache;
pub mod config;
pub mod exec;
pub mod hazard;
pub mod host;
pub mod houdini;
pub mod logging;
pub mod mcp;
pub mod model;
pub mod snapshot;

pub use config::Config;
pub use houdini::{Houdini, HoudiniError};
