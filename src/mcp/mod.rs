// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Model Context Protocol (MCP) server surface.
//!
//! Thin wrappers exposing the [`crate::houdini::Houdini`] context as tools: execution, scene
//! snapshots and diffs, node type lookup and cache control.

mod server;
mod types;

pub use server::HoudiniMcp;
