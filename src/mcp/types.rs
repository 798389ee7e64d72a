// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::houdini::ParameterValue;
use crate::model::{SceneDiff, SceneSnapshot};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    /// Script evaluated inside Houdini with `hou` in scope.
    pub code: String,
    /// Run even when the hazard scan matches.
    pub allow_dangerous: Option<bool>,
    /// Wall-clock budget in seconds (default 30).
    pub timeout_seconds: Option<f64>,
    /// Snapshot the default root before and after, and report the diff.
    pub capture_diff: Option<bool>,
    pub max_stdout_bytes: Option<usize>,
    pub max_stderr_bytes: Option<usize>,
    /// Cap on reported added nodes (default 1000).
    pub max_diff_nodes: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RootParams {
    /// Absolute node path; defaults to the configured root (usually `/obj`).
    pub root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotResponse {
    pub root: String,
    pub node_count: u64,
    pub snapshot: SceneSnapshot,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DiffParams {
    pub before: SceneSnapshot,
    pub after: SceneSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LastDiffResponse {
    /// Absent until an execution with `capture_diff` has run.
    pub diff: Option<SceneDiff>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadSceneParams {
    /// Path of the `.hip` file on the Houdini host.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NodePathParams {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NodeParametersResponse {
    pub path: String,
    pub parameters: Vec<ParameterValue>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NodeTypesParams {
    /// Exact category, case-insensitive (`Sop`, `Object`, `Driver`, ...).
    pub category: Option<String>,
    /// Case-insensitive substring of the type name.
    pub name_filter: Option<String>,
    /// Page size (default 100, at most 1000).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheStatsResponse {
    pub caches: Vec<CacheStats>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheInvalidateResponse {
    pub invalidated: Vec<String>,
}
