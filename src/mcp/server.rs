// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use tracing::debug;

use crate::cache::{CatalogueQuery, Page};
use crate::exec::{ExecutionRequest, ExecutionResult, DEFAULT_MAX_DIFF_NODES, DEFAULT_TIMEOUT};
use crate::houdini::{ChangeReport, Houdini, HoudiniError};
use crate::host::ConnectionInfo;
use crate::model::{NodeTypeEntry, SceneDiff};

use super::types::*;

const DEFAULT_PAGE_LIMIT: usize = 100;
const MAX_PAGE_LIMIT: usize = 1_000;

#[derive(Clone)]
pub struct HoudiniMcp {
    houdini: Arc<Houdini>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl HoudiniMcp {
    pub fn new(houdini: Houdini) -> Self {
        Self::new_shared(Arc::new(houdini))
    }

    /// Server over a context shared with other servers (one per HTTP session).
    pub fn new_shared(houdini: Arc<Houdini>) -> Self {
        Self { houdini, tool_router: Self::tool_router() }
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Runs a core call on the blocking pool; every core call may block on the host.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ErrorData>
    where
        F: FnOnce(&Houdini) -> T + Send + 'static,
        T: Send + 'static,
    {
        let houdini = Arc::clone(&self.houdini);
        tokio::task::spawn_blocking(move || f(&houdini)).await.map_err(|err| {
            ErrorData::internal_error(format!("blocking task failed: {err}"), None)
        })
    }

    /// Report whether Houdini is reachable, with its version and current scene file; never fails.
    #[tool(name = "connection.status")]
    async fn connection_status(&self) -> Result<Json<ConnectionInfo>, ErrorData> {
        let info = self.blocking(|houdini| houdini.connection_info()).await?;
        Ok(Json(info))
    }

    /// Execute Python inside Houdini (`hou` in scope). Dangerous code is blocked unless
    /// `allow_dangerous` is set; set `capture_diff` to get the scene changes under the default root.
    #[tool(name = "code.execute")]
    async fn code_execute(
        &self,
        params: Parameters<ExecuteParams>,
    ) -> Result<Json<ExecutionResult>, ErrorData> {
        let request = execution_request(params.0)?;
        debug!(
            bytes = request.code.len(),
            capture_diff = request.capture_diff,
            timeout_ms = request.timeout.as_millis() as u64,
            "code.execute"
        );
        let result = self.blocking(move |houdini| houdini.execute(&request)).await?;
        Ok(Json(result))
    }

    /// Snapshot the node tree under `root` (default root when omitted); it becomes the baseline
    /// for `scene.changes`.
    #[tool(name = "scene.snapshot")]
    async fn scene_snapshot(
        &self,
        params: Parameters<RootParams>,
    ) -> Result<Json<SnapshotResponse>, ErrorData> {
        let root = parse_root(params.0.root)?;
        let snapshot = self
            .blocking(move |houdini| houdini.snapshot(root.as_deref()))
            .await?
            .map_err(map_houdini_error)?;
        Ok(Json(SnapshotResponse {
            root: snapshot.root.clone(),
            node_count: snapshot.node_count() as u64,
            snapshot,
        }))
    }

    /// Diff the scene under `root` against its baseline, then advance the baseline. The first
    /// call for a root only records the baseline.
    #[tool(name = "scene.changes")]
    async fn scene_changes(
        &self,
        params: Parameters<RootParams>,
    ) -> Result<Json<ChangeReport>, ErrorData> {
        let root = parse_root(params.0.root)?;
        let report = self
            .blocking(move |houdini| houdini.changes(root.as_deref()))
            .await?
            .map_err(map_houdini_error)?;
        Ok(Json(report))
    }

    /// Diff two snapshots previously returned by `scene.snapshot`; does not touch Houdini.
    #[tool(name = "scene.diff")]
    async fn scene_diff(&self, params: Parameters<DiffParams>) -> Result<Json<SceneDiff>, ErrorData> {
        let DiffParams { before, after } = params.0;
        Ok(Json(Houdini::diff(&before, &after)))
    }

    /// Diff captured by the most recent `code.execute` with `capture_diff`.
    #[tool(name = "scene.last_diff")]
    async fn scene_last_diff(&self) -> Result<Json<LastDiffResponse>, ErrorData> {
        let diff = self.houdini.last_diff();
        Ok(Json(LastDiffResponse { diff }))
    }

    /// Load a `.hip` file; drops caches and scene baselines.
    #[tool(name = "scene.load")]
    async fn scene_load(
        &self,
        params: Parameters<LoadSceneParams>,
    ) -> Result<Json<ConnectionInfo>, ErrorData> {
        let path = params.0.path.trim().to_owned();
        if path.is_empty() {
            return Err(ErrorData::invalid_params("path must not be empty", None));
        }
        let info = self
            .blocking(move |houdini| houdini.load_scene(&path))
            .await?
            .map_err(map_houdini_error)?;
        Ok(Json(info))
    }

    /// Start an empty scene; drops caches and scene baselines.
    #[tool(name = "scene.new")]
    async fn scene_new(&self) -> Result<Json<ConnectionInfo>, ErrorData> {
        let info =
            self.blocking(|houdini| houdini.new_scene()).await?.map_err(map_houdini_error)?;
        Ok(Json(info))
    }

    /// Read the parameters of one node as JSON values.
    #[tool(name = "node.parameters")]
    async fn node_parameters(
        &self,
        params: Parameters<NodePathParams>,
    ) -> Result<Json<NodeParametersResponse>, ErrorData> {
        let path = parse_node_path(params.0.path)?;
        let lookup = path.clone();
        let parameters = self
            .blocking(move |houdini| houdini.node_parameters(&lookup))
            .await?
            .map_err(map_houdini_error)?;
        Ok(Json(NodeParametersResponse { path, parameters }))
    }

    /// List node types from the cached catalogue, filtered by category and name, paginated.
    #[tool(name = "node_types.list")]
    async fn node_types_list(
        &self,
        params: Parameters<NodeTypesParams>,
    ) -> Result<Json<Page<NodeTypeEntry>>, ErrorData> {
        let query = catalogue_query(params.0);
        let page = self
            .blocking(move |houdini| houdini.node_types(&query))
            .await?
            .map_err(map_houdini_error)?;
        Ok(Json(page))
    }

    /// Hit/miss counters and freshness of every cache.
    #[tool(name = "cache.stats")]
    async fn cache_stats(&self) -> Result<Json<CacheStatsResponse>, ErrorData> {
        let caches = self.blocking(|houdini| houdini.cache_stats()).await?;
        Ok(Json(CacheStatsResponse { caches }))
    }

    /// Drop every cache; the next read repopulates from Houdini.
    #[tool(name = "cache.invalidate")]
    async fn cache_invalidate(&self) -> Result<Json<CacheInvalidateResponse>, ErrorData> {
        let invalidated = self
            .blocking(|houdini| {
                houdini.invalidate_caches();
                houdini.cache_stats().into_iter().map(|stats| stats.name).collect::<Vec<_>>()
            })
            .await?;
        Ok(Json(CacheInvalidateResponse { invalidated }))
    }
}

#[tool_handler]
impl ServerHandler for HoudiniMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Houdini bridge server (tools: connection.status, code.execute, scene.snapshot, scene.changes, scene.diff, scene.last_diff, scene.load, scene.new, node.parameters, node_types.list, cache.stats, cache.invalidate)"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Parameter validation and error mapping for MCP tool handlers.
include!("server/helpers.rs");

#[cfg(test)]
mod e2e;
