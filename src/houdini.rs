// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The process context: one session, its caches and the scene bookkeeping built on top.
//!
//! Every core operation goes through [`Houdini`]. It is constructed once from a [`Transport`] and a
//! [`Config`], so tests and `--demo` swap in [`crate::host::memory::MemoryHost`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cache::node_types::populate_node_types;
use crate::cache::{filter_page, CacheRegistry, CacheStats, CatalogueQuery, Page, TtlCache};
use crate::config::Config;
use crate::exec::{self, ExecutionRequest, ExecutionResult};
use crate::host::wire::LineTransport;
use crate::host::{ConnectionInfo, HostConnection, RemoteSession, Transport, TransportError};
use crate::model::{NodeTypeEntry, SceneDiff, SceneSnapshot};
use crate::snapshot;

#[derive(Debug, thiserror::Error)]
pub enum HoudiniError {
    /// The channel failed; the session was reset and the next call reconnects.
    #[error("lost connection to Houdini during {operation}: {message}")]
    ConnectionLost { operation: &'static str, message: String },
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("Houdini rejected {operation}: {message}")]
    Host { operation: &'static str, message: String },
}

impl HoudiniError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }

    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::ConnectionLost { operation, .. } | Self::Host { operation, .. } => Some(*operation),
            Self::NodeNotFound(_) => None,
        }
    }
}

/// Result of diffing the scene against the stored baseline of a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ChangeReport {
    pub root: String,
    /// `None` when no baseline existed; the current scene became the baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<SceneDiff>,
    pub node_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ParameterValue {
    pub name: String,
    pub value: Value,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Houdini {
    session: RemoteSession,
    default_root: String,
    node_types: Arc<TtlCache<NodeTypeEntry>>,
    caches: CacheRegistry,
    last_diff: Mutex<Option<SceneDiff>>,
    baselines: Mutex<BTreeMap<String, SceneSnapshot>>,
}

impl std::fmt::Debug for Houdini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Houdini")
            .field("session", &self.session)
            .field("default_root", &self.default_root)
            .finish_non_exhaustive()
    }
}

impl Houdini {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        let session =
            RemoteSession::new(transport, config.host.clone(), config.port, config.retry_policy());
        let node_types = Arc::new(TtlCache::new("node_types", config.node_type_ttl));
        let mut caches = CacheRegistry::default();
        caches.register(node_types.clone());
        Self {
            session,
            default_root: config.default_root.clone(),
            node_types,
            caches,
            last_diff: Mutex::new(None),
            baselines: Mutex::new(BTreeMap::new()),
        }
    }

    /// Context talking to a real host over TCP.
    pub fn connect_tcp(config: &Config) -> Self {
        let transport = LineTransport {
            connect_timeout: config.connect_timeout,
            call_timeout: config.call_timeout,
        };
        Self::new(Arc::new(transport), config)
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.session.info()
    }

    /// Runs `f` on a live connection, turning transport faults into [`HoudiniError`]s.
    fn with_session<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Arc<dyn HostConnection>) -> Result<T, TransportError>,
    ) -> Result<T, HoudiniError> {
        let conn = self
            .session
            .ensure_live()
            .map_err(|err| HoudiniError::ConnectionLost { operation, message: err.to_string() })?;
        f(&conn).map_err(|err| {
            if self.session.report_fault(&conn, &err) {
                HoudiniError::ConnectionLost { operation, message: err.to_string() }
            } else {
                HoudiniError::Host { operation, message: err.to_string() }
            }
        })
    }

    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let result = exec::execute(&self.session, &self.default_root, request);
        if let Some(diff) = &result.diff {
            *lock(&self.last_diff) = Some(diff.clone());
        }
        result
    }

    /// Diff of the most recent execution that captured one.
    pub fn last_diff(&self) -> Option<SceneDiff> {
        lock(&self.last_diff).clone()
    }

    fn capture(&self, root: &str) -> Result<SceneSnapshot, HoudiniError> {
        self.with_session("snapshot", |conn| snapshot::snapshot(conn.as_ref(), root))
    }

    /// Snapshot of `root` (default root when `None`); it becomes the baseline for that root.
    pub fn snapshot(&self, root: Option<&str>) -> Result<SceneSnapshot, HoudiniError> {
        let root = root.unwrap_or(&self.default_root);
        let snapshot = self.capture(root)?;
        lock(&self.baselines).insert(root.to_owned(), snapshot.clone());
        Ok(snapshot)
    }

    pub fn diff(before: &SceneSnapshot, after: &SceneSnapshot) -> SceneDiff {
        snapshot::diff(before, after)
    }

    /// Diffs a fresh snapshot against the baseline of `root`, then advances the baseline.
    pub fn changes(&self, root: Option<&str>) -> Result<ChangeReport, HoudiniError> {
        let root = root.unwrap_or(&self.default_root);
        let current = self.capture(root)?;
        let node_count = current.node_count();
        let previous = lock(&self.baselines).insert(root.to_owned(), current.clone());
        Ok(ChangeReport {
            root: root.to_owned(),
            diff: previous.map(|previous| snapshot::diff(&previous, &current)),
            node_count,
        })
    }

    pub fn node_types(&self, query: &CatalogueQuery) -> Result<Page<NodeTypeEntry>, HoudiniError> {
        let types = self.with_session("node_types", |conn| {
            self.node_types.get_all(|| populate_node_types(conn.as_ref()))
        })?;
        Ok(filter_page(&types, query))
    }

    pub fn node_parameters(&self, path: &str) -> Result<Vec<ParameterValue>, HoudiniError> {
        let parameters = self.with_session("parameters", |conn| {
            if !conn.node_exists(path)? {
                return Ok(None);
            }
            conn.parameters(path).map(Some)
        })?;
        let parameters = parameters.ok_or_else(|| HoudiniError::NodeNotFound(path.to_owned()))?;
        Ok(parameters
            .into_iter()
            .map(|(name, value)| ParameterValue { name, value: value.to_json() })
            .collect())
    }

    /// Loads a scene file; every cache and baseline is dropped.
    pub fn load_scene(&self, path: &str) -> Result<ConnectionInfo, HoudiniError> {
        self.with_session("load_file", |conn| conn.load_file(path))?;
        self.scene_replaced();
        info!(path, "scene loaded");
        Ok(self.connection_info())
    }

    pub fn new_scene(&self) -> Result<ConnectionInfo, HoudiniError> {
        self.with_session("new_file", |conn| conn.new_file())?;
        self.scene_replaced();
        info!("new scene");
        Ok(self.connection_info())
    }

    fn scene_replaced(&self) {
        self.invalidate_caches();
        lock(&self.baselines).clear();
        *lock(&self.last_diff) = None;
    }

    pub fn invalidate_caches(&self) {
        self.caches.invalidate_all();
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        self.caches.stats()
    }
}
