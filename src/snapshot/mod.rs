// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Structural snapshots of the host graph and the diff between two of them.
//!
//! Two interchangeable builders exist. The bulk builder issues two textual commands regardless of
//! scene size; the per-node builder walks the graph one round trip per node and is used only when
//! the bulk commands are unavailable or fail. Both produce identical trees for the same graph:
//! only the root's direct children carry a type, deeper nodes carry [`UNKNOWN_TYPE`].

use std::time::Instant;

use tracing::{debug, warn};

use crate::host::{HostConnection, TransportError};
use crate::model::{join_path, SceneDiff, SceneNode, SceneSnapshot, UNKNOWN_TYPE};

pub mod listing;

pub use listing::{parse_type_listing, Listing};

/// Which builder produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bulk,
    PerNode,
}

/// Snapshot of the subtree under `root`, falling back to the per-node walk when the bulk listing
/// fails.
pub fn snapshot(conn: &dyn HostConnection, root: &str) -> Result<SceneSnapshot, TransportError> {
    snapshot_with_strategy(conn, root).map(|(snapshot, _)| snapshot)
}

pub fn snapshot_with_strategy(
    conn: &dyn HostConnection,
    root: &str,
) -> Result<(SceneSnapshot, Strategy), TransportError> {
    let started = Instant::now();
    let (snapshot, strategy) = match bulk_snapshot(conn, root) {
        Ok(snapshot) => (snapshot, Strategy::Bulk),
        Err(err) => {
            warn!(root, error = %err, "bulk listing failed; walking nodes individually");
            (walk_snapshot(conn, root)?, Strategy::PerNode)
        }
    };
    debug!(
        root,
        ?strategy,
        nodes = snapshot.node_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "snapshot taken"
    );
    Ok((snapshot, strategy))
}

/// Two round trips: `opls -R` for structure, `optype` for the root's direct children.
pub fn bulk_snapshot(
    conn: &dyn HostConnection,
    root: &str,
) -> Result<SceneSnapshot, TransportError> {
    let text = conn.hscript(&format!("opls -R {root}"))?;
    let listing = Listing::parse(root, &text);
    if listing.is_empty() {
        return Ok(SceneSnapshot::new(root, Vec::new()));
    }
    let types = parse_type_listing(&conn.hscript(&format!("optype {}", join_path(root, "*")))?);
    Ok(SceneSnapshot::new(root, listing.materialize(&types)))
}

/// One `list_children` round trip per node. A missing root yields an empty snapshot.
pub fn walk_snapshot(
    conn: &dyn HostConnection,
    root: &str,
) -> Result<SceneSnapshot, TransportError> {
    if !conn.node_exists(root)? {
        return Ok(SceneSnapshot::new(root, Vec::new()));
    }
    Ok(SceneSnapshot::new(root, walk_children(conn, root, true)?))
}

fn walk_children(
    conn: &dyn HostConnection,
    parent: &str,
    typed: bool,
) -> Result<Vec<SceneNode>, TransportError> {
    conn.list_children(parent)?
        .into_iter()
        .map(|stub| {
            let path = join_path(parent, &stub.name);
            let children = walk_children(conn, &path, false)?;
            let type_name = if typed { stub.type_name } else { UNKNOWN_TYPE.to_owned() };
            Ok(SceneNode::new(path, type_name, stub.name).with_children(children))
        })
        .collect()
}

/// Flat set-and-shallow-equality diff.
///
/// A path is `modified` when its own record (type, name, ordered direct child paths) differs; a
/// change deeper down marks only the nodes whose own record changed.
pub fn diff(before: &SceneSnapshot, after: &SceneSnapshot) -> SceneDiff {
    let before = before.flatten();
    let after = after.flatten();

    let added: Vec<String> = after
        .keys()
        .filter(|path| !before.contains_key(*path))
        .map(|path| (*path).to_owned())
        .collect();
    let removed: Vec<String> = before
        .keys()
        .filter(|path| !after.contains_key(*path))
        .map(|path| (*path).to_owned())
        .collect();
    let modified: Vec<String> = before
        .iter()
        .filter(|(path, record)| after.get(*path).is_some_and(|other| other != *record))
        .map(|(path, _)| (*path).to_owned())
        .collect();

    let mut diff = SceneDiff { added, removed, modified, has_changes: false };
    diff.has_changes = diff.change_count() > 0;
    diff
}

#[cfg(test)]
mod tests;
