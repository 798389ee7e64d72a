// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Type name recorded for nodes whose type was not fetched.
pub const UNKNOWN_TYPE: &str = "unknown";

/// One node of the host's object graph as seen by a snapshot.
///
/// `path` is the sole identity of a node; two nodes are the same entity iff their paths match.
/// `children` keeps the order reported by the host's listing command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneNode {
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(
        path: impl Into<String>,
        type_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            type_name: type_name.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<SceneNode>) -> Self {
        self.children = children;
        self
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::count).sum::<usize>()
    }
}

/// Point-in-time tree serialization of the subtree under `root`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneSnapshot {
    pub root: String,
    pub nodes: Vec<SceneNode>,
}

/// The per-node record compared by the diff: the node's own fields plus its direct child paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord<'a> {
    pub type_name: &'a str,
    pub name: &'a str,
    pub children: Vec<&'a str>,
}

impl SceneSnapshot {
    pub fn new(root: impl Into<String>, nodes: Vec<SceneNode>) -> Self {
        Self { root: root.into(), nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(SceneNode::count).sum()
    }

    /// Flattens every node (at any depth) into one record keyed by path.
    pub fn flatten(&self) -> BTreeMap<&str, NodeRecord<'_>> {
        let mut out = BTreeMap::new();
        let mut stack: Vec<&SceneNode> = self.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.insert(
                node.path.as_str(),
                NodeRecord {
                    type_name: &node.type_name,
                    name: &node.name,
                    children: node.children.iter().map(|child| child.path.as_str()).collect(),
                },
            );
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// All paths in depth-first listing order.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack: Vec<&SceneNode> = self.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node.path.as_str());
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Added/removed/modified path sets between two snapshots.
///
/// Sets are serialized as sorted arrays so that equal diffs render identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
    pub has_changes: bool,
}

impl SceneDiff {
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Joins a parent path and a child name the way the host spells paths.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
