// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

#![allow(dead_code)]

// Shared deterministic benchmark scenes (no RNG).

use std::collections::HashMap;

use houdini_mcp::host::memory::MemoryHost;
use houdini_mcp::model::{SceneNode, SceneSnapshot};
use houdini_mcp::snapshot::Listing;

pub const ROOT: &str = "/obj";

#[derive(Debug, Clone, Copy)]
pub enum Case {
    /// A handful of objects with short networks.
    Small,
    /// Typical shot: many objects, moderate nesting.
    Medium,
    /// Wide and deep; tens of thousands of nodes.
    Large,
}

impl Case {
    pub fn id(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Children per node at each depth below the root.
    pub fn shape(self) -> &'static [usize] {
        match self {
            Self::Small => &[8, 4],
            Self::Medium => &[60, 12, 3],
            Self::Large => &[200, 20, 6],
        }
    }
}

fn child_name(depth: usize, index: usize) -> String {
    const STEMS: [&str; 6] = ["geo", "grid", "attribnoise", "null", "merge", "xform"];
    format!("{}{}_{index}", STEMS[(depth + index) % STEMS.len()], depth)
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// `opls -R` text for `case`: one header per parent, depth first.
pub fn listing_text(case: Case) -> String {
    fn section(out: &mut String, path: &str, shape: &[usize], depth: usize) {
        let Some((&width, rest)) = shape.split_first() else { return };
        out.push_str(path);
        out.push_str(":\n");
        for index in 0..width {
            out.push_str(&child_name(depth, index));
            out.push('\n');
        }
        out.push('\n');
        for index in 0..width {
            section(out, &join(path, &child_name(depth, index)), rest, depth + 1);
        }
    }
    let mut out = String::new();
    section(&mut out, ROOT, case.shape(), 0);
    out
}

/// `optype` answer for the root's direct children.
pub fn root_types(case: Case) -> HashMap<String, String> {
    (0..case.shape()[0]).map(|index| (child_name(0, index), "geo".to_owned())).collect()
}

pub fn snapshot(case: Case) -> SceneSnapshot {
    let listing = Listing::parse(ROOT, &listing_text(case));
    SceneSnapshot::new(ROOT, listing.materialize(&root_types(case)))
}

/// `snapshot(case)` after a typical script: a few nodes added, one subtree removed, one retyped.
pub fn edited(case: Case) -> SceneSnapshot {
    let mut after = snapshot(case);
    if let Some(first) = after.nodes.first_mut() {
        first.type_name = "subnet".to_owned();
        let path = join(&first.path, "scatter_new");
        first.children.push(SceneNode::new(path, "scatter", "scatter_new"));
    }
    after.nodes.pop();
    after.nodes.push(SceneNode::new(join(ROOT, "cam_new"), "cam", "cam_new"));
    after
}

/// A `MemoryHost` populated with the scene of `case`.
pub fn memory_host(case: Case) -> MemoryHost {
    fn fill(host: &MemoryHost, parent: &str, shape: &[usize], depth: usize) {
        let Some((&width, rest)) = shape.split_first() else { return };
        for index in 0..width {
            let name = child_name(depth, index);
            let path = host.add_node(parent, "geo", &name).expect("add node");
            fill(host, &path, rest, depth + 1);
        }
    }
    let host = MemoryHost::new();
    fill(&host, ROOT, case.shape(), 0);
    host
}

/// Order-sensitive digest so results cannot be optimised away.
pub fn checksum(nodes: &[SceneNode]) -> u64 {
    let mut acc = 0u64;
    let mut stack: Vec<&SceneNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        acc = acc.rotate_left(5) ^ node.path.len() as u64 ^ node.children.len() as u64;
        stack.extend(node.children.iter());
    }
    acc
}
