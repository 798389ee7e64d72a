// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Parsers for the host's bulk listing commands.

use std::collections::{HashMap, HashSet};

use crate::model::{join_path, SceneNode, UNKNOWN_TYPE};

/// Output of `opls -R <root>`, indexed by path.
///
/// Built in one pass: lines ending in `:` open a parent section, every other non-empty line is a
/// child name of the current section. Lines before the first header belong to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    root: String,
    names: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl Listing {
    pub fn parse(root: &str, text: &str) -> Self {
        let mut names = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut seen = HashSet::new();
        let mut parent = root.to_owned();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_suffix(':') {
                parent = header.trim_end().to_owned();
                continue;
            }
            let path = join_path(&parent, line);
            if !seen.insert(path.clone()) {
                continue;
            }
            children.entry(parent.clone()).or_default().push(path.clone());
            names.insert(path, line.to_owned());
        }

        Self { root: root.to_owned(), names, children }
    }

    /// Number of distinct nodes listed.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Builds the trees under the root.
    ///
    /// `root_types` maps names of the root's direct children to their type; deeper nodes get the
    /// unknown sentinel. Sections whose header is not reachable from the root are ignored.
    pub fn materialize(&self, root_types: &HashMap<String, String>) -> Vec<SceneNode> {
        self.children_of(&self.root)
            .iter()
            .map(|path| {
                let mut node = self.build(path);
                if let Some(type_name) = root_types.get(&node.name) {
                    node.type_name = type_name.clone();
                }
                node
            })
            .collect()
    }

    fn children_of(&self, path: &str) -> &[String] {
        self.children.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    fn build(&self, path: &str) -> SceneNode {
        let name = self.names.get(path).cloned().unwrap_or_else(|| leaf_name(path).to_owned());
        let children = self.children_of(path).iter().map(|child| self.build(child)).collect();
        SceneNode::new(path, UNKNOWN_TYPE, name).with_children(children)
    }
}

fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parses `optype <parent>/*` output into `name -> type`.
///
/// Records are `Name: <name>` followed by `Op Type: <type>`; other lines are ignored.
pub fn parse_type_listing(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut current: Option<&str> = None;
    for line in text.lines() {
        let line = line.trim_end();
        if let Some(name) = line.strip_prefix("Name: ") {
            current = Some(name);
        } else if let Some(type_name) = line.strip_prefix("Op Type: ") {
            if let Some(name) = current.take() {
                out.insert(name.to_owned(), type_name.to_owned());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_attach_names_to_their_header() {
        let listing = Listing::parse(
            "/obj",
            "/obj:\ngeo1\ncam1\n\n/obj/geo1:\nsphere1\nxform1\n",
        );
        assert_eq!(listing.len(), 4);
        let nodes = listing.materialize(&HashMap::new());
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].path, "/obj/geo1");
        let grandchildren: Vec<&str> =
            nodes[0].children.iter().map(|node| node.path.as_str()).collect();
        assert_eq!(grandchildren, vec!["/obj/geo1/sphere1", "/obj/geo1/xform1"]);
        assert!(nodes[1].children.is_empty());
    }

    #[test]
    fn lines_before_any_header_belong_to_the_root() {
        let listing = Listing::parse("/obj", "geo1\ngeo2\n");
        let paths: Vec<String> =
            listing.materialize(&HashMap::new()).into_iter().map(|node| node.path).collect();
        assert_eq!(paths, vec!["/obj/geo1", "/obj/geo2"]);
    }

    #[test]
    fn only_root_children_receive_types() {
        let listing = Listing::parse("/obj", "/obj:\ngeo1\n/obj/geo1:\nbox1\n");
        let types = parse_type_listing("Name: geo1\nOp Type: geo\n\nName: ghost\nOp Type: cam\n");
        let nodes = listing.materialize(&types);
        assert_eq!(nodes[0].type_name, "geo");
        assert_eq!(nodes[0].children[0].type_name, UNKNOWN_TYPE);
    }

    #[test]
    fn repeated_names_are_listed_once() {
        let listing = Listing::parse("/obj", "/obj:\ngeo1\ngeo1\n");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.materialize(&HashMap::new()).len(), 1);
    }

    #[test]
    fn empty_output_is_an_empty_listing() {
        assert!(Listing::parse("/obj", "").is_empty());
        assert!(Listing::parse("/obj", "\n\n").materialize(&HashMap::new()).is_empty());
    }

    #[test]
    fn type_records_need_a_preceding_name() {
        let types = parse_type_listing("Op Type: orphan\nName: a\nOp Type: geo\n");
        assert_eq!(types.len(), 1);
        assert_eq!(types["a"], "geo");
    }
}
