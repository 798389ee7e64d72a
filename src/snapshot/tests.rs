// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use rstest::{fixture, rstest};

use crate::host::memory::MemoryHost;
use crate::host::{HostConnection, Transport};
use crate::model::{SceneNode, SceneSnapshot, UNKNOWN_TYPE};

use super::{bulk_snapshot, diff, snapshot_with_strategy, walk_snapshot, Strategy};

#[fixture]
fn demo() -> (MemoryHost, Arc<dyn HostConnection>) {
    let host = MemoryHost::demo();
    let conn = host.open("localhost", 18811).expect("open demo host");
    (host, conn)
}

fn leaf(path: &str, type_name: &str) -> SceneNode {
    let name = path.rsplit('/').next().unwrap_or(path);
    SceneNode::new(path, type_name, name)
}

#[rstest]
fn bulk_and_per_node_builders_agree(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (_host, conn) = demo;
    let bulk = bulk_snapshot(conn.as_ref(), "/obj").expect("bulk");
    let walked = walk_snapshot(conn.as_ref(), "/obj").expect("walk");
    assert_eq!(bulk.paths(), walked.paths());
    assert_eq!(bulk, walked);
    assert!(!diff(&bulk, &walked).has_changes);
}

#[rstest]
fn builders_agree_from_the_scene_root(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (_host, conn) = demo;
    let bulk = bulk_snapshot(conn.as_ref(), "/").expect("bulk");
    let walked = walk_snapshot(conn.as_ref(), "/").expect("walk");
    assert_eq!(bulk, walked);
    assert!(bulk.paths().contains(&"/obj/terrain/grid1"));
}

#[rstest]
fn deeper_nodes_carry_the_sentinel_type(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (_host, conn) = demo;
    let snapshot = bulk_snapshot(conn.as_ref(), "/obj").expect("bulk");
    let terrain = snapshot.nodes.iter().find(|node| node.name == "terrain").expect("terrain");
    assert_eq!(terrain.type_name, "geo");
    assert!(terrain.children.iter().all(|child| child.type_name == UNKNOWN_TYPE));
}

#[rstest]
fn falls_back_when_bulk_listing_is_unsupported(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (host, conn) = demo;
    let (bulk, strategy) = snapshot_with_strategy(conn.as_ref(), "/obj").expect("bulk");
    assert_eq!(strategy, Strategy::Bulk);

    host.set_hscript_supported(false);
    let (walked, strategy) = snapshot_with_strategy(conn.as_ref(), "/obj").expect("fallback");
    assert_eq!(strategy, Strategy::PerNode);
    assert_eq!(bulk, walked);
}

#[rstest]
fn bulk_snapshot_costs_two_round_trips(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (host, conn) = demo;
    let before = host.round_trips();
    bulk_snapshot(conn.as_ref(), "/obj").expect("bulk");
    assert_eq!(host.round_trips() - before, 2);
}

#[rstest]
fn missing_root_is_empty_for_both_builders(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (_host, conn) = demo;
    assert!(bulk_snapshot(conn.as_ref(), "/nowhere").expect("bulk").is_empty());
    assert!(walk_snapshot(conn.as_ref(), "/nowhere").expect("walk").is_empty());
}

#[rstest]
fn severed_connection_surfaces_from_the_fallback(demo: (MemoryHost, Arc<dyn HostConnection>)) {
    let (host, conn) = demo;
    host.sever();
    let err = snapshot_with_strategy(conn.as_ref(), "/obj").unwrap_err();
    assert!(err.is_connection_fault());
}

#[test]
fn diff_from_empty_reports_the_new_node() {
    let before = SceneSnapshot::new("/r", Vec::new());
    let after = SceneSnapshot::new("/r", vec![leaf("/r/a", "t")]);
    let result = diff(&before, &after);
    assert_eq!(result.added, vec!["/r/a".to_owned()]);
    assert!(result.removed.is_empty());
    assert!(result.modified.is_empty());
    assert!(result.has_changes);
}

fn scene_a() -> SceneSnapshot {
    SceneSnapshot::new(
        "/obj",
        vec![
            SceneNode::new("/obj/geo1", "geo", "geo1")
                .with_children(vec![leaf("/obj/geo1/box1", UNKNOWN_TYPE)]),
            leaf("/obj/cam1", "cam"),
        ],
    )
}

fn scene_b() -> SceneSnapshot {
    SceneSnapshot::new(
        "/obj",
        vec![
            SceneNode::new("/obj/geo1", "geo", "geo1").with_children(vec![
                leaf("/obj/geo1/box1", UNKNOWN_TYPE),
                leaf("/obj/geo1/xform1", UNKNOWN_TYPE),
            ]),
            leaf("/obj/light1", "hlight"),
        ],
    )
}

#[rstest]
#[case::empty(SceneSnapshot::default())]
#[case::flat(scene_a())]
#[case::nested(scene_b())]
fn diff_is_reflexive(#[case] scene: SceneSnapshot) {
    let result = diff(&scene, &scene);
    assert!(result.added.is_empty() && result.removed.is_empty() && result.modified.is_empty());
    assert!(!result.has_changes);
}

#[rstest]
#[case(scene_a(), scene_b())]
#[case(SceneSnapshot::default(), scene_b())]
fn diff_is_antisymmetric(#[case] a: SceneSnapshot, #[case] b: SceneSnapshot) {
    let forward = diff(&a, &b);
    let backward = diff(&b, &a);
    assert_eq!(forward.added, backward.removed);
    assert_eq!(forward.removed, backward.added);
    assert_eq!(forward.modified, backward.modified);
}

#[test]
fn modified_is_limited_to_nodes_whose_own_record_changed() {
    let result = diff(&scene_a(), &scene_b());
    assert_eq!(result.added, vec!["/obj/geo1/xform1".to_owned(), "/obj/light1".to_owned()]);
    assert_eq!(result.removed, vec!["/obj/cam1".to_owned()]);
    assert_eq!(result.modified, vec!["/obj/geo1".to_owned()]);
}

#[test]
fn deep_changes_do_not_mark_unaffected_ancestors() {
    let deep = |leaf_type: &str| {
        SceneSnapshot::new(
            "/obj",
            vec![SceneNode::new("/obj/a", "geo", "a").with_children(vec![SceneNode::new(
                "/obj/a/b",
                UNKNOWN_TYPE,
                "b",
            )
            .with_children(vec![leaf("/obj/a/b/c", leaf_type)])])],
        )
    };
    let result = diff(&deep("x"), &deep("y"));
    assert_eq!(result.modified, vec!["/obj/a/b/c".to_owned()]);
}

#[test]
fn reordered_children_count_as_a_modification() {
    let ordered = |first: &str, second: &str| {
        SceneSnapshot::new(
            "/obj",
            vec![SceneNode::new("/obj/g", "geo", "g").with_children(vec![
                leaf(&format!("/obj/g/{first}"), UNKNOWN_TYPE),
                leaf(&format!("/obj/g/{second}"), UNKNOWN_TYPE),
            ])],
        )
    };
    let result = diff(&ordered("a", "b"), &ordered("b", "a"));
    assert_eq!(result.modified, vec!["/obj/g".to_owned()]);
    assert!(result.added.is_empty());
}
