// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use houdini_mcp::host::Transport;
use houdini_mcp::snapshot::{bulk_snapshot, diff, walk_snapshot, Listing};

mod fixtures;
mod profiler;

use fixtures::Case;

const CASES: [Case; 3] = [Case::Small, Case::Medium, Case::Large];

// Benchmark identity (keep stable):
// - Group names: `snapshot.parse_listing`, `snapshot.materialize`, `snapshot.diff`,
//   `snapshot.memory_host`.
// - Case IDs are `small`, `medium`, `large`; `memory_host` suffixes them with the strategy.
fn benches_snapshot(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("snapshot.parse_listing");
        for case in CASES {
            let text = fixtures::listing_text(case);
            let listing = Listing::parse(fixtures::ROOT, &text);
            group.throughput(Throughput::Elements(listing.len() as u64));
            group.bench_function(case.id(), move |b| {
                b.iter(|| black_box(Listing::parse(fixtures::ROOT, black_box(&text))).len())
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("snapshot.materialize");
        for case in CASES {
            let listing = Listing::parse(fixtures::ROOT, &fixtures::listing_text(case));
            let types = fixtures::root_types(case);
            group.throughput(Throughput::Elements(listing.len() as u64));
            group.bench_function(case.id(), move |b| {
                b.iter(|| {
                    let nodes = black_box(&listing).materialize(black_box(&types));
                    black_box(fixtures::checksum(&nodes))
                })
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("snapshot.diff");
        for case in CASES {
            let before = fixtures::snapshot(case);
            let after = fixtures::edited(case);
            group.throughput(Throughput::Elements(before.node_count() as u64));
            group.bench_function(case.id(), move |b| {
                b.iter(|| {
                    let changes = diff(black_box(&before), black_box(&after));
                    black_box(changes.change_count())
                })
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("snapshot.memory_host");
        for case in [Case::Small, Case::Medium] {
            let host = fixtures::memory_host(case);
            let conn = host.open("localhost", 18811).expect("open memory host");
            let nodes = fixtures::snapshot(case).node_count() as u64;
            group.throughput(Throughput::Elements(nodes));

            let bulk_conn = conn.clone();
            group.bench_function(format!("{}_bulk", case.id()), move |b| {
                b.iter(|| {
                    let snapshot =
                        bulk_snapshot(bulk_conn.as_ref(), fixtures::ROOT).expect("bulk snapshot");
                    black_box(fixtures::checksum(&snapshot.nodes))
                })
            });
            group.bench_function(format!("{}_walk", case.id()), move |b| {
                b.iter(|| {
                    let snapshot =
                        walk_snapshot(conn.as_ref(), fixtures::ROOT).expect("walk snapshot");
                    black_box(fixtures::checksum(&snapshot.nodes))
                })
            });
        }
        group.finish();
    }
}

criterion_group! {
    name = benches;
    config = profiler::criterion();
    targets = benches_snapshot
}
criterion_main!(benches);
