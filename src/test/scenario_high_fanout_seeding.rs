// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A high-fanout net with an existing partial tree spread far from the next sink being routed:
//! seeding only from tree nodes within a few spatial bins of the target must do strictly less
//! work than seeding from the whole tree, for the same connection.

use crate::connection_router::{route_connection, ConnectionRequest};
use crate::cost::CostParams;
use crate::heap::BinaryHeap;
use crate::lookahead::NoOpLookahead;
use crate::route_tree::spatial::SpatialLookup;
use crate::route_tree::RouteTree;
use crate::rrg::{RrNode, Rrg, RrgView, Switch};
use crate::scratch::ScratchTable;
use crate::stats::IterationStats;
use crate::types::{BoundingBox, NetId, RrNodeKind, SinkIndex, SwitchId};

const FAR_BRANCHES: i32 = 20;

fn sw() -> Switch {
    Switch {
        r: 1.0,
        t_del: 0.0,
        c_internal: 0.0,
        buffered: true,
        configurable: true,
    }
}

fn node(kind: RrNodeKind, x: i32, y: i32) -> RrNode {
    RrNode {
        kind,
        bbox: BoundingBox::point(x, y, 0),
        capacity: 1,
        ptc: 0,
        r: 1.0,
        c: 0.0,
        cost_index: 0,
        non_config_set: None,
    }
}

/// Builds the shared RRG: a root source at the origin, `FAR_BRANCHES` far-away dead-end chan
/// nodes (each with one further dead-end neighbor, so expanding one costs two heap pushes), and
/// four near chan nodes close to `sink`, each with a direct edge to it.
fn build_rrg() -> (Rrg, crate::types::RrNodeId, crate::types::RrNodeId, Vec<crate::types::RrNodeId>, Vec<(crate::types::RrNodeId, crate::types::RrNodeId)>) {
    let mut rrg = Rrg::new(vec![sw()]);
    let source = rrg.add_node(node(RrNodeKind::Source, 0, 0));
    let sink = rrg.add_node(node(RrNodeKind::Sink, 0, 0));

    let mut near = Vec::new();
    for i in 0..4 {
        let n = rrg.add_node(node(RrNodeKind::ChanX, 5 + i, 5 + i));
        rrg.add_edge(n, sink, SwitchId(0));
        near.push(n);
    }

    let mut far = Vec::new();
    for i in 0..FAR_BRANCHES {
        let branch = rrg.add_node(node(RrNodeKind::ChanX, 1000 + i, 1000 + i));
        let dead_end = rrg.add_node(node(RrNodeKind::ChanX, 1000 + i, 1001 + i));
        rrg.add_edge(branch, dead_end, SwitchId(0));
        far.push((branch, dead_end));
    }

    (rrg, source, sink, near, far)
}

/// Builds a route tree rooted at `source` with every far/near node spliced directly onto the
/// root, registering each in `spatial` at its own position (as `update_from_heap` would have
/// while building up the real partial tree).
fn build_tree_and_spatial(
    rrg: &Rrg,
    source: crate::types::RrNodeId,
    near: &[crate::types::RrNodeId],
    far: &[(crate::types::RrNodeId, crate::types::RrNodeId)],
    all_sinks: std::collections::HashSet<SinkIndex>,
) -> (RouteTree, SpatialLookup) {
    let mut tree = RouteTree::new(NetId(0), source, all_sinks);
    let mut spatial = SpatialLookup::new(100, 100, 100);
    let root = tree.root();

    for &n in near {
        let id = tree.insert_child(rrg, root, n, SwitchId(0), None);
        let bbox = rrg.node(n).bbox;
        spatial.insert(bbox.xlow, bbox.ylow, id);
    }
    for &(branch, _dead_end) in far {
        let id = tree.insert_child(rrg, root, branch, SwitchId(0), None);
        let bbox = rrg.node(branch).bbox;
        spatial.insert(bbox.xlow, bbox.ylow, id);
    }

    (tree, spatial)
}

#[test]
fn spatially_restricted_seeding_pushes_no_more_than_whole_tree_seeding() {
    let (rrg, source, sink, near, far) = build_rrg();
    let lookahead = NoOpLookahead;
    let sinks: std::collections::HashSet<SinkIndex> = [SinkIndex(1)].into_iter().collect();

    let cost_params = CostParams {
        criticality: 0.0,
        astar_factor: 1.0,
        bend_cost: 0.0,
        choking_discount: None,
    };

    // Restricted: high-fanout seeding from only the spatially-nearby tree nodes.
    let (mut restricted_tree, mut restricted_spatial) = build_tree_and_spatial(&rrg, source, &near, &far, sinks.clone());
    let mut restricted_scratch = ScratchTable::new(rrg.num_nodes());
    let mut restricted_heap = BinaryHeap::new();
    let mut restricted_stats = IterationStats::default();
    let request = ConnectionRequest {
        net: NetId(0),
        sink: SinkIndex(1),
        sink_node: sink,
        bbox: rrg.node(sink).bbox,
        full_device_bbox: BoundingBox::point(-10, -10, 0).union(&BoundingBox::point(1100, 1100, 0)),
        cost_params,
        high_fanout: true,
        allow_bbox_prune: false,
    };
    route_connection(
        &rrg,
        &mut restricted_heap,
        &mut restricted_scratch,
        &mut restricted_tree,
        &lookahead,
        Some(&mut restricted_spatial),
        &request,
        &mut restricted_stats,
    )
    .expect("sink is reachable from the near cluster");

    // Unrestricted: the same connection, but seeded from every tree node (as a low-fanout net
    // would be, or as this net would be with no spatial lookup available).
    let (mut full_tree, _unused_spatial) = build_tree_and_spatial(&rrg, source, &near, &far, sinks);
    let mut full_scratch = ScratchTable::new(rrg.num_nodes());
    let mut full_heap = BinaryHeap::new();
    let mut full_stats = IterationStats::default();
    let full_request = ConnectionRequest {
        high_fanout: false,
        ..request
    };
    route_connection(
        &rrg,
        &mut full_heap,
        &mut full_scratch,
        &mut full_tree,
        &lookahead,
        None,
        &full_request,
        &mut full_stats,
    )
    .expect("sink is reachable from the near cluster");

    let restricted_pushes = restricted_stats.heap_pushes_intra + restricted_stats.heap_pushes_inter;
    let full_pushes = full_stats.heap_pushes_intra + full_stats.heap_pushes_inter;
    assert!(
        restricted_pushes <= full_pushes,
        "restricted seeding pushed {restricted_pushes} entries, whole-tree seeding only {full_pushes}"
    );
    // The far dead-end branches must not have been touched at all under restricted seeding: each
    // one costs exactly one extra push when it is expanded, so a strict gap proves they were
    // skipped rather than merely tying.
    assert!(restricted_pushes + FAR_BRANCHES as u64 <= full_pushes);
}
