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

//! The single-connection A* search (spec §4.3): given a route tree and a target sink, finds a
//! minimum-estimated-cost path from any live tree node to the sink and splices it in.

use std::collections::HashSet;

use crate::cost::{evaluate_edge, CongestionState, CostParams, EdgeContext};
use crate::error::ConnectionRouterError;
use crate::heap::{HeapEntry, HeapInterface};
use crate::lookahead::Lookahead;
use crate::route_tree::spatial::SpatialLookup;
use crate::route_tree::{RouteTree, TreeNodeId};
use crate::rrg::RrgView;
use crate::scratch::ScratchTable;
use crate::stats::{ClusterLocality, IterationStats};
use crate::types::{BoundingBox, NetId, NonConfigSetId, RrNodeId, RrNodeKind, SinkIndex};

/// Nets with fanout at or above this threshold use spatial pre-search seeding (spec §4.3).
pub const HIGH_FANOUT_THRESHOLD: usize = 64;

/// Seeding window, in grid bins, around the target sink for high-fanout nets.
const HIGH_FANOUT_SEED_RADIUS: i32 = 3;

/// Minimum number of channel nodes a high-fanout seed must produce before falling back to
/// seeding from the whole tree.
const MIN_HIGH_FANOUT_SEED_CHANNELS: usize = 2;

/// Everything the search needs to know about the connection being routed, independent of the
/// tree/heap/scratch state that is threaded through explicitly.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRequest {
    /// The net being routed.
    pub net: NetId,
    /// The sink index within the net.
    pub sink: SinkIndex,
    /// The RR node id of the target sink.
    pub sink_node: RrNodeId,
    /// Current search bounding box.
    pub bbox: BoundingBox,
    /// The full-device bounding box, used for the final retry on failure.
    pub full_device_bbox: BoundingBox,
    /// Cost tunables for this connection.
    pub cost_params: CostParams,
    /// Whether this net's fanout warrants spatial pre-search seeding.
    pub high_fanout: bool,
    /// Disabled during short-path hold-repair, where detours outside the box may be needed.
    pub allow_bbox_prune: bool,
}

/// Outcome of a successful search: where the new branch attached, and the sink's new tree node.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionResult {
    /// The tree node the new branch attached to.
    pub attachment: TreeNodeId,
    /// The sink's newly spliced tree node.
    pub sink: TreeNodeId,
}

/// Run the single-connection search described in spec §4.3.
///
/// `heap` and `scratch` are caller-owned so they can be reused (and, in the parallel router,
/// shared) across many connections without reallocating.
#[allow(clippy::too_many_arguments)]
pub fn route_connection<Rg, H, L>(
    rrg: &Rg,
    heap: &mut H,
    scratch: &mut ScratchTable,
    tree: &mut RouteTree,
    lookahead: &L,
    mut spatial: Option<&mut SpatialLookup>,
    request: &ConnectionRequest,
    stats: &mut IterationStats,
) -> Result<ConnectionResult, ConnectionRouterError>
where
    Rg: RrgView,
    H: HeapInterface,
    L: Lookahead,
{
    heap.empty();
    seed_heap(rrg, scratch, tree, lookahead, spatial.as_deref(), request, heap);
    heap.build();

    if heap.is_empty() {
        return Err(ConnectionRouterError::EmptyHeapAtStart {
            net: request.net,
            sink: request.sink,
        });
    }

    loop {
        let popped = match heap.pop_min() {
            Some(e) => e,
            None => {
                scratch.reset_search_fields();
                return Err(ConnectionRouterError::Unrouteable {
                    net: request.net,
                    sink: request.sink,
                    sink_node: request.sink_node,
                });
            }
        };
        stats.record_pop(ClusterLocality::Intra);

        if popped.total_cost != scratch.get(popped.node).path_cost {
            // Post-heap prune: a cheaper path to this node was recorded after this entry was
            // pushed.
            continue;
        }

        if popped.node == request.sink_node {
            break;
        }

        expand(rrg, scratch, lookahead, request, popped, heap, stats);
    }

    let result = tree
        .update_from_heap(
            rrg,
            scratch,
            request.sink_node,
            request.sink,
            spatial.as_deref_mut(),
        )
        .map(|(attachment, sink)| ConnectionResult { attachment, sink });

    let reset = scratch.reset_search_fields();
    stats.route_tree_pushes += reset as u64;

    result.map_err(|_| ConnectionRouterError::Unrouteable {
        net: request.net,
        sink: request.sink,
        sink_node: request.sink_node,
    })
}

fn seed_heap<Rg, L, H>(
    rrg: &Rg,
    scratch: &mut ScratchTable,
    tree: &RouteTree,
    lookahead: &L,
    spatial: Option<&SpatialLookup>,
    request: &ConnectionRequest,
    heap: &mut H,
) where
    Rg: RrgView,
    L: Lookahead,
    H: HeapInterface,
{
    let mut seeds: Vec<TreeNodeId> = Vec::new();

    if request.high_fanout {
        if let Some(lookup) = spatial {
            let target = rrg.node(request.sink_node).bbox;
            let candidates: Vec<TreeNodeId> = lookup
                .nodes_within(target.xlow, target.ylow, HIGH_FANOUT_SEED_RADIUS)
                .into_iter()
                .filter(|&id| tree.node(id).re_expand)
                .collect();
            let channel_count = candidates
                .iter()
                .filter(|&&id| rrg.node(tree.node(id).rr_node).kind.is_pass_transistor())
                .count();
            if channel_count >= MIN_HIGH_FANOUT_SEED_CHANNELS {
                seeds = candidates;
            }
        }
    }

    if seeds.is_empty() {
        seeds = tree.iter_nodes().collect();
    }

    for id in seeds {
        let node = tree.node(id);
        if !node.re_expand {
            continue;
        }
        let rr = node.rr_node;
        let backward_cost = request.cost_params.criticality * node.t_del;
        let h = request.cost_params.astar_factor
            * lookahead.expected_cost(rr, request.sink_node, node.r_upstream);
        let total_cost = backward_cost + h;
        scratch.record_search_update(rr, total_cost, backward_cost, None, None, node.r_upstream);
        heap.push(HeapEntry {
            node: rr,
            total_cost,
            backward_cost,
            prev_node: None,
            prev_switch: None,
            r_upstream: node.r_upstream,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn expand<Rg, L, H>(
    rrg: &Rg,
    scratch: &mut ScratchTable,
    lookahead: &L,
    request: &ConnectionRequest,
    popped: HeapEntry,
    heap: &mut H,
    stats: &mut IterationStats,
) where
    Rg: RrgView,
    L: Lookahead,
    H: HeapInterface,
{
    let u = popped.node;
    let u_node = rrg.node(u);
    let mut entered_this_expansion: HashSet<NonConfigSetId> = HashSet::new();

    for (edge, v) in rrg.edges(u) {
        let v_node = rrg.node(v);

        if request.allow_bbox_prune && !v_node.bbox.intersects(&request.bbox) {
            continue;
        }

        if v_node.kind == RrNodeKind::IPin {
            let target_tile = rrg.node(request.sink_node).bbox;
            if !v_node.bbox.intersects(&target_tile) {
                continue;
            }
        }

        let switch = rrg.switch(edge.switch);
        let same_set_already_entered = match v_node.non_config_set {
            Some(set) => !entered_this_expansion.insert(set),
            None => false,
        };

        let existing = scratch.get(v);
        let ctx = EdgeContext {
            from_kind: u_node.kind,
            from_r: u_node.r,
            from_r_upstream: popped.r_upstream,
            from_backward_cost: popped.backward_cost,
            to_kind: v_node.kind,
            to_r: v_node.r,
            to_c: v_node.c,
            to_base_cost: rrg.base_cost(v),
        };
        let congestion = CongestionState {
            acc_cost: existing.acc_cost,
            pres_cost: existing.pres_cost,
        };
        let edge_cost = evaluate_edge(
            &ctx,
            switch,
            congestion,
            &request.cost_params,
            same_set_already_entered,
        );
        let h = request.cost_params.astar_factor
            * lookahead.expected_cost(v, request.sink_node, edge_cost.r_upstream);
        let new_total = edge_cost.backward_cost + h;

        let accept = new_total < existing.path_cost
            || (new_total == existing.path_cost && tie_break_wins(Some(u), existing.prev_node));
        if !accept {
            continue;
        }

        scratch.record_search_update(
            v,
            new_total,
            edge_cost.backward_cost,
            Some(u),
            Some(edge.switch),
            edge_cost.r_upstream,
        );
        stats.record_push(ClusterLocality::Intra, v_node.kind);
        heap.push(HeapEntry {
            node: v,
            total_cost: new_total,
            backward_cost: edge_cost.backward_cost,
            prev_node: Some(u),
            prev_switch: Some(edge.switch),
            r_upstream: edge_cost.r_upstream,
        });
    }
}

/// Deterministic tie-break shared with the parallel router (spec §4.6): on equal cost, the
/// candidate whose predecessor is numerically smaller wins; a node with no predecessor (the
/// search's own source) always wins.
pub fn tie_break_wins(candidate_prev: Option<RrNodeId>, incumbent_prev: Option<RrNodeId>) -> bool {
    match (candidate_prev, incumbent_prev) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a.index() < b.index(),
    }
}
