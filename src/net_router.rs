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

//! Per-net orchestration (spec §4.5, "Per-iteration per-net flow"): decide whether to keep or
//! rip up a net's existing tree, order its remaining sinks by criticality, route each sink via
//! [`crate::connection_router::route_connection`], and fold the result back into the tree.

use std::collections::{HashMap, HashSet};

use crate::config::RouterConfig;
use crate::connection_router::{route_connection, ConnectionRequest};
use crate::cost::CostParams;
use crate::error::NetRouterError;
use crate::heap::HeapInterface;
use crate::lookahead::Lookahead;
use crate::netlist::{Net, TimingInfo};
use crate::route_tree::spatial::SpatialLookup;
use crate::route_tree::RouteTree;
use crate::rrg::RrgView;
use crate::scratch::ScratchTable;
use crate::stats::IterationStats;
use crate::types::{BoundingBox, RrNodeId, SinkIndex};

/// Per-connection lower-bound delay bookkeeping for forced reroute (spec §4.5): a connection's
/// lower bound only ever shrinks, and is compared against its current measured delay each
/// iteration to decide whether it must be rerouted regardless of congestion.
#[derive(Debug, Clone, Default)]
pub struct LowerBoundDelays {
    bounds: HashMap<(crate::types::NetId, SinkIndex), f64>,
}

impl LowerBoundDelays {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly measured delay, tightening the stored lower bound if `delay` is smaller.
    pub fn observe(&mut self, net: crate::types::NetId, sink: SinkIndex, delay: f64) {
        let entry = self.bounds.entry((net, sink)).or_insert(delay);
        if delay < *entry {
            *entry = delay;
        }
    }

    /// The current lower bound for `(net, sink)`, or `f64::INFINITY` if never observed.
    pub fn get(&self, net: crate::types::NetId, sink: SinkIndex) -> f64 {
        self.bounds
            .get(&(net, sink))
            .copied()
            .unwrap_or(f64::INFINITY)
    }
}

/// Whether `(net, sink)` must be rerouted this iteration regardless of congestion state (spec
/// §4.5 "Forced reroute"): its criticality exceeds `max_criticality - forced_reroute_criticality_tolerance`
/// and its most recent measured delay exceeds its lower bound by more than
/// `forced_reroute_delay_tolerance` (relative).
pub fn needs_forced_reroute(
    config: &RouterConfig,
    criticality: f64,
    measured_delay: f64,
    lower_bound_delay: f64,
) -> bool {
    let critical_enough = criticality >= config.max_criticality - config.forced_reroute_criticality_tolerance;
    if !critical_enough || !lower_bound_delay.is_finite() {
        return false;
    }
    let slack = measured_delay - lower_bound_delay;
    critical_enough && slack > config.forced_reroute_delay_tolerance * lower_bound_delay
}

/// Decide whether `tree` should be kept (possibly pruned) or discarded outright for this
/// iteration (spec §4.5 step 1, "Setup").
///
/// Returns the surviving tree (a fresh one rooted at `net.source` if nothing survived) plus the
/// set of sinks that must be (re-)routed this iteration. Congestion bookkeeping: the net's prior
/// occupancy contribution is subtracted before pruning and, if a pruned copy survives, added back
/// — so a net's own usage is never double-counted against itself while deciding what to keep.
pub fn setup_net<R: RrgView>(
    rrg: &R,
    scratch: &mut ScratchTable,
    net: &Net,
    existing: Option<&RouteTree>,
    iteration: usize,
    incremental_reroute_fanout_threshold: usize,
    forced_reroute: &HashSet<SinkIndex>,
) -> (RouteTree, HashSet<SinkIndex>) {
    let discard_outright = iteration == 1 || net.fanout() < incremental_reroute_fanout_threshold;

    let Some(tree) = existing else {
        let tree = RouteTree::new(net.id, net.source, net.sink_indices().collect());
        let remaining = tree.get_remaining_sinks().collect();
        return (tree, remaining);
    };

    if discard_outright {
        for id in tree.iter_nodes() {
            scratch.decr_occ(tree.node(id).rr_node);
        }
        let fresh = RouteTree::new(net.id, net.source, net.sink_indices().collect());
        let remaining = fresh.get_remaining_sinks().collect();
        return (fresh, remaining);
    }

    for id in tree.iter_nodes() {
        scratch.decr_occ(tree.node(id).rr_node);
    }
    match tree.prune(rrg, scratch, forced_reroute) {
        Some(pruned) => {
            for id in pruned.iter_nodes() {
                scratch.incr_occ(pruned.node(id).rr_node);
            }
            let remaining = pruned.get_remaining_sinks().collect();
            (pruned, remaining)
        }
        None => {
            let fresh = RouteTree::new(net.id, net.source, net.sink_indices().collect());
            let remaining = fresh.get_remaining_sinks().collect();
            (fresh, remaining)
        }
    }
}

/// Per-pin routing criticality, clamped and exponentiated per spec §6
/// (`criticality = min(max_criticality, raw)^criticality_exp`).
fn pin_criticality(config: &RouterConfig, raw_criticality: f64) -> f64 {
    raw_criticality.min(config.max_criticality).max(0.0).powf(config.criticality_exp)
}

/// Route every remaining sink of `net`, ordered by descending criticality (spec §4.5 step 2),
/// splicing each into `tree` as it succeeds. Updates `tree`'s per-sink delays via `timing` once
/// all sinks have been attempted.
#[allow(clippy::too_many_arguments)]
pub fn route_net<R, H, L, T>(
    rrg: &R,
    heap: &mut H,
    scratch: &mut ScratchTable,
    tree: &mut RouteTree,
    lookahead: &L,
    mut spatial: Option<&mut SpatialLookup>,
    net: &Net,
    remaining_sinks: &HashSet<SinkIndex>,
    config: &RouterConfig,
    timing: &mut T,
    full_device_bbox: BoundingBox,
    stats: &mut IterationStats,
) -> Result<(), NetRouterError>
where
    R: RrgView,
    H: HeapInterface,
    L: Lookahead,
    T: TimingInfo,
{
    let mut ordered: Vec<SinkIndex> = remaining_sinks.iter().copied().collect();
    ordered.sort_by(|a, b| {
        let ca = pin_criticality(config, timing.criticality(net.id, *a));
        let cb = pin_criticality(config, timing.criticality(net.id, *b));
        cb.partial_cmp(&ca).unwrap_or(std::cmp::Ordering::Equal)
    });

    let bbox = tree
        .current_bounding_box(rrg)
        .scale(config.bb_factor, &full_device_bbox);

    for sink in ordered {
        let sink_node = net.sink_node(sink);
        let criticality = pin_criticality(config, timing.criticality(net.id, sink));
        let cost_params = CostParams {
            criticality,
            astar_factor: config.astar_fac,
            bend_cost: config.bend_cost,
            choking_discount: None,
        };
        let high_fanout = net.fanout() >= config.high_fanout_threshold && !net.is_clock && !net.is_global;

        let request = ConnectionRequest {
            net: net.id,
            sink,
            sink_node,
            bbox,
            full_device_bbox,
            cost_params,
            high_fanout,
            allow_bbox_prune: true,
        };

        let result = route_connection(rrg, heap, scratch, tree, lookahead, spatial.as_deref_mut(), &request, stats);
        match result {
            Ok(_) => {}
            Err(_) => {
                let retry_request = ConnectionRequest {
                    bbox: full_device_bbox,
                    allow_bbox_prune: false,
                    ..request
                };
                route_connection(rrg, heap, scratch, tree, lookahead, spatial.as_deref_mut(), &retry_request, stats)?;
            }
        };

        stats.connections_routed += 1;
    }

    stats.nets_routed += 1;
    update_net_delays(tree, net, timing);
    Ok(())
}

/// Push each reached sink's Elmore delay estimate back to the timing-analysis collaborator
/// (spec §4.5 step 2, "Update net delays from the tree after all sinks").
fn update_net_delays<T: TimingInfo>(tree: &RouteTree, net: &Net, timing: &mut T) {
    for sink in net.sink_indices() {
        if let Some(id) = tree.find_by_sink_index(sink) {
            timing.update_sink_delay(net.id, sink, tree.node(id).t_del);
        }
    }
}

/// Two-stage clock pre-route (spec §4.5 step 3): first route the net's source to a virtual
/// clock-root sink treating it as an ordinary one-sink connection (ignoring the net's real
/// fanout), freeze that pre-routed tree so it can no longer be re-expanded, then return it ready
/// for ordinary per-sink routing of the ultimate clock loads from the frozen network.
#[allow(clippy::too_many_arguments)]
pub fn clock_pre_route<R, H, L>(
    rrg: &R,
    heap: &mut H,
    scratch: &mut ScratchTable,
    lookahead: &L,
    net: &Net,
    virtual_root_node: RrNodeId,
    config: &RouterConfig,
    full_device_bbox: BoundingBox,
    stats: &mut IterationStats,
) -> Result<RouteTree, NetRouterError>
where
    R: RrgView,
    H: HeapInterface,
    L: Lookahead,
{
    let mut tree = RouteTree::new(net.id, net.source, HashSet::from([SinkIndex(1)]));
    let request = ConnectionRequest {
        net: net.id,
        sink: SinkIndex(1),
        sink_node: virtual_root_node,
        bbox: full_device_bbox,
        full_device_bbox,
        cost_params: CostParams {
            criticality: 0.0,
            astar_factor: config.astar_fac,
            bend_cost: config.bend_cost,
            choking_discount: None,
        },
        high_fanout: false,
        allow_bbox_prune: false,
    };
    route_connection(rrg, heap, scratch, &mut tree, lookahead, None, &request, stats)?;
    tree.freeze(rrg);
    Ok(tree)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::heap::BinaryHeap;
    use crate::lookahead::NoOpLookahead;
    use crate::netlist::FixedCriticality;
    use crate::rrg::{RrNode, Rrg, Switch};
    use crate::types::{NetId, RrNodeKind, SwitchId};

    fn sw() -> Switch {
        Switch {
            r: 1.0,
            t_del: 1e-12,
            c_internal: 0.0,
            buffered: true,
            configurable: true,
        }
    }

    fn node(kind: RrNodeKind) -> RrNode {
        RrNode {
            kind,
            bbox: BoundingBox::point(0, 0, 0),
            capacity: 1,
            ptc: 0,
            r: 1.0,
            c: 1e-15,
            cost_index: 0,
            non_config_set: None,
        }
    }

    #[test]
    fn forced_reroute_triggers_on_critical_delay_regression() {
        let mut config = RouterConfig::default();
        config.max_criticality = 0.99;
        config.forced_reroute_criticality_tolerance = 0.05;
        config.forced_reroute_delay_tolerance = 0.01;
        assert!(needs_forced_reroute(&config, 0.98, 1.2, 1.0));
        assert!(!needs_forced_reroute(&config, 0.5, 1.2, 1.0));
        assert!(!needs_forced_reroute(&config, 0.98, 1.005, 1.0));
    }

    #[test]
    fn setup_net_discards_a_fresh_net_on_first_iteration() {
        let mut rrg = Rrg::new(vec![sw()]);
        let source = rrg.add_node(node(RrNodeKind::Source));
        let sink = rrg.add_node(node(RrNodeKind::Sink));
        rrg.add_edge(source, sink, SwitchId(0));
        let mut scratch = ScratchTable::new(rrg.num_nodes());
        let net = Net {
            id: NetId(0),
            source,
            sinks: vec![sink],
            is_global: false,
            is_ignored: false,
            is_clock: false,
        };
        let (tree, remaining) = setup_net(&rrg, &mut scratch, &net, None, 1, 4, &HashSet::new());
        assert_eq!(tree.root(), tree.root());
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn route_net_reaches_every_sink_in_criticality_order() {
        let mut rrg = Rrg::new(vec![sw()]);
        let source = rrg.add_node(node(RrNodeKind::Source));
        let sink_a = rrg.add_node(node(RrNodeKind::Sink));
        let sink_b = rrg.add_node(node(RrNodeKind::Sink));
        rrg.add_edge(source, sink_a, SwitchId(0));
        rrg.add_edge(source, sink_b, SwitchId(0));

        let mut scratch = ScratchTable::new(rrg.num_nodes());
        let mut heap = BinaryHeap::new();
        let lookahead = NoOpLookahead;
        let mut timing = FixedCriticality(0.5);
        let net = Net {
            id: NetId(0),
            source,
            sinks: vec![sink_a, sink_b],
            is_global: false,
            is_ignored: false,
            is_clock: false,
        };
        let config = RouterConfig::default();
        let mut tree = RouteTree::new(net.id, net.source, net.sink_indices().collect());
        let remaining: HashSet<SinkIndex> = net.sink_indices().collect();
        let mut stats = IterationStats::default();

        route_net(
            &rrg,
            &mut heap,
            &mut scratch,
            &mut tree,
            &lookahead,
            None,
            &net,
            &remaining,
            &config,
            &mut timing,
            rrg.node(source).bbox,
            &mut stats,
        )
        .expect("both sinks reachable");

        assert!(tree.get_remaining_sinks().next().is_none());
        assert_eq!(stats.connections_routed, 2);
        assert_eq!(stats.nets_routed, 1);
    }
}
