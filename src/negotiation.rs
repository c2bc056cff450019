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

//! The outer Pathfinder negotiation loop (spec §4.5): repeat routing iterations while raising
//! present/historical congestion penalties until every node's occupancy fits its capacity,
//! snapshotting the best legal routing seen and aborting early when the predictor gives up hope.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::RouterConfig;
use crate::cost::{historical_cost_increment, present_cost};
use crate::error::{AbortReason, NegotiationError};
use crate::heap::HeapInterface;
use crate::lookahead::Lookahead;
use crate::net_router::{needs_forced_reroute, route_net, setup_net, LowerBoundDelays};
use crate::netlist::{Netlist, TimingInfo};
use crate::predictor::{should_abort, wirelength_abort};
use crate::route_tree::RouteTree;
use crate::rrg::RrgView;
use crate::scratch::ScratchTable;
use crate::stats::{IterationStats, OveruseInfo, RouterStats};
use crate::types::{BoundingBox, NetId, SinkIndex};

/// Timing summary used to rank candidate "best routing" snapshots (spec §4.5 convergence:
/// "ranked by sWNS > sTNS > hWNS > hTNS > wirelength").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingMetrics {
    /// Setup worst negative slack.
    pub swns: f64,
    /// Setup total negative slack.
    pub stns: f64,
    /// Hold worst negative slack.
    pub hwns: f64,
    /// Hold total negative slack.
    pub htns: f64,
    /// Total wirelength (sum of used RR node extents) of the snapshot.
    pub wirelength: u64,
}

impl TimingMetrics {
    /// Whether `self` is a strictly better snapshot than `other` by the ranking spec §4.5 names:
    /// sWNS first (larger, i.e. less negative, is better), then sTNS, hWNS, hTNS, and finally
    /// smaller wirelength as the final tie-break.
    pub fn better_than(&self, other: &TimingMetrics) -> bool {
        (self.swns, self.stns, self.hwns, self.htns, std::cmp::Reverse(self.wirelength))
            .partial_cmp(&(other.swns, other.stns, other.hwns, other.htns, std::cmp::Reverse(other.wirelength)))
            .map(|o| o == std::cmp::Ordering::Greater)
            .unwrap_or(false)
    }
}

/// A full snapshot of the best legal routing observed so far, so an early abort still returns
/// something usable instead of nothing (spec §4.5 supplemental: "best-routing snapshot").
#[derive(Debug, Clone)]
pub struct BestRouting {
    /// Iteration at which this snapshot was taken.
    pub iteration: usize,
    /// A deep copy of every net's route tree at that iteration.
    pub trees: HashMap<NetId, RouteTree>,
    /// The timing metrics used to rank this snapshot against later ones.
    pub metrics: TimingMetrics,
}

/// Final outcome of a completed negotiation run.
#[derive(Debug, Clone)]
pub struct NegotiationResult {
    /// The final (or best-known) per-net route trees.
    pub trees: HashMap<NetId, RouteTree>,
    /// Iteration at which the returned trees were produced.
    pub iteration: usize,
    /// Whether the returned trees are a fully legal (congestion-free) routing.
    pub converged: bool,
}

/// Run the negotiation loop to completion: iterate [`crate::net_router::route_net`] over every
/// net, update congestion penalties, and stop on convergence, reconvergence plateau, predictor
/// abort, or `max_router_iterations`.
#[allow(clippy::too_many_arguments)]
pub fn negotiate<R, H, L, N, T>(
    rrg: &R,
    mut heap: H,
    scratch: &mut ScratchTable,
    lookahead: &L,
    netlist: &N,
    timing: &mut T,
    config: &RouterConfig,
    full_device_bbox: BoundingBox,
) -> Result<NegotiationResult, NegotiationError>
where
    R: RrgView,
    H: HeapInterface,
    L: Lookahead,
    N: Netlist,
    T: TimingInfo,
{
    let mut trees: HashMap<NetId, RouteTree> = HashMap::new();
    let mut stats = RouterStats::new();
    let mut lower_bounds = LowerBoundDelays::new();
    let mut best: Option<BestRouting> = None;
    let mut present_factor = config.first_iter_pres_fac;
    let mut reroute_threshold = 4usize;
    let mut last_overused_nodes = 0u64;
    let mut forced_reroute: HashMap<NetId, HashSet<SinkIndex>> = HashMap::new();
    let empty_forced: HashSet<SinkIndex> = HashSet::new();

    for iteration in 1..=config.max_router_iterations {
        let conflicted = iteration as f64 >= config.conflicted_fraction * config.max_router_iterations as f64;
        if conflicted && iteration % 5 == 0 {
            reroute_threshold = usize::MAX;
        }

        let mut iter_stats = IterationStats::default();

        for net in netlist.nets() {
            if net.is_ignored {
                continue;
            }
            let existing = trees.get(&net.id);
            let forced = forced_reroute.get(&net.id).unwrap_or(&empty_forced);
            let (mut tree, remaining) =
                setup_net(rrg, scratch, net, existing, iteration, reroute_threshold, forced);

            route_net(
                rrg,
                &mut heap,
                scratch,
                &mut tree,
                lookahead,
                None,
                net,
                &remaining,
                config,
                timing,
                full_device_bbox,
                &mut iter_stats,
            )
            .map_err(|source| NegotiationError::NetUnrouteable { net: net.id, source })?;

            for sink in net.sink_indices() {
                if let Some(id) = tree.find_by_sink_index(sink) {
                    let delay = tree.node(id).t_del;
                    lower_bounds.observe(net.id, sink, delay);
                }
            }

            trees.insert(net.id, tree);
        }

        let overuse = compute_overuse(rrg, scratch);
        last_overused_nodes = overuse.overused_nodes;
        iter_stats.overuse = overuse;
        stats.push_iteration(iteration, iter_stats);

        debug!(
            "iteration {iteration}: {} overused nodes (present_factor={present_factor:.4})",
            overuse.overused_nodes
        );

        if overuse.overused_nodes == 0 {
            let metrics = TimingMetrics {
                swns: timing.setup_worst_negative_slack(),
                stns: timing.total_negative_slack(),
                hwns: timing.hold_worst_negative_slack(),
                htns: timing.hold_total_negative_slack(),
                wirelength: trees.values().map(|t| t.iter_nodes().count() as u64).sum(),
            };
            let is_better = best.as_ref().map(|b| metrics.better_than(&b.metrics)).unwrap_or(true);
            if is_better {
                best = Some(BestRouting {
                    iteration,
                    trees: trees.clone(),
                    metrics,
                });
                info!("iteration {iteration}: converged, new best routing snapshot");
            } else {
                info!("iteration {iteration}: reconverged without improving timing, stopping");
                return Ok(NegotiationResult {
                    trees,
                    iteration,
                    converged: true,
                });
            }
            present_factor = config.first_iter_pres_fac;
        }

        update_congestion(rrg, scratch, present_factor, config.acc_fac, iteration);

        if let Some(reason) = should_abort(config, stats.predictor_history(), overuse.overused_nodes) {
            warn!("iteration {iteration}: aborting ({reason:?})");
            return finish_on_abort(best, iteration, reason, overuse.overused_nodes);
        }
        if let Some(reason) = wirelength_abort(
            config,
            iteration,
            overuse.total_nodes.saturating_sub(overuse.overused_nodes),
            overuse.total_nodes.max(1),
        ) {
            warn!("iteration {iteration}: aborting ({reason:?})");
            return finish_on_abort(best, iteration, reason, overuse.overused_nodes);
        }

        present_factor = if iteration == 1 {
            config.initial_pres_fac
        } else {
            (present_factor * config.pres_fac_mult).min(config.max_pres_fac)
        };

        forced_reroute.clear();
        for net in netlist.nets() {
            if let Some(tree) = trees.get(&net.id) {
                for sink in net.sink_indices() {
                    if let Some(id) = tree.find_by_sink_index(sink) {
                        let criticality = timing.criticality(net.id, sink);
                        let delay = tree.node(id).t_del;
                        if needs_forced_reroute(
                            config,
                            criticality,
                            delay,
                            lower_bounds.get(net.id, sink),
                        ) {
                            debug!("net {:?} sink {:?} flagged for forced reroute", net.id, sink);
                            forced_reroute.entry(net.id).or_default().insert(sink);
                        }
                    }
                }
            }
        }
    }

    finish_on_abort(
        best,
        config.max_router_iterations,
        AbortReason::MaxIterations,
        last_overused_nodes,
    )
}

fn finish_on_abort(
    best: Option<BestRouting>,
    iteration: usize,
    reason: AbortReason,
    overused_nodes: u64,
) -> Result<NegotiationResult, NegotiationError> {
    if let Some(best) = best {
        return Ok(NegotiationResult {
            trees: best.trees,
            iteration: best.iteration,
            converged: true,
        });
    }
    Err(NegotiationError::Aborted {
        reason,
        iteration,
        overused_nodes: overused_nodes as usize,
    })
}

/// Update present/historical congestion penalties for every node with nonzero occupancy, per
/// spec §4.5 ("Historical update": `acc_cost += max(0, occ - capacity) * acc_factor`, first
/// iteration uses factor 0).
fn update_congestion<R: RrgView>(rrg: &R, scratch: &mut ScratchTable, present_factor: f64, acc_fac: f64, iteration: usize) {
    let acc_factor = if iteration == 1 { 0.0 } else { acc_fac };
    for i in 0..scratch.len() {
        let node = crate::types::RrNodeId::new(i);
        let occ = scratch.occ(node);
        if occ == 0 {
            continue;
        }
        let capacity = rrg.node(node).capacity;
        let pres = present_cost(occ, capacity, present_factor);
        scratch.set_pres_cost(node, pres);
        let delta = historical_cost_increment(occ, capacity, acc_factor);
        if delta > 0.0 {
            scratch.add_acc_cost(node, delta);
        }
    }
}

fn compute_overuse<R: RrgView>(rrg: &R, scratch: &ScratchTable) -> OveruseInfo {
    let mut info = OveruseInfo {
        total_nodes: scratch.len() as u64,
        ..Default::default()
    };
    for i in 0..scratch.len() {
        let node = crate::types::RrNodeId::new(i);
        let occ = scratch.occ(node);
        if occ == 0 {
            continue;
        }
        let capacity = rrg.node(node).capacity;
        if occ > capacity {
            let overuse = occ - capacity;
            info.overused_nodes += 1;
            info.total_overuse += overuse as u64;
            info.worst_overuse = info.worst_overuse.max(overuse);
        }
    }
    info
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn better_timing_metrics_ranks_higher_slack_first() {
        let a = TimingMetrics {
            swns: -1.0,
            stns: -5.0,
            hwns: 0.0,
            htns: 0.0,
            wirelength: 100,
        };
        let b = TimingMetrics {
            swns: -0.5,
            stns: -50.0,
            hwns: 0.0,
            htns: 0.0,
            wirelength: 10,
        };
        // b has better (less negative) swns despite worse stns/wirelength: swns dominates.
        assert!(b.better_than(&a));
        assert!(!a.better_than(&b));
    }

    #[test]
    fn equal_slack_falls_back_to_smaller_wirelength() {
        let a = TimingMetrics {
            swns: 0.0,
            stns: 0.0,
            hwns: 0.0,
            htns: 0.0,
            wirelength: 100,
        };
        let b = TimingMetrics {
            swns: 0.0,
            stns: 0.0,
            hwns: 0.0,
            htns: 0.0,
            wirelength: 50,
        };
        assert!(b.better_than(&a));
    }
}
