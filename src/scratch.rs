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

//! The per-node routing scratch table (`node_route_inf`, spec §3): one entry per RRG node,
//! split into search-local fields (reset between sinks via the "modified list" pattern) and
//! persistent congestion fields (carried across iterations until the negotiation loop updates
//! them).

use crate::types::{RrNodeId, SwitchId};

/// One node's routing scratch entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRouteInf {
    /// `f + g`: the heap key last pushed for this node, or `+inf` if untouched this search.
    pub path_cost: f64,
    /// `g`: true cost accumulated so far in the current search.
    pub backward_cost: f64,
    /// The node this node was reached from in the current search, for backtracing.
    pub prev_node: Option<RrNodeId>,
    /// The switch taken from `prev_node` to reach this node.
    pub prev_switch: Option<SwitchId>,
    /// Upstream resistance to ground, valid only alongside a finite `path_cost`.
    pub r_upstream: f64,
    /// Current number of nets using this node.
    pub occ: u32,
    /// Historical (accumulated) congestion penalty.
    pub acc_cost: f64,
    /// Present congestion penalty, cached from [`crate::cost::present_cost`].
    pub pres_cost: f64,
    /// Whether this node is the active search's target sink.
    pub target_flag: bool,
}

impl Default for NodeRouteInf {
    fn default() -> Self {
        Self {
            path_cost: f64::INFINITY,
            backward_cost: f64::INFINITY,
            prev_node: None,
            prev_switch: None,
            r_upstream: 0.0,
            occ: 0,
            acc_cost: 1.0,
            pres_cost: 1.0,
            target_flag: false,
        }
    }
}

/// The full scratch table plus the "modified list" of nodes touched by the in-progress search,
/// so resetting between sinks costs O(modified) instead of O(|V|) (spec §3, §9).
#[derive(Debug, Clone)]
pub struct ScratchTable {
    entries: Vec<NodeRouteInf>,
    modified: Vec<RrNodeId>,
}

impl ScratchTable {
    /// Create a table sized for `num_nodes` RRG nodes, all in the untouched default state.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            entries: vec![NodeRouteInf::default(); num_nodes],
            modified: Vec::new(),
        }
    }

    /// Read a node's entry.
    pub fn get(&self, node: RrNodeId) -> &NodeRouteInf {
        &self.entries[node.index()]
    }

    /// Set the search-local fields of `node` and record it in the modified list so it can be
    /// reset in O(1) amortized when the search ends.
    #[allow(clippy::too_many_arguments)]
    pub fn record_search_update(
        &mut self,
        node: RrNodeId,
        path_cost: f64,
        backward_cost: f64,
        prev_node: Option<RrNodeId>,
        prev_switch: Option<SwitchId>,
        r_upstream: f64,
    ) {
        let was_untouched = !self.entries[node.index()].path_cost.is_finite();
        let e = &mut self.entries[node.index()];
        e.path_cost = path_cost;
        e.backward_cost = backward_cost;
        e.prev_node = prev_node;
        e.prev_switch = prev_switch;
        e.r_upstream = r_upstream;
        if was_untouched {
            self.modified.push(node);
        }
    }

    /// Mark `node` as the active search's target.
    pub fn set_target(&mut self, node: RrNodeId, target: bool) {
        self.entries[node.index()].target_flag = target;
    }

    /// Reset every node touched since the last reset back to "untouched" (`path_cost = +inf`),
    /// per the modified-list pattern. Returns the number of nodes reset, for stats.
    pub fn reset_search_fields(&mut self) -> usize {
        let n = self.modified.len();
        for node in self.modified.drain(..) {
            let e = &mut self.entries[node.index()];
            e.path_cost = f64::INFINITY;
            e.backward_cost = f64::INFINITY;
            e.prev_node = None;
            e.prev_switch = None;
            e.target_flag = false;
        }
        n
    }

    /// Current occupancy of `node`.
    pub fn occ(&self, node: RrNodeId) -> u32 {
        self.entries[node.index()].occ
    }

    /// Increment `node`'s occupancy by one (a net has started using it).
    pub fn incr_occ(&mut self, node: RrNodeId) {
        self.entries[node.index()].occ += 1;
    }

    /// Decrement `node`'s occupancy by one (a net has stopped using it, e.g. via pruning).
    pub fn decr_occ(&mut self, node: RrNodeId) {
        let occ = &mut self.entries[node.index()].occ;
        debug_assert!(*occ > 0, "occupancy underflow on node {node:?}");
        *occ = occ.saturating_sub(1);
    }

    /// Add `delta` to `node`'s historical cost (spec §4.5 historical update).
    pub fn add_acc_cost(&mut self, node: RrNodeId, delta: f64) {
        self.entries[node.index()].acc_cost += delta;
    }

    /// Reset `node`'s historical cost (used when re-routing a design cleanly).
    pub fn set_acc_cost(&mut self, node: RrNodeId, value: f64) {
        self.entries[node.index()].acc_cost = value;
    }

    /// Overwrite `node`'s cached present-cost.
    pub fn set_pres_cost(&mut self, node: RrNodeId, value: f64) {
        self.entries[node.index()].pres_cost = value;
    }

    /// Number of RRG nodes this table covers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table covers zero nodes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_only_touches_modified_nodes() {
        let mut t = ScratchTable::new(4);
        let n0 = RrNodeId::new(0);
        let n1 = RrNodeId::new(1);
        t.record_search_update(n0, 1.0, 1.0, None, None, 0.0);
        t.record_search_update(n1, 2.0, 2.0, Some(n0), None, 0.0);
        assert_eq!(t.reset_search_fields(), 2);
        assert_eq!(t.get(n0).path_cost, f64::INFINITY);
        assert_eq!(t.get(n1).path_cost, f64::INFINITY);
        // Persistent fields are untouched by reset.
        t.incr_occ(n0);
        assert_eq!(t.occ(n0), 1);
        t.reset_search_fields();
        assert_eq!(t.occ(n0), 1);
    }

    #[test]
    fn untouched_node_path_cost_is_infinite() {
        let t = ScratchTable::new(1);
        assert!(!t.get(RrNodeId::new(0)).path_cost.is_finite());
    }
}
