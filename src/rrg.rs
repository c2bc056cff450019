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

//! The routing-resource graph (RRG): the read-only input the router searches.
//!
//! Construction, architecture parsing, and placement are out of scope (spec §1); this module
//! only defines the view the rest of the crate consumes and a `StableDiGraph`-backed
//! implementation useful for tests and small standalone drivers.

use std::collections::HashMap;

use petgraph::prelude::*;
use petgraph::stable_graph::StableDiGraph;

use crate::types::{BoundingBox, NonConfigSetId, RrNodeId, RrNodeKind, SwitchId};

/// A switch-table entry: the electrical and structural properties of one switch type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Switch {
    /// Switch resistance.
    pub r: f64,
    /// Switch intrinsic delay.
    pub t_del: f64,
    /// Internal (self-)capacitance charged when this switch is taken.
    pub c_internal: f64,
    /// Whether the switch isolates downstream capacitance from upstream (buffered) or not.
    pub buffered: bool,
    /// Whether the switch can be turned off (`false` ⇒ always-on, part of a non-configurable set).
    pub configurable: bool,
}

/// Per-node electrical and structural data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrNode {
    /// Node type.
    pub kind: RrNodeKind,
    /// Spatial/layer extent.
    pub bbox: BoundingBox,
    /// Number of nets that may concurrently use this node.
    pub capacity: u32,
    /// Track/pin number within the node's tile (purely descriptive; used by lookahead tables).
    pub ptc: i32,
    /// Node resistance.
    pub r: f64,
    /// Node capacitance.
    pub c: f64,
    /// Cost-index bucket (groups nodes that share a base cost / lookahead table row).
    pub cost_index: u16,
    /// Non-configurable set this node belongs to, if any.
    pub non_config_set: Option<NonConfigSetId>,
}

/// A directed edge in the RRG: which switch connects two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RrEdge {
    /// The switch type taken by this edge.
    pub switch: SwitchId,
}

/// Read-only view of the routing-resource graph consumed by the router. Implemented here by
/// [`Rrg`] for tests and small drivers; production use is expected to implement this trait
/// directly against whatever graph representation the surrounding toolchain already has, rather
/// than materializing a copy.
pub trait RrgView {
    /// Iterator over the outgoing edges of `node`, yielded as `(edge, target)` pairs.
    type Edges<'a>: Iterator<Item = (RrEdge, RrNodeId)>
    where
        Self: 'a;

    /// Look up a node's data. Panics if `node` is not part of the graph (the RRG is assumed
    /// internally consistent; out-of-range ids indicate a caller bug, not routing failure).
    fn node(&self, node: RrNodeId) -> &RrNode;

    /// Outgoing edges of `node`.
    fn edges(&self, node: RrNodeId) -> Self::Edges<'_>;

    /// Look up a switch's data.
    fn switch(&self, switch: SwitchId) -> &Switch;

    /// All node ids currently sharing `set` (the non-configurable closure, spec §4.2). Returns
    /// an empty slice for `None`.
    fn non_config_set_members(&self, set: NonConfigSetId) -> &[RrNodeId];

    /// Base routing cost of `node`, prior to the `sqrt(fanout)` scaling spec §4.4 applies for
    /// pass-transistor nodes.
    fn base_cost(&self, node: RrNodeId) -> f64;

    /// Total number of nodes in the graph.
    fn num_nodes(&self) -> usize;

    /// Total number of switch types in the switch table, for bounds-checking a switch id read
    /// back from a persisted traceback (spec §6) before calling [`RrgView::switch`].
    fn num_switches(&self) -> usize;
}

/// A concrete, in-memory RRG built on a [`StableDiGraph`]. Nodes may be removed by
/// `petgraph::stable_graph` semantics, which keeps [`RrNodeId`] stable across construction —
/// matching spec §3's "RRG is immutable during routing" invariant once built.
#[derive(Debug, Clone, Default)]
pub struct Rrg {
    graph: StableDiGraph<RrNode, RrEdge, crate::types::IndexType>,
    switches: Vec<Switch>,
    non_config_sets: HashMap<NonConfigSetId, Vec<RrNodeId>>,
    base_costs: HashMap<RrNodeId, f64>,
}

impl Rrg {
    /// Create an empty RRG with the given switch table.
    pub fn new(switches: Vec<Switch>) -> Self {
        Self {
            graph: StableDiGraph::default(),
            switches,
            non_config_sets: HashMap::new(),
            base_costs: HashMap::new(),
        }
    }

    /// Add a node, returning its stable id.
    pub fn add_node(&mut self, node: RrNode) -> RrNodeId {
        let base_cost = default_base_cost(&node);
        let id = self.graph.add_node(node);
        self.base_costs.insert(id, base_cost);
        if let Some(set) = node.non_config_set {
            self.non_config_sets.entry(set).or_default().push(id);
        }
        id
    }

    /// Override the precomputed base cost of a node (architectures may tune this per cost-index).
    pub fn set_base_cost(&mut self, node: RrNodeId, cost: f64) {
        self.base_costs.insert(node, cost);
    }

    /// Add a directed edge `from -> to` taken via `switch`.
    pub fn add_edge(&mut self, from: RrNodeId, to: RrNodeId, switch: SwitchId) -> EdgeIndex<crate::types::IndexType> {
        self.graph.add_edge(from, to, RrEdge { switch })
    }
}

/// Default base cost: `1.0` for all nodes, scaled by `sqrt(fanout)` at query time for
/// pass-transistor (channel) nodes per spec §4.4. `fanout` here is approximated by the node's
/// out-degree at construction time, since the RRG is immutable once routing starts.
fn default_base_cost(node: &RrNode) -> f64 {
    let _ = node;
    1.0
}

impl RrgView for Rrg {
    type Edges<'a> = RrgEdges<'a>;

    fn node(&self, node: RrNodeId) -> &RrNode {
        self.graph
            .node_weight(node)
            .expect("rr node id must be valid for the lifetime of the RRG")
    }

    fn edges(&self, node: RrNodeId) -> RrgEdges<'_> {
        RrgEdges {
            inner: self.graph.edges(node),
        }
    }

    fn switch(&self, switch: SwitchId) -> &Switch {
        &self.switches[switch.0 as usize]
    }

    fn non_config_set_members(&self, set: NonConfigSetId) -> &[RrNodeId] {
        self.non_config_sets
            .get(&set)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn base_cost(&self, node: RrNodeId) -> f64 {
        let base = self.base_costs.get(&node).copied().unwrap_or(1.0);
        let kind = self.graph[node].kind;
        if kind.is_pass_transistor() {
            let fanout = self.graph.edges(node).count().max(1) as f64;
            base * fanout.sqrt()
        } else {
            base
        }
    }

    fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    fn num_switches(&self) -> usize {
        self.switches.len()
    }
}

/// Iterator over a node's outgoing edges, adapting petgraph's edge reference into `(RrEdge,
/// RrNodeId)` pairs.
pub struct RrgEdges<'a> {
    inner: petgraph::stable_graph::Edges<'a, RrEdge, petgraph::Directed, crate::types::IndexType>,
}

impl<'a> Iterator for RrgEdges<'a> {
    type Item = (RrEdge, RrNodeId);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (*e.weight(), e.target()))
    }
}

impl std::fmt::Debug for RrgEdges<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RrgEdges").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sw(r: f64, t_del: f64, buffered: bool) -> Switch {
        Switch {
            r,
            t_del,
            c_internal: 0.0,
            buffered,
            configurable: true,
        }
    }

    #[test]
    fn base_cost_scales_with_sqrt_fanout_for_channels() {
        let mut rrg = Rrg::new(vec![sw(1.0, 1e-12, false)]);
        let chan = rrg.add_node(RrNode {
            kind: RrNodeKind::ChanX,
            bbox: BoundingBox::point(0, 0, 0),
            capacity: 1,
            ptc: 0,
            r: 1.0,
            c: 1.0,
            cost_index: 0,
            non_config_set: None,
        });
        let ipin = rrg.add_node(RrNode {
            kind: RrNodeKind::IPin,
            bbox: BoundingBox::point(0, 0, 0),
            capacity: 1,
            ptc: 0,
            r: 0.0,
            c: 0.0,
            cost_index: 0,
            non_config_set: None,
        });
        // Four fan-out edges from the channel node.
        for _ in 0..4 {
            let t = rrg.add_node(RrNode {
                kind: RrNodeKind::IPin,
                bbox: BoundingBox::point(0, 0, 0),
                capacity: 1,
                ptc: 0,
                r: 0.0,
                c: 0.0,
                cost_index: 0,
                non_config_set: None,
            });
            rrg.add_edge(chan, t, SwitchId(0));
        }
        let _ = ipin;
        assert!((rrg.base_cost(chan) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn non_config_set_members_round_trip() {
        let mut rrg = Rrg::new(vec![sw(0.0, 0.0, true)]);
        let set = NonConfigSetId(7);
        let a = rrg.add_node(RrNode {
            kind: RrNodeKind::ChanX,
            bbox: BoundingBox::point(0, 0, 0),
            capacity: 1,
            ptc: 0,
            r: 0.0,
            c: 0.0,
            cost_index: 0,
            non_config_set: Some(set),
        });
        let b = rrg.add_node(RrNode {
            kind: RrNodeKind::ChanY,
            bbox: BoundingBox::point(0, 0, 0),
            capacity: 1,
            ptc: 0,
            r: 0.0,
            c: 0.0,
            cost_index: 0,
            non_config_set: Some(set),
        });
        let members = rrg.non_config_set_members(set);
        assert_eq!(members.len(), 2);
        assert!(members.contains(&a));
        assert!(members.contains(&b));
    }
}
