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

//! Router instrumentation (spec §3): per-iteration and cumulative counters, congestion
//! snapshots, and the ordered overuse history the abort predictor fits against.

use crate::types::RrNodeKind;

/// Whether a heap push/pop happened while expanding within the connection's own net/cluster or
/// crossing into another, per spec §3's "split by inter/intra-cluster" stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLocality {
    /// Expansion stayed within the source connection's local cluster.
    Intra,
    /// Expansion crossed into another cluster.
    Inter,
}

/// Counters accumulated during a single routing iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IterationStats {
    /// Connections (sink searches) attempted this iteration.
    pub connections_routed: u64,
    /// Distinct nets routed this iteration.
    pub nets_routed: u64,
    /// Heap pushes while expanding within a connection's own cluster.
    pub heap_pushes_intra: u64,
    /// Heap pushes while expanding across clusters.
    pub heap_pushes_inter: u64,
    /// Heap pops within a connection's own cluster.
    pub heap_pops_intra: u64,
    /// Heap pops across clusters.
    pub heap_pops_inter: u64,
    /// Nodes spliced into route trees.
    pub route_tree_pushes: u64,
    /// Congestion snapshot taken at the end of this iteration.
    pub overuse: OveruseInfo,
}

impl IterationStats {
    /// Record a heap push of a node of kind `kind`, bucketed by locality.
    pub fn record_push(&mut self, locality: ClusterLocality, _kind: RrNodeKind) {
        match locality {
            ClusterLocality::Intra => self.heap_pushes_intra += 1,
            ClusterLocality::Inter => self.heap_pushes_inter += 1,
        }
    }

    /// Record a heap pop, bucketed by locality.
    pub fn record_pop(&mut self, locality: ClusterLocality) {
        match locality {
            ClusterLocality::Intra => self.heap_pops_intra += 1,
            ClusterLocality::Inter => self.heap_pops_inter += 1,
        }
    }
}

/// Congestion snapshot: how much of the device is currently overused.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OveruseInfo {
    /// Total RRG nodes considered.
    pub total_nodes: u64,
    /// Nodes whose occupancy exceeds capacity.
    pub overused_nodes: u64,
    /// Sum of `occ - capacity` over all overused nodes.
    pub total_overuse: u64,
    /// Largest single-node `occ - capacity`.
    pub worst_overuse: u32,
}

/// Running totals plus the full per-iteration history, mirroring the teacher's convention of
/// keeping both a cumulative summary and an ordered event log.
#[derive(Debug, Clone, Default)]
pub struct RouterStats {
    /// Cumulative totals across every iteration so far.
    pub totals: IterationStats,
    /// One entry per completed iteration, in order.
    pub history: Vec<IterationStats>,
    /// `(iteration, overused_node_count)` pairs, the input to the abort predictor's linear fit.
    predictor_history: Vec<(usize, u64)>,
}

impl RouterStats {
    /// Create an empty stats accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `iter` into the running totals and append it to the history.
    pub fn push_iteration(&mut self, iteration: usize, iter: IterationStats) {
        self.totals.connections_routed += iter.connections_routed;
        self.totals.nets_routed += iter.nets_routed;
        self.totals.heap_pushes_intra += iter.heap_pushes_intra;
        self.totals.heap_pushes_inter += iter.heap_pushes_inter;
        self.totals.heap_pops_intra += iter.heap_pops_intra;
        self.totals.heap_pops_inter += iter.heap_pops_inter;
        self.totals.route_tree_pushes += iter.route_tree_pushes;
        self.predictor_history.push((iteration, iter.overuse.overused_nodes));
        self.history.push(iter);
    }

    /// The `(iteration, overused_node_count)` history the abort predictor consumes.
    pub fn predictor_history(&self) -> &[(usize, u64)] {
        &self.predictor_history
    }
}
