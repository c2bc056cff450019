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

//! Min-priority queues driving the connection router's A* search (spec §4.1).
//!
//! Two implementations share the [`HeapInterface`] contract: [`binary::BinaryHeap`] (exact
//! ordering, d-ary array) and [`bucket::BucketHeap`] (approximate ordering, near-linear
//! amortized cost, randomized tie-break). Both traffic in [`HeapEntry`], the full scratch tuple
//! needed to reconstruct a path on pop.

pub mod binary;
pub mod bucket;

pub use binary::BinaryHeap;
pub use bucket::BucketHeap;

use ordered_float::NotNan;

use crate::types::{RrNodeId, SwitchId};

/// The record pushed to and popped from a heap: enough of the per-node scratch state to verify,
/// on pop, that the entry is still the best known path to `node` (the "post-heap prune").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapEntry {
    /// RR node this entry routes to.
    pub node: RrNodeId,
    /// Estimated total cost (`backward_cost + h`); the heap's sort key.
    pub total_cost: f64,
    /// True cost accumulated so far (`g`).
    pub backward_cost: f64,
    /// The node this one was reached from, for backtracing. `None` only for the search's
    /// virtual root (a live route-tree node the search was seeded from).
    pub prev_node: Option<RrNodeId>,
    /// The switch taken from `prev_node` to reach `node`. `None` iff `prev_node` is `None`.
    pub prev_switch: Option<SwitchId>,
    /// Upstream resistance to ground at `node`, needed to continue the Elmore delay chain.
    pub r_upstream: f64,
}

impl HeapEntry {
    pub(crate) fn key(&self) -> NotNan<f64> {
        NotNan::new(self.total_cost).expect("router costs must never be NaN")
    }
}

/// Contract shared by every heap variant (spec §4.1). All operations are infallible given
/// correct API use: a pop from an empty heap returns `None`, which the connection router
/// interprets as "no path".
pub trait HeapInterface {
    /// Add an entry. May temporarily violate the heap property if several pushes are meant to be
    /// followed by a single [`HeapInterface::build`].
    fn push(&mut self, entry: HeapEntry);

    /// Extract the minimum-cost entry, skipping any entries invalidated by a cheaper push since
    /// they were inserted.
    fn pop_min(&mut self) -> Option<HeapEntry>;

    /// Restore the heap property after a batch of `push` calls (O(n) sift-down for the binary
    /// variant; a no-op for the bucket variant, which has no invariant to restore).
    fn build(&mut self);

    /// Remove every entry.
    fn empty(&mut self);

    /// Whether the heap currently holds no entries.
    fn is_empty(&self) -> bool;

    /// Debug-only sanity check of internal structure.
    fn is_valid(&self) -> bool;
}
