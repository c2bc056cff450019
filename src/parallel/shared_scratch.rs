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

//! A shared, per-node-locked variant of [`crate::scratch::ScratchTable`] for the parallel
//! connection router (spec §4.6): one [`NodeLock`] per RRG node, acquired only around the
//! read-modify-write of that node's `node_route_inf` entry.
//!
//! The lock itself is a spin-then-block mutex: workers busy-spin for a bounded number of
//! iterations (via [`crossbeam::utils::Backoff`]) before falling back to a blocking
//! [`std::sync::Mutex`] acquisition, so short-lived contention never pays OS scheduling cost
//! while long-lived contention still parks instead of burning a core.

use std::sync::{Mutex, MutexGuard};

use crossbeam::utils::Backoff;

use crate::scratch::NodeRouteInf;
use crate::types::{RrNodeId, SwitchId};

/// Per-node spin-then-block lock guarding one [`NodeRouteInf`] entry.
#[derive(Debug)]
pub struct NodeLock {
    inner: Mutex<NodeRouteInf>,
}

impl NodeLock {
    fn new() -> Self {
        Self {
            inner: Mutex::new(NodeRouteInf::default()),
        }
    }

    fn acquire(&self) -> MutexGuard<'_, NodeRouteInf> {
        let backoff = Backoff::new();
        loop {
            if let Ok(guard) = self.inner.try_lock() {
                return guard;
            }
            if backoff.is_completed() {
                return self.inner.lock().expect("node lock poisoned");
            }
            backoff.snooze();
        }
    }
}

/// A held lock on one node's scratch entry, handed out by [`SharedScratchTable::lock`].
#[derive(Debug)]
pub struct NodeGuard<'a> {
    guard: MutexGuard<'a, NodeRouteInf>,
}

impl NodeGuard<'_> {
    /// Snapshot the entry's current contents.
    pub fn read(&self) -> NodeRouteInf {
        *self.guard
    }

    /// Overwrite the search-local fields, as [`crate::scratch::ScratchTable::record_search_update`]
    /// does for the serial router.
    pub fn write(
        mut self,
        path_cost: f64,
        backward_cost: f64,
        prev_node: Option<RrNodeId>,
        prev_switch: Option<SwitchId>,
        r_upstream: f64,
    ) {
        self.guard.path_cost = path_cost;
        self.guard.backward_cost = backward_cost;
        self.guard.prev_node = prev_node;
        self.guard.prev_switch = prev_switch;
        self.guard.r_upstream = r_upstream;
    }
}

/// An unlocked, best-effort read of a node's congestion state, used only to decide whether it is
/// worth paying for the real lock (spec §4.6 "pre-lock filter"). When the node is currently held
/// by another worker this reports neutral/never-prune defaults rather than blocking, so the
/// speculative check degrades to "always take the lock" under contention instead of racing.
#[derive(Debug, Clone, Copy)]
pub struct SpeculativeRead {
    /// `acc_cost` as last observed, or the untouched default `1.0` if the node was contended.
    pub acc_cost: f64,
    /// `pres_cost` as last observed, or the untouched default `1.0` if the node was contended.
    pub pres_cost: f64,
    path_cost: f64,
}

impl SpeculativeRead {
    /// The lowest backward cost that could possibly beat the incumbent, for the pre-lock prune.
    /// `+inf` (never prunes) when the node was contended and so has no known value.
    pub fn path_cost_lower_bound(&self) -> f64 {
        self.path_cost
    }
}

/// The full per-node-locked scratch table shared by all parallel-search workers.
#[derive(Debug)]
pub struct SharedScratchTable {
    entries: Vec<NodeLock>,
}

impl SharedScratchTable {
    /// Create a table sized for `num_nodes` RRG nodes, all in the untouched default state.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            entries: (0..num_nodes).map(|_| NodeLock::new()).collect(),
        }
    }

    /// Acquire the lock on `node`'s entry for a read-modify-write.
    pub fn lock(&self, node: RrNodeId) -> NodeGuard<'_> {
        NodeGuard {
            guard: self.entries[node.index()].acquire(),
        }
    }

    /// Blocking snapshot read of `node`'s entry (used once a search has concluded, outside the
    /// hot expansion loop).
    pub fn read(&self, node: RrNodeId) -> crate::heap::HeapEntry {
        let entry = *self.entries[node.index()].acquire();
        crate::heap::HeapEntry {
            node,
            total_cost: entry.path_cost,
            backward_cost: entry.backward_cost,
            prev_node: entry.prev_node,
            prev_switch: entry.prev_switch,
            r_upstream: entry.r_upstream,
        }
    }

    /// Opportunistic, non-blocking read for the pre-lock speculative prune. Returns neutral
    /// defaults (never prunes) if the node is currently locked by another worker.
    pub fn read_unlocked(&self, node: RrNodeId) -> SpeculativeRead {
        match self.entries[node.index()].inner.try_lock() {
            Ok(entry) => SpeculativeRead {
                acc_cost: entry.acc_cost,
                pres_cost: entry.pres_cost,
                path_cost: entry.path_cost,
            },
            Err(_) => SpeculativeRead {
                acc_cost: 1.0,
                pres_cost: 1.0,
                path_cost: f64::INFINITY,
            },
        }
    }

    /// Current occupancy of `node`, as last committed by [`SharedScratchTable::incr_occ`]/
    /// [`SharedScratchTable::decr_occ`].
    pub fn occ(&self, node: RrNodeId) -> u32 {
        self.entries[node.index()].acquire().occ
    }

    /// Record that one more net now uses `node`, mirroring
    /// [`crate::scratch::ScratchTable::incr_occ`] for the per-node-locked table.
    pub fn incr_occ(&self, node: RrNodeId) {
        self.entries[node.index()].acquire().occ += 1;
    }

    /// Record that a net no longer uses `node`, mirroring
    /// [`crate::scratch::ScratchTable::decr_occ`].
    pub fn decr_occ(&self, node: RrNodeId) {
        let mut guard = self.entries[node.index()].acquire();
        debug_assert!(guard.occ > 0, "occupancy underflow on node {:?}", node);
        guard.occ = guard.occ.saturating_sub(1);
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
    fn write_then_read_round_trips_through_the_lock() {
        let table = SharedScratchTable::new(2);
        let n0 = RrNodeId::new(0);
        let guard = table.lock(n0);
        guard.write(1.5, 1.0, None, None, 3.0);
        let entry = table.read(n0);
        assert_eq!(entry.total_cost, 1.5);
        assert_eq!(entry.backward_cost, 1.0);
        assert_eq!(entry.r_upstream, 3.0);
    }

    #[test]
    fn untouched_node_reports_infinite_path_cost() {
        let table = SharedScratchTable::new(1);
        let n0 = RrNodeId::new(0);
        assert!(!table.read(n0).total_cost.is_finite());
        assert!(!table.read_unlocked(n0).path_cost_lower_bound().is_finite());
    }
}
