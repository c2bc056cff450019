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

//! The deterministic parallel connection router (spec §4.6): N worker threads cooperatively
//! expand a single search over a shared scratch table and heap, synchronizing per-node access
//! through a spin-then-block lock and terminating on heap-drain plus all-workers-idle.
//!
//! Feature-gated behind `parallel`; the serial router in [`crate::connection_router`] never
//! depends on anything here.

mod partition;
mod shared_scratch;

pub use partition::{partition_nets, route_partition_parallel, PartitionNode};
pub use shared_scratch::{NodeLock, SharedScratchTable};

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};

use crossbeam::utils::Backoff;

use crate::connection_router::tie_break_wins;
use crate::cost::{evaluate_edge, CongestionState, CostParams, EdgeContext};
use crate::error::ConnectionRouterError;
use crate::heap::{HeapEntry, HeapInterface};
use crate::lookahead::Lookahead;
use crate::rrg::RrgView;
use crate::types::{BoundingBox, NetId, NonConfigSetId, RrNodeId, RrNodeKind, SinkIndex};

/// A heap shared by every worker, guarded by a single lock (spec §4.6 "concurrent multi-queue").
/// Push/pop latency is dominated by the per-node lock contention in practice, so a plain mutex
/// around whichever [`HeapInterface`] variant is selected is sufficient; this is the one place
/// this module trades a literal lock-free structure for a safe, confidently-correct one.
#[derive(Debug)]
pub struct SharedHeap<H> {
    inner: Mutex<H>,
}

impl<H: HeapInterface> SharedHeap<H> {
    /// Wrap an existing heap for sharing across workers.
    pub fn new(heap: H) -> Self {
        Self {
            inner: Mutex::new(heap),
        }
    }

    fn push(&self, entry: HeapEntry) {
        self.inner.lock().expect("heap mutex poisoned").push(entry);
    }

    fn pop_min(&self) -> Option<HeapEntry> {
        self.inner.lock().expect("heap mutex poisoned").pop_min()
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().expect("heap mutex poisoned").is_empty()
    }

    fn build(&self) {
        self.inner.lock().expect("heap mutex poisoned").build();
    }

    fn empty(&self) {
        self.inner.lock().expect("heap mutex poisoned").empty();
    }

    /// Unwrap back to the plain heap once no worker threads remain.
    pub fn into_inner(self) -> H {
        self.inner.into_inner().expect("heap mutex poisoned")
    }
}

/// Everything workers need to drive one shared connection search, independent of the tree/
/// bookkeeping only the coordinating thread touches.
#[derive(Debug)]
pub struct ParallelSearch<'a, Rg, H, L> {
    rrg: &'a Rg,
    heap: &'a SharedHeap<H>,
    scratch: &'a SharedScratchTable,
    lookahead: &'a L,
    sink_node: RrNodeId,
    bbox: BoundingBox,
    full_device_bbox: BoundingBox,
    allow_bbox_prune: bool,
    cost_params: CostParams,
    /// Bit pattern of the best total cost at which `sink_node` has been popped so far, or
    /// `f64::INFINITY`'s bits if not yet reached (spec §4.6 "post-target pruning").
    best_sink_cost_bits: AtomicU64,
    idle_count: AtomicUsize,
    num_workers: usize,
    found_sink: AtomicBool,
}

/// Run the deterministic parallel single-connection search (spec §4.6). `num_workers` threads
/// (including the calling thread, which plays worker 0) cooperatively drain `heap`; termination
/// is heap-drain plus every worker idle. Returns the sink's [`HeapEntry`] as it was recorded in
/// `scratch` once at least one worker has popped it and no cheaper path remains possible.
#[allow(clippy::too_many_arguments)]
pub fn route_connection_parallel<Rg, H, L>(
    rrg: &Rg,
    heap: &SharedHeap<H>,
    scratch: &SharedScratchTable,
    lookahead: &L,
    sink_node: RrNodeId,
    bbox: BoundingBox,
    full_device_bbox: BoundingBox,
    allow_bbox_prune: bool,
    cost_params: CostParams,
    num_workers: usize,
) -> Result<HeapEntry, ConnectionRouterError>
where
    Rg: RrgView + Sync,
    H: HeapInterface + Send,
    L: Lookahead + Sync,
{
    heap.build();
    if heap.is_empty() {
        return Err(ConnectionRouterError::EmptyHeapAtStart {
            net: NetId(u32::MAX),
            sink: SinkIndex(0),
        });
    }

    let search = ParallelSearch {
        rrg,
        heap,
        scratch,
        lookahead,
        sink_node,
        bbox,
        full_device_bbox,
        allow_bbox_prune,
        cost_params,
        best_sink_cost_bits: AtomicU64::new(f64::INFINITY.to_bits()),
        idle_count: AtomicUsize::new(0),
        num_workers: num_workers.max(1),
        found_sink: AtomicBool::new(false),
    };
    let barrier = Barrier::new(search.num_workers);

    std::thread::scope(|scope| {
        for worker_id in 1..search.num_workers {
            let search = &search;
            let barrier = &barrier;
            scope.spawn(move || worker_loop(search, barrier, worker_id));
        }
        worker_loop(&search, &barrier, 0);
    });

    if search.found_sink.load(Ordering::Acquire) {
        commit_path_occupancy(scratch, sink_node);
        Ok(scratch.read(sink_node))
    } else {
        Err(ConnectionRouterError::Unrouteable {
            net: NetId(u32::MAX),
            sink: SinkIndex(0),
            sink_node,
        })
    }
}

/// Walk the winning path backward from `sink_node` via `prev_node`, incrementing occupancy for
/// every node it passes through, mirroring the serial router's `RouteTree::update_from_heap`
/// (which does the same for every node it splices into the tree). Stops without touching the
/// node at which `prev_node` is `None` — the search's seeded root, already accounted for by
/// whatever tree it was seeded from.
fn commit_path_occupancy(scratch: &SharedScratchTable, sink_node: RrNodeId) {
    let mut cursor = sink_node;
    loop {
        let entry = scratch.read(cursor);
        match entry.prev_node {
            Some(prev) => {
                scratch.incr_occ(cursor);
                cursor = prev;
            }
            None => break,
        }
    }
}

fn worker_loop<Rg, H, L>(search: &ParallelSearch<'_, Rg, H, L>, barrier: &Barrier, _worker_id: usize)
where
    Rg: RrgView + Sync,
    H: HeapInterface + Send,
    L: Lookahead + Sync,
{
    barrier.wait();
    loop {
        match search.heap.pop_min() {
            Some(popped) => {
                search.idle_count.fetch_sub(1, Ordering::AcqRel);
                expand_one(search, popped);
                search.idle_count.fetch_add(1, Ordering::AcqRel);
            }
            None => {
                search.idle_count.fetch_add(1, Ordering::AcqRel);
                let backoff = Backoff::new();
                loop {
                    if !search.heap.is_empty() {
                        search.idle_count.fetch_sub(1, Ordering::AcqRel);
                        break;
                    }
                    if search.idle_count.load(Ordering::Acquire) >= search.num_workers {
                        return;
                    }
                    backoff.snooze();
                }
            }
        }
    }
}

fn expand_one<Rg, H, L>(search: &ParallelSearch<'_, Rg, H, L>, popped: HeapEntry)
where
    Rg: RrgView + Sync,
    H: HeapInterface + Send,
    L: Lookahead + Sync,
{
    let current_best = f64::from_bits(search.best_sink_cost_bits.load(Ordering::Acquire));
    if popped.backward_cost > current_best {
        return;
    }

    if popped.node == search.sink_node {
        register_sink_reached(search, popped.total_cost);
        return;
    }

    let u = popped.node;
    let u_node = search.rrg.node(u);
    let mut entered_this_expansion: std::collections::HashSet<NonConfigSetId> = std::collections::HashSet::new();

    for (edge, v) in search.rrg.edges(u) {
        let v_node = search.rrg.node(v);

        if search.allow_bbox_prune && !v_node.bbox.intersects(&search.bbox) {
            continue;
        }
        if v_node.kind == RrNodeKind::IPin {
            let target_tile = search.rrg.node(search.sink_node).bbox;
            if !v_node.bbox.intersects(&target_tile) {
                continue;
            }
        }

        // Speculative pre-lock prune: an unlocked read of the incumbent cost to skip hopeless
        // candidates before paying for the lock (spec §4.6).
        let speculative = search.scratch.read_unlocked(v);
        let switch = search.rrg.switch(edge.switch);
        let same_set_already_entered = match v_node.non_config_set {
            Some(set) => !entered_this_expansion.insert(set),
            None => false,
        };
        let ctx = EdgeContext {
            from_kind: u_node.kind,
            from_r: u_node.r,
            from_r_upstream: popped.r_upstream,
            from_backward_cost: popped.backward_cost,
            to_kind: v_node.kind,
            to_r: v_node.r,
            to_c: v_node.c,
            to_base_cost: search.rrg.base_cost(v),
        };
        let speculative_cost = evaluate_edge(
            &ctx,
            switch,
            CongestionState {
                acc_cost: speculative.acc_cost,
                pres_cost: speculative.pres_cost,
            },
            &search.cost_params,
            same_set_already_entered,
        );
        if speculative_cost.backward_cost >= speculative.path_cost_lower_bound() {
            continue;
        }

        let guard = search.scratch.lock(v);
        let existing = guard.read();
        let congestion = CongestionState {
            acc_cost: existing.acc_cost,
            pres_cost: existing.pres_cost,
        };
        let edge_cost = evaluate_edge(&ctx, switch, congestion, &search.cost_params, same_set_already_entered);
        let h = search.cost_params.astar_factor
            * search.lookahead.expected_cost(v, search.sink_node, edge_cost.r_upstream);
        let new_total = edge_cost.backward_cost + h;

        let accept = new_total < existing.path_cost
            || (new_total == existing.path_cost && tie_break_wins(Some(u), existing.prev_node));
        if !accept {
            drop(guard);
            continue;
        }

        guard.write(
            new_total,
            edge_cost.backward_cost,
            Some(u),
            Some(edge.switch),
            edge_cost.r_upstream,
        );
        drop(guard);

        search.heap.push(HeapEntry {
            node: v,
            total_cost: new_total,
            backward_cost: edge_cost.backward_cost,
            prev_node: Some(u),
            prev_switch: Some(edge.switch),
            r_upstream: edge_cost.r_upstream,
        });
    }
}

fn register_sink_reached<Rg, H, L>(search: &ParallelSearch<'_, Rg, H, L>, total_cost: f64)
where
    Rg: RrgView + Sync,
    H: HeapInterface + Send,
    L: Lookahead + Sync,
{
    search.found_sink.store(true, Ordering::Release);
    let mut current = search.best_sink_cost_bits.load(Ordering::Acquire);
    loop {
        let current_f = f64::from_bits(current);
        if total_cost >= current_f {
            break;
        }
        match search.best_sink_cost_bits.compare_exchange_weak(
            current,
            total_cost.to_bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::heap::BinaryHeap;
    use crate::lookahead::NoOpLookahead;
    use crate::rrg::{RrNode, Rrg, Switch};
    use crate::types::SwitchId;

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
    fn parallel_search_reaches_the_sink_regardless_of_worker_count() {
        let mut rrg = Rrg::new(vec![sw()]);
        let source = rrg.add_node(node(RrNodeKind::Source));
        let mid = rrg.add_node(node(RrNodeKind::ChanX));
        let sink = rrg.add_node(node(RrNodeKind::Sink));
        rrg.add_edge(source, mid, SwitchId(0));
        rrg.add_edge(mid, sink, SwitchId(0));

        for workers in [1usize, 2, 4] {
            let scratch = SharedScratchTable::new(rrg.num_nodes());
            let mut heap = BinaryHeap::new();
            heap.push(HeapEntry {
                node: source,
                total_cost: 0.0,
                backward_cost: 0.0,
                prev_node: None,
                prev_switch: None,
                r_upstream: 0.0,
            });
            let shared_heap = SharedHeap::new(heap);
            let lookahead = NoOpLookahead;
            let params = CostParams {
                criticality: 0.0,
                astar_factor: 1.0,
                bend_cost: 0.0,
                choking_discount: None,
            };

            let result = route_connection_parallel(
                &rrg,
                &shared_heap,
                &scratch,
                &lookahead,
                sink,
                rrg.node(sink).bbox,
                rrg.node(sink).bbox,
                false,
                params,
                workers,
            )
            .expect("path exists regardless of worker count");
            assert_eq!(result.node, sink);
        }
    }
}
