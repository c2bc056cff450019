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

//! Partitioning nets across workers by geography (spec §4.6 "Partitioning across nets"): nets
//! whose bounding boxes land entirely within disjoint regions of the device can be routed truly
//! concurrently with no shared-node contention at all, leaving the per-node lock in
//! [`super::shared_scratch`] for the rarer case of a net that spans a partition boundary.

use crossbeam::deque::{Injector, Steal};

use crate::types::{BoundingBox, NetId};

/// One node of the bbox-bisection partition tree built by [`partition_nets`].
#[derive(Debug, Clone)]
pub struct PartitionNode {
    /// The region of the device this node covers.
    pub bbox: BoundingBox,
    /// Nets whose bounding box fits entirely within `bbox` and within a leaf (only populated on
    /// leaves; internal nodes push everything down to children or up to `boundary_nets`).
    pub nets: Vec<NetId>,
    /// Nets whose bounding box straddles this node's child split, and so must be routed after
    /// both children have finished (serialized, on the root thread of
    /// [`route_partition_parallel`]) rather than concurrently with either child's work.
    pub boundary_nets: Vec<NetId>,
    /// The two children from bisecting `bbox`, or `None` if this is a leaf.
    pub children: Option<(Box<PartitionNode>, Box<PartitionNode>)>,
}

impl PartitionNode {
    fn leaf(bbox: BoundingBox, nets: Vec<NetId>) -> Self {
        Self {
            bbox,
            nets,
            boundary_nets: Vec::new(),
            children: None,
        }
    }
}

/// Build a partition tree over `nets` (each paired with its routing bounding box), bisecting
/// along whichever axis is wider at each level and stopping once a region holds at most
/// `leaf_size` nets or can no longer be split. Nets that straddle a split are hoisted into that
/// node's `boundary_nets` rather than duplicated into both children.
pub fn partition_nets(nets: &[(NetId, BoundingBox)], region: BoundingBox, leaf_size: usize) -> PartitionNode {
    if nets.len() <= leaf_size {
        return PartitionNode::leaf(region, nets.iter().map(|(id, _)| *id).collect());
    }

    let width = region.xhigh - region.xlow;
    let height = region.yhigh - region.ylow;
    if width <= 0 && height <= 0 {
        return PartitionNode::leaf(region, nets.iter().map(|(id, _)| *id).collect());
    }

    let (left_region, right_region) = if width >= height {
        let mid = region.xlow + width / 2;
        (
            BoundingBox { xhigh: mid, ..region },
            BoundingBox { xlow: mid + 1, ..region },
        )
    } else {
        let mid = region.ylow + height / 2;
        (
            BoundingBox { yhigh: mid, ..region },
            BoundingBox { ylow: mid + 1, ..region },
        )
    };

    let mut left_nets = Vec::new();
    let mut right_nets = Vec::new();
    let mut boundary_nets = Vec::new();
    for &(id, bbox) in nets {
        let fits_left = bbox.xlow >= left_region.xlow
            && bbox.xhigh <= left_region.xhigh
            && bbox.ylow >= left_region.ylow
            && bbox.yhigh <= left_region.yhigh;
        let fits_right = bbox.xlow >= right_region.xlow
            && bbox.xhigh <= right_region.xhigh
            && bbox.ylow >= right_region.ylow
            && bbox.yhigh <= right_region.yhigh;
        if fits_left {
            left_nets.push((id, bbox));
        } else if fits_right {
            right_nets.push((id, bbox));
        } else {
            boundary_nets.push(id);
        }
    }

    // Neither child shrank: further recursion would loop forever on a region that cannot be
    // split more finely than the nets' own bounding boxes allow.
    if left_nets.len() == nets.len() || right_nets.len() == nets.len() {
        return PartitionNode::leaf(region, nets.iter().map(|(id, _)| *id).collect());
    }

    PartitionNode {
        bbox: region,
        nets: Vec::new(),
        boundary_nets,
        children: Some((
            Box::new(partition_nets(&left_nets, left_region, leaf_size)),
            Box::new(partition_nets(&right_nets, right_region, leaf_size)),
        )),
    }
}

fn collect<'a>(node: &'a PartitionNode, leaves: &mut Vec<&'a PartitionNode>, boundary: &mut Vec<NetId>) {
    boundary.extend(node.boundary_nets.iter().copied());
    match &node.children {
        Some((left, right)) => {
            collect(left, leaves, boundary);
            collect(right, leaves, boundary);
        }
        None => leaves.push(node),
    }
}

/// Route every net in the partition tree: leaf nets are dispatched across `num_workers` via a
/// work-stealing queue (safe, since disjoint leaves never touch the same RRG region), then
/// `boundary_nets` collected from every level are routed serially on the calling thread, since
/// they may touch nodes more than one leaf also touched.
///
/// `route_one` must be safe to call concurrently for distinct nets; it is the caller's
/// responsibility to route a net against whatever shared search state (e.g. a
/// [`super::SharedScratchTable`]) it closes over.
pub fn route_partition_parallel<F>(root: &PartitionNode, route_one: F, num_workers: usize)
where
    F: Fn(NetId) + Sync,
{
    let mut leaves = Vec::new();
    let mut boundary_nets = Vec::new();
    collect(root, &mut leaves, &mut boundary_nets);

    let injector: Injector<NetId> = Injector::new();
    for leaf in &leaves {
        for &net in &leaf.nets {
            injector.push(net);
        }
    }

    let num_workers = num_workers.max(1);
    std::thread::scope(|scope| {
        for _ in 0..num_workers {
            let injector = &injector;
            let route_one = &route_one;
            scope.spawn(move || loop {
                match injector.steal() {
                    Steal::Success(net) => route_one(net),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            });
        }
    });

    for net in boundary_nets {
        route_one(net);
    }
}
