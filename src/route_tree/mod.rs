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

//! The per-net route tree (spec §4.2): the partial routing of a single net, rooted at its
//! SOURCE, extended one sink at a time by the connection router and pruned by the negotiation
//! loop when congestion appears.
//!
//! Nodes live in a flat arena ([`TreeNode`] indexed by [`TreeNodeId`]) rather than the
//! intrusive doubly-linked list a C++ router would use for this; pruned nodes return their slot
//! to a free list so repeated rerouting of the same net does not grow the arena unboundedly.

pub mod spatial;

use std::collections::{HashMap, HashSet};

use crate::error::RouteTreeError;
use crate::rrg::RrgView;
use crate::scratch::ScratchTable;
use crate::types::{BoundingBox, NetId, NonConfigSetId, RrNodeId, RrNodeKind, SinkIndex, SwitchId};

/// A stable index into a [`RouteTree`]'s arena. Not comparable across different trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNodeId(u32);

impl TreeNodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of a route tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// The RRG node this tree node represents.
    pub rr_node: RrNodeId,
    /// The switch of the edge entering this node from its parent. `None` only for the root.
    pub switch_from_parent: Option<SwitchId>,
    /// This node's parent, or `None` for the root.
    pub parent: Option<TreeNodeId>,
    /// This node's children. A node owns its children exclusively.
    pub children: Vec<TreeNodeId>,
    /// Upstream resistance to ground (spec §4.2 invariant 2).
    pub r_upstream: f64,
    /// Downstream capacitance of the subtree rooted here (spec §4.2 invariant 3).
    pub c_downstream: f64,
    /// Elmore delay estimate to this node (spec §4.2 invariant 4).
    pub t_del: f64,
    /// Whether the connection router may still expand from this node.
    pub re_expand: bool,
    /// The sink index this node represents, if it is a SINK leaf.
    pub net_pin_index: Option<SinkIndex>,
}

/// The route tree of a single net.
#[derive(Debug, Clone)]
pub struct RouteTree {
    net: NetId,
    arena: Vec<TreeNode>,
    free_list: Vec<TreeNodeId>,
    root: TreeNodeId,
    by_rr_node: HashMap<RrNodeId, Vec<TreeNodeId>>,
    by_sink_index: HashMap<SinkIndex, TreeNodeId>,
    reached_sinks: HashSet<SinkIndex>,
    all_sinks: HashSet<SinkIndex>,
    non_config_set_usage: HashMap<NonConfigSetId, u32>,
}

impl RouteTree {
    /// Create a new tree rooted at `source`, with `all_sinks` the complete set of sink indices
    /// this net must eventually reach.
    pub fn new(net: NetId, source: RrNodeId, all_sinks: HashSet<SinkIndex>) -> Self {
        let root = TreeNode {
            rr_node: source,
            switch_from_parent: None,
            parent: None,
            children: Vec::new(),
            r_upstream: 0.0,
            c_downstream: 0.0,
            t_del: 0.0,
            re_expand: true,
            net_pin_index: None,
        };
        let mut by_rr_node = HashMap::new();
        by_rr_node.insert(source, vec![TreeNodeId(0)]);
        Self {
            net,
            arena: vec![root],
            free_list: Vec::new(),
            root: TreeNodeId(0),
            by_rr_node,
            by_sink_index: HashMap::new(),
            reached_sinks: HashSet::new(),
            all_sinks,
            non_config_set_usage: HashMap::new(),
        }
    }

    fn alloc(&mut self, node: TreeNode) -> TreeNodeId {
        if let Some(id) = self.free_list.pop() {
            self.arena[id.index()] = node;
            id
        } else {
            let id = TreeNodeId(self.arena.len() as u32);
            self.arena.push(node);
            id
        }
    }

    /// The net this tree belongs to.
    pub fn net(&self) -> NetId {
        self.net
    }

    /// The tree's root node id (the net's SOURCE).
    pub fn root(&self) -> TreeNodeId {
        self.root
    }

    /// Look up a tree node.
    pub fn node(&self, id: TreeNodeId) -> &TreeNode {
        &self.arena[id.index()]
    }

    /// All tree nodes currently representing `rr_node` (normally at most one, except when the
    /// same physical SINK is reached by distinct pins).
    pub fn find_by_rr_id(&self, rr_node: RrNodeId) -> &[TreeNodeId] {
        self.by_rr_node
            .get(&rr_node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The tree node representing sink `pin_index`, if reached.
    pub fn find_by_sink_index(&self, pin_index: SinkIndex) -> Option<TreeNodeId> {
        self.by_sink_index.get(&pin_index).copied()
    }

    /// Every node id reachable from the root via live parent/child links, in pre-order. Unlike
    /// iterating the arena directly, this never yields a node orphaned by [`RouteTree::prune`]
    /// or [`RouteTree::freeze`], since those only ever detach via the `children` lists.
    pub fn iter_nodes(&self) -> impl Iterator<Item = TreeNodeId> + '_ {
        let mut stack = vec![self.root];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.arena[id.index()].children.iter().copied());
            Some(id)
        })
    }

    /// Sink indices not yet reached by this tree.
    pub fn get_remaining_sinks(&self) -> impl Iterator<Item = SinkIndex> + '_ {
        self.all_sinks
            .iter()
            .copied()
            .filter(move |s| !self.reached_sinks.contains(s))
    }

    /// Sink indices already reached by this tree.
    pub fn get_reached_sinks(&self) -> impl Iterator<Item = SinkIndex> + '_ {
        self.reached_sinks.iter().copied()
    }

    /// Per-set count of configurable entries into each non-configurable edge set reachable from
    /// this tree, used by [`RouteTree::prune`] to drop sets no live connection depends on.
    pub fn get_non_config_node_set_usage(&self) -> &HashMap<NonConfigSetId, u32> {
        &self.non_config_set_usage
    }

    /// The bounding box spanning every RRG node currently in the tree.
    pub fn current_bounding_box<R: RrgView>(&self, rrg: &R) -> BoundingBox {
        let mut bbox = rrg.node(self.arena[self.root.index()].rr_node).bbox;
        for node in &self.arena {
            bbox = bbox.union(&rrg.node(node.rr_node).bbox);
        }
        bbox
    }

    /// Directly attach a child node, bypassing the search-backtrace path. Used by the traceback
    /// codec ([`crate::trace`]) to reconstruct a tree from persisted state; `reload_timing`
    /// should be called once the whole tree has been rebuilt, since R/C/Tdel are not known until
    /// then.
    pub fn insert_child<R: RrgView>(
        &mut self,
        rrg: &R,
        parent: TreeNodeId,
        rr_node: RrNodeId,
        switch: SwitchId,
        net_pin_index: Option<SinkIndex>,
    ) -> TreeNodeId {
        let new_id = self.alloc(TreeNode {
            rr_node,
            switch_from_parent: Some(switch),
            parent: Some(parent),
            children: Vec::new(),
            r_upstream: 0.0,
            c_downstream: 0.0,
            t_del: 0.0,
            re_expand: true,
            net_pin_index,
        });
        self.arena[parent.index()].children.push(new_id);
        self.by_rr_node.entry(rr_node).or_default().push(new_id);
        if let Some(pin) = net_pin_index {
            self.by_sink_index.insert(pin, new_id);
            self.reached_sinks.insert(pin);
        }
        if let Some(set) = rrg.node(rr_node).non_config_set {
            *self.non_config_set_usage.entry(set).or_insert(0) += 1;
        }
        new_id
    }

    /// Splice the path backtraced from `sink` into the tree. Walks `scratch`'s `prev_node`
    /// pointers backward from `sink` until reaching a node already present in the tree,
    /// allocates new tree nodes for the intermediates in parent-to-child order, propagates the
    /// non-configurable closure from the newly added nodes, recomputes R/C/Tdel in the affected
    /// subtree, and marks `pin_index` reached.
    ///
    /// Returns `(attachment point, newly added sink node)`.
    pub fn update_from_heap<R: RrgView>(
        &mut self,
        rrg: &R,
        scratch: &mut ScratchTable,
        sink: RrNodeId,
        pin_index: SinkIndex,
        mut spatial: Option<&mut spatial::SpatialLookup>,
    ) -> Result<(TreeNodeId, TreeNodeId), RouteTreeError> {
        // Walk backward from `sink` to the nearest node already in the tree.
        let mut chain = Vec::new();
        let mut cursor = sink;
        let attach_tree_id = loop {
            if let Some(existing) = self.by_rr_node.get(&cursor) {
                break existing[0];
            }
            chain.push(cursor);
            match scratch.get(cursor).prev_node {
                Some(prev) => cursor = prev,
                None => return Err(RouteTreeError::Disconnected(pin_index)),
            }
        };
        chain.reverse();

        let mut parent_id = attach_tree_id;
        let mut sink_tree_id = attach_tree_id;
        let mut newly_added = Vec::new();
        for rr in chain {
            let entry = *scratch.get(rr);
            let pin = if rr == sink { Some(pin_index) } else { None };
            let new_id = self.alloc(TreeNode {
                rr_node: rr,
                switch_from_parent: entry.prev_switch,
                parent: Some(parent_id),
                children: Vec::new(),
                r_upstream: entry.r_upstream,
                c_downstream: 0.0,
                t_del: 0.0,
                re_expand: true,
                net_pin_index: pin,
            });
            self.arena[parent_id.index()].children.push(new_id);
            self.by_rr_node.entry(rr).or_default().push(new_id);
            if let Some(p) = pin {
                self.by_sink_index.insert(p, new_id);
                self.reached_sinks.insert(p);
                sink_tree_id = new_id;
            }
            if let Some(set) = rrg.node(rr).non_config_set {
                *self.non_config_set_usage.entry(set).or_insert(0) += 1;
            }
            if let Some(lookup) = spatial.as_deref_mut() {
                let bbox = rrg.node(rr).bbox;
                lookup.insert(bbox.xlow, bbox.ylow, new_id);
            }
            scratch.incr_occ(rr);
            newly_added.push(new_id);
            parent_id = new_id;
        }

        for id in newly_added {
            self.close_non_configurable(rrg, scratch, id);
        }

        self.reload_timing(rrg, attach_tree_id);
        Ok((attach_tree_id, sink_tree_id))
    }

    /// Transitively add every node reachable from `from` via a non-configurable (always-on)
    /// switch: once one member of such a set is live, all of them are.
    fn close_non_configurable<R: RrgView>(
        &mut self,
        rrg: &R,
        scratch: &mut ScratchTable,
        from: TreeNodeId,
    ) {
        let mut frontier = vec![from];
        while let Some(id) = frontier.pop() {
            let rr = self.arena[id.index()].rr_node;
            for (edge, target) in rrg.edges(rr) {
                let switch = rrg.switch(edge.switch);
                if switch.configurable || self.by_rr_node.contains_key(&target) {
                    continue;
                }
                let r_upstream = if switch.buffered {
                    0.0
                } else {
                    self.arena[id.index()].r_upstream
                } + switch.r
                    + rrg.node(target).r;
                let new_id = self.alloc(TreeNode {
                    rr_node: target,
                    switch_from_parent: Some(edge.switch),
                    parent: Some(id),
                    children: Vec::new(),
                    r_upstream,
                    c_downstream: 0.0,
                    t_del: 0.0,
                    re_expand: true,
                    net_pin_index: None,
                });
                self.arena[id.index()].children.push(new_id);
                self.by_rr_node.entry(target).or_default().push(new_id);
                scratch.incr_occ(target);
                frontier.push(new_id);
            }
        }
    }

    /// Recompute `C_downstream` bottom-up and `R_upstream`/`Tdel` top-down within the subtree
    /// rooted at `from`, then propagate the resulting `C_downstream` delta up through unbuffered
    /// ancestors (stopping at the first buffered switch, which isolates downstream capacitance).
    pub fn reload_timing<R: RrgView>(&mut self, rrg: &R, from: TreeNodeId) {
        let old_c = self.arena[from.index()].c_downstream;
        let new_c = self.recompute_c_downstream(rrg, from);
        let delta = new_c - old_c;

        if delta != 0.0 {
            let mut cur = from;
            while let Some(parent) = self.arena[cur.index()].parent {
                let buffered = self.arena[cur.index()]
                    .switch_from_parent
                    .map(|s| rrg.switch(s).buffered)
                    .unwrap_or(true);
                if buffered {
                    break;
                }
                self.arena[parent.index()].c_downstream += delta;
                cur = parent;
            }
        }

        self.recompute_r_and_delay(rrg, from);
    }

    fn recompute_c_downstream<R: RrgView>(&mut self, rrg: &R, id: TreeNodeId) -> f64 {
        let children = self.arena[id.index()].children.clone();
        let mut total = rrg.node(self.arena[id.index()].rr_node).c;
        for child in children {
            let child_c = self.recompute_c_downstream(rrg, child);
            let switch = self.arena[child.index()].switch_from_parent.map(|s| rrg.switch(s));
            let contribution = match switch {
                Some(sw) if sw.buffered => sw.c_internal,
                Some(sw) => child_c + sw.c_internal,
                None => child_c,
            };
            total += contribution;
        }
        self.arena[id.index()].c_downstream = total;
        total
    }

    fn recompute_r_and_delay<R: RrgView>(&mut self, rrg: &R, id: TreeNodeId) {
        let node_rr = self.arena[id.index()].rr_node;
        let node_r = rrg.node(node_rr).r;
        let (parent_r_upstream, parent_r, parent_t_del) = match self.arena[id.index()].parent {
            Some(p) => {
                let pn = &self.arena[p.index()];
                (pn.r_upstream, rrg.node(pn.rr_node).r, pn.t_del)
            }
            None => (0.0, 0.0, 0.0),
        };

        if let Some(switch_id) = self.arena[id.index()].switch_from_parent {
            let switch = rrg.switch(switch_id);
            let r_upstream = if switch.buffered { 0.0 } else { parent_r_upstream } + switch.r + node_r;
            let c_downstream = self.arena[id.index()].c_downstream;
            let r_del = switch.r + 0.5 * node_r;
            let mut t_del = parent_t_del + switch.t_del + r_del * c_downstream;
            let r_del_adjust = r_upstream - 0.5 * parent_r;
            t_del += r_del_adjust * switch.c_internal;
            self.arena[id.index()].r_upstream = r_upstream;
            self.arena[id.index()].t_del = t_del;
        } else {
            self.arena[id.index()].r_upstream = node_r;
            self.arena[id.index()].t_del = 0.0;
        }

        let children = self.arena[id.index()].children.clone();
        for child in children {
            self.recompute_r_and_delay(rrg, child);
        }
    }

    /// Recursive congestion/forced-reroute pruning pass (spec §4.2). Returns `None` if the
    /// entire tree (including the root) was pruned; otherwise a tree retaining only the legal
    /// maximal sub-routing.
    pub fn prune<R: RrgView>(
        &self,
        rrg: &R,
        scratch: &ScratchTable,
        forced_reroute: &HashSet<SinkIndex>,
    ) -> Option<RouteTree> {
        let mut keep = HashSet::new();
        let root_kept = self.prune_visit(rrg, scratch, forced_reroute, self.root, true, &mut keep);
        if !root_kept {
            return None;
        }
        Some(self.rebuild_from_keep(&keep))
    }

    fn prune_visit<R: RrgView>(
        &self,
        rrg: &R,
        scratch: &ScratchTable,
        forced_reroute: &HashSet<SinkIndex>,
        id: TreeNodeId,
        is_root: bool,
        keep: &mut HashSet<TreeNodeId>,
    ) -> bool {
        let node = &self.arena[id.index()];
        let rr = rrg.node(node.rr_node);

        let mut any_child_kept = false;
        for &child in &node.children {
            if self.prune_visit(rrg, scratch, forced_reroute, child, false, keep) {
                any_child_kept = true;
            }
        }

        if rr.kind == RrNodeKind::Sink {
            let forced_out = node
                .net_pin_index
                .map(|p| forced_reroute.contains(&p))
                .unwrap_or(false);
            if forced_out || (!is_root && scratch.occ(node.rr_node) > rr.capacity) {
                return false;
            }
            keep.insert(id);
            return true;
        }

        if !is_root && scratch.occ(node.rr_node) > rr.capacity {
            return false;
        }

        if !node.children.is_empty() && !any_child_kept {
            return false;
        }

        if let Some(set) = rr.non_config_set {
            if self.non_config_set_usage.get(&set).copied().unwrap_or(0) == 0 {
                return false;
            }
        }

        keep.insert(id);
        true
    }

    fn rebuild_from_keep(&self, keep: &HashSet<TreeNodeId>) -> RouteTree {
        let mut tree = RouteTree {
            net: self.net,
            arena: Vec::new(),
            free_list: Vec::new(),
            root: TreeNodeId(0),
            by_rr_node: HashMap::new(),
            by_sink_index: HashMap::new(),
            reached_sinks: HashSet::new(),
            all_sinks: self.all_sinks.clone(),
            non_config_set_usage: HashMap::new(),
        };
        let new_root = copy_kept_subtree(self, keep, self.root, None, &mut tree);
        tree.root = new_root;
        tree
    }

    /// Structural sanity check: parent/child linkage is consistent, every SINK is a leaf, and
    /// every node's `R_upstream` matches what the switch table would recompute.
    pub fn is_valid<R: RrgView>(&self, rrg: &R) -> bool {
        for (i, node) in self.arena.iter().enumerate() {
            let id = TreeNodeId(i as u32);
            for &child in &node.children {
                if self.arena[child.index()].parent != Some(id) {
                    return false;
                }
            }
            if rrg.node(node.rr_node).kind == RrNodeKind::Sink && !node.children.is_empty() {
                return false;
            }
            let expected_r = match node.switch_from_parent {
                Some(switch_id) => {
                    let switch = rrg.switch(switch_id);
                    let parent_r_upstream = node
                        .parent
                        .map(|p| self.arena[p.index()].r_upstream)
                        .unwrap_or(0.0);
                    (if switch.buffered { 0.0 } else { parent_r_upstream })
                        + switch.r
                        + rrg.node(node.rr_node).r
                }
                None => rrg.node(node.rr_node).r,
            };
            if (expected_r - node.r_upstream).abs() > 1e-6 {
                return false;
            }
        }
        true
    }

    /// Whether no node currently in the tree is overused.
    pub fn is_uncongested<R: RrgView>(&self, rrg: &R, scratch: &ScratchTable) -> bool {
        self.arena
            .iter()
            .all(|n| scratch.occ(n.rr_node) <= rrg.node(n.rr_node).capacity)
    }

    /// After a net completes routing, drop SINK leaves from the in-memory tree and mark the
    /// remaining interior nodes non-expandable. Used after clock-net pre-routing.
    pub fn freeze<R: RrgView>(&mut self, rrg: &R) {
        let sink_ids: Vec<TreeNodeId> = self
            .arena
            .iter()
            .enumerate()
            .filter(|(_, n)| rrg.node(n.rr_node).kind == RrNodeKind::Sink)
            .map(|(i, _)| TreeNodeId(i as u32))
            .collect();

        for id in sink_ids {
            let rr = self.arena[id.index()].rr_node;
            if let Some(parent) = self.arena[id.index()].parent {
                self.arena[parent.index()].children.retain(|&c| c != id);
            }
            if let Some(pin) = self.arena[id.index()].net_pin_index {
                self.by_sink_index.remove(&pin);
            }
            if let Some(v) = self.by_rr_node.get_mut(&rr) {
                v.retain(|&x| x != id);
                if v.is_empty() {
                    self.by_rr_node.remove(&rr);
                }
            }
            self.free_list.push(id);
        }

        for node in self.arena.iter_mut() {
            node.re_expand = false;
        }
    }
}

fn copy_kept_subtree(
    src: &RouteTree,
    keep: &HashSet<TreeNodeId>,
    old: TreeNodeId,
    new_parent: Option<TreeNodeId>,
    dst: &mut RouteTree,
) -> TreeNodeId {
    let old_node = &src.arena[old.index()];
    let new_id = dst.alloc(TreeNode {
        rr_node: old_node.rr_node,
        switch_from_parent: if new_parent.is_some() {
            old_node.switch_from_parent
        } else {
            None
        },
        parent: new_parent,
        children: Vec::new(),
        r_upstream: old_node.r_upstream,
        c_downstream: old_node.c_downstream,
        t_del: old_node.t_del,
        re_expand: old_node.re_expand,
        net_pin_index: old_node.net_pin_index,
    });
    dst.by_rr_node.entry(old_node.rr_node).or_default().push(new_id);
    if let Some(pin) = old_node.net_pin_index {
        dst.by_sink_index.insert(pin, new_id);
        dst.reached_sinks.insert(pin);
    }
    for &child in &old_node.children {
        if keep.contains(&child) {
            let new_child = copy_kept_subtree(src, keep, child, Some(new_id), dst);
            dst.arena[new_id.index()].children.push(new_child);
        }
    }
    new_id
}
