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

//! The persisted traceback codec (spec §6, §9): a flat, DFS-ordered encoding of a route tree's
//! edges, round-trippable via [`Traceback::from_tree`] / [`Traceback::to_tree`]. This is a
//! separate codec over the tree's edge list, not part of the search itself.

use std::collections::{HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::route_tree::{RouteTree, TreeNodeId};
use crate::rrg::RrgView;
use crate::types::{NetId, RrNodeId, SinkIndex, SwitchId};

/// One entry of a persisted traceback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TracebackEntry {
    /// The RR node this entry represents.
    pub rr_node: RrNodeId,
    /// The switch of the edge entering this node from its parent. `None` only for the root.
    pub switch_id: Option<SwitchId>,
    /// Index into this same traceback of this entry's parent. `None` only for the root.
    pub parent_index: Option<usize>,
    /// The sink index this entry represents, if it is a SINK leaf. `-1` (`None`) for non-SINK
    /// and special virtual SINKs.
    pub pin_index: Option<SinkIndex>,
}

/// A persisted route tree for one net, in DFS order (parent always precedes its children).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Traceback {
    /// The net this traceback belongs to.
    pub net: NetId,
    /// Entries in DFS order; `entries[0]` is always the root (the net's SOURCE).
    pub entries: Vec<TracebackEntry>,
}

impl Traceback {
    /// Flatten a route tree into its persisted form.
    pub fn from_tree(tree: &RouteTree) -> Self {
        let mut entries = Vec::new();
        let mut index_of: HashMap<TreeNodeId, usize> = HashMap::new();

        for id in tree.iter_nodes() {
            let node = tree.node(id);
            let parent_index = node.parent.map(|p| index_of[&p]);
            entries.push(TracebackEntry {
                rr_node: node.rr_node,
                switch_id: node.switch_from_parent,
                parent_index,
                pin_index: node.net_pin_index,
            });
            index_of.insert(id, entries.len() - 1);
        }

        Self {
            net: tree.net(),
            entries,
        }
    }

    /// Rebuild a route tree from a persisted traceback.
    ///
    /// When `verify_switch_id` is `true`, an out-of-range switch id is a hard error
    /// ([`TraceError::UnknownSwitch`]). When `false`, an out-of-range id is replaced with switch
    /// 0 (the "switch-id remap fallback" of spec §7, for trace files saved against an RRG with a
    /// different switch table).
    pub fn to_tree<R: RrgView>(&self, rrg: &R, verify_switch_id: bool) -> Result<RouteTree, TraceError> {
        let root_entry = self
            .entries
            .first()
            .ok_or(TraceError::UnknownNode(RrNodeId::new(0)))?;
        if root_entry.rr_node.index() >= rrg.num_nodes() {
            return Err(TraceError::UnknownNode(root_entry.rr_node));
        }

        let all_sinks: HashSet<SinkIndex> = self.entries.iter().filter_map(|e| e.pin_index).collect();
        let mut tree = RouteTree::new(self.net, root_entry.rr_node, all_sinks);

        let mut id_of: Vec<TreeNodeId> = vec![tree.root()];
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if entry.rr_node.index() >= rrg.num_nodes() {
                return Err(TraceError::UnknownNode(entry.rr_node));
            }
            let parent_index = entry
                .parent_index
                .ok_or(TraceError::NotWalkable(entry.rr_node))?;
            let parent_id = *id_of
                .get(parent_index)
                .ok_or(TraceError::NotWalkable(entry.rr_node))?;
            let parent_rr = tree.node(parent_id).rr_node;

            let requested_switch = entry.switch_id.ok_or(TraceError::NotWalkable(entry.rr_node))?;
            let switch = if requested_switch.0 as usize >= rrg.num_switches() {
                if verify_switch_id {
                    return Err(TraceError::UnknownSwitch(entry.rr_node));
                }
                SwitchId(0)
            } else {
                requested_switch
            };

            let walkable = rrg
                .edges(parent_rr)
                .any(|(edge, target)| target == entry.rr_node && edge.switch == switch);
            if !walkable {
                return Err(TraceError::NotWalkable(entry.rr_node));
            }

            let new_id = tree.insert_child(rrg, parent_id, entry.rr_node, switch, entry.pin_index);
            id_of.push(new_id);
            debug_assert_eq!(id_of.len() - 1, i);
        }

        tree.reload_timing(rrg, tree.root());
        Ok(tree)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rrg::{RrNode, Rrg, Switch};
    use crate::scratch::ScratchTable;
    use crate::types::{BoundingBox, RrNodeKind};
    use std::collections::HashSet as StdHashSet;

    fn sw(r: f64, t_del: f64) -> Switch {
        Switch {
            r,
            t_del,
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

    fn linear_rrg() -> (Rrg, RrNodeId, RrNodeId, RrNodeId) {
        let mut rrg = Rrg::new(vec![sw(1.0, 1e-12)]);
        let source = rrg.add_node(node(RrNodeKind::Source));
        let mid = rrg.add_node(node(RrNodeKind::ChanX));
        let sink = rrg.add_node(node(RrNodeKind::Sink));
        rrg.add_edge(source, mid, SwitchId(0));
        rrg.add_edge(mid, sink, SwitchId(0));
        (rrg, source, mid, sink)
    }

    #[test]
    fn round_trips_a_simple_tree() {
        let (rrg, source, mid, sink) = linear_rrg();
        let scratch = ScratchTable::new(rrg.num_nodes());
        let mut tree = RouteTree::new(NetId(0), source, [SinkIndex(1)].into_iter().collect());
        tree.insert_child(&rrg, tree.root(), mid, SwitchId(0), None);
        let mid_id = tree.find_by_rr_id(mid)[0];
        tree.insert_child(&rrg, mid_id, sink, SwitchId(0), Some(SinkIndex(1)));
        tree.reload_timing(&rrg, tree.root());
        let _ = &scratch;

        let trace = Traceback::from_tree(&tree);
        assert_eq!(trace.entries.len(), 3);
        assert_eq!(trace.entries[0].rr_node, source);
        assert_eq!(trace.entries[0].parent_index, None);

        let rebuilt = trace.to_tree(&rrg, true).expect("valid traceback");
        assert!(rebuilt.is_valid(&rrg));
        assert_eq!(rebuilt.get_reached_sinks().collect::<StdHashSet<_>>(), {
            let mut s = StdHashSet::new();
            s.insert(SinkIndex(1));
            s
        });
    }

    #[test]
    fn unknown_switch_id_is_rejected_when_verification_is_on() {
        let (rrg, source, mid, _sink) = linear_rrg();
        let trace = Traceback {
            net: NetId(0),
            entries: vec![
                TracebackEntry {
                    rr_node: source,
                    switch_id: None,
                    parent_index: None,
                    pin_index: None,
                },
                TracebackEntry {
                    rr_node: mid,
                    switch_id: Some(SwitchId(99)),
                    parent_index: Some(0),
                    pin_index: None,
                },
            ],
        };
        let err = trace.to_tree(&rrg, true).unwrap_err();
        assert!(matches!(err, TraceError::UnknownSwitch(_)));
    }

    #[test]
    fn unknown_switch_id_falls_back_to_switch_zero_when_verification_is_off() {
        let (rrg, source, mid, _sink) = linear_rrg();
        let trace = Traceback {
            net: NetId(0),
            entries: vec![
                TracebackEntry {
                    rr_node: source,
                    switch_id: None,
                    parent_index: None,
                    pin_index: None,
                },
                TracebackEntry {
                    rr_node: mid,
                    switch_id: Some(SwitchId(99)),
                    parent_index: Some(0),
                    pin_index: None,
                },
            ],
        };
        let tree = trace.to_tree(&rrg, false).expect("remap fallback salvages it");
        assert_eq!(tree.node(tree.find_by_rr_id(mid)[0]).switch_from_parent, Some(SwitchId(0)));
    }

    #[test]
    fn non_walkable_edge_is_rejected() {
        let (rrg, source, _mid, sink) = linear_rrg();
        // source -> sink directly is not an edge in the RRG.
        let trace = Traceback {
            net: NetId(0),
            entries: vec![
                TracebackEntry {
                    rr_node: source,
                    switch_id: None,
                    parent_index: None,
                    pin_index: None,
                },
                TracebackEntry {
                    rr_node: sink,
                    switch_id: Some(SwitchId(0)),
                    parent_index: Some(0),
                    pin_index: Some(SinkIndex(1)),
                },
            ],
        };
        let err = trace.to_tree(&rrg, true).unwrap_err();
        assert!(matches!(err, TraceError::NotWalkable(_)));
    }
}
