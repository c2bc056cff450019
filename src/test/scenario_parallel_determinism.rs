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

//! The same exact-cost-tie diamond as the serial tie-break scenario, but searched by the
//! parallel worker pool at several worker counts: the winning predecessor must come out
//! identical every time, since the tie-break rule does not depend on pop order.

use crate::cost::CostParams;
use crate::heap::{BinaryHeap, HeapEntry, HeapInterface};
use crate::lookahead::NoOpLookahead;
use crate::parallel::{route_connection_parallel, SharedHeap, SharedScratchTable};
use crate::rrg::{RrNode, Rrg, RrgView, Switch};
use crate::types::{BoundingBox, RrNodeKind, SwitchId};

fn sw() -> Switch {
    Switch {
        r: 0.0,
        t_del: 0.0,
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
        r: 0.0,
        c: 0.0,
        cost_index: 0,
        non_config_set: None,
    }
}

#[test]
fn winning_predecessor_is_independent_of_worker_count() {
    let mut rrg = Rrg::new(vec![sw()]);
    let source = rrg.add_node(node(RrNodeKind::Source));
    // mid_a is allocated before mid_b, so it carries the smaller RrNodeId.
    let mid_a = rrg.add_node(node(RrNodeKind::ChanX));
    let mid_b = rrg.add_node(node(RrNodeKind::ChanX));
    let sink = rrg.add_node(node(RrNodeKind::Sink));

    rrg.add_edge(source, mid_a, SwitchId(0));
    rrg.add_edge(source, mid_b, SwitchId(0));
    rrg.add_edge(mid_a, sink, SwitchId(0));
    rrg.add_edge(mid_b, sink, SwitchId(0));

    rrg.set_base_cost(mid_a, 5.0);
    rrg.set_base_cost(mid_b, 5.0);
    rrg.set_base_cost(sink, 5.0);

    let params = CostParams {
        criticality: 0.0,
        astar_factor: 1.0,
        bend_cost: 0.0,
        choking_discount: None,
    };
    let lookahead = NoOpLookahead;

    for workers in [1usize, 2, 4, 8] {
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
        .expect("both paths reach the sink regardless of worker count");

        assert_eq!(result.node, sink);
        assert_eq!(
            result.prev_node,
            Some(mid_a),
            "worker count {workers} should still resolve the tie in favor of the smaller node id"
        );
    }
}
