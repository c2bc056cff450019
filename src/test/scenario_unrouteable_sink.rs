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

//! A three-sink net where two sinks are reachable and the third sits in a disconnected part of
//! the RRG: the outer loop must fail fast, naming the unreachable sink, rather than looping.

use crate::config::RouterConfig;
use crate::error::{ConnectionRouterError, NegotiationError, NetRouterError};
use crate::heap::BinaryHeap;
use crate::lookahead::NoOpLookahead;
use crate::negotiation::negotiate;
use crate::netlist::{FixedCriticality, Net, StaticNetlist};
use crate::rrg::{RrNode, Rrg, RrgView, Switch};
use crate::scratch::ScratchTable;
use crate::types::{BoundingBox, NetId, RrNodeKind, SinkIndex, SwitchId};

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
fn one_unreachable_sink_fails_the_whole_net_without_looping() {
    let mut rrg = Rrg::new(vec![sw()]);
    let source = rrg.add_node(node(RrNodeKind::Source));
    let sink_a = rrg.add_node(node(RrNodeKind::Sink));
    let sink_b = rrg.add_node(node(RrNodeKind::Sink));
    let sink_c = rrg.add_node(node(RrNodeKind::Sink));
    rrg.add_edge(source, sink_a, SwitchId(0));
    rrg.add_edge(source, sink_b, SwitchId(0));
    // sink_c has no incoming edge from anywhere: unreachable.

    let net = Net {
        id: NetId(0),
        source,
        sinks: vec![sink_a, sink_b, sink_c],
        is_global: false,
        is_ignored: false,
        is_clock: false,
    };
    let netlist = StaticNetlist::new(vec![net]);
    let mut timing = FixedCriticality(0.5);
    let mut scratch = ScratchTable::new(rrg.num_nodes());
    let config = RouterConfig::default();

    let result = negotiate(
        &rrg,
        BinaryHeap::new(),
        &mut scratch,
        &NoOpLookahead,
        &netlist,
        &mut timing,
        &config,
        rrg.node(source).bbox,
    );

    match result {
        Err(NegotiationError::NetUnrouteable {
            net: failed_net,
            source: NetRouterError::Connection(ConnectionRouterError::Unrouteable { sink_node, .. }),
        }) => {
            assert_eq!(failed_net, NetId(0));
            assert_eq!(sink_node, sink_c);
        }
        other => panic!("expected a NetUnrouteable/Unrouteable failure for sink_c, got {other:?}"),
    }
}
