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

//! The netlist and timing-info external collaborators (spec §6): the router pulls per-net sink
//! lists and per-pin criticality from these, and pushes updated per-sink delays back. Neither is
//! implemented beyond a test double; a real toolchain provides its own.

use crate::types::{NetId, RrNodeId, SinkIndex};

/// A single net as the router sees it.
#[derive(Debug, Clone)]
pub struct Net {
    /// This net's id.
    pub id: NetId,
    /// RR node id of the net's driver.
    pub source: RrNodeId,
    /// RR node ids of the net's sinks, 0-indexed here; [`SinkIndex`] is 1-indexed (index 0 is
    /// reserved for the source), so `sinks[i]` corresponds to `SinkIndex(i as u32 + 1)`.
    pub sinks: Vec<RrNodeId>,
    /// Global nets (e.g. clocks, resets) are routed specially and excluded from ordinary
    /// congestion-driven rerouting heuristics.
    pub is_global: bool,
    /// Ignored nets are not routed at all (spec §6 `ideal` routing scheme).
    pub is_ignored: bool,
    /// Whether this net is a clock network requiring two-stage pre-routing (spec §4.5).
    pub is_clock: bool,
}

impl Net {
    /// Number of sinks (fanout).
    pub fn fanout(&self) -> usize {
        self.sinks.len()
    }

    /// The RR node id of `sink`. Panics if `sink` is out of range for this net.
    pub fn sink_node(&self, sink: SinkIndex) -> RrNodeId {
        self.sinks[sink.0 as usize - 1]
    }

    /// All sink indices of this net, in order.
    pub fn sink_indices(&self) -> impl Iterator<Item = SinkIndex> {
        (1..=self.sinks.len() as u32).map(SinkIndex)
    }
}

/// Read-only view of the set of nets to route.
pub trait Netlist {
    /// All nets, in an order stable for the lifetime of a routing run.
    fn nets(&self) -> &[Net];

    /// Look up a net by id.
    fn net(&self, id: NetId) -> &Net {
        &self.nets()[id.0 as usize]
    }
}

/// Timing-analysis collaborator: pulls per-pin criticality and slack, accepts updated per-sink
/// delays pushed back after routing.
///
/// The convergence ranking (spec §4.5: "sWNS > sTNS > hWNS > hTNS > wirelength") needs all four
/// slack figures from the setup and hold analyses; this crate performs neither analysis itself
/// (out of scope, as for criticality), so every figure is pulled from the collaborator rather
/// than derived here.
pub trait TimingInfo {
    /// Timing criticality of `(net, sink)`, in `[0, 1]`.
    fn criticality(&self, net: NetId, sink: SinkIndex) -> f64;

    /// Setup worst negative slack across the whole design (sWNS).
    fn setup_worst_negative_slack(&self) -> f64;

    /// Setup total negative slack across the whole design (sTNS).
    fn total_negative_slack(&self) -> f64;

    /// Hold worst negative slack across the whole design (hWNS).
    fn hold_worst_negative_slack(&self) -> f64;

    /// Hold total negative slack across the whole design (hTNS).
    fn hold_total_negative_slack(&self) -> f64;

    /// Report a newly measured delay for `(net, sink)` back to STA.
    fn update_sink_delay(&mut self, net: NetId, sink: SinkIndex, delay: f64);
}

/// A plain in-memory netlist, useful for tests and small standalone drivers.
#[derive(Debug, Clone, Default)]
pub struct StaticNetlist {
    nets: Vec<Net>,
}

impl StaticNetlist {
    /// Build a netlist from an explicit net list.
    pub fn new(nets: Vec<Net>) -> Self {
        Self { nets }
    }
}

impl Netlist for StaticNetlist {
    fn nets(&self) -> &[Net] {
        &self.nets
    }
}

/// A timing-info double that reports a fixed criticality for every sink and no slack at all, for
/// tests that do not exercise timing-driven behavior or convergence ranking.
#[derive(Debug, Clone, Copy)]
pub struct FixedCriticality(pub f64);

impl TimingInfo for FixedCriticality {
    fn criticality(&self, _net: NetId, _sink: SinkIndex) -> f64 {
        self.0
    }

    fn setup_worst_negative_slack(&self) -> f64 {
        0.0
    }

    fn total_negative_slack(&self) -> f64 {
        0.0
    }

    fn hold_worst_negative_slack(&self) -> f64 {
        0.0
    }

    fn hold_total_negative_slack(&self) -> f64 {
        0.0
    }

    fn update_sink_delay(&mut self, _net: NetId, _sink: SinkIndex, _delay: f64) {}
}
