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

//! Shared identifier and scalar types used across every layer of the router.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub(crate) type IndexType = u32;

/// Identity of a node in the routing-resource graph. Stable for the lifetime of the RRG.
pub type RrNodeId = petgraph::graph::NodeIndex<IndexType>;

/// Identity of a switch type in the RRG's switch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwitchId(pub u32);

/// Identity of a non-configurable edge set. All edges sharing a set id are either all live or
/// all dead together; see spec §4.2 "non-configurable closure".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NonConfigSetId(pub u32);

/// Identity of a net within the netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetId(pub u32);

/// 1-indexed position of a sink (pin) within a net, matching `net_pin_index` in spec §3. Index 0
/// is reserved for the net's driver/source pin and never appears as a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SinkIndex(pub u32);

/// The kind of an RRG node, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RrNodeKind {
    /// Per-net logical driver.
    Source,
    /// Per-net logical endpoint.
    Sink,
    /// Block output pin.
    OPin,
    /// Block input pin.
    IPin,
    /// Horizontal wire segment.
    ChanX,
    /// Vertical wire segment.
    ChanY,
}

impl RrNodeKind {
    /// Whether this kind ever carries a base cost scaling of `sqrt(fanout)` (spec §4.4): the
    /// pass-transistor-style nodes, i.e. channel wires.
    pub fn is_pass_transistor(self) -> bool {
        matches!(self, RrNodeKind::ChanX | RrNodeKind::ChanY)
    }
}

/// Axis-aligned bounding box over RR node or net extents, with an optional layer range for
/// multi-die architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Minimum x.
    pub xlow: i32,
    /// Minimum y.
    pub ylow: i32,
    /// Maximum x.
    pub xhigh: i32,
    /// Maximum y.
    pub yhigh: i32,
    /// Minimum layer (die).
    pub layer_low: i32,
    /// Maximum layer (die).
    pub layer_high: i32,
}

impl BoundingBox {
    /// A single-point bounding box at `(x, y, layer)`.
    pub fn point(x: i32, y: i32, layer: i32) -> Self {
        Self {
            xlow: x,
            ylow: y,
            xhigh: x,
            yhigh: y,
            layer_low: layer,
            layer_high: layer,
        }
    }

    /// Whether `self` and `other` overlap on all three axes.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xlow <= other.xhigh
            && self.xhigh >= other.xlow
            && self.ylow <= other.yhigh
            && self.yhigh >= other.ylow
            && self.layer_low <= other.layer_high
            && self.layer_high >= other.layer_low
    }

    /// The smallest bounding box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            xlow: self.xlow.min(other.xlow),
            ylow: self.ylow.min(other.ylow),
            xhigh: self.xhigh.max(other.xhigh),
            yhigh: self.yhigh.max(other.yhigh),
            layer_low: self.layer_low.min(other.layer_low),
            layer_high: self.layer_high.max(other.layer_high),
        }
    }

    /// Grow the box by one tile on every side (bounded by `limit`).
    pub fn grow_by_one(&self, limit: &BoundingBox) -> BoundingBox {
        BoundingBox {
            xlow: (self.xlow - 1).max(limit.xlow),
            ylow: (self.ylow - 1).max(limit.ylow),
            xhigh: (self.xhigh + 1).min(limit.xhigh),
            yhigh: (self.yhigh + 1).min(limit.yhigh),
            layer_low: self.layer_low,
            layer_high: self.layer_high,
        }
    }

    /// Scale the box around its own center by `factor`, bounded by `limit`.
    pub fn scale(&self, factor: i32, limit: &BoundingBox) -> BoundingBox {
        let w = (self.xhigh - self.xlow).max(1) * (factor - 1) / 2;
        let h = (self.yhigh - self.ylow).max(1) * (factor - 1) / 2;
        BoundingBox {
            xlow: (self.xlow - w).max(limit.xlow),
            ylow: (self.ylow - h).max(limit.ylow),
            xhigh: (self.xhigh + w).min(limit.xhigh),
            yhigh: (self.yhigh + h).min(limit.yhigh),
            layer_low: self.layer_low,
            layer_high: self.layer_high,
        }
    }

    /// Area of the box in tiles (at least 1 on each axis).
    pub fn area(&self) -> i64 {
        ((self.xhigh - self.xlow).max(0) as i64 + 1) * ((self.yhigh - self.ylow).max(0) as i64 + 1)
    }
}
