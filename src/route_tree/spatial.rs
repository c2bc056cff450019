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

//! A 2-D grid of bins over a net's route tree, used only for high-fanout nets to seed the
//! connection router's pre-search from nodes physically near the target sink (spec §3, §4.3).

use std::collections::HashMap;

use super::TreeNodeId;

/// Grid coordinates of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinCoord {
    /// Bin column.
    pub x: i32,
    /// Bin row.
    pub y: i32,
}

/// Spatial index over a route tree's nodes, bucketed into bins whose size is chosen so that
/// `bin_area ≈ 4 * bbox_area / fanout` (spec §3).
#[derive(Debug, Clone, Default)]
pub struct SpatialLookup {
    bin_size_x: i32,
    bin_size_y: i32,
    bins: HashMap<BinCoord, Vec<TreeNodeId>>,
}

impl SpatialLookup {
    /// Build an empty lookup sized for a net with the given bounding-box area and fanout.
    pub fn new(bbox_width: i32, bbox_height: i32, fanout: usize) -> Self {
        let fanout = fanout.max(1) as i64;
        let target_bin_area = (4 * bbox_width.max(1) as i64 * bbox_height.max(1) as i64) / fanout;
        let side = (target_bin_area as f64).sqrt().ceil().max(1.0) as i32;
        Self {
            bin_size_x: side,
            bin_size_y: side,
            bins: HashMap::new(),
        }
    }

    fn coord(&self, x: i32, y: i32) -> BinCoord {
        BinCoord {
            x: x.div_euclid(self.bin_size_x.max(1)),
            y: y.div_euclid(self.bin_size_y.max(1)),
        }
    }

    /// Insert a tree node physically located at `(x, y)`.
    pub fn insert(&mut self, x: i32, y: i32, node: TreeNodeId) {
        let c = self.coord(x, y);
        self.bins.entry(c).or_default().push(node);
    }

    /// Remove a tree node previously inserted at `(x, y)` (used when pruning).
    pub fn remove(&mut self, x: i32, y: i32, node: TreeNodeId) {
        let c = self.coord(x, y);
        if let Some(v) = self.bins.get_mut(&c) {
            v.retain(|&n| n != node);
        }
    }

    /// All tree nodes within `radius` bins of `(x, y)` (inclusive), e.g. the "±3 grid-bins"
    /// seeding window spec §4.3 specifies for high-fanout nets.
    pub fn nodes_within(&self, x: i32, y: i32, radius: i32) -> Vec<TreeNodeId> {
        let center = self.coord(x, y);
        let mut out = Vec::new();
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let c = BinCoord {
                    x: center.x + dx,
                    y: center.y + dy,
                };
                if let Some(v) = self.bins.get(&c) {
                    out.extend_from_slice(v);
                }
            }
        }
        out
    }
}
