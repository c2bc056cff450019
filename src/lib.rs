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

#![deny(missing_docs, missing_debug_implementations)]

//! # rrg\_router
//!
//! A timing-driven, congestion-negotiating maze router for FPGA routing-resource graphs
//! (RRGs): A* single-connection search, per-net route trees with Elmore delay, and an outer
//! Pathfinder negotiation loop that raises present/historical congestion penalties until every
//! node's occupancy fits its capacity.
//!
//! This crate is the routing *core* only: RRG construction, architecture parsing, and placement
//! are out of scope. Callers implement [`rrg::RrgView`] against whatever graph representation
//! their toolchain already has, and [`netlist::Netlist`] / [`netlist::TimingInfo`] against their
//! own netlist and static-timing-analysis data.
//!
//! ## Example usage
//!
//! ```
//! use rrg_router::config::RouterConfig;
//! use rrg_router::heap::BinaryHeap;
//! use rrg_router::lookahead::NoOpLookahead;
//! use rrg_router::negotiation::negotiate;
//! use rrg_router::netlist::{FixedCriticality, Net, StaticNetlist};
//! use rrg_router::rrg::{RrNode, Rrg, RrgView, Switch};
//! use rrg_router::scratch::ScratchTable;
//! use rrg_router::types::{BoundingBox, NetId, RrNodeKind, SwitchId};
//!
//! fn main() {
//!     let mut rrg = Rrg::new(vec![Switch {
//!         r: 1.0,
//!         t_del: 1e-12,
//!         c_internal: 0.0,
//!         buffered: true,
//!         configurable: true,
//!     }]);
//!     let source = rrg.add_node(RrNode {
//!         kind: RrNodeKind::Source,
//!         bbox: BoundingBox::point(0, 0, 0),
//!         capacity: 1,
//!         ptc: 0,
//!         r: 0.0,
//!         c: 0.0,
//!         cost_index: 0,
//!         non_config_set: None,
//!     });
//!     let sink = rrg.add_node(RrNode {
//!         kind: RrNodeKind::Sink,
//!         bbox: BoundingBox::point(1, 1, 0),
//!         capacity: 1,
//!         ptc: 0,
//!         r: 0.0,
//!         c: 0.0,
//!         cost_index: 0,
//!         non_config_set: None,
//!     });
//!     rrg.add_edge(source, sink, SwitchId(0));
//!
//!     let netlist = StaticNetlist::new(vec![Net {
//!         id: NetId(0),
//!         source,
//!         sinks: vec![sink],
//!         is_global: false,
//!         is_ignored: false,
//!         is_clock: false,
//!     }]);
//!     let mut timing = FixedCriticality(0.0);
//!     let config = RouterConfig::default();
//!     let full_device_bbox = BoundingBox::point(1, 1, 0);
//!
//!     let result = negotiate(
//!         &rrg,
//!         BinaryHeap::new(),
//!         &mut ScratchTable::new(rrg.num_nodes()),
//!         &NoOpLookahead,
//!         &netlist,
//!         &mut timing,
//!         &config,
//!         full_device_bbox,
//!     )
//!     .expect("this tiny example always converges");
//!
//!     assert!(result.converged);
//!     assert_eq!(result.trees.len(), 1);
//! }
//! ```

pub mod config;
pub mod connection_router;
pub mod constraints;
pub mod cost;
pub mod error;
pub mod heap;
pub mod lookahead;
pub mod negotiation;
pub mod net_router;
pub mod netlist;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod predictor;
pub mod route_tree;
pub mod rrg;
pub mod scratch;
pub mod stats;
#[cfg(test)]
mod test;
pub mod trace;
pub mod types;

pub use config::RouterConfig;
pub use error::RouterError;
pub use negotiation::{negotiate, NegotiationResult};
pub use rrg::RrgView;
pub use trace::Traceback;
