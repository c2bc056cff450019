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

//! The lookahead: an external oracle answering "expected remaining (delay, congestion) from
//! node X to sink Y given upstream R" (spec §2, §6). Construction is out of scope; this module
//! only defines the query interface the connection router consumes, plus a no-op implementation
//! that degrades the search to Dijkstra.

use crate::types::RrNodeId;

/// Expected remaining delay and congestion from a node to a target, as reported by a lookahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedCost {
    /// Estimated remaining delay.
    pub delay: f64,
    /// Estimated remaining congestion cost.
    pub congestion: f64,
}

/// Query interface for the A* heuristic. Implementations must be admissible (never overestimate)
/// for the search to remain optimal, but the router must remain *correct* (just not necessarily
/// optimal) under any non-negative lookahead, including one that isn't admissible.
pub trait Lookahead {
    /// Expected scalar cost (already combining delay and congestion to whatever weighting the
    /// lookahead was built with) from `node` to `target`, given the upstream resistance
    /// accumulated so far.
    fn expected_cost(&self, node: RrNodeId, target: RrNodeId, r_upstream: f64) -> f64;

    /// Expected remaining delay and congestion, reported separately. Used by the post-target
    /// pruning rescale in the parallel router (spec §4.6), which needs a delay-only
    /// non-overestimating bound distinct from the (possibly inadmissible) ordering heuristic.
    fn expected_delay_and_cong(
        &self,
        node: RrNodeId,
        target: RrNodeId,
        r_upstream: f64,
    ) -> ExpectedCost;
}

/// A lookahead that always reports zero remaining cost. Plugging this in degrades the A* search
/// to plain Dijkstra: every heap key collapses to the true backward cost, so the search still
/// finds a legal (if less directed) path. Spec §8 requires this substitution to still produce a
/// legal routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLookahead;

impl Lookahead for NoOpLookahead {
    fn expected_cost(&self, _node: RrNodeId, _target: RrNodeId, _r_upstream: f64) -> f64 {
        0.0
    }

    fn expected_delay_and_cong(
        &self,
        _node: RrNodeId,
        _target: RrNodeId,
        _r_upstream: f64,
    ) -> ExpectedCost {
        ExpectedCost {
            delay: 0.0,
            congestion: 0.0,
        }
    }
}
