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

//! Per-edge cost evaluation (spec §4.4): the R/C-aware Elmore delay estimate and the
//! congestion-penalty term that together drive both the maze search and the Pathfinder
//! negotiation loop.

use crate::rrg::Switch;
use crate::types::RrNodeKind;

/// The subset of an edge's source/target endpoints needed to evaluate its cost, independent of
/// how the caller stores its scratch table.
#[derive(Debug, Clone, Copy)]
pub struct EdgeContext {
    /// Node kind of the edge's source, used for bend-cost detection.
    pub from_kind: RrNodeKind,
    /// Node resistance of the edge's source, used for the internal-capacitance correction.
    pub from_r: f64,
    /// Upstream resistance to ground at the edge's source.
    pub from_r_upstream: f64,
    /// True cost accumulated to reach the edge's source.
    pub from_backward_cost: f64,
    /// Node kind of the edge's target, used for bend-cost detection.
    pub to_kind: RrNodeKind,
    /// Node resistance of the edge's target.
    pub to_r: f64,
    /// Node capacitance of the edge's target.
    pub to_c: f64,
    /// Precomputed base routing cost of the edge's target (already `sqrt(fanout)`-scaled for
    /// pass-transistor nodes per spec §4.4).
    pub to_base_cost: f64,
}

/// Present/historical congestion state read from the target node's persistent scratch entry.
#[derive(Debug, Clone, Copy)]
pub struct CongestionState {
    /// Historical penalty, updated once per iteration by the negotiation loop.
    pub acc_cost: f64,
    /// Present penalty, a function of current occupancy/capacity/`present_factor`.
    pub pres_cost: f64,
}

/// Tunables that shape the cost function, carried per search (criticality is per-sink, the rest
/// are global router settings).
#[derive(Debug, Clone, Copy)]
pub struct CostParams {
    /// Timing criticality of the connection being routed, in `[0, 1]`.
    pub criticality: f64,
    /// Weight applied to the A* lookahead heuristic.
    pub astar_factor: f64,
    /// Added to the backward cost whenever the path bends between a CHANX and a CHANY.
    pub bend_cost: f64,
    /// Optional choking-spot discount exponent `k`: divides congestion cost by `2^k`.
    pub choking_discount: Option<u32>,
}

/// Result of evaluating one candidate edge `u -> v` via a chosen switch.
#[derive(Debug, Clone, Copy)]
pub struct EdgeCost {
    /// New upstream resistance to ground at `v`.
    pub r_upstream: f64,
    /// New true cost to reach `v` via this edge.
    pub backward_cost: f64,
    /// Delay contribution of this edge alone (half-segment Elmore plus internal-cap correction),
    /// exposed for the route tree's timing bookkeeping and for tests.
    pub t_del_segment: f64,
    /// Congestion contribution of this edge alone (`0` when `v` is the non-first member of an
    /// already-entered non-configurable set).
    pub congestion: f64,
}

/// Evaluate the cost of taking `switch` from a node in context `ctx`, given the target's
/// congestion state. `same_non_config_set_already_entered` is `true` when `v` belongs to a
/// non-configurable set whose first member was already charged on this same expansion (spec
/// §4.4: "the set's cost was paid when the first member was entered").
pub fn evaluate_edge(
    ctx: &EdgeContext,
    switch: &Switch,
    congestion: CongestionState,
    params: &CostParams,
    same_non_config_set_already_entered: bool,
) -> EdgeCost {
    let r_upstream = if switch.buffered { 0.0 } else { ctx.from_r_upstream } + switch.r + ctx.to_r;

    let r_del = r_upstream - 0.5 * ctx.to_r;
    let mut t_del_segment = switch.t_del + r_del * ctx.to_c;

    let r_del_adjust = r_upstream - 0.5 * ctx.from_r;
    t_del_segment += r_del_adjust * switch.c_internal;

    let cong = if same_non_config_set_already_entered {
        0.0
    } else {
        let raw = ctx.to_base_cost * congestion.acc_cost * congestion.pres_cost;
        match params.choking_discount {
            Some(k) => raw / 2f64.powi(k as i32),
            None => raw,
        }
    };

    let bend = if is_bend(ctx.from_kind, ctx.to_kind) {
        params.bend_cost
    } else {
        0.0
    };

    let backward_cost = ctx.from_backward_cost
        + (1.0 - params.criticality) * cong
        + params.criticality * t_del_segment
        + bend;

    EdgeCost {
        r_upstream,
        backward_cost,
        t_del_segment,
        congestion: cong,
    }
}

fn is_bend(from: RrNodeKind, to: RrNodeKind) -> bool {
    matches!(
        (from, to),
        (RrNodeKind::ChanX, RrNodeKind::ChanY) | (RrNodeKind::ChanY, RrNodeKind::ChanX)
    )
}

/// Present congestion penalty for a node: `1 + max(0, occ + 1 - capacity) * present_factor`
/// (spec §4.4). Recomputed by the negotiation loop whenever a node's occupancy changes or
/// `present_factor` is reseated; cached on the node's persistent scratch entry so the hot path
/// (edge evaluation) never recomputes it.
pub fn present_cost(occ: u32, capacity: u32, present_factor: f64) -> f64 {
    let overuse = (occ as i64 + 1 - capacity as i64).max(0) as f64;
    1.0 + overuse * present_factor
}

/// Historical cost increment applied once per iteration to every overused node (spec §4.5):
/// `acc_cost += max(0, occ - capacity) * acc_factor`.
pub fn historical_cost_increment(occ: u32, capacity: u32, acc_factor: f64) -> f64 {
    let overuse = (occ as i64 - capacity as i64).max(0) as f64;
    overuse * acc_factor
}

#[cfg(test)]
mod test {
    use super::*;

    fn switch(r: f64, t_del: f64, c_internal: f64, buffered: bool) -> Switch {
        Switch {
            r,
            t_del,
            c_internal,
            buffered,
            configurable: true,
        }
    }

    #[test]
    fn buffered_switch_resets_r_upstream() {
        let ctx = EdgeContext {
            from_kind: RrNodeKind::ChanX,
            from_r: 1.0,
            from_r_upstream: 50.0,
            from_backward_cost: 0.0,
            to_kind: RrNodeKind::ChanX,
            to_r: 2.0,
            to_c: 1e-15,
            to_base_cost: 1.0,
        };
        let sw = switch(5.0, 1e-12, 0.0, true);
        let cost = evaluate_edge(
            &ctx,
            &sw,
            CongestionState {
                acc_cost: 1.0,
                pres_cost: 1.0,
            },
            &CostParams {
                criticality: 0.0,
                astar_factor: 1.0,
                bend_cost: 0.0,
                choking_discount: None,
            },
            false,
        );
        // buffered ⇒ upstream R ignores from_r_upstream entirely.
        assert!((cost.r_upstream - 7.0).abs() < 1e-9);
    }

    #[test]
    fn unbuffered_switch_accumulates_r_upstream() {
        let ctx = EdgeContext {
            from_kind: RrNodeKind::ChanX,
            from_r: 1.0,
            from_r_upstream: 50.0,
            from_backward_cost: 0.0,
            to_kind: RrNodeKind::ChanX,
            to_r: 2.0,
            to_c: 1e-15,
            to_base_cost: 1.0,
        };
        let sw = switch(5.0, 1e-12, 0.0, false);
        let cost = evaluate_edge(
            &ctx,
            &sw,
            CongestionState {
                acc_cost: 1.0,
                pres_cost: 1.0,
            },
            &CostParams {
                criticality: 0.0,
                astar_factor: 1.0,
                bend_cost: 0.0,
                choking_discount: None,
            },
            false,
        );
        assert!((cost.r_upstream - 57.0).abs() < 1e-9);
    }

    #[test]
    fn bend_cost_applies_only_between_chanx_and_chany() {
        let ctx = EdgeContext {
            from_kind: RrNodeKind::ChanX,
            from_r: 0.0,
            from_r_upstream: 0.0,
            from_backward_cost: 0.0,
            to_kind: RrNodeKind::ChanY,
            to_r: 0.0,
            to_c: 0.0,
            to_base_cost: 0.0,
        };
        let sw = switch(0.0, 0.0, 0.0, true);
        let params = CostParams {
            criticality: 0.0,
            astar_factor: 1.0,
            bend_cost: 2.5,
            choking_discount: None,
        };
        let cost = evaluate_edge(
            &ctx,
            &sw,
            CongestionState {
                acc_cost: 0.0,
                pres_cost: 1.0,
            },
            &params,
            false,
        );
        assert!((cost.backward_cost - 2.5).abs() < 1e-9);
    }

    #[test]
    fn non_config_second_member_is_free() {
        let ctx = EdgeContext {
            from_kind: RrNodeKind::ChanX,
            from_r: 0.0,
            from_r_upstream: 0.0,
            from_backward_cost: 0.0,
            to_kind: RrNodeKind::ChanX,
            to_r: 0.0,
            to_c: 0.0,
            to_base_cost: 100.0,
        };
        let sw = switch(0.0, 0.0, 0.0, true);
        let params = CostParams {
            criticality: 0.0,
            astar_factor: 1.0,
            bend_cost: 0.0,
            choking_discount: None,
        };
        let cost = evaluate_edge(
            &ctx,
            &sw,
            CongestionState {
                acc_cost: 10.0,
                pres_cost: 10.0,
            },
            &params,
            true,
        );
        assert_eq!(cost.congestion, 0.0);
    }

    #[test]
    fn present_cost_is_one_when_under_capacity() {
        assert_eq!(present_cost(0, 2, 100.0), 1.0);
    }

    #[test]
    fn present_cost_penalizes_overuse() {
        assert_eq!(present_cost(2, 1, 10.0), 1.0 + 2.0 * 10.0);
    }

    #[test]
    fn historical_cost_increment_zero_unless_overused() {
        assert_eq!(historical_cost_increment(1, 1, 1.0), 0.0);
        assert_eq!(historical_cost_increment(3, 1, 1.0), 2.0);
    }
}
