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

//! Router configuration (spec §6's CLI surface), collected into one explicit value rather than
//! read off globals (spec §9 "Global mutable state" redesign note).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::connection_router::HIGH_FANOUT_THRESHOLD;

/// Which connection-router implementation drives the outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RouterAlgorithm {
    /// One connection at a time, on the calling thread.
    #[default]
    Serial,
    /// The deterministic multi-worker connection router (spec §4.6).
    Parallel,
}

/// Which heap implementation backs the maze search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeapKind {
    /// Exact ordering, O(log n) push/pop.
    #[default]
    Binary,
    /// Approximate ordering, near-linear amortized, randomized tie-break.
    Bucket,
}

/// Abort-predictor aggressiveness (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoutingFailurePredictor {
    /// Never abort early.
    #[default]
    Off,
    /// Abort only when convergence is wildly out of reach.
    Safe,
    /// Abort more eagerly.
    Aggressive,
}

/// Hold-time repair (RCV) budgeting strategy. Only `Disable` is implemented by this core; other
/// variants are accepted so configuration files from a fuller toolchain still parse, but are
/// treated identically to `Disable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoutingBudgetsAlgorithm {
    /// No hold-time repair.
    #[default]
    Disable,
    /// Placeholder for a yoyo-style budget algorithm; not implemented here.
    Yoyo,
}

/// Full router configuration, mirroring spec §6's CLI flag table.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouterConfig {
    /// `--router_algorithm`.
    pub router_algorithm: RouterAlgorithm,
    /// `--router_heap`.
    pub router_heap: HeapKind,
    /// `--max_router_iterations`.
    pub max_router_iterations: usize,
    /// `--initial_pres_fac`.
    pub initial_pres_fac: f64,
    /// `--first_iter_pres_fac`.
    pub first_iter_pres_fac: f64,
    /// `--pres_fac_mult`.
    pub pres_fac_mult: f64,
    /// Safe ceiling `present_factor` is clipped to.
    pub max_pres_fac: f64,
    /// `--acc_fac`.
    pub acc_fac: f64,
    /// `--astar_fac`.
    pub astar_fac: f64,
    /// `--bend_cost`.
    pub bend_cost: f64,
    /// `--max_criticality`.
    pub max_criticality: f64,
    /// `--criticality_exp`.
    pub criticality_exp: f64,
    /// `--bb_factor`.
    pub bb_factor: i32,
    /// `--high_fanout_threshold`.
    pub high_fanout_threshold: usize,
    /// `--high_fanout_max_slope`.
    pub high_fanout_max_slope: f64,
    /// `--routing_failure_predictor`.
    pub routing_failure_predictor: RoutingFailurePredictor,
    /// `--routing_budgets_algorithm`.
    pub routing_budgets_algorithm: RoutingBudgetsAlgorithm,
    /// `--save_routing_per_iteration`.
    pub save_routing_per_iteration: bool,
    /// Fraction of `max_router_iterations` after which conflicted mode engages.
    pub conflicted_fraction: f64,
    /// Abort threshold for the SAFE predictor, as a fraction of `max_router_iterations`.
    pub safe_factor: f64,
    /// Abort threshold for the AGGRESSIVE predictor, as a fraction of `max_router_iterations`.
    pub aggressive_factor: f64,
    /// Minimum overused-node count before the predictor is allowed to abort.
    pub min_overuse_threshold: u64,
    /// Fraction of available wirelength that, if exceeded in iteration 1, triggers an early exit.
    pub init_wirelength_abort_threshold: f64,
    /// Criticality tolerance for forced reroute.
    pub forced_reroute_criticality_tolerance: f64,
    /// Delay tolerance (vs. lower-bound delay) for forced reroute.
    pub forced_reroute_delay_tolerance: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router_algorithm: RouterAlgorithm::default(),
            router_heap: HeapKind::default(),
            max_router_iterations: 50,
            initial_pres_fac: 0.5,
            first_iter_pres_fac: 0.0,
            pres_fac_mult: 1.3,
            max_pres_fac: 1_000.0,
            acc_fac: 1.0,
            astar_fac: 1.2,
            bend_cost: 0.0,
            max_criticality: 0.99,
            criticality_exp: 1.0,
            bb_factor: 3,
            high_fanout_threshold: HIGH_FANOUT_THRESHOLD,
            high_fanout_max_slope: 1.0,
            routing_failure_predictor: RoutingFailurePredictor::default(),
            routing_budgets_algorithm: RoutingBudgetsAlgorithm::default(),
            save_routing_per_iteration: false,
            conflicted_fraction: 0.8,
            safe_factor: 4.0,
            aggressive_factor: 2.0,
            min_overuse_threshold: 0,
            init_wirelength_abort_threshold: 0.55,
            forced_reroute_criticality_tolerance: 0.05,
            forced_reroute_delay_tolerance: 0.01,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_uses_documented_defaults() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.router_algorithm, RouterAlgorithm::Serial);
        assert_eq!(cfg.router_heap, HeapKind::Binary);
        assert_eq!(cfg.first_iter_pres_fac, 0.0);
        assert_eq!(cfg.high_fanout_threshold, HIGH_FANOUT_THRESHOLD);
    }
}
