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

//! The routing-failure predictor (spec §4.5): fits a line to `log(overused_nodes)` over the
//! back half of the iteration history and estimates how many more iterations convergence would
//! take, aborting early if that estimate is hopeless.

use crate::config::{RouterConfig, RoutingFailurePredictor};
use crate::error::AbortReason;

/// A least-squares fit of `log(overused_nodes)` against iteration number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictorFit {
    slope: f64,
    intercept: f64,
}

impl PredictorFit {
    /// The iteration at which the fit predicts overuse would reach zero, or `None` if overuse is
    /// not trending downward (a non-negative slope never reaches zero).
    pub fn predicted_zero_iteration(&self) -> Option<f64> {
        if self.slope >= 0.0 {
            None
        } else {
            Some(-self.intercept / self.slope)
        }
    }
}

/// Fit a line to `log(overused_nodes)` over the most recent half of `history`, skipping
/// iterations with zero overuse (undefined log). Returns `None` if fewer than two usable points
/// remain.
pub fn fit_log_overuse(history: &[(usize, u64)]) -> Option<PredictorFit> {
    let n = history.len();
    if n < 2 {
        return None;
    }
    let start = n / 2;
    let points: Vec<(f64, f64)> = history[start..]
        .iter()
        .filter(|&&(_, overused)| overused > 0)
        .map(|&(iteration, overused)| (iteration as f64, (overused as f64).ln()))
        .collect();
    if points.len() < 2 {
        return None;
    }

    let n_f = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();
    let sum_xx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n_f;
    Some(PredictorFit { slope, intercept })
}

/// Decide whether the abort predictor should stop the outer loop now, given the iteration
/// history and current overuse. Returns `None` when routing should continue.
pub fn should_abort(
    config: &RouterConfig,
    history: &[(usize, u64)],
    current_overuse: u64,
) -> Option<AbortReason> {
    let factor = match config.routing_failure_predictor {
        RoutingFailurePredictor::Off => return None,
        RoutingFailurePredictor::Safe => config.safe_factor,
        RoutingFailurePredictor::Aggressive => config.aggressive_factor,
    };
    if current_overuse <= config.min_overuse_threshold {
        return None;
    }
    let fit = fit_log_overuse(history)?;
    let predicted = fit.predicted_zero_iteration()?;
    let threshold = factor * config.max_router_iterations as f64;
    if predicted > threshold {
        Some(AbortReason::Predictor)
    } else {
        None
    }
}

/// Early exit if iteration 1 already consumed more than `init_wirelength_abort_threshold` of
/// available wirelength.
pub fn wirelength_abort(
    config: &RouterConfig,
    iteration: usize,
    used_wirelength: u64,
    available_wirelength: u64,
) -> Option<AbortReason> {
    if iteration != 1 || available_wirelength == 0 {
        return None;
    }
    let frac = used_wirelength as f64 / available_wirelength as f64;
    if frac > config.init_wirelength_abort_threshold {
        Some(AbortReason::WirelengthHeuristic)
    } else {
        None
    }
}
