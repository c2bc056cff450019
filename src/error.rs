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

//! Error types for every layer of the router, composed into a single [`RouterError`].

use thiserror::Error;

use crate::types::{NetId, RrNodeId, SinkIndex};

/// Failure of a single sink's maze search.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRouterError {
    /// The heap was exhausted (within the full-device bounding box) without reaching the sink.
    #[error("net {net:?}: no path found to sink {sink:?} (rr node {sink_node:?})")]
    Unrouteable {
        /// The net being routed.
        net: NetId,
        /// The sink index within the net.
        sink: SinkIndex,
        /// The RR node id of the target sink.
        sink_node: RrNodeId,
    },
    /// Pre-search setup produced an empty heap (no expandable tree node survived pruning).
    #[error("net {net:?}: heap was empty before starting the search for sink {sink:?}")]
    EmptyHeapAtStart {
        /// The net being routed.
        net: NetId,
        /// The sink index within the net.
        sink: SinkIndex,
    },
}

/// Failure while mutating a net's route tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteTreeError {
    /// An internal invariant (R_upstream/C_downstream/Tdel consistency, SINK leafness,
    /// parent/child linkage) did not hold. This should never trigger; it indicates a bug.
    #[error("route tree invariant violated: {0}")]
    Invariant(&'static str),
    /// Asked to splice a search result that does not connect back to any node in the tree.
    #[error("search result for sink {0:?} does not attach to the existing tree")]
    Disconnected(SinkIndex),
    /// Looked up a sink index that the tree does not know about.
    #[error("sink index {0:?} is not part of this net")]
    UnknownSink(SinkIndex),
}

/// Failure while orchestrating the routing of one net within an iteration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetRouterError {
    /// One connection failed outright (see [`ConnectionRouterError`]).
    #[error("connection router failed: {0}")]
    Connection(#[from] ConnectionRouterError),
    /// The route tree rejected an operation (see [`RouteTreeError`]).
    #[error("route tree error: {0}")]
    Tree(#[from] RouteTreeError),
}

/// Reason the negotiation loop stopped before reporting success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The abort predictor estimated convergence would take too long.
    Predictor,
    /// Iteration 1 already consumed more than the wirelength abort threshold.
    WirelengthHeuristic,
    /// `max_router_iterations` was reached without a legal routing.
    MaxIterations,
}

/// Failure of the outer negotiation loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// A net could not be routed at all; fatal for the whole run.
    #[error("net {net:?} is unrouteable: {source}")]
    NetUnrouteable {
        /// The net that failed.
        net: NetId,
        /// The underlying per-connection failure.
        source: NetRouterError,
    },
    /// The loop stopped early without reaching a legal routing.
    #[error("routing aborted after {iteration} iterations ({reason:?}), {overused_nodes} nodes still overused")]
    Aborted {
        /// Why the loop stopped.
        reason: AbortReason,
        /// Iteration at which the abort happened.
        iteration: usize,
        /// Number of overused nodes at abort time.
        overused_nodes: usize,
    },
}

/// Failure decoding or validating a persisted traceback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// A traceback entry referenced a switch id that does not exist in the current RRG and
    /// `verify_switch_id` was set, so no remap fallback was attempted.
    #[error("traceback entry for rr node {0:?} references an unknown switch id")]
    UnknownSwitch(RrNodeId),
    /// A traceback entry referenced an RR node id that does not exist in the current RRG.
    #[error("traceback entry references unknown rr node {0:?}")]
    UnknownNode(RrNodeId),
    /// The traceback's edges do not form a walkable path (a child is not actually reachable
    /// from its recorded parent in the RRG).
    #[error("traceback entry for rr node {0:?} is not reachable from its recorded parent")]
    NotWalkable(RrNodeId),
}

/// Failure parsing or applying a user routing constraints file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// A net-name pattern failed to compile as a regex.
    #[error("invalid net-name pattern `{0}`: {1}")]
    InvalidPattern(String, String),
    /// A `dedicated_network` scheme did not name a network.
    #[error("routing scheme for `{0}` selects dedicated_network but names no network")]
    MissingNetworkName(String),
}

/// Top-level error type returned to callers of the router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// See [`NetRouterError`].
    #[error(transparent)]
    NetRouter(#[from] NetRouterError),
    /// See [`NegotiationError`].
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    /// See [`TraceError`].
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// See [`ConstraintError`].
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    /// See [`RouteTreeError`].
    #[error(transparent)]
    Tree(#[from] RouteTreeError),
}
