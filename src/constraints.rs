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

//! User routing constraints (spec §6): a mapping from net-name pattern (literal or regex) to a
//! routing scheme. Exact matches are tried before regex patterns, in the order they were added.

use std::collections::HashMap;

use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConstraintError;

/// How a net matched by a constraint should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RouteModel {
    /// Not routed; delay downstream of the net is treated as zero.
    Ideal,
    /// Routed as an ordinary global net.
    Routed,
    /// Routed in two stages through a named dedicated network (e.g. a clock spine).
    DedicatedNetwork,
}

/// A routing scheme assigned to one or more nets by name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoutingScheme {
    /// How to route nets matching this scheme.
    pub model: RouteModel,
    /// The dedicated network's name, required when `model` is [`RouteModel::DedicatedNetwork`].
    pub network_name: Option<String>,
}

impl RoutingScheme {
    fn validate(&self, pattern: &str) -> Result<(), ConstraintError> {
        if self.model == RouteModel::DedicatedNetwork && self.network_name.is_none() {
            return Err(ConstraintError::MissingNetworkName(pattern.to_string()));
        }
        Ok(())
    }
}

/// The full set of user routing constraints for a design.
#[derive(Debug, Clone, Default)]
pub struct UserRouteConstraints {
    literal: HashMap<String, RoutingScheme>,
    patterns: Vec<(Regex, RoutingScheme)>,
}

impl UserRouteConstraints {
    /// An empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact net-name match.
    pub fn add_literal(&mut self, net_name: &str, scheme: RoutingScheme) -> Result<(), ConstraintError> {
        scheme.validate(net_name)?;
        self.literal.insert(net_name.to_string(), scheme);
        Ok(())
    }

    /// Add a regex net-name pattern, tried after all literal matches fail.
    pub fn add_pattern(&mut self, pattern: &str, scheme: RoutingScheme) -> Result<(), ConstraintError> {
        scheme.validate(pattern)?;
        let regex = Regex::new(pattern)
            .map_err(|e| ConstraintError::InvalidPattern(pattern.to_string(), e.to_string()))?;
        self.patterns.push((regex, scheme));
        Ok(())
    }

    /// Look up the routing scheme for `net_name`, trying exact matches first, then patterns in
    /// insertion order.
    pub fn lookup(&self, net_name: &str) -> Option<&RoutingScheme> {
        if let Some(scheme) = self.literal.get(net_name) {
            return Some(scheme);
        }
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(net_name))
            .map(|(_, scheme)| scheme)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_match_wins_over_a_pattern_that_would_also_match() {
        let mut constraints = UserRouteConstraints::new();
        constraints
            .add_pattern(
                r"^clk.*",
                RoutingScheme {
                    model: RouteModel::Routed,
                    network_name: None,
                },
            )
            .unwrap();
        constraints
            .add_literal(
                "clk_main",
                RoutingScheme {
                    model: RouteModel::DedicatedNetwork,
                    network_name: Some("global_clk".to_string()),
                },
            )
            .unwrap();

        let scheme = constraints.lookup("clk_main").unwrap();
        assert_eq!(scheme.model, RouteModel::DedicatedNetwork);
        assert_eq!(scheme.network_name.as_deref(), Some("global_clk"));
    }

    #[test]
    fn pattern_match_applies_when_no_literal_matches() {
        let mut constraints = UserRouteConstraints::new();
        constraints
            .add_pattern(
                r"^rst_.*",
                RoutingScheme {
                    model: RouteModel::Ideal,
                    network_name: None,
                },
            )
            .unwrap();
        let scheme = constraints.lookup("rst_async").unwrap();
        assert_eq!(scheme.model, RouteModel::Ideal);
    }

    #[test]
    fn unmatched_net_name_returns_none() {
        let constraints = UserRouteConstraints::new();
        assert!(constraints.lookup("anything").is_none());
    }

    #[test]
    fn dedicated_network_without_a_name_is_rejected() {
        let mut constraints = UserRouteConstraints::new();
        let err = constraints
            .add_literal(
                "clk",
                RoutingScheme {
                    model: RouteModel::DedicatedNetwork,
                    network_name: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ConstraintError::MissingNetworkName(_)));
    }

    #[test]
    fn invalid_regex_pattern_is_rejected() {
        let mut constraints = UserRouteConstraints::new();
        let err = constraints
            .add_pattern(
                "(unclosed",
                RoutingScheme {
                    model: RouteModel::Routed,
                    network_name: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidPattern(_, _)));
    }
}
