//! Delegation authority checker
//!
//! The producing agent is taken as given (identity is not verified here); the
//! checker only compares the stamped `delegation.agent` and
//! `delegation.depth` against the declared allow-list and depth limit.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{absent, mismatched, AssertionChecker, AssertionResult};
use crate::contracts::{AssertionKind, AssertionSpec};
use crate::provenance::FieldProvenance;

pub const AGENT_KEY: &str = "delegation.agent";
pub const DEPTH_KEY: &str = "delegation.depth";

/// Checker for [`AssertionKind::Delegation`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DelegationChecker;

impl AssertionChecker for DelegationChecker {
    fn kind(&self) -> AssertionKind {
        AssertionKind::Delegation
    }

    fn check(
        &self,
        observed: Option<&Value>,
        spec: &AssertionSpec,
        provenance: Option<&FieldProvenance>,
        _now: DateTime<Utc>,
    ) -> AssertionResult {
        let AssertionSpec::Delegation(spec) = spec else {
            return mismatched(self.kind(), spec);
        };
        if observed.is_none() {
            return absent(self.kind());
        }

        let Some(agent) = provenance.and_then(|p| p.metadata(AGENT_KEY)) else {
            return AssertionResult::not_evaluable(self.kind(), "no delegate agent recorded");
        };

        if !spec.allowed_delegates.iter().any(|d| d == agent) {
            return AssertionResult::fail(
                self.kind(),
                spec.on_violation,
                format!("agent '{}' is not an allowed delegate", agent),
            )
            .with_observed(agent);
        }

        if let Some(max_depth) = spec.max_depth {
            let depth = provenance.and_then(|p| p.metadata(DEPTH_KEY));
            match depth.map(|d| d.trim().parse::<u32>()) {
                Some(Ok(depth)) if depth > max_depth => {
                    return AssertionResult::fail(
                        self.kind(),
                        spec.on_violation,
                        format!(
                            "agent '{}' acted at delegation depth {}, max {}",
                            agent, depth, max_depth
                        ),
                    )
                    .with_observed(agent);
                }
                Some(Err(_)) => {
                    return AssertionResult::not_evaluable(
                        self.kind(),
                        "delegation depth is not numeric",
                    );
                }
                _ => {}
            }
        }

        AssertionResult::pass(self.kind(), format!("agent '{}' is an allowed delegate", agent))
            .with_observed(agent)
    }
}
