//! Budget checker
//!
//! The consumed amount is the field value itself. A missing or non-numeric
//! value leaves the budget not evaluable.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{absent, mismatched, AssertionChecker, AssertionResult};
use crate::context::as_number;
use crate::contracts::{AssertionKind, AssertionSpec};
use crate::provenance::FieldProvenance;

/// Checker for [`AssertionKind::Budget`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetChecker;

impl AssertionChecker for BudgetChecker {
    fn kind(&self) -> AssertionKind {
        AssertionKind::Budget
    }

    fn check(
        &self,
        observed: Option<&Value>,
        spec: &AssertionSpec,
        _provenance: Option<&FieldProvenance>,
        _now: DateTime<Utc>,
    ) -> AssertionResult {
        let AssertionSpec::Budget(spec) = spec else {
            return mismatched(self.kind(), spec);
        };

        let Some(observed) = observed else {
            return absent(self.kind());
        };
        let Some(used) = as_number(observed) else {
            return AssertionResult::not_evaluable(
                self.kind(),
                format!("consumption for budget '{}' is not numeric", spec.budget_id),
            );
        };

        if used > spec.limit {
            return AssertionResult::fail(
                self.kind(),
                spec.on_violation,
                format!(
                    "budget '{}' exceeded: {} of {} {}",
                    spec.budget_id, used, spec.limit, spec.unit
                ),
            )
            .with_observed(used);
        }

        if let Some(ratio) = spec.warn_remaining_ratio {
            // A zero limit leaves no meaningful ratio
            if spec.limit > 0.0 {
                let remaining = (spec.limit - used) / spec.limit;
                if remaining < ratio {
                    return AssertionResult::fail(
                        self.kind(),
                        spec.on_below,
                        format!(
                            "budget '{}' running low: {:.1}% of {} {} remaining",
                            spec.budget_id,
                            remaining * 100.0,
                            spec.limit,
                            spec.unit
                        ),
                    )
                    .with_observed(used);
                }
            }
        }

        AssertionResult::pass(
            self.kind(),
            format!(
                "budget '{}' within limit: {} of {} {}",
                spec.budget_id, used, spec.limit, spec.unit
            ),
        )
        .with_observed(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{BudgetAssertion, Severity};
    use crate::engine::checkers::AssertionStatus;
    use crate::provenance::PendingStamp;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn spec(warn_remaining_ratio: Option<f64>) -> AssertionSpec {
        AssertionSpec::Budget(BudgetAssertion {
            budget_id: "tokens".to_string(),
            unit: "tokens".to_string(),
            limit: 1000.0,
            warn_remaining_ratio,
            on_violation: Severity::Blocking,
            on_below: Severity::Warning,
        })
    }

    fn check(observed: Option<&Value>, ratio: Option<f64>) -> AssertionResult {
        BudgetChecker.check(observed, &spec(ratio), None, Utc::now())
    }

    #[test]
    fn test_within_limit() {
        let result = check(Some(&json!(400)), Some(0.2));
        assert!(result.passed());
        assert_eq!(result.observed, Some(json!(400.0)));
    }

    #[test]
    fn test_over_limit_uses_on_violation() {
        let result = check(Some(&json!(1200)), None);
        assert_eq!(result.severity, Some(Severity::Blocking));
    }

    #[test]
    fn test_limit_is_inclusive() {
        assert!(check(Some(&json!(1000)), None).passed());
    }

    #[test]
    fn test_low_remaining_uses_on_below() {
        let result = check(Some(&json!(900)), Some(0.2));
        assert_eq!(result.severity, Some(Severity::Warning));
        assert!(result.message.contains("running low"));
    }

    #[test]
    fn test_metadata_does_not_replace_consumption() {
        let mut metadata = BTreeMap::new();
        metadata.insert("budget.tokens.consumed".to_string(), "1500".to_string());
        let record = PendingStamp::new("usage", "generate", &json!("n/a"), metadata, Utc::now())
            .apply_to(None);

        let result = BudgetChecker.check(Some(&json!("n/a")), &spec(None), Some(&record), Utc::now());
        assert_eq!(result.status, AssertionStatus::NotEvaluable);
        let result = BudgetChecker.check(None, &spec(None), Some(&record), Utc::now());
        assert_eq!(result.status, AssertionStatus::NotEvaluable);
    }

    #[test]
    fn test_non_numeric_is_not_evaluable() {
        assert_eq!(check(Some(&json!("lots")), None).status, AssertionStatus::NotEvaluable);
        assert_eq!(check(None, None).status, AssertionStatus::NotEvaluable);
    }
}
