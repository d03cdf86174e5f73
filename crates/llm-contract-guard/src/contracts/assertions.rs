//! Assertion specifications
//!
//! The closed set of assertion kinds a field can carry beyond presence. A new
//! concern is added as a new variant here plus a checker registered for its
//! [`AssertionKind`]; there is no free-form assertion block.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schemas::{blocking, warning, Severity};
use crate::error::SchemaError;

/// Tag identifying which checker evaluates an assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// Metric threshold on the produced value
    Quality,
    /// Age of the last provenance stamp
    Staleness,
    /// Consumption against a budget
    Budget,
    /// Score recorded by an external evaluator
    Evaluation,
    /// Authority of the agent that produced the value
    Delegation,
}

impl AssertionKind {
    /// All kinds, in declaration order
    pub const ALL: [AssertionKind; 5] = [
        AssertionKind::Quality,
        AssertionKind::Staleness,
        AssertionKind::Budget,
        AssertionKind::Evaluation,
        AssertionKind::Delegation,
    ];

    /// Stable lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionKind::Quality => "quality",
            AssertionKind::Staleness => "staleness",
            AssertionKind::Budget => "budget",
            AssertionKind::Evaluation => "evaluation",
            AssertionKind::Delegation => "delegation",
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-tagged assertion attached to a field or chain link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertionSpec {
    Quality(QualityAssertion),
    Staleness(StalenessAssertion),
    Budget(BudgetAssertion),
    Evaluation(EvaluationAssertion),
    Delegation(DelegationAssertion),
    /// Presence-only
    None,
}

/// Metric must reach a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityAssertion {
    /// Dot-path of the metric inside the field value
    pub metric_path: String,
    /// Minimum acceptable value (inclusive)
    pub threshold: f64,
    /// Severity when the metric is below the threshold
    #[serde(default = "warning")]
    pub on_below: Severity,
    /// Severity when the metric is outside the normalized [0, 1] range
    #[serde(default = "blocking")]
    pub on_violation: Severity,
}

/// Last stamp must be recent enough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StalenessAssertion {
    /// Maximum age of the field's provenance stamp
    pub max_age_seconds: u64,
    /// Configuration version the stamp must carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_config_version: Option<String>,
    #[serde(default = "blocking")]
    pub on_violation: Severity,
}

/// Consumption must stay within a limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetAssertion {
    pub budget_id: String,
    /// Unit of the budget (tokens, usd, calls, ...)
    pub unit: String,
    /// Maximum consumption (inclusive)
    pub limit: f64,
    /// Remaining fraction of the limit below which `on_below` applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_remaining_ratio: Option<f64>,
    #[serde(default = "blocking")]
    pub on_violation: Severity,
    #[serde(default = "warning")]
    pub on_below: Severity,
}

/// Evaluator-recorded score must reach a minimum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationAssertion {
    /// Evaluator expected to have scored the field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator_id: Option<String>,
    pub min_score: f64,
    #[serde(default = "warning")]
    pub on_below: Severity,
    /// Severity when the evaluator rejected the value or is not the expected one
    #[serde(default = "blocking")]
    pub on_violation: Severity,
}

/// Producing agent must be an allowed delegate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelegationAssertion {
    pub allowed_delegates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default = "blocking")]
    pub on_violation: Severity,
}

impl AssertionSpec {
    /// Kind of this assertion, `None` for presence-only
    pub fn kind(&self) -> Option<AssertionKind> {
        match self {
            AssertionSpec::Quality(_) => Some(AssertionKind::Quality),
            AssertionSpec::Staleness(_) => Some(AssertionKind::Staleness),
            AssertionSpec::Budget(_) => Some(AssertionKind::Budget),
            AssertionSpec::Evaluation(_) => Some(AssertionKind::Evaluation),
            AssertionSpec::Delegation(_) => Some(AssertionKind::Delegation),
            AssertionSpec::None => None,
        }
    }

    /// Severity applied to a hard violation
    pub fn on_violation(&self) -> Option<Severity> {
        match self {
            AssertionSpec::Quality(a) => Some(a.on_violation),
            AssertionSpec::Staleness(a) => Some(a.on_violation),
            AssertionSpec::Budget(a) => Some(a.on_violation),
            AssertionSpec::Evaluation(a) => Some(a.on_violation),
            AssertionSpec::Delegation(a) => Some(a.on_violation),
            AssertionSpec::None => None,
        }
    }

    /// Severity applied to a below-threshold result, for threshold-style kinds
    pub fn on_below(&self) -> Option<Severity> {
        match self {
            AssertionSpec::Quality(a) => Some(a.on_below),
            AssertionSpec::Budget(a) => Some(a.on_below),
            AssertionSpec::Evaluation(a) => Some(a.on_below),
            AssertionSpec::Staleness(_) | AssertionSpec::Delegation(_) | AssertionSpec::None => {
                None
            }
        }
    }

    /// Strongest severity this assertion can produce
    pub fn max_severity(&self) -> Option<Severity> {
        match (self.on_violation(), self.on_below()) {
            (Some(v), Some(b)) => Some(v.max(b)),
            (v, b) => v.or(b),
        }
    }

    /// Reject parameters that are malformed or that make a BLOCKING
    /// assertion impossible to satisfy
    pub fn validate_structure(&self, field: &str) -> Result<(), SchemaError> {
        let Some(kind) = self.kind() else {
            return Ok(());
        };
        let invalid = |reason: String| SchemaError::InvalidAssertion {
            kind,
            field: field.to_string(),
            reason,
        };
        let unsatisfiable = |reason: String| SchemaError::UnsatisfiableAssertion {
            kind,
            field: field.to_string(),
            reason,
        };

        match self {
            AssertionSpec::Quality(a) => {
                if a.metric_path.trim().is_empty() {
                    return Err(invalid("metric_path is empty".to_string()));
                }
                if !a.threshold.is_finite() {
                    return Err(invalid(format!("threshold {} is not finite", a.threshold)));
                }
                if a.on_below.is_blocking() && !(0.0..=1.0).contains(&a.threshold) {
                    return Err(unsatisfiable(format!(
                        "threshold {} lies outside the metric range [0, 1]",
                        a.threshold
                    )));
                }
            }
            AssertionSpec::Staleness(a) => {
                if a.on_violation.is_blocking() && a.max_age_seconds == 0 {
                    return Err(unsatisfiable("max_age_seconds is 0".to_string()));
                }
            }
            AssertionSpec::Budget(a) => {
                if a.budget_id.trim().is_empty() {
                    return Err(invalid("budget_id is empty".to_string()));
                }
                if !a.limit.is_finite() || a.limit < 0.0 {
                    return Err(invalid(format!("limit {} must be finite and >= 0", a.limit)));
                }
                if let Some(ratio) = a.warn_remaining_ratio {
                    if !(0.0..=1.0).contains(&ratio) {
                        return Err(invalid(format!(
                            "warn_remaining_ratio {} lies outside [0, 1]",
                            ratio
                        )));
                    }
                    if a.on_below.is_blocking() && ratio >= 1.0 {
                        return Err(unsatisfiable(
                            "warn_remaining_ratio of 1 fails on any consumption".to_string(),
                        ));
                    }
                }
            }
            AssertionSpec::Evaluation(a) => {
                if !a.min_score.is_finite() {
                    return Err(invalid(format!("min_score {} is not finite", a.min_score)));
                }
            }
            AssertionSpec::Delegation(a) => {
                if a.on_violation.is_blocking() && a.allowed_delegates.is_empty() {
                    return Err(unsatisfiable("allowed_delegates is empty".to_string()));
                }
            }
            AssertionSpec::None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quality_assertion_from_document() {
        let spec: AssertionSpec = serde_json::from_value(json!({
            "kind": "quality",
            "metric_path": "retrieval_confidence",
            "threshold": 0.7,
            "on_below": "WARNING"
        }))
        .unwrap();

        assert_eq!(spec.kind(), Some(AssertionKind::Quality));
        assert_eq!(spec.on_below(), Some(Severity::Warning));
        assert_eq!(spec.on_violation(), Some(Severity::Blocking));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = serde_json::from_value::<AssertionSpec>(json!({
            "kind": "sentiment",
            "threshold": 0.5
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let result = serde_json::from_value::<AssertionSpec>(json!({
            "kind": "staleness",
            "max_age_seconds": 60,
            "max_age_minutes": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_none_has_no_kind_or_severity() {
        let spec: AssertionSpec = serde_json::from_value(json!({"kind": "none"})).unwrap();
        assert_eq!(spec, AssertionSpec::None);
        assert!(spec.kind().is_none());
        assert!(spec.max_severity().is_none());
        assert!(spec.validate_structure("x").is_ok());
    }

    #[test]
    fn test_blocking_quality_threshold_out_of_range() {
        let spec = AssertionSpec::Quality(QualityAssertion {
            metric_path: "confidence".to_string(),
            threshold: 1.5,
            on_below: Severity::Blocking,
            on_violation: Severity::Blocking,
        });
        assert!(matches!(
            spec.validate_structure("context"),
            Err(SchemaError::UnsatisfiableAssertion { .. })
        ));

        let warning_only = AssertionSpec::Quality(QualityAssertion {
            metric_path: "confidence".to_string(),
            threshold: 1.5,
            on_below: Severity::Warning,
            on_violation: Severity::Blocking,
        });
        assert!(warning_only.validate_structure("context").is_ok());
    }

    #[test]
    fn test_blocking_zero_staleness_window() {
        let spec = AssertionSpec::Staleness(StalenessAssertion {
            max_age_seconds: 0,
            expected_config_version: None,
            on_violation: Severity::Blocking,
        });
        assert!(matches!(
            spec.validate_structure("index"),
            Err(SchemaError::UnsatisfiableAssertion { .. })
        ));
    }

    #[test]
    fn test_negative_budget_limit() {
        let spec = AssertionSpec::Budget(BudgetAssertion {
            budget_id: "tokens".to_string(),
            unit: "tokens".to_string(),
            limit: -1.0,
            warn_remaining_ratio: None,
            on_violation: Severity::Warning,
            on_below: Severity::Advisory,
        });
        assert!(matches!(
            spec.validate_structure("usage"),
            Err(SchemaError::InvalidAssertion { .. })
        ));
    }

    #[test]
    fn test_blocking_delegation_without_delegates() {
        let spec = AssertionSpec::Delegation(DelegationAssertion {
            allowed_delegates: vec![],
            max_depth: None,
            on_violation: Severity::Blocking,
        });
        assert!(spec.validate_structure("answer").is_err());
    }

    #[test]
    fn test_max_severity() {
        let spec = AssertionSpec::Evaluation(EvaluationAssertion {
            evaluator_id: None,
            min_score: 0.5,
            on_below: Severity::Advisory,
            on_violation: Severity::Warning,
        });
        assert_eq!(spec.max_severity(), Some(Severity::Warning));
    }
}
