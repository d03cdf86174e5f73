//! Evaluation gate checker
//!
//! Reads the verdict an external evaluator stamped on the field:
//! `evaluation.score`, `evaluation.passed` and `evaluation.evaluator_id`.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{absent, mismatched, AssertionChecker, AssertionResult};
use crate::contracts::{AssertionKind, AssertionSpec};
use crate::provenance::FieldProvenance;

pub const SCORE_KEY: &str = "evaluation.score";
pub const PASSED_KEY: &str = "evaluation.passed";
pub const EVALUATOR_KEY: &str = "evaluation.evaluator_id";

/// Checker for [`AssertionKind::Evaluation`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationChecker;

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl AssertionChecker for EvaluationChecker {
    fn kind(&self) -> AssertionKind {
        AssertionKind::Evaluation
    }

    fn check(
        &self,
        observed: Option<&Value>,
        spec: &AssertionSpec,
        provenance: Option<&FieldProvenance>,
        _now: DateTime<Utc>,
    ) -> AssertionResult {
        let AssertionSpec::Evaluation(spec) = spec else {
            return mismatched(self.kind(), spec);
        };
        if observed.is_none() {
            return absent(self.kind());
        }

        let Some(record) = provenance else {
            return AssertionResult::not_evaluable(self.kind(), "field has no provenance stamp");
        };

        if let Some(expected) = &spec.evaluator_id {
            match record.metadata(EVALUATOR_KEY) {
                Some(actual) if actual == expected => {}
                Some(actual) => {
                    return AssertionResult::fail(
                        self.kind(),
                        spec.on_violation,
                        format!("scored by evaluator '{}', expected '{}'", actual, expected),
                    );
                }
                None => {
                    return AssertionResult::not_evaluable(
                        self.kind(),
                        format!("no evaluator recorded, expected '{}'", expected),
                    );
                }
            }
        }

        if record.metadata(PASSED_KEY).and_then(parse_flag) == Some(false) {
            return AssertionResult::fail(
                self.kind(),
                spec.on_violation,
                "evaluator rejected the value",
            )
            .with_observed(false);
        }

        let Some(score) = record.metadata_f64(SCORE_KEY) else {
            return AssertionResult::not_evaluable(
                self.kind(),
                "no numeric evaluation score recorded",
            );
        };

        if score < spec.min_score {
            return AssertionResult::fail(
                self.kind(),
                spec.on_below,
                format!("evaluation score {} is below minimum {}", score, spec.min_score),
            )
            .with_observed(score);
        }

        AssertionResult::pass(
            self.kind(),
            format!("evaluation score {} meets minimum {}", score, spec.min_score),
        )
        .with_observed(score)
    }
}
