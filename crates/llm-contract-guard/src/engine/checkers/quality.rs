//! Quality threshold checker
//!
//! Compares a normalized metric (0.0 - 1.0), read at `metric_path` inside the
//! field value, against a threshold.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{absent, mismatched, AssertionChecker, AssertionResult};
use crate::context::{as_number, resolve_in};
use crate::contracts::{AssertionKind, AssertionSpec, QualityAssertion};
use crate::provenance::FieldProvenance;

/// Checker for [`AssertionKind::Quality`]
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityChecker;

impl QualityChecker {
    fn metric(spec: &QualityAssertion, observed: &Value) -> Option<f64> {
        resolve_in(observed, &spec.metric_path).and_then(as_number)
    }
}

impl AssertionChecker for QualityChecker {
    fn kind(&self) -> AssertionKind {
        AssertionKind::Quality
    }

    fn check(
        &self,
        observed: Option<&Value>,
        spec: &AssertionSpec,
        _provenance: Option<&FieldProvenance>,
        _now: DateTime<Utc>,
    ) -> AssertionResult {
        let AssertionSpec::Quality(spec) = spec else {
            return mismatched(self.kind(), spec);
        };
        let Some(observed) = observed else {
            return absent(self.kind());
        };

        let Some(metric) = Self::metric(spec, observed) else {
            return AssertionResult::not_evaluable(
                self.kind(),
                format!("metric '{}' is missing or not numeric", spec.metric_path),
            );
        };

        if !(0.0..=1.0).contains(&metric) {
            return AssertionResult::fail(
                self.kind(),
                spec.on_violation,
                format!(
                    "metric '{}' = {} is outside the normalized range [0, 1]",
                    spec.metric_path, metric
                ),
            )
            .with_observed(metric);
        }

        if metric < spec.threshold {
            return AssertionResult::fail(
                self.kind(),
                spec.on_below,
                format!(
                    "metric '{}' = {} is below threshold {}",
                    spec.metric_path, metric, spec.threshold
                ),
            )
            .with_observed(metric);
        }

        AssertionResult::pass(
            self.kind(),
            format!(
                "metric '{}' = {} meets threshold {}",
                spec.metric_path, metric, spec.threshold
            ),
        )
        .with_observed(metric)
    }
}
