//! Staleness checker
//!
//! Measures the age of a field's latest provenance stamp against the
//! caller-supplied `now`. The engine never reads the wall clock itself.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{absent, mismatched, AssertionChecker, AssertionResult};
use crate::contracts::{AssertionKind, AssertionSpec};
use crate::provenance::FieldProvenance;

/// Metadata key carrying the configuration version a value was built from
pub const CONFIG_VERSION_KEY: &str = "staleness.config_version";

/// Checker for [`AssertionKind::Staleness`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessChecker;

impl AssertionChecker for StalenessChecker {
    fn kind(&self) -> AssertionKind {
        AssertionKind::Staleness
    }

    fn check(
        &self,
        observed: Option<&Value>,
        spec: &AssertionSpec,
        provenance: Option<&FieldProvenance>,
        now: DateTime<Utc>,
    ) -> AssertionResult {
        let AssertionSpec::Staleness(spec) = spec else {
            return mismatched(self.kind(), spec);
        };
        if observed.is_none() {
            return absent(self.kind());
        }

        let Some(record) = provenance else {
            return AssertionResult::not_evaluable(self.kind(), "field has no provenance stamp");
        };

        let age_ms = i128::from(record.age(now).num_milliseconds());
        let max_ms = i128::from(spec.max_age_seconds) * 1000;
        let age_seconds = age_ms as f64 / 1000.0;

        if age_ms > max_ms {
            return AssertionResult::fail(
                self.kind(),
                spec.on_violation,
                format!(
                    "stamped by '{}' {}s ago, exceeding max age {}s",
                    record.origin_phase, age_seconds, spec.max_age_seconds
                ),
            )
            .with_observed(age_seconds);
        }

        if let Some(expected) = &spec.expected_config_version {
            match record.metadata(CONFIG_VERSION_KEY) {
                Some(actual) if actual != expected => {
                    return AssertionResult::fail(
                        self.kind(),
                        spec.on_violation,
                        format!(
                            "built from configuration version '{}', expected '{}'",
                            actual, expected
                        ),
                    )
                    .with_observed(age_seconds);
                }
                Some(_) => {}
                None => {
                    tracing::debug!(
                        field = %record.field_path,
                        "No configuration version stamped; only age was checked"
                    );
                }
            }
        }

        AssertionResult::pass(
            self.kind(),
            format!("age {}s within max age {}s", age_seconds, spec.max_age_seconds),
        )
        .with_observed(age_seconds)
    }
}
