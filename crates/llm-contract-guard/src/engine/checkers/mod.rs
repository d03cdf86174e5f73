//! Assertion checker framework
//!
//! Every assertion kind is evaluated by exactly one [`AssertionChecker`]
//! registered under its [`AssertionKind`]. The boundary validator and the
//! chain evaluator only ever dispatch through the [`CheckerRegistry`]; they
//! never branch on a kind themselves.

pub mod budget;
pub mod delegation;
pub mod evaluation;
pub mod quality;
pub mod staleness;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::contracts::{AssertionKind, AssertionSpec, Severity};
use crate::provenance::FieldProvenance;

/// Outcome class of a single assertion check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionStatus {
    Passed,
    Failed,
    /// The checker could not resolve its input. Never scored.
    NotEvaluable,
}

impl fmt::Display for AssertionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionStatus::Passed => write!(f, "passed"),
            AssertionStatus::Failed => write!(f, "failed"),
            AssertionStatus::NotEvaluable => write!(f, "not_evaluable"),
        }
    }
}

/// Result of one assertion check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub kind: AssertionKind,
    pub status: AssertionStatus,
    /// Severity to apply; set only when the check failed
    pub severity: Option<Severity>,
    pub message: String,
    /// Raw value the checker compared (metric, age in seconds, consumption, ...)
    pub observed: Option<Value>,
}

impl AssertionResult {
    /// Create a passing result
    pub fn pass(kind: AssertionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: AssertionStatus::Passed,
            severity: None,
            message: message.into(),
            observed: None,
        }
    }

    /// Create a failing result carrying the severity to apply
    pub fn fail(kind: AssertionKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: AssertionStatus::Failed,
            severity: Some(severity),
            message: message.into(),
            observed: None,
        }
    }

    /// Create a result for an input the checker could not resolve
    pub fn not_evaluable(kind: AssertionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: AssertionStatus::NotEvaluable,
            severity: None,
            message: message.into(),
            observed: None,
        }
    }

    /// Attach the observed value
    pub fn with_observed(mut self, observed: impl Into<Value>) -> Self {
        self.observed = Some(observed.into());
        self
    }

    /// Check if the assertion held
    pub fn passed(&self) -> bool {
        self.status == AssertionStatus::Passed
    }

    /// Check if the assertion failed (not-evaluable is not a failure)
    pub fn is_failure(&self) -> bool {
        self.status == AssertionStatus::Failed
    }

    /// Check if the failure is BLOCKING
    pub fn is_blocking(&self) -> bool {
        self.is_failure() && self.severity.is_some_and(|s| s.is_blocking())
    }
}

/// A pure check for one assertion kind.
///
/// Checkers read only their explicit inputs. `observed` is `None` when the
/// field is absent from the context; checkers that need a value must then
/// report [`AssertionStatus::NotEvaluable`] rather than fail.
#[cfg_attr(test, mockall::automock)]
pub trait AssertionChecker: Send + Sync {
    /// Kind this checker evaluates
    fn kind(&self) -> AssertionKind;

    /// Evaluate `spec` against the observed value and provenance record
    fn check<'a, 'b>(
        &self,
        observed: Option<&'a Value>,
        spec: &AssertionSpec,
        provenance: Option<&'b FieldProvenance>,
        now: DateTime<Utc>,
    ) -> AssertionResult;
}

/// Result for a field with no observed value
pub(crate) fn absent(kind: AssertionKind) -> AssertionResult {
    AssertionResult::not_evaluable(kind, "no observed value")
}

/// Result for a spec routed to the wrong checker
pub(crate) fn mismatched(kind: AssertionKind, spec: &AssertionSpec) -> AssertionResult {
    AssertionResult::not_evaluable(
        kind,
        format!(
            "{} checker received a {} assertion",
            kind,
            spec.kind().map_or("presence-only", |k| k.as_str())
        ),
    )
}

/// Read-only map from assertion kind to checker.
///
/// Built at startup and shared across runs.
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<AssertionKind, Arc<dyn AssertionChecker>>,
}

impl CheckerRegistry {
    /// Create a registry with the built-in checkers
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(quality::QualityChecker));
        registry.register(Arc::new(staleness::StalenessChecker));
        registry.register(Arc::new(budget::BudgetChecker));
        registry.register(Arc::new(evaluation::EvaluationChecker));
        registry.register(Arc::new(delegation::DelegationChecker));
        registry
    }

    /// Create a registry with no checkers
    pub fn empty() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Register a checker under its kind, returning the one it replaces
    pub fn register(
        &mut self,
        checker: Arc<dyn AssertionChecker>,
    ) -> Option<Arc<dyn AssertionChecker>> {
        self.checkers.insert(checker.kind(), checker)
    }

    /// Get the checker for a kind
    pub fn get(&self, kind: AssertionKind) -> Option<&Arc<dyn AssertionChecker>> {
        self.checkers.get(&kind)
    }

    /// Check if a kind has a checker
    pub fn supports(&self, kind: AssertionKind) -> bool {
        self.checkers.contains_key(&kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<AssertionKind> {
        let mut kinds: Vec<_> = self.checkers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Dispatch an assertion to its checker.
    ///
    /// Returns `None` for presence-only specs.
    pub fn check(
        &self,
        observed: Option<&Value>,
        spec: &AssertionSpec,
        provenance: Option<&FieldProvenance>,
        now: DateTime<Utc>,
    ) -> Option<AssertionResult> {
        let kind = spec.kind()?;
        let result = match self.get(kind) {
            Some(checker) => checker.check(observed, spec, provenance, now),
            // Unreachable for a loaded contract; loading rejects unregistered kinds
            None => AssertionResult::not_evaluable(kind, format!("no checker registered for {}", kind)),
        };

        if result.status == AssertionStatus::NotEvaluable {
            tracing::debug!(kind = %kind, reason = %result.message, "Assertion not evaluable");
        }
        Some(result)
    }
}

impl fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
