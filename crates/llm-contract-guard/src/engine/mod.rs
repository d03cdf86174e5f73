//! Boundary validation engine
//!
//! This module checks one boundary (entry, exit or resume) of one phase
//! against the loaded contract and aggregates per-field outcomes by severity.
//!
//! Per field spec, in declaration order:
//!
//! 1. Resolve the field from the context. An absent field fails presence with
//!    the spec's severity and its assertion is skipped.
//! 2. For a present field, dispatch an attached assertion through the
//!    [`CheckerRegistry`] with the field's current provenance record.
//! 3. Map a failing assertion through the severity the checker selected.
//! 4. Record an outcome for the field whatever happened.
//!
//! Validation is a pure function of contract, context and provenance. Event
//! emission is fire-and-forget and never affects the returned result.

pub mod chain;
pub mod checkers;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::PipelineContext;
use crate::contracts::{AssertionKind, Contract, Direction, FieldSpec, Severity};
use crate::error::{GuardError, Result};
use crate::provenance::ProvenanceLookup;
use crate::telemetry::{EventEmitter, EventRecord, EVENT_BOUNDARY_VIOLATION};

pub use chain::{ChainEvaluation, ChainEvaluator, ChainStatus, LinkOutcome};
pub use checkers::{AssertionChecker, AssertionResult, AssertionStatus, CheckerRegistry};

/// What made a field fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The field was absent from the context
    Presence,
    /// The field's assertion did not hold
    Assertion,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Presence => write!(f, "presence"),
            FailureKind::Assertion => write!(f, "assertion"),
        }
    }
}

/// Outcome of checking one field spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutcome {
    pub field_path: String,
    /// Whether the field resolved in the context
    pub present: bool,
    /// Severity applied to the failure; `None` when the field passed
    pub severity: Option<Severity>,
    pub failure: Option<FailureKind>,
    /// Assertion result, if one was dispatched
    pub assertion: Option<AssertionResult>,
    pub message: String,
}

impl FieldOutcome {
    /// Check if the field failed at any severity
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Check if the field failed at BLOCKING severity
    pub fn is_blocking(&self) -> bool {
        self.severity.is_some_and(|s| s.is_blocking())
    }

    /// Kind of the failing assertion, if the failure was an assertion failure
    pub fn failing_kind(&self) -> Option<AssertionKind> {
        match self.failure {
            Some(FailureKind::Assertion) => self.assertion.as_ref().map(|a| a.kind),
            _ => None,
        }
    }
}

/// Aggregated result of one boundary check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractValidationResult {
    pub phase: String,
    pub direction: Direction,
    /// `true` when no field failed at BLOCKING severity
    pub passed: bool,
    pub blocking_failures: Vec<FieldOutcome>,
    pub warnings: Vec<FieldOutcome>,
    pub advisories: Vec<FieldOutcome>,
    /// Every field checked, in declaration order
    pub outcomes: Vec<FieldOutcome>,
}

impl ContractValidationResult {
    fn new(phase: &str, direction: Direction) -> Self {
        Self {
            phase: phase.to_string(),
            direction,
            passed: true,
            blocking_failures: Vec::new(),
            warnings: Vec::new(),
            advisories: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: FieldOutcome) {
        match outcome.severity {
            Some(Severity::Blocking) => {
                self.passed = false;
                self.blocking_failures.push(outcome.clone());
            }
            Some(Severity::Warning) => self.warnings.push(outcome.clone()),
            Some(Severity::Advisory) => self.advisories.push(outcome.clone()),
            None => {}
        }
        self.outcomes.push(outcome);
    }

    /// Number of field specs checked
    pub fn fields_checked(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if any field failed, at any severity
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(FieldOutcome::is_failure)
    }

    /// Paths of fields failing at BLOCKING severity
    pub fn blocking_fields(&self) -> Vec<String> {
        self.blocking_failures
            .iter()
            .map(|o| o.field_path.clone())
            .collect()
    }

    /// Assertion kinds behind the BLOCKING failures, deduplicated
    pub fn blocking_kinds(&self) -> Vec<AssertionKind> {
        let mut kinds: Vec<_> = self
            .blocking_failures
            .iter()
            .filter_map(FieldOutcome::failing_kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// One-line description of the BLOCKING failures
    pub fn blocking_message(&self) -> String {
        self.blocking_failures
            .iter()
            .map(|o| format!("{}: {}", o.field_path, o.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Checks phase boundaries against a contract
pub struct BoundaryValidator<'a> {
    contract: &'a Contract,
    registry: &'a CheckerRegistry,
    emitter: &'a EventEmitter,
}

impl<'a> BoundaryValidator<'a> {
    /// Create a validator
    pub fn new(
        contract: &'a Contract,
        registry: &'a CheckerRegistry,
        emitter: &'a EventEmitter,
    ) -> Self {
        Self {
            contract,
            registry,
            emitter,
        }
    }

    /// Validate one boundary of a phase.
    ///
    /// Fails only for a phase the contract does not declare.
    pub fn validate(
        &self,
        phase: &str,
        direction: Direction,
        context: &dyn PipelineContext,
        provenance: &dyn ProvenanceLookup,
        now: DateTime<Utc>,
    ) -> Result<ContractValidationResult> {
        let specs = self
            .contract
            .field_specs(phase, direction)
            .ok_or_else(|| GuardError::UnknownPhase(phase.to_string()))?;

        let mut result = ContractValidationResult::new(phase, direction);
        for spec in specs {
            let outcome = self.check_field(spec, context, provenance, now);
            if outcome.is_failure() {
                self.emit_violation(phase, direction, &outcome);
            }
            result.record(outcome);
        }

        tracing::debug!(
            phase = %phase,
            direction = %direction,
            fields = result.fields_checked(),
            blocking = result.blocking_failures.len(),
            warnings = result.warnings.len(),
            advisories = result.advisories.len(),
            "Validated boundary"
        );

        Ok(result)
    }

    fn check_field(
        &self,
        spec: &FieldSpec,
        context: &dyn PipelineContext,
        provenance: &dyn ProvenanceLookup,
        now: DateTime<Utc>,
    ) -> FieldOutcome {
        let value = context.resolve(&spec.field_path);
        let record = provenance.lookup(&spec.field_path);

        let Some(value) = value else {
            return FieldOutcome {
                field_path: spec.field_path.clone(),
                present: false,
                severity: Some(spec.severity),
                failure: Some(FailureKind::Presence),
                assertion: None,
                message: format!("field '{}' is absent", spec.field_path),
            };
        };

        let assertion = spec
            .effective_assertion()
            .and_then(|a| self.registry.check(Some(value), a, record, now));
        let severity = assertion
            .as_ref()
            .filter(|a| a.is_failure())
            .and_then(|a| a.severity);
        let message = match &assertion {
            Some(a) if severity.is_some() => format!("{} assertion failed: {}", a.kind, a.message),
            Some(a) => a.message.clone(),
            None => "present".to_string(),
        };

        FieldOutcome {
            field_path: spec.field_path.clone(),
            present: true,
            severity,
            failure: severity.map(|_| FailureKind::Assertion),
            assertion,
            message,
        }
    }

    fn emit_violation(&self, phase: &str, direction: Direction, outcome: &FieldOutcome) {
        let event = EventRecord::new(EVENT_BOUNDARY_VIOLATION)
            .with("phase", phase)
            .with("direction", direction.to_string())
            .with("field", outcome.field_path.as_str())
            .with_opt("severity", outcome.severity.map(|s| s.to_string()))
            .with_opt("failure", outcome.failure.map(|f| f.to_string()))
            .with_opt("assertion_kind", outcome.failing_kind().map(|k| k.as_str()))
            .with("blocking", outcome.is_blocking())
            .with("message", outcome.message.as_str());
        self.emitter.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{AssertionSpec, Phase, QualityAssertion};
    use crate::contracts::ContractDocument;
    use crate::provenance::ProvenanceStore;
    use crate::telemetry::BufferedEventSink;
    use checkers::MockAssertionChecker;
    use serde_json::json;
    use std::sync::Arc;

    fn quality(on_below: Severity) -> AssertionSpec {
        AssertionSpec::Quality(QualityAssertion {
            metric_path: "retrieval_confidence".to_string(),
            threshold: 0.7,
            on_below,
            on_violation: Severity::Blocking,
        })
    }

    fn contract(registry: &CheckerRegistry) -> Contract {
        let document = ContractDocument {
            schema_version: "1.0".to_string(),
            contract_id: Some("rag".to_string()),
            description: None,
            phases: vec![
                Phase::new("retrieve")
                    .with_exit(
                        FieldSpec::required("retrieved_context")
                            .with_assertion(quality(Severity::Warning)),
                    )
                    .with_exit(FieldSpec::required("rag.index_snapshot"))
                    .with_exit(FieldSpec::new("rag.trace_id", Severity::Advisory)),
                Phase::new("generate").with_entry(FieldSpec::required("retrieved_context")),
            ],
            propagation_chains: vec![],
        };
        Contract::from_document(document, registry).unwrap()
    }

    fn validate(context: serde_json::Value) -> ContractValidationResult {
        let registry = CheckerRegistry::with_defaults();
        let contract = contract(&registry);
        let emitter = EventEmitter::disabled();
        let store = ProvenanceStore::new();
        BoundaryValidator::new(&contract, &registry, &emitter)
            .validate("retrieve", Direction::Exit, &context, &store, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_all_present_and_passing() {
        let result = validate(json!({
            "retrieved_context": {"retrieval_confidence": 0.9},
            "rag": {"index_snapshot": "snap-1", "trace_id": "t"}
        }));
        assert!(result.passed);
        assert!(!result.has_failures());
        assert_eq!(result.fields_checked(), 3);
        assert!(result.outcomes[0].assertion.as_ref().unwrap().passed());
    }

    #[test]
    fn test_low_quality_is_a_warning() {
        let result = validate(json!({
            "retrieved_context": {"retrieval_confidence": 0.4},
            "rag": {"index_snapshot": "snap-1", "trace_id": "t"}
        }));
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].failing_kind(), Some(AssertionKind::Quality));
    }

    #[test]
    fn test_missing_blocking_field_fails() {
        let result = validate(json!({
            "retrieved_context": {"retrieval_confidence": 0.9},
            "rag": {"trace_id": "t"}
        }));
        assert!(!result.passed);
        assert_eq!(result.blocking_fields(), vec!["rag.index_snapshot"]);
        assert_eq!(result.blocking_failures[0].failure, Some(FailureKind::Presence));
        assert!(result.blocking_kinds().is_empty());
    }

    #[test]
    fn test_missing_advisory_field_is_recorded() {
        let result = validate(json!({
            "retrieved_context": {"retrieval_confidence": 0.9},
            "rag": {"index_snapshot": "snap-1"}
        }));
        assert!(result.passed);
        assert_eq!(result.advisories.len(), 1);
        assert!(!result.advisories[0].present);
    }

    #[test]
    fn test_absent_blocking_field_skips_assertion() {
        let mut checker = MockAssertionChecker::new();
        checker.expect_kind().return_const(AssertionKind::Quality);
        checker.expect_check().times(0);

        let mut registry = CheckerRegistry::with_defaults();
        registry.register(Arc::new(checker));
        let contract = contract(&registry);
        let emitter = EventEmitter::disabled();
        let store = ProvenanceStore::new();

        let context = json!({"rag": {"index_snapshot": "s"}});
        let result = BoundaryValidator::new(&contract, &registry, &emitter)
            .validate("retrieve", Direction::Exit, &context, &store, Utc::now())
            .unwrap();

        assert!(!result.passed);
        assert!(result.blocking_failures[0].assertion.is_none());
    }

    #[test]
    fn test_absent_warning_field_skips_assertion() {
        let mut checker = MockAssertionChecker::new();
        checker.expect_kind().return_const(AssertionKind::Quality);
        checker.expect_check().times(0);

        let mut registry = CheckerRegistry::with_defaults();
        registry.register(Arc::new(checker));
        let document = ContractDocument {
            schema_version: "1.0".to_string(),
            contract_id: None,
            description: None,
            phases: vec![Phase::new("generate").with_exit(
                FieldSpec::new("citations", Severity::Warning)
                    .with_assertion(quality(Severity::Blocking)),
            )],
            propagation_chains: vec![],
        };
        let contract = Contract::from_document(document, &registry).unwrap();
        let emitter = EventEmitter::disabled();
        let store = ProvenanceStore::new();

        let result = BoundaryValidator::new(&contract, &registry, &emitter)
            .validate("generate", Direction::Exit, &json!({}), &store, Utc::now())
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].failure, Some(FailureKind::Presence));
        assert!(result.warnings[0].assertion.is_none());
    }

    #[test]
    fn test_unknown_phase() {
        let registry = CheckerRegistry::with_defaults();
        let contract = contract(&registry);
        let emitter = EventEmitter::disabled();
        let store = ProvenanceStore::new();

        let err = BoundaryValidator::new(&contract, &registry, &emitter)
            .validate("rerank", Direction::Entry, &json!({}), &store, Utc::now())
            .unwrap_err();
        assert_eq!(err, GuardError::UnknownPhase("rerank".to_string()));
    }

    #[test]
    fn test_emits_one_event_per_failure() {
        let registry = CheckerRegistry::with_defaults();
        let contract = contract(&registry);
        let (sink, mut receiver) = BufferedEventSink::new(16);
        let emitter = EventEmitter::new(Arc::new(sink));
        let store = ProvenanceStore::new();

        BoundaryValidator::new(&contract, &registry, &emitter)
            .validate("retrieve", Direction::Exit, &json!({}), &store, Utc::now())
            .unwrap();

        let events = receiver.drain();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.name == EVENT_BOUNDARY_VIOLATION));
    }
}
