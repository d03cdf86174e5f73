//! Workflow run summary
//!
//! Aggregate counts accumulated by the enforcement guard over one run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::EnforcementMode;
use crate::contracts::{AssertionKind, Contract};
use crate::engine::{
    AssertionResult, AssertionStatus, ChainEvaluation, ChainStatus, ContractValidationResult,
    FailureKind,
};
use crate::telemetry::{EventRecord, EVENT_WORKFLOW_SUMMARY};

/// Per-kind assertion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindBreakdown {
    pub evaluated: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_evaluable: usize,
}

/// Per-phase boundary counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub boundaries_checked: usize,
    pub fields_checked: usize,
    pub blocking_failures: usize,
    pub warnings: usize,
    pub advisories: usize,
}

/// Aggregate outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunSummary {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_label: Option<String>,
    pub contract_id: Option<String>,
    pub contract_hash: String,
    pub mode: EnforcementMode,
    pub fields_checked: usize,
    pub blocking_failures: usize,
    pub warnings: usize,
    pub advisories: usize,
    pub presence_failures: usize,
    pub assertion_failures: usize,
    pub not_evaluable: usize,
    /// Violations raised in strict mode
    pub violations_raised: usize,
    /// Transitions completed despite BLOCKING failures (permissive mode)
    pub forced_transitions: usize,
    pub phases: BTreeMap<String, PhaseCounts>,
    pub chain_statuses: BTreeMap<String, ChainStatus>,
    pub assertion_kinds: BTreeMap<AssertionKind, KindBreakdown>,
    /// Events the sink refused during the run
    pub events_dropped: u64,
}

impl WorkflowRunSummary {
    /// Create an empty summary for a run
    pub fn new(
        run_id: Uuid,
        contract: &Contract,
        mode: EnforcementMode,
        run_label: Option<String>,
    ) -> Self {
        Self {
            run_id,
            run_label,
            contract_id: contract.id().map(str::to_string),
            contract_hash: contract.contract_hash().to_string(),
            mode,
            fields_checked: 0,
            blocking_failures: 0,
            warnings: 0,
            advisories: 0,
            presence_failures: 0,
            assertion_failures: 0,
            not_evaluable: 0,
            violations_raised: 0,
            forced_transitions: 0,
            phases: BTreeMap::new(),
            chain_statuses: BTreeMap::new(),
            assertion_kinds: BTreeMap::new(),
            events_dropped: 0,
        }
    }

    /// Fold a boundary result into the counts
    pub fn record_validation(&mut self, result: &ContractValidationResult) {
        self.fields_checked += result.fields_checked();
        self.blocking_failures += result.blocking_failures.len();
        self.warnings += result.warnings.len();
        self.advisories += result.advisories.len();

        for outcome in &result.outcomes {
            match outcome.failure {
                Some(FailureKind::Presence) => self.presence_failures += 1,
                Some(FailureKind::Assertion) => self.assertion_failures += 1,
                None => {}
            }
            if let Some(assertion) = &outcome.assertion {
                self.record_assertion(assertion);
            }
        }

        let phase = self.phases.entry(result.phase.clone()).or_default();
        phase.boundaries_checked += 1;
        phase.fields_checked += result.fields_checked();
        phase.blocking_failures += result.blocking_failures.len();
        phase.warnings += result.warnings.len();
        phase.advisories += result.advisories.len();
    }

    /// Record a chain's latest status
    pub fn record_chain(&mut self, evaluation: &ChainEvaluation) {
        for assertion in evaluation.links.iter().flat_map(|l| l.assertions.iter()) {
            self.record_assertion(assertion);
        }
        self.chain_statuses
            .insert(evaluation.chain_id.clone(), evaluation.status);
    }

    fn record_assertion(&mut self, assertion: &AssertionResult) {
        let counts = self.assertion_kinds.entry(assertion.kind).or_default();
        counts.evaluated += 1;
        match assertion.status {
            AssertionStatus::Passed => counts.passed += 1,
            AssertionStatus::Failed => counts.failed += 1,
            AssertionStatus::NotEvaluable => {
                counts.not_evaluable += 1;
                self.not_evaluable += 1;
            }
        }
    }

    /// Check if the run finished with no BLOCKING failure and no broken chain
    pub fn passed(&self) -> bool {
        self.blocking_failures == 0 && self.broken_chains().is_empty()
    }

    /// Ids of chains that ended BROKEN
    pub fn broken_chains(&self) -> Vec<&str> {
        self.chain_statuses
            .iter()
            .filter(|(_, s)| **s == ChainStatus::Broken)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Flatten into a `workflow.summary` event
    pub fn to_event(&self) -> EventRecord {
        let mut event = EventRecord::new(EVENT_WORKFLOW_SUMMARY)
            .with("run_id", self.run_id.to_string())
            .with_opt("run_label", self.run_label.clone())
            .with_opt("contract_id", self.contract_id.clone())
            .with("contract_hash", self.contract_hash.as_str())
            .with("mode", self.mode.to_string())
            .with("passed", self.passed())
            .with("fields_checked", self.fields_checked)
            .with("blocking_failures", self.blocking_failures)
            .with("warnings", self.warnings)
            .with("advisories", self.advisories)
            .with("presence_failures", self.presence_failures)
            .with("assertion_failures", self.assertion_failures)
            .with("not_evaluable", self.not_evaluable)
            .with("violations_raised", self.violations_raised)
            .with("forced_transitions", self.forced_transitions)
            .with("events_dropped", self.events_dropped);

        for (chain_id, status) in &self.chain_statuses {
            event = event.with(format!("chain.{}", chain_id), status.to_string());
        }
        for (kind, counts) in &self.assertion_kinds {
            event = event
                .with(format!("assertion.{}.passed", kind), counts.passed)
                .with(format!("assertion.{}.failed", kind), counts.failed)
                .with(format!("assertion.{}.not_evaluable", kind), counts.not_evaluable);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContractDocument, FieldSpec, Phase, Severity};
    use crate::engine::{BoundaryValidator, CheckerRegistry};
    use crate::contracts::Direction;
    use crate::provenance::ProvenanceStore;
    use crate::telemetry::{AttributeValue, EventEmitter};
    use chrono::Utc;
    use serde_json::json;

    fn contract() -> Contract {
        let document = ContractDocument {
            schema_version: "1.0".to_string(),
            contract_id: Some("summary-test".to_string()),
            description: None,
            phases: vec![Phase::new("generate")
                .with_exit(FieldSpec::required("answer"))
                .with_exit(FieldSpec::new("citations", Severity::Warning))],
            propagation_chains: vec![],
        };
        Contract::from_document(document, &CheckerRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn test_record_validation() {
        let contract = contract();
        let registry = CheckerRegistry::with_defaults();
        let emitter = EventEmitter::disabled();
        let store = ProvenanceStore::new();
        let result = BoundaryValidator::new(&contract, &registry, &emitter)
            .validate("generate", Direction::Exit, &json!({}), &store, Utc::now())
            .unwrap();

        let mut summary =
            WorkflowRunSummary::new(Uuid::new_v4(), &contract, EnforcementMode::Audit, None);
        summary.record_validation(&result);

        assert_eq!(summary.fields_checked, 2);
        assert_eq!(summary.blocking_failures, 1);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.presence_failures, 2);
        assert_eq!(summary.phases["generate"].boundaries_checked, 1);
        assert!(!summary.passed());
    }

    #[test]
    fn test_summary_event() {
        let contract = contract();
        let mut summary = WorkflowRunSummary::new(
            Uuid::new_v4(),
            &contract,
            EnforcementMode::Strict,
            Some("nightly".to_string()),
        );
        summary
            .chain_statuses
            .insert("context-flow".to_string(), ChainStatus::Broken);

        let event = summary.to_event();
        assert_eq!(event.name, EVENT_WORKFLOW_SUMMARY);
        assert_eq!(event.attribute("contract_id"), Some(&AttributeValue::from("summary-test")));
        assert_eq!(
            event.attribute("chain.context-flow"),
            Some(&AttributeValue::from("BROKEN"))
        );
        assert_eq!(event.attribute("passed"), Some(&AttributeValue::Bool(false)));
        assert_eq!(summary.broken_chains(), vec!["context-flow"]);
    }

    #[test]
    fn test_summary_serializes() {
        let summary =
            WorkflowRunSummary::new(Uuid::new_v4(), &contract(), EnforcementMode::Permissive, None);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["mode"], json!("permissive"));
        assert!(value.get("run_label").is_none());
    }
}
