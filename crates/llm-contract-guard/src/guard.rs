//! Enforcement guard
//!
//! Drives one pipeline run through its phase boundaries:
//!
//! ```text
//! pending -> entering -> entered -> exiting -> exited -> entering -> ...
//!                          |  ^
//!                          v  |
//!                        resuming
//! ```
//!
//! Each transition validates the matching boundary and then applies the
//! configured [`EnforcementMode`] to any BLOCKING outcome. Stamps recorded
//! while a phase is entered are staged and only committed once its exit
//! completes, so a strict-mode violation leaves no partial provenance for
//! the phase that triggered it.
//!
//! A guard owns all state of its run. Independent runs use independent
//! guards and share only the read-only [`Contract`] and [`CheckerRegistry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{EnforcementMode, GuardConfig};
use crate::context::PipelineContext;
use crate::contracts::{AssertionKind, Contract, Direction};
use crate::engine::{
    BoundaryValidator, ChainEvaluation, ChainEvaluator, CheckerRegistry, ContractValidationResult,
};
use crate::error::{BoundaryViolationError, GuardError, Result, ViolationSite};
use crate::provenance::{FieldProvenance, PendingStamp, ProvenanceStore, StagedProvenance};
use crate::summary::WorkflowRunSummary;
use crate::telemetry::{BufferedEventSink, EventEmitter, EventReceiver, EventSink};

/// Position of the run in the boundary state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryState {
    Pending,
    Entering,
    Entered,
    Exiting,
    Exited,
    Resuming,
}

impl fmt::Display for BoundaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryState::Pending => write!(f, "pending"),
            BoundaryState::Entering => write!(f, "entering"),
            BoundaryState::Entered => write!(f, "entered"),
            BoundaryState::Exiting => write!(f, "exiting"),
            BoundaryState::Exited => write!(f, "exited"),
            BoundaryState::Resuming => write!(f, "resuming"),
        }
    }
}

/// What a completed transition checked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryReport {
    pub phase: String,
    pub site: ViolationSite,
    /// Boundary results, in the order they were validated
    pub results: Vec<ContractValidationResult>,
    /// Chains evaluated at this transition
    pub chains: Vec<ChainEvaluation>,
    /// The transition completed despite a BLOCKING outcome
    pub forced: bool,
}

impl BoundaryReport {
    /// Check if nothing BLOCKING was found
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed) && !self.chains.iter().any(is_blocking_breakage)
    }
}

fn is_blocking_breakage(chain: &ChainEvaluation) -> bool {
    chain.is_broken() && chain.severity.is_blocking()
}

/// Per-run enforcement state machine
pub struct EnforcementGuard {
    contract: Arc<Contract>,
    registry: Arc<CheckerRegistry>,
    config: GuardConfig,
    emitter: EventEmitter,
    run_id: Uuid,
    state: BoundaryState,
    current_phase: Option<String>,
    store: ProvenanceStore,
    staged: HashMap<String, FieldProvenance>,
    chains: BTreeMap<String, ChainEvaluation>,
    summary: WorkflowRunSummary,
}

impl EnforcementGuard {
    /// Create a guard for one run.
    ///
    /// Events go to `sink` when one is given and `config.emit_events` is set.
    pub fn new(
        contract: Arc<Contract>,
        registry: Arc<CheckerRegistry>,
        config: GuardConfig,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        let emitter = if config.emit_events {
            EventEmitter::from_option(sink)
        } else {
            EventEmitter::disabled()
        };
        let run_id = Uuid::new_v4();
        let store = ProvenanceStore::with_emitter(emitter.clone(), config.metadata_attribute_cap);
        let summary =
            WorkflowRunSummary::new(run_id, &contract, config.mode, config.run_label.clone());

        tracing::debug!(run_id = %run_id, mode = %config.mode, "Created enforcement guard");

        Self {
            contract,
            registry,
            config,
            emitter,
            run_id,
            state: BoundaryState::Pending,
            current_phase: None,
            store,
            staged: HashMap::new(),
            chains: BTreeMap::new(),
            summary,
        }
    }

    /// Create a guard writing to a fresh buffered sink sized by
    /// `config.event_buffer_capacity`
    pub fn with_buffered_sink(
        contract: Arc<Contract>,
        registry: Arc<CheckerRegistry>,
        config: GuardConfig,
    ) -> (Self, EventReceiver) {
        let (sink, receiver) = BufferedEventSink::new(config.event_buffer_capacity);
        let guard = Self::new(contract, registry, config, Some(Arc::new(sink)));
        (guard, receiver)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn mode(&self) -> EnforcementMode {
        self.config.mode
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    /// Phase currently entered, or the last phase exited
    pub fn current_phase(&self) -> Option<&str> {
        self.current_phase.as_deref()
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Committed provenance
    pub fn provenance(&self) -> &ProvenanceStore {
        &self.store
    }

    /// Committed provenance overlaid with the running phase's staged stamps
    pub fn staged_provenance(&self) -> StagedProvenance<'_> {
        StagedProvenance::new(&self.store, &self.staged)
    }

    /// Summary accumulated so far
    pub fn summary(&self) -> &WorkflowRunSummary {
        &self.summary
    }

    /// Latest evaluation of a chain in this run
    pub fn chain_evaluation(&self, chain_id: &str) -> Option<&ChainEvaluation> {
        self.chains.get(chain_id)
    }

    /// Validate the entry boundary of `phase` and enter it
    pub fn enter_phase(
        &mut self,
        phase: &str,
        context: &dyn PipelineContext,
        now: DateTime<Utc>,
    ) -> Result<BoundaryReport> {
        self.require_phase(phase)?;
        let previous = self.state;
        if !matches!(previous, BoundaryState::Pending | BoundaryState::Exited) {
            return Err(self.invalid_transition(phase, "enter"));
        }

        let result = self.validator().validate(phase, Direction::Entry, context, &self.store, now)?;
        self.state = BoundaryState::Entering;
        self.summary.record_validation(&result);

        let mut report = BoundaryReport {
            phase: phase.to_string(),
            site: ViolationSite::Entry,
            results: vec![result],
            chains: Vec::new(),
            forced: false,
        };

        if let Err(violation) = self.enforce(&mut report) {
            self.state = previous;
            return Err(violation.into());
        }

        self.state = BoundaryState::Entered;
        self.current_phase = Some(phase.to_string());
        tracing::info!(run_id = %self.run_id, phase = %phase, forced = report.forced, "Entered phase");
        Ok(report)
    }

    /// Record that the entered phase set `field_path` to `value`.
    ///
    /// The stamp is staged until the phase exits.
    pub fn stamp(
        &mut self,
        field_path: &str,
        value: &Value,
        metadata: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let phase = match (self.state, &self.current_phase) {
            (BoundaryState::Entered, Some(phase)) => phase.clone(),
            _ => return Err(GuardError::NoActivePhase),
        };

        let existing = self
            .staged
            .get(field_path)
            .or_else(|| self.store.get(field_path));
        let record = PendingStamp::new(field_path, phase, value, metadata, now).apply_to(existing);
        self.staged.insert(field_path.to_string(), record);
        Ok(())
    }

    /// Validate the exit boundary of the entered phase, evaluate the chains
    /// ending at it, and commit its staged stamps
    pub fn exit_phase(
        &mut self,
        phase: &str,
        context: &dyn PipelineContext,
        now: DateTime<Utc>,
    ) -> Result<BoundaryReport> {
        self.require_phase(phase)?;
        if self.state != BoundaryState::Entered || self.current_phase.as_deref() != Some(phase) {
            return Err(self.invalid_transition(phase, "exit"));
        }

        let (result, chains) = {
            let view = StagedProvenance::new(&self.store, &self.staged);
            let result = self.validator().validate(phase, Direction::Exit, context, &view, now)?;
            let evaluator = self.chain_evaluator();
            let chains: Vec<_> = self
                .contract
                .chains_ending_at(phase)
                .map(|chain| evaluator.evaluate(chain, context, &view, now))
                .collect();
            (result, chains)
        };

        self.state = BoundaryState::Exiting;
        self.summary.record_validation(&result);

        let mut report = BoundaryReport {
            phase: phase.to_string(),
            site: ViolationSite::Exit,
            results: vec![result],
            chains,
            forced: false,
        };

        if let Err(violation) = self.enforce(&mut report) {
            let discarded = self.staged.len();
            self.staged.clear();
            self.state = BoundaryState::Entered;
            tracing::debug!(phase = %phase, discarded, "Discarded staged provenance");
            return Err(violation.into());
        }

        // Only a completed exit settles the chains ending at it
        for chain in &report.chains {
            self.summary.record_chain(chain);
            self.chains.insert(chain.chain_id.clone(), chain.clone());
        }
        self.commit_staged();
        self.state = BoundaryState::Exited;
        tracing::info!(run_id = %self.run_id, phase = %phase, forced = report.forced, "Exited phase");
        Ok(report)
    }

    /// Resume a run from a checkpoint taken after `phase` completed.
    ///
    /// Runs the phase's checkpoint specs and the next phase's entry specs
    /// against the committed provenance, then enters the next phase. When
    /// `phase` is the last one the run is left exited.
    pub fn resume_from_checkpoint(
        &mut self,
        phase: &str,
        context: &dyn PipelineContext,
        now: DateTime<Utc>,
    ) -> Result<BoundaryReport> {
        self.require_phase(phase)?;
        let previous = self.state;
        if !matches!(
            previous,
            BoundaryState::Pending | BoundaryState::Entered | BoundaryState::Exited
        ) {
            return Err(self.invalid_transition(phase, "resume"));
        }

        let next = self.contract.next_phase(phase).map(|p| p.name.clone());
        let mut results = Vec::with_capacity(2);
        {
            let validator = self.validator();
            results.push(validator.validate(phase, Direction::Resume, context, &self.store, now)?);
            if let Some(next) = &next {
                results.push(validator.validate(next, Direction::Entry, context, &self.store, now)?);
            }
        }
        self.state = BoundaryState::Resuming;
        // Work in flight before the checkpoint restart is not carried over
        self.staged.clear();
        for result in &results {
            self.summary.record_validation(result);
        }

        let mut report = BoundaryReport {
            phase: phase.to_string(),
            site: ViolationSite::Resume,
            results,
            chains: Vec::new(),
            forced: false,
        };

        if let Err(violation) = self.enforce(&mut report) {
            self.state = previous;
            return Err(violation.into());
        }

        match next {
            Some(next) => {
                tracing::info!(run_id = %self.run_id, checkpoint = %phase, phase = %next, "Resumed into phase");
                self.state = BoundaryState::Entered;
                self.current_phase = Some(next);
            }
            None => {
                tracing::info!(run_id = %self.run_id, checkpoint = %phase, "Resumed after final phase");
                self.state = BoundaryState::Exited;
                self.current_phase = Some(phase.to_string());
            }
        }
        Ok(report)
    }

    /// Replace committed provenance with checkpointed records
    pub fn restore_provenance(&mut self, records: impl IntoIterator<Item = FieldProvenance>) {
        self.staged.clear();
        self.store.restore(records);
    }

    /// Evaluate every declared chain against committed provenance.
    ///
    /// Reports only; never raises.
    pub fn evaluate_chains(
        &mut self,
        context: &dyn PipelineContext,
        now: DateTime<Utc>,
    ) -> Vec<ChainEvaluation> {
        let evaluations: Vec<_> = {
            let evaluator = self.chain_evaluator();
            self.contract
                .chains()
                .iter()
                .map(|chain| evaluator.evaluate(chain, context, &self.store, now))
                .collect()
        };
        for evaluation in &evaluations {
            self.summary.record_chain(evaluation);
            self.chains
                .insert(evaluation.chain_id.clone(), evaluation.clone());
        }
        evaluations
    }

    /// Close the run: evaluate chains not evaluated yet, emit the summary
    /// event and return the summary
    pub fn finish(
        &mut self,
        context: &dyn PipelineContext,
        now: DateTime<Utc>,
    ) -> WorkflowRunSummary {
        let pending: Vec<_> = {
            let evaluator = self.chain_evaluator();
            self.contract
                .chains()
                .iter()
                .filter(|chain| !self.chains.contains_key(&chain.id))
                .map(|chain| evaluator.evaluate(chain, context, &self.store, now))
                .collect()
        };
        for evaluation in pending {
            self.summary.record_chain(&evaluation);
            self.chains.insert(evaluation.chain_id.clone(), evaluation);
        }

        self.summary.events_dropped = self.emitter.failed_emissions();
        self.emitter.emit(self.summary.to_event());

        tracing::info!(
            run_id = %self.run_id,
            passed = self.summary.passed(),
            fields_checked = self.summary.fields_checked,
            blocking_failures = self.summary.blocking_failures,
            warnings = self.summary.warnings,
            violations_raised = self.summary.violations_raised,
            forced_transitions = self.summary.forced_transitions,
            "Workflow run finished"
        );

        self.summary.clone()
    }

    /// Start a new independent run with the same contract and configuration
    pub fn reset(&mut self) {
        self.run_id = Uuid::new_v4();
        self.state = BoundaryState::Pending;
        self.current_phase = None;
        self.store.clear();
        self.staged.clear();
        self.chains.clear();
        self.summary = WorkflowRunSummary::new(
            self.run_id,
            &self.contract,
            self.config.mode,
            self.config.run_label.clone(),
        );
        tracing::debug!(run_id = %self.run_id, "Reset enforcement guard");
    }

    fn commit_staged(&mut self) {
        let mut staged: Vec<_> = self.staged.drain().map(|(_, record)| record).collect();
        staged.sort_by(|a, b| a.field_path.cmp(&b.field_path));
        for record in staged {
            self.store.commit(record);
        }
    }

    fn validator(&self) -> BoundaryValidator<'_> {
        BoundaryValidator::new(&self.contract, &self.registry, &self.emitter)
    }

    fn chain_evaluator(&self) -> ChainEvaluator<'_> {
        ChainEvaluator::new(&self.registry, &self.emitter)
            .with_escalation(self.config.mode == EnforcementMode::Strict)
    }

    fn require_phase(&self, phase: &str) -> Result<()> {
        match self.contract.phase(phase) {
            Some(_) => Ok(()),
            None => Err(GuardError::UnknownPhase(phase.to_string())),
        }
    }

    fn invalid_transition(&self, phase: &str, action: &'static str) -> GuardError {
        GuardError::InvalidTransition {
            phase: phase.to_string(),
            from: self.state.to_string(),
            action,
        }
    }

    /// Apply the enforcement mode to a transition's outcome
    fn enforce(
        &mut self,
        report: &mut BoundaryReport,
    ) -> std::result::Result<(), BoundaryViolationError> {
        if report.passed() {
            return Ok(());
        }

        match self.config.mode {
            EnforcementMode::Audit => Ok(()),
            EnforcementMode::Permissive => {
                report.forced = true;
                self.summary.forced_transitions += 1;
                tracing::warn!(
                    run_id = %self.run_id,
                    phase = %report.phase,
                    site = %report.site,
                    fields = ?blocking_fields(report),
                    "Blocking contract failure, forcing transition"
                );
                Ok(())
            }
            EnforcementMode::Strict => {
                let violation = violation_for(report);
                self.summary.violations_raised += 1;
                tracing::error!(
                    run_id = %self.run_id,
                    phase = %violation.phase,
                    site = %violation.site,
                    fields = ?violation.fields,
                    chain = violation.chain_id.as_deref().unwrap_or("-"),
                    "Boundary violation"
                );
                Err(violation)
            }
        }
    }
}

impl fmt::Debug for EnforcementGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnforcementGuard")
            .field("run_id", &self.run_id)
            .field("mode", &self.config.mode)
            .field("state", &self.state)
            .field("current_phase", &self.current_phase)
            .field("provenance_records", &self.store.len())
            .field("staged_records", &self.staged.len())
            .finish()
    }
}

fn blocking_fields(report: &BoundaryReport) -> Vec<String> {
    let mut fields: Vec<String> = report
        .results
        .iter()
        .flat_map(ContractValidationResult::blocking_fields)
        .collect();
    fields.dedup();
    fields
}

fn violation_for(report: &BoundaryReport) -> BoundaryViolationError {
    let fields = blocking_fields(report);
    let broken: Vec<&ChainEvaluation> = report
        .chains
        .iter()
        .filter(|c| is_blocking_breakage(c))
        .collect();

    let mut assertion_kinds: Vec<AssertionKind> = report
        .results
        .iter()
        .flat_map(ContractValidationResult::blocking_kinds)
        .chain(broken.iter().flat_map(|c| c.failing_kinds()))
        .collect();
    assertion_kinds.sort();
    assertion_kinds.dedup();

    let mut messages: Vec<String> = report
        .results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("{} of '{}': {}", r.direction, r.phase, r.blocking_message()))
        .collect();
    messages.extend(broken.iter().map(|c| c.message.clone()));

    let site = if fields.is_empty() && !broken.is_empty() {
        ViolationSite::Chain
    } else {
        report.site
    };

    BoundaryViolationError {
        phase: report.phase.clone(),
        site,
        fields,
        chain_id: broken.first().map(|c| c.chain_id.clone()),
        assertion_kinds,
        message: messages.join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::ProvenanceLookup;
    use serde_json::json;

    fn contract() -> Arc<Contract> {
        let document = json!({
            "schema_version": "1.0",
            "contract_id": "guard-test",
            "phases": [
                {"name": "retrieve", "exit": [{"field": "context"}]},
                {"name": "generate", "entry": [{"field": "context"}], "exit": [{"field": "answer"}]}
            ],
            "propagation_chains": [{
                "id": "context-flow",
                "links": [
                    {"phase": "retrieve", "field": "context"},
                    {"phase": "generate", "field": "context"}
                ]
            }]
        });
        Arc::new(Contract::from_value(document, &CheckerRegistry::with_defaults()).unwrap())
    }

    fn guard(mode: EnforcementMode) -> EnforcementGuard {
        EnforcementGuard::new(
            contract(),
            Arc::new(CheckerRegistry::with_defaults()),
            GuardConfig::builder().mode(mode).build(),
            None,
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut guard = guard(EnforcementMode::Strict);
        let now = Utc::now();
        let ctx = json!({"context": "docs", "answer": "42"});

        guard.enter_phase("retrieve", &ctx, now).unwrap();
        assert_eq!(guard.state(), BoundaryState::Entered);
        guard.stamp("context", &json!("docs"), BTreeMap::new(), now).unwrap();
        assert!(guard.provenance().is_empty());
        guard.exit_phase("retrieve", &ctx, now).unwrap();
        assert_eq!(guard.state(), BoundaryState::Exited);
        assert!(guard.provenance().contains("context"));

        guard.enter_phase("generate", &ctx, now).unwrap();
        guard.stamp("context", &json!("docs"), BTreeMap::new(), now).unwrap();
        let report = guard.exit_phase("generate", &ctx, now).unwrap();
        assert!(report.passed());
        assert_eq!(report.chains.len(), 1);

        let summary = guard.finish(&ctx, now);
        assert!(summary.passed());
        assert_eq!(summary.chain_statuses["context-flow"].to_string(), "INTACT");
    }

    #[test]
    fn test_strict_exit_violation_discards_staged() {
        let mut guard = guard(EnforcementMode::Strict);
        let now = Utc::now();

        guard.enter_phase("retrieve", &json!({}), now).unwrap();
        guard.stamp("other", &json!(1), BTreeMap::new(), now).unwrap();
        let err = guard.exit_phase("retrieve", &json!({}), now).unwrap_err();

        let violation = err.as_violation().unwrap();
        assert_eq!(violation.site, ViolationSite::Exit);
        assert_eq!(violation.fields, vec!["context"]);
        assert_eq!(guard.state(), BoundaryState::Entered);
        assert!(guard.provenance().is_empty());
        assert!(guard.staged_provenance().lookup("other").is_none());
        assert_eq!(guard.summary().violations_raised, 1);
    }

    #[test]
    fn test_permissive_forces_transition() {
        let mut guard = guard(EnforcementMode::Permissive);
        let report = guard.enter_phase("generate", &json!({}), Utc::now()).unwrap();
        assert!(report.forced);
        assert!(!report.passed());
        assert_eq!(guard.state(), BoundaryState::Entered);
        assert_eq!(guard.summary().forced_transitions, 1);
    }

    #[test]
    fn test_audit_never_raises_or_forces() {
        let mut guard = guard(EnforcementMode::Audit);
        let report = guard.enter_phase("generate", &json!({}), Utc::now()).unwrap();
        assert!(!report.forced);
        assert_eq!(guard.summary().blocking_failures, 1);
        assert_eq!(guard.summary().forced_transitions, 0);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut guard = guard(EnforcementMode::Strict);
        let now = Utc::now();
        let ctx = json!({"context": "x"});

        assert!(matches!(
            guard.exit_phase("retrieve", &ctx, now),
            Err(GuardError::InvalidTransition { action: "exit", .. })
        ));
        assert_eq!(
            guard.stamp("context", &json!(1), BTreeMap::new(), now),
            Err(GuardError::NoActivePhase)
        );
        assert_eq!(
            guard.enter_phase("rerank", &ctx, now).unwrap_err(),
            GuardError::UnknownPhase("rerank".to_string())
        );
        assert_eq!(guard.state(), BoundaryState::Pending);

        guard.enter_phase("retrieve", &ctx, now).unwrap();
        assert!(matches!(
            guard.enter_phase("generate", &ctx, now),
            Err(GuardError::InvalidTransition { action: "enter", .. })
        ));
        assert!(matches!(
            guard.exit_phase("generate", &ctx, now),
            Err(GuardError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_strict_broken_chain_raises() {
        let mut guard = guard(EnforcementMode::Strict);
        let now = Utc::now();
        let ctx = json!({"context": "docs", "answer": "a"});

        guard.enter_phase("retrieve", &ctx, now).unwrap();
        guard.stamp("context", &json!("docs"), BTreeMap::new(), now).unwrap();
        guard.exit_phase("retrieve", &ctx, now).unwrap();

        guard.enter_phase("generate", &ctx, now).unwrap();
        let err = guard.exit_phase("generate", &ctx, now).unwrap_err();
        let violation = err.as_violation().unwrap();
        assert_eq!(violation.site, ViolationSite::Chain);
        assert_eq!(violation.chain_id.as_deref(), Some("context-flow"));
        assert!(guard.chain_evaluation("context-flow").is_none());
        assert!(guard.summary().chain_statuses.is_empty());

        guard.stamp("context", &json!("docs"), BTreeMap::new(), now).unwrap();
        let report = guard.exit_phase("generate", &ctx, now).unwrap();
        assert!(report.passed());
        assert_eq!(
            guard.summary().chain_statuses["context-flow"],
            crate::engine::ChainStatus::Intact
        );
    }

    #[test]
    fn test_reset_clears_run_state() {
        let mut guard = guard(EnforcementMode::Strict);
        let now = Utc::now();
        let ctx = json!({"context": "docs"});
        let first_run = guard.run_id();

        guard.enter_phase("retrieve", &ctx, now).unwrap();
        guard.stamp("context", &json!("docs"), BTreeMap::new(), now).unwrap();
        guard.exit_phase("retrieve", &ctx, now).unwrap();

        guard.reset();
        assert_ne!(guard.run_id(), first_run);
        assert_eq!(guard.state(), BoundaryState::Pending);
        assert!(guard.provenance().is_empty());
        assert_eq!(guard.summary().fields_checked, 0);
        assert!(guard.chain_evaluation("context-flow").is_none());
    }
}
