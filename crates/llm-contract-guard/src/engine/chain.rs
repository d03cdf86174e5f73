//! Propagation chain evaluation
//!
//! A chain is healthy when every link's phase stamped the link's field and
//! every per-link assertion held. Presence is read from provenance lineage
//! only; the evaluator never re-derives domain values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::checkers::{AssertionResult, CheckerRegistry};
use crate::context::PipelineContext;
use crate::contracts::{AssertionKind, PropagationChainSpec, Severity};
use crate::provenance::ProvenanceLookup;
use crate::telemetry::{EventEmitter, EventRecord, EVENT_CHAIN_EVALUATED};

/// End-to-end health of a chain.
///
/// Ordered `Broken < Degraded < Intact`; a chain takes the minimum of its
/// links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainStatus {
    Broken,
    Degraded,
    Intact,
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::Broken => write!(f, "BROKEN"),
            ChainStatus::Degraded => write!(f, "DEGRADED"),
            ChainStatus::Intact => write!(f, "INTACT"),
        }
    }
}

/// Outcome of one chain link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub phase: String,
    pub field_path: String,
    /// Whether the link's phase stamped the field
    pub present: bool,
    pub status: ChainStatus,
    pub assertions: Vec<AssertionResult>,
}

/// Result of evaluating one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvaluation {
    pub chain_id: String,
    pub status: ChainStatus,
    /// Declared breakage severity of the chain
    pub severity: Severity,
    pub message: String,
    /// Links evaluated, in declared order; stops at the first absent link
    pub links: Vec<LinkOutcome>,
}

impl ChainEvaluation {
    /// Check if the chain is broken
    pub fn is_broken(&self) -> bool {
        self.status == ChainStatus::Broken
    }

    /// Link where the chain broke on a missing field
    pub fn missing_link(&self) -> Option<&LinkOutcome> {
        self.links.iter().find(|l| !l.present)
    }

    /// Kinds of failed link assertions, deduplicated
    pub fn failing_kinds(&self) -> Vec<AssertionKind> {
        let mut kinds: Vec<_> = self
            .links
            .iter()
            .flat_map(|l| l.assertions.iter())
            .filter(|a| a.is_failure())
            .map(|a| a.kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Number of failed link assertions
    pub fn failed_assertions(&self) -> usize {
        self.links
            .iter()
            .flat_map(|l| l.assertions.iter())
            .filter(|a| a.is_failure())
            .count()
    }
}

/// Computes chain health from provenance and link assertions
pub struct ChainEvaluator<'a> {
    registry: &'a CheckerRegistry,
    emitter: &'a EventEmitter,
    escalate_blocking: bool,
}

impl<'a> ChainEvaluator<'a> {
    /// Create an evaluator that reports BLOCKING link failures as DEGRADED
    pub fn new(registry: &'a CheckerRegistry, emitter: &'a EventEmitter) -> Self {
        Self {
            registry,
            emitter,
            escalate_blocking: false,
        }
    }

    /// Report BLOCKING link failures as BROKEN instead
    pub fn with_escalation(mut self, escalate_blocking: bool) -> Self {
        self.escalate_blocking = escalate_blocking;
        self
    }

    /// Evaluate a chain against what the provenance currently reflects
    pub fn evaluate(
        &self,
        chain: &PropagationChainSpec,
        context: &dyn PipelineContext,
        provenance: &dyn ProvenanceLookup,
        now: DateTime<Utc>,
    ) -> ChainEvaluation {
        let mut links = Vec::with_capacity(chain.links.len());
        let mut status = ChainStatus::Intact;
        let mut broken_at = None;

        for (index, link) in chain.links.iter().enumerate() {
            let record = provenance
                .lookup(&link.field_path)
                .filter(|r| r.stamped_by(&link.phase));

            let Some(record) = record else {
                links.push(LinkOutcome {
                    phase: link.phase.clone(),
                    field_path: link.field_path.clone(),
                    present: false,
                    status: ChainStatus::Broken,
                    assertions: Vec::new(),
                });
                status = ChainStatus::Broken;
                broken_at = Some(index);
                break;
            };

            let observed = context.resolve(&link.field_path);
            let assertions: Vec<AssertionResult> = link
                .assertions
                .iter()
                .filter_map(|a| self.registry.check(observed, a, Some(record), now))
                .collect();

            let link_status = assertions
                .iter()
                .filter(|a| a.is_failure())
                .map(|a| {
                    if a.is_blocking() && self.escalate_blocking {
                        ChainStatus::Broken
                    } else {
                        ChainStatus::Degraded
                    }
                })
                .min()
                .unwrap_or(ChainStatus::Intact);

            status = status.min(link_status);
            links.push(LinkOutcome {
                phase: link.phase.clone(),
                field_path: link.field_path.clone(),
                present: true,
                status: link_status,
                assertions,
            });
        }

        let mut evaluation = ChainEvaluation {
            chain_id: chain.id.clone(),
            status,
            severity: chain.severity,
            message: String::new(),
            links,
        };
        evaluation.message = describe(&evaluation, chain.links.len(), broken_at);

        tracing::debug!(
            chain = %chain.id,
            status = %evaluation.status,
            links = evaluation.links.len(),
            "Evaluated propagation chain"
        );
        self.emit(&evaluation, chain.links.len(), broken_at);

        evaluation
    }

    fn emit(&self, evaluation: &ChainEvaluation, total_links: usize, broken_at: Option<usize>) {
        let event = EventRecord::new(EVENT_CHAIN_EVALUATED)
            .with("chain_id", evaluation.chain_id.as_str())
            .with("status", evaluation.status.to_string())
            .with("severity", evaluation.severity.to_string())
            .with("links_evaluated", evaluation.links.len())
            .with("links_total", total_links)
            .with("failed_assertions", evaluation.failed_assertions())
            .with_opt("broken_at_link", broken_at)
            .with("message", evaluation.message.as_str());
        self.emitter.emit(event);
    }
}

fn describe(evaluation: &ChainEvaluation, total_links: usize, broken_at: Option<usize>) -> String {
    if let (Some(index), Some(link)) = (broken_at, evaluation.missing_link()) {
        return format!(
            "chain '{}' broken at link {} of {}: '{}' was never stamped by phase '{}'",
            evaluation.chain_id,
            index + 1,
            total_links,
            link.field_path,
            link.phase
        );
    }

    match evaluation.status {
        ChainStatus::Intact => format!(
            "chain '{}' intact across {} links",
            evaluation.chain_id, total_links
        ),
        status => {
            let kinds: Vec<_> = evaluation
                .failing_kinds()
                .iter()
                .map(|k| k.as_str())
                .collect();
            format!(
                "chain '{}' {}: {} link assertion failure(s) ({})",
                evaluation.chain_id,
                status.to_string().to_lowercase(),
                evaluation.failed_assertions(),
                kinds.join(", ")
            )
        }
    }
}
