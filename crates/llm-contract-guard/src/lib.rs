//! LLM Contract Guard
//!
//! Boundary-contract validation and provenance-chain tracking for multi-phase
//! LLM pipelines.
//!
//! ## Features
//!
//! - **Declarative Contracts**: Phases, per-boundary field specs and
//!   propagation chains, validated once at load time
//! - **Pluggable Assertions**: Quality, staleness, budget, evaluation and
//!   delegation checkers behind one registry
//! - **Provenance Tracking**: Who set each field, when, and what it hashed to
//! - **Chain Health**: INTACT / DEGRADED / BROKEN across declared chains
//! - **Enforcement Modes**: strict, permissive and audit
//! - **Non-blocking Events**: Optional bounded event sink, never backpressures
//!
//! ## Architecture
//!
//! 1. **Contracts** (`contracts/`): The contract document model and the
//!    loaded, immutable [`Contract`].
//!
//! 2. **Provenance** (`provenance`): Per-run [`ProvenanceStore`].
//!
//! 3. **Engine** (`engine/`): Checker registry, boundary validator and chain
//!    evaluator.
//!
//! 4. **Guard** (`guard`): The per-run [`EnforcementGuard`] state machine and
//!    its [`WorkflowRunSummary`].
//!
//! 5. **Telemetry** (`telemetry/`): Event records and sinks.
//!
//! No operation performs I/O or reads the wall clock; every time-dependent
//! check takes a caller-supplied `now`, so the guard can be driven from
//! synchronous or async code alike.
//!
//! ## Example
//!
//! ```rust
//! use llm_contract_guard::{CheckerRegistry, Contract, EnforcementGuard, GuardConfig};
//! use chrono::Utc;
//! use serde_json::json;
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CheckerRegistry::with_defaults());
//! let contract = Contract::from_json_str(
//!     r#"{
//!         "schema_version": "1.0",
//!         "phases": [
//!             {"name": "retrieve", "exit": [{"field": "context"}]},
//!             {"name": "generate", "entry": [{"field": "context"}]}
//!         ]
//!     }"#,
//!     &registry,
//! )
//! .unwrap();
//!
//! let mut guard = EnforcementGuard::new(Arc::new(contract), registry, GuardConfig::default(), None);
//! let ctx = json!({"context": ["doc-1", "doc-2"]});
//! let now = Utc::now();
//!
//! guard.enter_phase("retrieve", &ctx, now).unwrap();
//! guard.stamp("context", &ctx["context"], BTreeMap::new(), now).unwrap();
//! guard.exit_phase("retrieve", &ctx, now).unwrap();
//! guard.enter_phase("generate", &ctx, now).unwrap();
//!
//! let summary = guard.finish(&ctx, now);
//! assert!(summary.passed());
//! ```

pub mod config;
pub mod context;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod guard;
pub mod provenance;
pub mod summary;
pub mod telemetry;

pub use config::{EnforcementMode, GuardConfig, GuardConfigBuilder};
pub use context::PipelineContext;
pub use contracts::{
    AssertionKind, AssertionSpec, ChainLink, Contract, ContractDocument, Direction, FieldSpec,
    Phase, PropagationChainSpec, Severity,
};
pub use engine::{
    AssertionChecker, AssertionResult, AssertionStatus, BoundaryValidator, ChainEvaluation,
    ChainEvaluator, ChainStatus, CheckerRegistry, ContractValidationResult, FailureKind,
    FieldOutcome,
};
pub use error::{BoundaryViolationError, GuardError, Result, SchemaError, ViolationSite};
pub use guard::{BoundaryReport, BoundaryState, EnforcementGuard};
pub use provenance::{FieldProvenance, ProvenanceLookup, ProvenanceStore};
pub use summary::WorkflowRunSummary;
pub use telemetry::{BufferedEventSink, EventEmitter, EventRecord, EventSink, TracingEventSink};
