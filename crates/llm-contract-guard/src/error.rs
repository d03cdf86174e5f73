//! Error types for the contract guard
//!
//! Load-time failures surface as [`SchemaError`]. Runtime failures at a phase
//! boundary are recovered into validation results; only the enforcement guard
//! escalates them into a [`BoundaryViolationError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contracts::{AssertionKind, Direction};

/// Malformed contract document. Never recoverable and never downgraded by an
/// enforcement mode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The document could not be decoded (unknown keys, unknown assertion
    /// kinds, wrong types)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The document declares a schema version this engine does not read
    #[error("Unsupported schema version '{found}' (supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    /// No phases were declared
    #[error("Contract declares no phases")]
    NoPhases,

    /// A phase has an empty name
    #[error("Phase at position {index} has an empty name")]
    EmptyPhaseName { index: usize },

    /// Two phases share a name
    #[error("Duplicate phase name '{0}'")]
    DuplicatePhase(String),

    /// A field path is empty or has an empty segment
    #[error("Invalid field path '{path}' in phase '{phase}'")]
    InvalidFieldPath { phase: String, path: String },

    /// The same field is declared twice on one boundary
    #[error("Field '{field}' declared more than once on {direction} of phase '{phase}'")]
    DuplicateField {
        phase: String,
        direction: Direction,
        field: String,
    },

    /// A chain has an empty id
    #[error("Propagation chain at position {index} has an empty id")]
    EmptyChainId { index: usize },

    /// Two chains share an id
    #[error("Duplicate propagation chain id '{0}'")]
    DuplicateChain(String),

    /// A chain declares no links
    #[error("Propagation chain '{0}' declares no links")]
    EmptyChain(String),

    /// A chain link references a phase that is not declared
    #[error("Propagation chain '{chain}' references undeclared phase '{phase}'")]
    UndeclaredChainPhase { chain: String, phase: String },

    /// Chain links must follow the declared phase order
    #[error("Propagation chain '{chain}' link '{phase}' precedes an earlier link's phase")]
    ChainOutOfOrder { chain: String, phase: String },

    /// Assertion parameters are malformed
    #[error("Invalid {kind} assertion on '{field}': {reason}")]
    InvalidAssertion {
        kind: AssertionKind,
        field: String,
        reason: String,
    },

    /// A BLOCKING assertion whose condition can never be satisfied
    #[error("Unsatisfiable blocking {kind} assertion on '{field}': {reason}")]
    UnsatisfiableAssertion {
        kind: AssertionKind,
        field: String,
        reason: String,
    },

    /// The contract uses a kind that no checker is registered for
    #[error("No checker registered for assertion kind '{kind}' (field '{field}')")]
    UnregisteredKind { kind: AssertionKind, field: String },
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Parse(err.to_string())
    }
}

/// Where a violation was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSite {
    Entry,
    Exit,
    Resume,
    Chain,
}

impl From<Direction> for ViolationSite {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Entry => ViolationSite::Entry,
            Direction::Exit => ViolationSite::Exit,
            Direction::Resume => ViolationSite::Resume,
        }
    }
}

impl fmt::Display for ViolationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationSite::Entry => write!(f, "entry"),
            ViolationSite::Exit => write!(f, "exit"),
            ViolationSite::Resume => write!(f, "resume"),
            ViolationSite::Chain => write!(f, "chain"),
        }
    }
}

/// A BLOCKING failure surfaced while the guard runs in strict mode.
///
/// The transition that produced it did not complete.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Boundary violation at {site} of phase '{phase}': {message}")]
pub struct BoundaryViolationError {
    /// Phase whose transition was refused
    pub phase: String,
    /// Boundary that failed
    pub site: ViolationSite,
    /// Offending field paths (empty for chain violations)
    pub fields: Vec<String>,
    /// Offending chain, for chain violations
    pub chain_id: Option<String>,
    /// Assertion kinds that failed (empty for pure presence failures)
    pub assertion_kinds: Vec<AssertionKind>,
    /// Human-readable summary
    pub message: String,
}

/// Errors returned by the enforcement guard
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    /// Strict-mode violation
    #[error(transparent)]
    Violation(#[from] BoundaryViolationError),

    /// The requested transition is not legal from the current state
    #[error("Cannot {action} phase '{phase}' from state '{from}'")]
    InvalidTransition {
        phase: String,
        from: String,
        action: &'static str,
    },

    /// The phase is not declared in the contract
    #[error("Unknown phase '{0}'")]
    UnknownPhase(String),

    /// A stamp was recorded while no phase was entered
    #[error("No phase is currently entered")]
    NoActivePhase,
}

impl GuardError {
    /// Check if this error is a strict-mode boundary violation
    pub fn is_violation(&self) -> bool {
        matches!(self, GuardError::Violation(_))
    }

    /// Get the violation, if this is one
    pub fn as_violation(&self) -> Option<&BoundaryViolationError> {
        match self {
            GuardError::Violation(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;
