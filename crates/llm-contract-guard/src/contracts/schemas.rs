//! Contract document definitions
//!
//! The declarative shape of a boundary contract: phases with entry, exit and
//! checkpoint field specs, and the propagation chains that link fields across
//! phases. Every level rejects unknown keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::assertions::AssertionSpec;

/// Importance of a check outcome.
///
/// Ordered from least to most severe so `max()` picks the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Logged only
    #[serde(alias = "ADVISORY", alias = "Advisory")]
    Advisory,
    /// Reported but never blocks
    #[serde(alias = "WARNING", alias = "Warning")]
    Warning,
    /// Fails the boundary
    #[serde(alias = "BLOCKING", alias = "Blocking")]
    Blocking,
}

impl Severity {
    /// Check if this severity fails a boundary
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Blocking)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Advisory => write!(f, "advisory"),
            Severity::Warning => write!(f, "warning"),
            Severity::Blocking => write!(f, "blocking"),
        }
    }
}

pub(crate) fn blocking() -> Severity {
    Severity::Blocking
}

pub(crate) fn warning() -> Severity {
    Severity::Warning
}

/// Which boundary of a phase a field spec belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Checked before the phase runs
    Entry,
    /// Checked after the phase runs
    Exit,
    /// Checked when resuming from a checkpoint taken after the phase
    Resume,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Entry => write!(f, "entry"),
            Direction::Exit => write!(f, "exit"),
            Direction::Resume => write!(f, "resume"),
        }
    }
}

/// Top-level contract document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractDocument {
    /// Document schema version ("1", "1.0", ...)
    pub schema_version: String,

    /// Optional identifier for the contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Phases in execution order
    pub phases: Vec<Phase>,

    /// Cross-phase propagation chains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub propagation_chains: Vec<PropagationChainSpec>,
}

/// A single pipeline phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Phase {
    /// Unique phase name
    pub name: String,

    /// Fields required on entry, in check order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<FieldSpec>,

    /// Fields required on exit, in check order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit: Vec<FieldSpec>,

    /// Fields re-checked when resuming from a checkpoint taken after this phase
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkpoint: Vec<FieldSpec>,
}

impl Phase {
    /// Create an empty phase
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: Vec::new(),
            exit: Vec::new(),
            checkpoint: Vec::new(),
        }
    }

    /// Add an entry field spec
    pub fn with_entry(mut self, spec: FieldSpec) -> Self {
        self.entry.push(spec);
        self
    }

    /// Add an exit field spec
    pub fn with_exit(mut self, spec: FieldSpec) -> Self {
        self.exit.push(spec);
        self
    }

    /// Add a checkpoint field spec
    pub fn with_checkpoint(mut self, spec: FieldSpec) -> Self {
        self.checkpoint.push(spec);
        self
    }

    /// Field specs for one boundary
    pub fn fields(&self, direction: Direction) -> &[FieldSpec] {
        match direction {
            Direction::Entry => &self.entry,
            Direction::Exit => &self.exit,
            Direction::Resume => &self.checkpoint,
        }
    }
}

/// Expectation for a single field at a boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Dot-path of the field in the pipeline context
    #[serde(rename = "field")]
    pub field_path: String,

    /// Severity applied when the field is absent
    #[serde(default = "blocking")]
    pub severity: Severity,

    /// Assertion checked when the field is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<AssertionSpec>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    /// Create a field spec with the given absence severity
    pub fn new(field_path: impl Into<String>, severity: Severity) -> Self {
        Self {
            field_path: field_path.into(),
            severity,
            assertion: None,
            description: None,
        }
    }

    /// Create a BLOCKING field spec
    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, Severity::Blocking)
    }

    /// Attach an assertion
    pub fn with_assertion(mut self, assertion: AssertionSpec) -> Self {
        self.assertion = Some(assertion);
        self
    }

    /// Add description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The attached assertion, treating `kind: none` as no assertion
    pub fn effective_assertion(&self) -> Option<&AssertionSpec> {
        self.assertion.as_ref().filter(|a| a.kind().is_some())
    }
}

/// Declared end-to-end propagation path of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropagationChainSpec {
    /// Unique chain id
    pub id: String,

    /// Links in propagation order
    pub links: Vec<ChainLink>,

    /// Severity of a broken chain
    #[serde(default = "blocking")]
    pub severity: Severity,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropagationChainSpec {
    /// Create a chain with BLOCKING breakage severity
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            links: Vec::new(),
            severity: Severity::Blocking,
            description: None,
        }
    }

    /// Append a link
    pub fn with_link(mut self, link: ChainLink) -> Self {
        self.links.push(link);
        self
    }

    /// Set the breakage severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Phase of the last link
    pub fn last_phase(&self) -> Option<&str> {
        self.links.last().map(|l| l.phase.as_str())
    }
}

/// One (phase, field) hop in a propagation chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainLink {
    /// Phase expected to stamp the field
    pub phase: String,

    /// Field dot-path
    #[serde(rename = "field")]
    pub field_path: String,

    /// Expectations checked on the field at this hop
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionSpec>,
}

impl ChainLink {
    /// Create a link with no assertions
    pub fn new(phase: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            field_path: field_path.into(),
            assertions: Vec::new(),
        }
    }

    /// Add an assertion
    pub fn with_assertion(mut self, assertion: AssertionSpec) -> Self {
        self.assertions.push(assertion);
        self
    }
}
