//! Boundary contract definitions
//!
//! A [`Contract`] is decoded and checked once, at run start, from a
//! [`ContractDocument`]. After loading it is immutable and may be shared by
//! any number of concurrent runs.
//!
//! # Design Principles
//!
//! - **Closed**: unknown keys and unknown assertion kinds are rejected
//! - **Fail-fast**: every structural defect is a [`SchemaError`] at load time
//! - **Read-only**: lookups never mutate the loaded contract

pub mod assertions;
pub mod schemas;

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

pub use assertions::{
    AssertionKind, AssertionSpec, BudgetAssertion, DelegationAssertion, EvaluationAssertion,
    QualityAssertion, StalenessAssertion,
};
pub use schemas::{
    ChainLink, ContractDocument, Direction, FieldSpec, Phase, PropagationChainSpec, Severity,
};

use crate::engine::checkers::CheckerRegistry;
use crate::error::SchemaError;

/// Major schema version this engine reads
pub const SUPPORTED_SCHEMA_MAJOR: &str = "1";

/// A validated, immutable contract
#[derive(Debug, Clone)]
pub struct Contract {
    document: ContractDocument,
    phase_index: HashMap<String, usize>,
    chain_index: HashMap<String, usize>,
    contract_hash: String,
}

impl Contract {
    /// Decode and validate a JSON contract document
    pub fn from_json_str(input: &str, registry: &CheckerRegistry) -> Result<Self, SchemaError> {
        let document: ContractDocument = serde_json::from_str(input)?;
        Self::from_document(document, registry)
    }

    /// Decode and validate an already-parsed contract document
    pub fn from_value(value: Value, registry: &CheckerRegistry) -> Result<Self, SchemaError> {
        let document: ContractDocument = serde_json::from_value(value)?;
        Self::from_document(document, registry)
    }

    /// Validate a contract document against the registered checkers
    pub fn from_document(
        document: ContractDocument,
        registry: &CheckerRegistry,
    ) -> Result<Self, SchemaError> {
        check_schema_version(&document.schema_version)?;

        if document.phases.is_empty() {
            return Err(SchemaError::NoPhases);
        }

        let mut phase_index = HashMap::new();
        for (index, phase) in document.phases.iter().enumerate() {
            if phase.name.trim().is_empty() {
                return Err(SchemaError::EmptyPhaseName { index });
            }
            if phase_index.insert(phase.name.clone(), index).is_some() {
                return Err(SchemaError::DuplicatePhase(phase.name.clone()));
            }
            for direction in [Direction::Entry, Direction::Exit, Direction::Resume] {
                check_field_specs(&phase.name, direction, phase.fields(direction), registry)?;
            }
        }

        let mut chain_index = HashMap::new();
        for (index, chain) in document.propagation_chains.iter().enumerate() {
            if chain.id.trim().is_empty() {
                return Err(SchemaError::EmptyChainId { index });
            }
            if chain_index.insert(chain.id.clone(), index).is_some() {
                return Err(SchemaError::DuplicateChain(chain.id.clone()));
            }
            check_chain(chain, &phase_index, registry)?;
        }

        let contract_hash = hash_document(&document)?;

        tracing::debug!(
            contract_id = document.contract_id.as_deref().unwrap_or("-"),
            phases = document.phases.len(),
            chains = document.propagation_chains.len(),
            contract_hash = %contract_hash,
            "Loaded boundary contract"
        );

        Ok(Self {
            document,
            phase_index,
            chain_index,
            contract_hash,
        })
    }

    /// Contract id, if declared
    pub fn id(&self) -> Option<&str> {
        self.document.contract_id.as_deref()
    }

    /// Declared schema version
    pub fn schema_version(&self) -> &str {
        &self.document.schema_version
    }

    /// SHA-256 of the normalized document
    pub fn contract_hash(&self) -> &str {
        &self.contract_hash
    }

    /// The underlying document
    pub fn document(&self) -> &ContractDocument {
        &self.document
    }

    /// Phases in execution order
    pub fn phases(&self) -> &[Phase] {
        &self.document.phases
    }

    /// Look up a phase by name
    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phase_index.get(name).map(|&i| &self.document.phases[i])
    }

    /// Position of a phase in execution order
    pub fn phase_position(&self, name: &str) -> Option<usize> {
        self.phase_index.get(name).copied()
    }

    /// Phase declared right after `name`
    pub fn next_phase(&self, name: &str) -> Option<&Phase> {
        self.phase_position(name)
            .and_then(|i| self.document.phases.get(i + 1))
    }

    /// Declared propagation chains
    pub fn chains(&self) -> &[PropagationChainSpec] {
        &self.document.propagation_chains
    }

    /// Look up a chain by id
    pub fn chain(&self, id: &str) -> Option<&PropagationChainSpec> {
        self.chain_index
            .get(id)
            .map(|&i| &self.document.propagation_chains[i])
    }

    /// Chains whose last link belongs to `phase`
    pub fn chains_ending_at<'a>(
        &'a self,
        phase: &'a str,
    ) -> impl Iterator<Item = &'a PropagationChainSpec> + 'a {
        self.document
            .propagation_chains
            .iter()
            .filter(move |c| c.last_phase() == Some(phase))
    }

    /// Field specs of one boundary of a phase
    pub fn field_specs(&self, phase: &str, direction: Direction) -> Option<&[FieldSpec]> {
        self.phase(phase).map(|p| p.fields(direction))
    }

    /// Assertion attached to a field on one boundary of a phase
    pub fn assertion_spec_for(
        &self,
        phase: &str,
        direction: Direction,
        field: &str,
    ) -> Option<&AssertionSpec> {
        self.field_specs(phase, direction)?
            .iter()
            .find(|s| s.field_path == field)
            .and_then(FieldSpec::effective_assertion)
    }

    /// Assertion kinds used anywhere in the contract
    pub fn assertion_kinds(&self) -> HashSet<AssertionKind> {
        let mut kinds = HashSet::new();
        for phase in &self.document.phases {
            for direction in [Direction::Entry, Direction::Exit, Direction::Resume] {
                kinds.extend(phase.fields(direction).iter().filter_map(|s| {
                    s.assertion.as_ref().and_then(AssertionSpec::kind)
                }));
            }
        }
        for chain in &self.document.propagation_chains {
            for link in &chain.links {
                kinds.extend(link.assertions.iter().filter_map(AssertionSpec::kind));
            }
        }
        kinds
    }
}

fn check_schema_version(version: &str) -> Result<(), SchemaError> {
    let major = version.trim().split('.').next().unwrap_or_default();
    if major == SUPPORTED_SCHEMA_MAJOR {
        Ok(())
    } else {
        Err(SchemaError::UnsupportedVersion {
            found: version.to_string(),
            supported: format!("{}.x", SUPPORTED_SCHEMA_MAJOR),
        })
    }
}

/// Non-empty and no empty segments
fn is_valid_path(path: &str) -> bool {
    !path.trim().is_empty() && path.split('.').all(|s| !s.trim().is_empty())
}

fn check_assertion(
    assertion: &AssertionSpec,
    field: &str,
    registry: &CheckerRegistry,
) -> Result<(), SchemaError> {
    assertion.validate_structure(field)?;
    if let Some(kind) = assertion.kind() {
        if !registry.supports(kind) {
            return Err(SchemaError::UnregisteredKind {
                kind,
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

fn check_field_specs(
    phase: &str,
    direction: Direction,
    specs: &[FieldSpec],
    registry: &CheckerRegistry,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !is_valid_path(&spec.field_path) {
            return Err(SchemaError::InvalidFieldPath {
                phase: phase.to_string(),
                path: spec.field_path.clone(),
            });
        }
        if !seen.insert(spec.field_path.as_str()) {
            return Err(SchemaError::DuplicateField {
                phase: phase.to_string(),
                direction,
                field: spec.field_path.clone(),
            });
        }
        if let Some(assertion) = &spec.assertion {
            check_assertion(assertion, &spec.field_path, registry)?;
        }
    }
    Ok(())
}

fn check_chain(
    chain: &PropagationChainSpec,
    phase_index: &HashMap<String, usize>,
    registry: &CheckerRegistry,
) -> Result<(), SchemaError> {
    if chain.links.is_empty() {
        return Err(SchemaError::EmptyChain(chain.id.clone()));
    }

    let mut last_position = 0;
    for link in &chain.links {
        let Some(&position) = phase_index.get(&link.phase) else {
            return Err(SchemaError::UndeclaredChainPhase {
                chain: chain.id.clone(),
                phase: link.phase.clone(),
            });
        };
        if position < last_position {
            return Err(SchemaError::ChainOutOfOrder {
                chain: chain.id.clone(),
                phase: link.phase.clone(),
            });
        }
        last_position = position;

        if !is_valid_path(&link.field_path) {
            return Err(SchemaError::InvalidFieldPath {
                phase: link.phase.clone(),
                path: link.field_path.clone(),
            });
        }
        for assertion in &link.assertions {
            check_assertion(assertion, &link.field_path, registry)?;
        }
    }
    Ok(())
}

fn hash_document(document: &ContractDocument) -> Result<String, SchemaError> {
    let bytes = serde_json::to_vec(document)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
