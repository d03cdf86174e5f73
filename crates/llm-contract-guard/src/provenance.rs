//! Field provenance tracking
//!
//! One [`FieldProvenance`] record per field path per run. A later stamp of the
//! same field updates the record in place (latest stamp wins for the hash,
//! time and origin; metadata is merged key by key) and appends the stamping
//! phase to the record's lineage. Full stamp history is not retained here;
//! every stamp is reported as a `provenance.stamped` event instead.
//!
//! The store holds metadata only. It never sees or changes the pipeline
//! context it describes beyond hashing the stamped value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use crate::telemetry::{EventEmitter, EventRecord, EVENT_PROVENANCE_STAMPED};

/// Metadata entries carried by a `provenance.stamped` event by default
pub const DEFAULT_METADATA_ATTRIBUTE_CAP: usize = 8;

/// Longest metadata value carried by an event, in characters
pub const MAX_METADATA_VALUE_CHARS: usize = 256;

/// Who set a field, when, and what it hashed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Record identity
    pub field_path: String,
    /// Phase of the latest stamp
    pub origin_phase: String,
    /// Time of the latest stamp
    pub set_at: DateTime<Utc>,
    /// SHA-256 (hex) of the latest stamped value
    pub value_hash: String,
    /// Assertion-specific stamps, namespaced by checker (`evaluation.score`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extension_metadata: BTreeMap<String, String>,
    /// Every phase that has stamped this field, in first-stamp order
    #[serde(default)]
    pub lineage: Vec<String>,
    /// Number of stamps applied to this record
    #[serde(default)]
    pub revision: u64,
}

impl FieldProvenance {
    /// Get a metadata value
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.extension_metadata.get(key).map(String::as_str)
    }

    /// Get a metadata value parsed as a finite number
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Check if `phase` has ever stamped this field
    pub fn stamped_by(&self, phase: &str) -> bool {
        self.lineage.iter().any(|p| p == phase)
    }

    /// Time elapsed since the latest stamp, clamped at zero
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.set_at).max(Duration::zero())
    }
}

/// Read-only access to provenance records
pub trait ProvenanceLookup {
    /// Current record for a field
    fn lookup(&self, field_path: &str) -> Option<&FieldProvenance>;
}

/// A stamp that has not been applied to a store yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStamp {
    pub field_path: String,
    pub phase: String,
    pub value_hash: String,
    pub metadata: BTreeMap<String, String>,
    pub at: DateTime<Utc>,
}

impl PendingStamp {
    /// Create a stamp, hashing the value
    pub fn new(
        field_path: impl Into<String>,
        phase: impl Into<String>,
        value: &Value,
        metadata: BTreeMap<String, String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            phase: phase.into(),
            value_hash: hash_value(value),
            metadata,
            at,
        }
    }

    /// Apply this stamp on top of an existing record (or create one)
    pub fn apply_to(self, existing: Option<&FieldProvenance>) -> FieldProvenance {
        match existing {
            Some(record) => {
                let mut record = record.clone();
                if !record.stamped_by(&self.phase) {
                    record.lineage.push(self.phase.clone());
                }
                record.origin_phase = self.phase;
                record.set_at = self.at;
                record.value_hash = self.value_hash;
                record.extension_metadata.extend(self.metadata);
                record.revision += 1;
                record
            }
            None => FieldProvenance {
                field_path: self.field_path,
                lineage: vec![self.phase.clone()],
                origin_phase: self.phase,
                set_at: self.at,
                value_hash: self.value_hash,
                extension_metadata: self.metadata,
                revision: 1,
            },
        }
    }
}

/// SHA-256 (hex) of the compact JSON form of a value
pub fn hash_value(value: &Value) -> String {
    let mut hasher = Sha256::new();
    // Value's Display is its compact JSON serialization
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Per-run provenance table
#[derive(Debug)]
pub struct ProvenanceStore {
    records: HashMap<String, FieldProvenance>,
    emitter: EventEmitter,
    metadata_cap: usize,
}

impl Default for ProvenanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvenanceStore {
    /// Create an empty store with no event sink
    pub fn new() -> Self {
        Self::with_emitter(EventEmitter::disabled(), DEFAULT_METADATA_ATTRIBUTE_CAP)
    }

    /// Create an empty store reporting stamps through `emitter`
    pub fn with_emitter(emitter: EventEmitter, metadata_cap: usize) -> Self {
        Self {
            records: HashMap::new(),
            emitter,
            metadata_cap,
        }
    }

    /// Record that `phase` set `field_path` to `value`
    pub fn stamp(
        &mut self,
        field_path: &str,
        phase: &str,
        value: &Value,
        metadata: BTreeMap<String, String>,
        at: DateTime<Utc>,
    ) -> &FieldProvenance {
        let stamp = PendingStamp::new(field_path, phase, value, metadata, at);
        self.commit(stamp.apply_to(self.records.get(field_path)))
    }

    /// Store a record produced by [`PendingStamp::apply_to`]
    pub fn commit(&mut self, record: FieldProvenance) -> &FieldProvenance {
        self.emitter.emit(self.stamped_event(&record));
        tracing::debug!(
            field = %record.field_path,
            phase = %record.origin_phase,
            revision = record.revision,
            "Stamped field provenance"
        );

        let key = record.field_path.clone();
        self.records.insert(key.clone(), record);
        &self.records[&key]
    }

    fn stamped_event(&self, record: &FieldProvenance) -> EventRecord {
        let mut event = EventRecord::new(EVENT_PROVENANCE_STAMPED)
            .with("field", record.field_path.as_str())
            .with("phase", record.origin_phase.as_str())
            .with("value_hash", record.value_hash.as_str())
            .with("set_at", record.set_at.to_rfc3339())
            .with("revision", record.revision)
            .with(
                "metadata_truncated",
                record.extension_metadata.len() > self.metadata_cap,
            );

        for (key, value) in record.extension_metadata.iter().take(self.metadata_cap) {
            let value: String = value.chars().take(MAX_METADATA_VALUE_CHARS).collect();
            event = event.with(format!("meta.{}", key), value);
        }
        event
    }

    /// Current record for a field
    pub fn get(&self, field_path: &str) -> Option<&FieldProvenance> {
        self.records.get(field_path)
    }

    /// Time since the field was last stamped
    pub fn age(&self, field_path: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.get(field_path).map(|r| r.age(now))
    }

    /// Check if a field has been stamped
    pub fn contains(&self, field_path: &str) -> bool {
        self.records.contains_key(field_path)
    }

    /// Number of stamped fields
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing has been stamped
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &FieldProvenance> {
        self.records.values()
    }

    /// Copy of every record, sorted by field path (for checkpoints)
    pub fn snapshot(&self) -> Vec<FieldProvenance> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.field_path.cmp(&b.field_path));
        records
    }

    /// Replace the table with checkpointed records. Emits no events.
    pub fn restore(&mut self, records: impl IntoIterator<Item = FieldProvenance>) {
        self.records = records
            .into_iter()
            .map(|r| (r.field_path.clone(), r))
            .collect();
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl ProvenanceLookup for ProvenanceStore {
    fn lookup(&self, field_path: &str) -> Option<&FieldProvenance> {
        self.get(field_path)
    }
}

/// Committed records overlaid with stamps staged by the running phase
pub struct StagedProvenance<'a> {
    base: &'a ProvenanceStore,
    staged: &'a HashMap<String, FieldProvenance>,
}

impl<'a> StagedProvenance<'a> {
    pub fn new(base: &'a ProvenanceStore, staged: &'a HashMap<String, FieldProvenance>) -> Self {
        Self { base, staged }
    }
}

impl ProvenanceLookup for StagedProvenance<'_> {
    fn lookup(&self, field_path: &str) -> Option<&FieldProvenance> {
        self.staged
            .get(field_path)
            .or_else(|| self.base.get(field_path))
    }
}
