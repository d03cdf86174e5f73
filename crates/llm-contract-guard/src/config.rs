//! Per-run guard configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::provenance::DEFAULT_METADATA_ATTRIBUTE_CAP;

pub const ENV_ENFORCEMENT_MODE: &str = "CONTRACT_ENFORCEMENT_MODE";
pub const ENV_EMIT_EVENTS: &str = "CONTRACT_EMIT_EVENTS";
pub const ENV_METADATA_ATTRIBUTE_CAP: &str = "CONTRACT_METADATA_ATTRIBUTE_CAP";
pub const ENV_EVENT_BUFFER_CAPACITY: &str = "CONTRACT_EVENT_BUFFER_CAPACITY";

/// Default capacity of the buffered event sink
pub const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 1000;

/// How the guard treats a BLOCKING failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Raise a violation; the transition does not complete
    #[default]
    Strict,
    /// Log and force the transition through
    Permissive,
    /// Only emit events
    Audit,
}

impl EnforcementMode {
    /// Check if BLOCKING failures halt the pipeline in this mode
    pub fn raises(&self) -> bool {
        matches!(self, EnforcementMode::Strict)
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementMode::Strict => write!(f, "strict"),
            EnforcementMode::Permissive => write!(f, "permissive"),
            EnforcementMode::Audit => write!(f, "audit"),
        }
    }
}

impl FromStr for EnforcementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(EnforcementMode::Strict),
            "permissive" => Ok(EnforcementMode::Permissive),
            "audit" => Ok(EnforcementMode::Audit),
            other => Err(format!(
                "unknown enforcement mode '{}' (expected strict, permissive or audit)",
                other
            )),
        }
    }
}

/// Guard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Enforcement mode for BLOCKING failures
    pub mode: EnforcementMode,

    /// Emit events to the configured sink
    pub emit_events: bool,

    /// Metadata entries carried by a `provenance.stamped` event
    pub metadata_attribute_cap: usize,

    /// Capacity used when the guard builds its own buffered sink
    pub event_buffer_capacity: usize,

    /// Free-form label carried in the run summary
    pub run_label: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: EnforcementMode::Strict,
            emit_events: true,
            metadata_attribute_cap: DEFAULT_METADATA_ATTRIBUTE_CAP,
            event_buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY,
            run_label: None,
        }
    }
}

impl GuardConfig {
    /// Create a new config builder
    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup. Invalid values fall back to the
    /// defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            mode: parse_or(&lookup, ENV_ENFORCEMENT_MODE, defaults.mode),
            emit_events: parse_or(&lookup, ENV_EMIT_EVENTS, defaults.emit_events),
            metadata_attribute_cap: parse_or(
                &lookup,
                ENV_METADATA_ATTRIBUTE_CAP,
                defaults.metadata_attribute_cap,
            ),
            event_buffer_capacity: parse_or(
                &lookup,
                ENV_EVENT_BUFFER_CAPACITY,
                defaults.event_buffer_capacity,
            ),
            run_label: None,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key = %key, value = %raw, default = %default, "Invalid configuration value, using default");
            default
        }
    }
}

/// Builder for GuardConfig
pub struct GuardConfigBuilder {
    config: GuardConfig,
}

impl GuardConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: GuardConfig::default(),
        }
    }

    /// Set the enforcement mode
    pub fn mode(mut self, mode: EnforcementMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Enable or disable event emission
    pub fn emit_events(mut self, enabled: bool) -> Self {
        self.config.emit_events = enabled;
        self
    }

    /// Set the metadata attribute cap
    pub fn metadata_attribute_cap(mut self, cap: usize) -> Self {
        self.config.metadata_attribute_cap = cap;
        self
    }

    /// Set the event buffer capacity
    pub fn event_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.event_buffer_capacity = capacity;
        self
    }

    /// Set the run label
    pub fn run_label(mut self, label: impl Into<String>) -> Self {
        self.config.run_label = Some(label.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> GuardConfig {
        self.config
    }
}

impl Default for GuardConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
