//! Telemetry module for the contract guard
//!
//! The engine reports what it observes as structured events through a narrow
//! sink interface. Emission is fire-and-forget: a missing, full or failing
//! sink never changes a validation outcome.
//!
//! # Architecture
//!
//! - `emitter` - event records, the [`EventSink`] seam, a bounded buffered
//!   sink, a tracing-only sink, and the [`EventEmitter`] wrapper used by the
//!   engine components

pub mod emitter;

pub use emitter::{
    AttributeValue, BufferedEventSink, EventAttributes, EventEmitter, EventReceiver, EventRecord,
    EventSink, TracingEventSink,
};

#[cfg(test)]
pub use emitter::MockEventSink;

use thiserror::Error;

/// Canonical event name for a provenance stamp
pub const EVENT_PROVENANCE_STAMPED: &str = "provenance.stamped";

/// Canonical event name for a failed field check
pub const EVENT_BOUNDARY_VIOLATION: &str = "boundary.violation";

/// Canonical event name for a chain evaluation
pub const EVENT_CHAIN_EVALUATED: &str = "chain.evaluated";

/// Canonical event name for the end-of-run summary
pub const EVENT_WORKFLOW_SUMMARY: &str = "workflow.summary";

/// Telemetry errors. Logged by the emitter, never escalated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Event buffer is full, dropped '{0}'")]
    BufferFull(String),

    #[error("Event sink is closed")]
    SinkClosed,

    #[error("Event sink rejected event: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::BufferFull("chain.evaluated".to_string());
        assert!(err.to_string().contains("chain.evaluated"));
        assert_eq!(TelemetryError::SinkClosed.to_string(), "Event sink is closed");
    }
}
