//! Event emission for boundary checks
//!
//! Emits event records without ever blocking the pipeline.
//!
//! # Features
//!
//! - Bounded channel-based buffer; overflow drops the event and is counted
//! - No runtime required: producers only use `try_send`
//! - Tracing-only sink for deployments without an event backend
//! - Optional sink: an emitter without one degrades to debug logging
//!
//! # Example
//!
//! ```rust
//! use llm_contract_guard::telemetry::{BufferedEventSink, EventEmitter, EventRecord};
//! use std::sync::Arc;
//!
//! let (sink, mut receiver) = BufferedEventSink::new(64);
//! let emitter = EventEmitter::new(Arc::new(sink));
//!
//! emitter.emit(EventRecord::new("chain.evaluated").with("status", "intact"));
//!
//! let events = receiver.drain();
//! assert_eq!(events[0].name, "chain.evaluated");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::{Result, TelemetryError};

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// Ordered attribute map
pub type EventAttributes = BTreeMap<String, AttributeValue>;

/// A single structured event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Canonical event name
    pub name: String,
    /// Scalar attributes
    pub attributes: EventAttributes,
}

impl EventRecord {
    /// Create an event with no attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: EventAttributes::new(),
        }
    }

    /// Add an attribute
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add an attribute if the value is present
    pub fn with_opt<V: Into<AttributeValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Get an attribute
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Destination for event records.
///
/// Implementations must not block the caller. A panicking sink is contained
/// by [`EventEmitter`] and counted like a refused event.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Accept one event
    fn emit(&self, event: EventRecord) -> Result<()>;
}

/// Sink backed by a bounded channel
pub struct BufferedEventSink {
    sender: mpsc::Sender<EventRecord>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl BufferedEventSink {
    /// Create a sink holding at most `capacity` undelivered events.
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        let sink = Self {
            sender,
            dropped: Arc::clone(&dropped),
            capacity,
        };
        (sink, EventReceiver { receiver, dropped })
    }

    /// Number of events dropped on overflow
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Maximum number of buffered events
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventSink for BufferedEventSink {
    fn emit(&self, event: EventRecord) -> Result<()> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TelemetryError::BufferFull(event.name))
            }
            Err(TrySendError::Closed(_)) => Err(TelemetryError::SinkClosed),
        }
    }
}

/// Consumer side of a [`BufferedEventSink`]
pub struct EventReceiver {
    receiver: mpsc::Receiver<EventRecord>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Take the next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<EventRecord> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next event; `None` once every sink is gone
    pub async fn recv(&mut self) -> Option<EventRecord> {
        self.receiver.recv().await
    }

    /// Take every buffered event
    pub fn drain(&mut self) -> Vec<EventRecord> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Number of events the producer side dropped
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sink that writes events to `tracing` only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: EventRecord) -> Result<()> {
        let attributes = serde_json::to_string(&event.attributes)
            .unwrap_or_else(|_| format!("{:?}", event.attributes));
        tracing::info!(event = %event.name, attributes = %attributes, "contract event");
        Ok(())
    }
}

/// Fire-and-forget wrapper around an optional sink
#[derive(Clone, Default)]
pub struct EventEmitter {
    sink: Option<Arc<dyn EventSink>>,
    failures: Arc<AtomicU64>,
}

impl EventEmitter {
    /// Create an emitter writing to `sink`
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink: Some(sink),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create an emitter with no sink; events are only debug-logged
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create an emitter from an optional sink
    pub fn from_option(sink: Option<Arc<dyn EventSink>>) -> Self {
        match sink {
            Some(sink) => Self::new(sink),
            None => Self::disabled(),
        }
    }

    /// Check if a sink is attached
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit an event. Never fails and never blocks.
    pub fn emit(&self, event: EventRecord) {
        let Some(sink) = &self.sink else {
            tracing::debug!(event = %event.name, "No event sink configured");
            return;
        };

        let name = event.name.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| sink.emit(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event = %name, error = %e, "Failed to emit contract event");
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(event = %name, "Event sink panicked, event dropped");
            }
        }
    }

    /// Number of events the sink refused (dropped, closed or rejected)
    pub fn failed_emissions(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("enabled", &self.is_enabled())
            .field("failed_emissions", &self.failed_emissions())
            .finish()
    }
}
