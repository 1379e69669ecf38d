// SPDX-License-Identifier: Apache-2.0

//! Event model consumed by front-ends.
//!
//! The coordinator emits one `Event` per notable transition into an
//! `EventSink` supplied at construction. The core never formats or writes
//! output itself - sinks decide representation (JSON lines, a test
//! buffer) and attach the timestamp and actor identity.

use serde::{Deserialize, Serialize};

use crate::region::MemoryState;

/// Category of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Process start/stop and state resets.
    System,
    /// Idempotent no-ops (double create, double attach).
    Warning,
    /// Failed operations and unrecognized commands.
    Error,
    /// Segment lifecycle (obtained, attached, detached, removed).
    Shm,
    /// Gate lifecycle (obtained, removed).
    Semaphore,
    /// About to block on the gate.
    Operation,
    /// A message was written to the region.
    Write,
    /// A message was read (or there was no new data).
    Read,
    /// Effective configuration at startup.
    Config,
    /// Usage hints for the command loop.
    Instruction,
}

impl EventKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Shm => "shm",
            Self::Semaphore => "semaphore",
            Self::Operation => "operation",
            Self::Write => "write",
            Self::Read => "read",
            Self::Config => "config",
            Self::Instruction => "instruction",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One structured record per notable transition or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
    /// Auxiliary payload: the message written/read or a resource id.
    pub data: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(kind: EventKind, message: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: Some(data.into()),
        }
    }
}

/// Receiver of coordinator events.
pub trait EventSink {
    fn record(&mut self, event: Event);

    /// Structured memory-state record; sinks without a use drop it.
    fn record_state(&mut self, _state: &MemoryState) {}
}

/// Sink collecting everything in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<Event>,
    pub states: Vec<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of the given kind, in emission order.
    pub fn of_kind(&self, kind: EventKind) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    fn record_state(&mut self, state: &MemoryState) {
        self.states.push(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventKind::Shm).unwrap(), "\"shm\"");
        assert_eq!(
            serde_json::to_string(&EventKind::Semaphore).unwrap(),
            "\"semaphore\""
        );
    }

    #[test]
    fn test_memory_sink_filters_by_kind() {
        let mut sink = MemorySink::new();
        sink.record(Event::new(EventKind::System, "started"));
        sink.record(Event::with_data(EventKind::Write, "wrote", "hello"));
        sink.record(Event::new(EventKind::System, "stopped"));

        assert_eq!(sink.of_kind(EventKind::System).len(), 2);
        let writes = sink.of_kind(EventKind::Write);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].data.as_deref(), Some("hello"));
    }
}
