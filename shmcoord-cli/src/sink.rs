// SPDX-License-Identifier: Apache-2.0

//! JSON event sink: one structured record per line on stdout.
//!
//! Each record carries a local timestamp (second resolution), the event
//! type, the emitting actor and pid, the human-readable message, and an
//! optional data payload. Escaping comes from serde_json. Memory-state
//! snapshots are printed with a `MEMORY_STATE: ` prefix so downstream
//! consumers can pick them out of the event stream.

use std::io::Write;

use serde::Serialize;
use shmcoord_core::{Event, EventKind, EventSink, MemoryState};

/// Sink writing JSON lines to stdout.
pub struct JsonEventSink {
    process: String,
    pid: u32,
}

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    #[serde(rename = "type")]
    kind: EventKind,
    process: &'a str,
    pid: u32,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
}

#[derive(Serialize)]
struct StateRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    state: &'a MemoryState,
}

impl JsonEventSink {
    pub fn new(process: impl Into<String>, pid: u32) -> Self {
        Self {
            process: process.into(),
            pid,
        }
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn write_line(prefix: &str, line: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A broken stdout means nobody is listening; nothing to report to.
        let _ = writeln!(out, "{}{}", prefix, line);
    }
}

impl EventSink for JsonEventSink {
    fn record(&mut self, event: Event) {
        let record = EventRecord {
            timestamp: Self::timestamp(),
            kind: event.kind,
            process: &self.process,
            pid: self.pid,
            message: &event.message,
            data: event.data.as_deref(),
        };
        match serde_json::to_string(&record) {
            Ok(line) => Self::write_line("", &line),
            Err(e) => tracing::error!(error = %e, "Failed to serialize event"),
        }
    }

    fn record_state(&mut self, state: &MemoryState) {
        let record = StateRecord {
            timestamp: Self::timestamp(),
            state,
        };
        match serde_json::to_string(&record) {
            Ok(line) => Self::write_line("MEMORY_STATE: ", &line),
            Err(e) => tracing::error!(error = %e, "Failed to serialize memory state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_record_shape() {
        let record = EventRecord {
            timestamp: "2026-01-01 12:00:00".to_string(),
            kind: EventKind::Write,
            process: "monitor",
            pid: 42,
            message: "Message written to shared memory",
            data: Some("hello \"world\""),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"write\""));
        assert!(json.contains("\"pid\":42"));
        // Quotes in the payload are escaped, not emitted raw
        assert!(json.contains(r#"hello \"world\""#));
    }

    #[test]
    fn test_data_field_omitted_when_absent() {
        let record = EventRecord {
            timestamp: "2026-01-01 12:00:00".to_string(),
            kind: EventKind::System,
            process: "monitor",
            pid: 1,
            message: "started",
            data: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"data\""));
    }
}
