// SPDX-License-Identifier: Apache-2.0

//! Region data model stored inside the shared segment.
//!
//! `RawRegion` is the exact in-memory layout every attached process maps;
//! its fields are only meaningful while the gate is held. `RegionSnapshot`
//! and `MemoryState` are plain copies taken inside a critical section so
//! formatting and logging happen after the gate is released.

use serde::Serialize;

use crate::shm::GateStatus;
use crate::types::BoundedMessage;

/// Fixed capacity of the message buffer, NUL included.
pub const MESSAGE_CAPACITY: usize = 256;

/// Shared payload layout.
///
/// One instance of this struct lives at offset 0 of the segment; the
/// segment is sized to hold exactly one. `updated` is a u8 rather than
/// bool so a torn or stale byte from another process can never produce an
/// invalid Rust value.
#[repr(C)]
pub struct RawRegion {
    /// NUL-terminated message buffer.
    pub message: [u8; MESSAGE_CAPACITY],
    /// Strictly non-decreasing write counter; +1 per successful write.
    pub counter: i32,
    /// Non-zero after a write until the next read observes it.
    pub updated: u8,
    /// Pid of the most recent writer (0 when none yet).
    pub last_writer: libc::pid_t,
    /// Unix timestamp (seconds) of the most recent write.
    pub last_update: i64,
}

impl RawRegion {
    /// Reset all fields to the freshly-created baseline.
    ///
    /// Called under the gate by the first attacher (counter == 0).
    pub fn initialize(&mut self, now: i64) {
        self.message = [0u8; MESSAGE_CAPACITY];
        self.counter = 0;
        self.updated = 0;
        self.last_writer = 0;
        self.last_update = now;
    }

    /// Copy a bounded message into the buffer, terminator included.
    pub fn store_message(&mut self, msg: &BoundedMessage) {
        self.message = *msg.as_raw();
    }

    /// Current message, honoring NUL termination.
    pub fn message(&self) -> BoundedMessage {
        BoundedMessage::from_raw(&self.message)
    }

    pub fn is_updated(&self) -> bool {
        self.updated != 0
    }

    pub fn set_updated(&mut self, updated: bool) {
        self.updated = u8::from(updated);
    }

    /// Plain copy of the current field values.
    pub fn snapshot(&self) -> RegionSnapshot {
        RegionSnapshot {
            message: self.message().to_string_lossy(),
            counter: self.counter,
            updated: self.is_updated(),
            last_writer: self.last_writer,
            last_update: self.last_update,
        }
    }
}

/// Copy of the region fields taken under the gate.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSnapshot {
    pub message: String,
    pub counter: i32,
    pub updated: bool,
    pub last_writer: i32,
    pub last_update: i64,
}

/// Full memory-state record: region contents plus kernel object identity
/// and current gate availability.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryState {
    pub shm_id: i32,
    pub sem_id: i32,
    pub memory: RegionSnapshot,
    pub semaphore: GateStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> RawRegion {
        RawRegion {
            message: [0u8; MESSAGE_CAPACITY],
            counter: 0,
            updated: 0,
            last_writer: 0,
            last_update: 0,
        }
    }

    #[test]
    fn test_initialize_resets_fields() {
        let mut region = zeroed();
        region.counter = 42;
        region.updated = 1;
        region.last_writer = 999;
        region.message[0] = b'x';

        region.initialize(1_700_000_000);

        assert_eq!(region.counter, 0);
        assert!(!region.is_updated());
        assert_eq!(region.last_writer, 0);
        assert_eq!(region.last_update, 1_700_000_000);
        assert!(region.message().is_empty());
    }

    #[test]
    fn test_store_and_read_message() {
        let mut region = zeroed();
        region.store_message(&BoundedMessage::new("shared hello"));
        assert_eq!(region.message().to_string_lossy(), "shared hello");
    }

    #[test]
    fn test_snapshot_copies_fields() {
        let mut region = zeroed();
        region.store_message(&BoundedMessage::new("snap"));
        region.counter = 3;
        region.set_updated(true);
        region.last_writer = 1234;
        region.last_update = 99;

        let snap = region.snapshot();
        assert_eq!(snap.message, "snap");
        assert_eq!(snap.counter, 3);
        assert!(snap.updated);
        assert_eq!(snap.last_writer, 1234);
        assert_eq!(snap.last_update, 99);
    }

    #[test]
    fn test_memory_state_serializes() {
        let state = MemoryState {
            shm_id: 7,
            sem_id: 8,
            memory: zeroed().snapshot(),
            semaphore: GateStatus {
                value: 1,
                available: true,
            },
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"shm_id\":7"));
        assert!(json.contains("\"available\":true"));
    }
}
