// SPDX-License-Identifier: Apache-2.0

//! The coordinator: per-process context enforcing the lifecycle protocol.
//!
//! One `Coordinator` is instantiated per process and bound to the same
//! pair of IPC keys as every other participant; it owns the process-local
//! handles (segment, gate, mapping) while the kernel objects themselves
//! are shared and survive until an explicit cleanup. Every region access
//! follows lock → mutate/read → unlock, and the gate is never held across
//! event emission or formatting.

use std::time::{SystemTime, UNIX_EPOCH};

use nix::unistd::{getpid, Pid};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::event::{Event, EventKind, EventSink};
use crate::region::{MemoryState, RegionSnapshot};
use crate::shm::{Attachment, Gate, Segment};
use crate::state::LifecycleState;
use crate::types::{BoundedMessage, IpcKey};

/// Kernel-object identity for one coordinated region.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub segment_key: IpcKey,
    pub gate_key: IpcKey,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            segment_key: IpcKey::SEGMENT_DEFAULT,
            gate_key: IpcKey::GATE_DEFAULT,
        }
    }
}

/// Per-process coordinator for the shared region.
pub struct Coordinator<S: EventSink> {
    config: CoordinatorConfig,
    state: LifecycleState,
    segment: Option<Segment>,
    gate: Option<Gate>,
    attachment: Option<Attachment>,
    pid: Pid,
    sink: S,
}

impl<S: EventSink> Coordinator<S> {
    pub fn new(config: CoordinatorConfig, sink: S) -> Self {
        Self {
            config,
            state: LifecycleState::Uncreated,
            segment: None,
            gate: None,
            attachment: None,
            pid: getpid(),
            sink,
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Route an event through this coordinator's sink.
    ///
    /// Front-ends use this so their own records (errors, usage hints)
    /// interleave with the coordinator's in emission order.
    pub fn emit(&mut self, event: Event) {
        self.sink.record(event);
    }

    /// Route a memory-state record through this coordinator's sink.
    pub fn emit_state(&mut self, state: &MemoryState) {
        self.sink.record_state(state);
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Tear down and hand back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Allocate (or open, if another process already allocated) the
    /// segment and the gate.
    ///
    /// Idempotent: a repeated call emits a warning and changes nothing.
    pub fn create(&mut self) -> CoordinatorResult<()> {
        if self.segment.is_some() {
            self.emit(Event::new(
                EventKind::Warning,
                "Shared memory already created",
            ));
            return Ok(());
        }

        let segment = Segment::create(self.config.segment_key)?;
        let gate = Gate::create(self.config.gate_key)?;
        let (shm_id, sem_id) = (segment.id(), gate.id());

        self.transition(LifecycleState::Created)?;
        self.segment = Some(segment);
        self.gate = Some(gate);

        self.emit(Event::with_data(
            EventKind::Shm,
            "Shared memory segment obtained",
            shm_id.to_string(),
        ));
        self.emit(Event::with_data(
            EventKind::Semaphore,
            "Semaphore obtained",
            sem_id.to_string(),
        ));
        Ok(())
    }

    /// Map the segment into this process's address space.
    ///
    /// The first attacher (counter still 0) initializes the region fields
    /// under the gate so a concurrent attacher can never observe a
    /// half-written region.
    pub fn attach(&mut self) -> CoordinatorResult<()> {
        if self.state.is_attached() {
            self.emit(Event::new(
                EventKind::Warning,
                "Shared memory already attached",
            ));
            return Ok(());
        }

        let (Some(segment), Some(gate)) = (self.segment.as_ref(), self.gate.as_ref()) else {
            return Err(CoordinatorError::InvalidState {
                operation: "attach",
                state: self.state,
            });
        };

        let attachment = segment.attach()?;
        let now = unix_now();
        {
            let _guard = gate.lock()?;
            // SAFETY: gate is held for the lifetime of this block
            let region = unsafe { attachment.region_mut() };
            if region.counter == 0 {
                region.initialize(now);
                tracing::debug!("Initialized region on first attach");
            }
        }

        self.transition(LifecycleState::Attached)?;
        self.attachment = Some(attachment);
        self.emit(Event::new(EventKind::Shm, "Shared memory attached"));
        Ok(())
    }

    /// Write a message into the region under the gate.
    ///
    /// Input longer than the region capacity is silently truncated; an
    /// empty message is permitted and still increments the counter.
    pub fn write(&mut self, message: &str) -> CoordinatorResult<RegionSnapshot> {
        if !self.state.is_attached() {
            return Err(CoordinatorError::InvalidState {
                operation: "write",
                state: self.state,
            });
        }
        let (Some(gate), Some(attachment)) = (self.gate.as_ref(), self.attachment.as_ref()) else {
            return Err(CoordinatorError::InvalidState {
                operation: "write",
                state: self.state,
            });
        };

        let bounded = BoundedMessage::new(message);
        let now = unix_now();
        let pid = self.pid.as_raw();

        self.sink.record(Event::new(
            EventKind::Operation,
            "Waiting for gate before write",
        ));

        let snapshot = {
            let _guard = gate.lock()?;
            // SAFETY: gate is held for the lifetime of this block
            let region = unsafe { attachment.region_mut() };
            region.store_message(&bounded);
            region.counter += 1;
            region.set_updated(true);
            region.last_writer = pid;
            region.last_update = now;
            region.snapshot()
        };

        self.emit(Event::with_data(
            EventKind::Write,
            "Message written to shared memory",
            bounded.to_string_lossy(),
        ));
        Ok(snapshot)
    }

    /// Read the region under the gate.
    ///
    /// Returns the message and clears the updated flag if a write has not
    /// been consumed yet (at-most-once delivery of the new-data signal);
    /// returns `None` without mutating anything otherwise.
    pub fn read(&mut self) -> CoordinatorResult<Option<String>> {
        if !self.state.is_attached() {
            return Err(CoordinatorError::InvalidState {
                operation: "read",
                state: self.state,
            });
        }
        let (Some(gate), Some(attachment)) = (self.gate.as_ref(), self.attachment.as_ref()) else {
            return Err(CoordinatorError::InvalidState {
                operation: "read",
                state: self.state,
            });
        };

        self.sink.record(Event::new(
            EventKind::Operation,
            "Waiting for gate before read",
        ));

        let captured = {
            let _guard = gate.lock()?;
            // SAFETY: gate is held for the lifetime of this block
            let region = unsafe { attachment.region_mut() };
            if region.is_updated() {
                region.set_updated(false);
                Some(region.message().to_string_lossy())
            } else {
                None
            }
        };

        match &captured {
            Some(message) => self.emit(Event::with_data(
                EventKind::Read,
                "Message read from shared memory",
                message.clone(),
            )),
            None => self.emit(Event::new(EventKind::Read, "No new data")),
        }
        Ok(captured)
    }

    /// Capture the full memory state under the gate.
    ///
    /// Read-only: the gate value in the result is sampled after release,
    /// so it normally reads as available.
    pub fn snapshot(&mut self) -> CoordinatorResult<MemoryState> {
        if !self.state.is_attached() {
            return Err(CoordinatorError::InvalidState {
                operation: "status",
                state: self.state,
            });
        }
        let (Some(segment), Some(gate), Some(attachment)) = (
            self.segment.as_ref(),
            self.gate.as_ref(),
            self.attachment.as_ref(),
        ) else {
            return Err(CoordinatorError::InvalidState {
                operation: "status",
                state: self.state,
            });
        };

        let memory = {
            let _guard = gate.lock()?;
            // SAFETY: gate is held for the lifetime of this block
            unsafe { attachment.region_mut() }.snapshot()
        };

        Ok(MemoryState {
            shm_id: segment.id(),
            sem_id: gate.id(),
            memory,
            semaphore: gate.status()?,
        })
    }

    /// Unmap the segment from this process's address space.
    ///
    /// Other processes and the kernel objects are unaffected.
    pub fn detach(&mut self) -> CoordinatorResult<()> {
        if !self.state.is_attached() {
            return Err(CoordinatorError::InvalidState {
                operation: "detach",
                state: self.state,
            });
        }
        let Some(attachment) = self.attachment.as_mut() else {
            return Err(CoordinatorError::InvalidState {
                operation: "detach",
                state: self.state,
            });
        };

        attachment.detach()?;
        self.attachment = None;
        self.transition(LifecycleState::Detached)?;
        self.emit(Event::new(EventKind::Shm, "Shared memory detached"));
        Ok(())
    }

    /// Remove the segment and the gate at the OS level.
    ///
    /// Acquires the gate so an in-flight writer finishes first, then
    /// destroys both objects; destroying the gate implicitly releases it.
    /// Every process's existing handles become invalid and a later
    /// `create()` yields a logically fresh region (counter restarts at 0).
    pub fn cleanup(&mut self) -> CoordinatorResult<()> {
        if !self.state.has_kernel_objects() {
            return Err(CoordinatorError::InvalidState {
                operation: "cleanup",
                state: self.state,
            });
        }
        let (Some(segment), Some(gate)) = (self.segment.as_ref(), self.gate.as_ref()) else {
            return Err(CoordinatorError::InvalidState {
                operation: "cleanup",
                state: self.state,
            });
        };
        let (shm_id, sem_id) = (segment.id(), gate.id());

        let guard = gate.lock()?;
        segment.remove()?;
        gate.remove()?;
        // The semaphore no longer exists; there is nothing left for the
        // guard to release.
        std::mem::forget(guard);

        // Drop the local mapping; the kernel destroys the segment once
        // the last attached process lets go.
        if let Some(mut attachment) = self.attachment.take() {
            if let Err(e) = attachment.detach() {
                tracing::warn!(error = %e, "Detach after removal failed");
            }
        }
        self.segment = None;
        self.gate = None;
        self.transition(LifecycleState::Cleaned)?;

        self.emit(Event::with_data(
            EventKind::Shm,
            "Shared memory segment removed",
            shm_id.to_string(),
        ));
        self.emit(Event::with_data(
            EventKind::Semaphore,
            "Semaphore removed",
            sem_id.to_string(),
        ));
        Ok(())
    }

    /// Best-effort teardown back to `Uncreated`.
    ///
    /// Runs detach and cleanup where applicable, pressing on through
    /// failures; always ends with all handles cleared.
    pub fn reset(&mut self) {
        if self.state.is_attached() {
            if let Err(e) = self.detach() {
                tracing::warn!(error = %e, "Detach failed during reset");
            }
        }
        if self.state.has_kernel_objects() {
            if let Err(e) = self.cleanup() {
                tracing::warn!(error = %e, "Cleanup failed during reset");
            }
        }

        // Forced: reset reaches Uncreated from any state, even after
        // partial failures above.
        self.attachment = None;
        self.segment = None;
        self.gate = None;
        self.state = LifecycleState::Uncreated;
        self.emit(Event::new(EventKind::System, "Coordinator state reset"));
    }

    fn transition(&mut self, target: LifecycleState) -> CoordinatorResult<()> {
        if !self.state.can_transition_to(target) {
            return Err(CoordinatorError::InvalidState {
                operation: target.name(),
                state: self.state,
            });
        }
        tracing::debug!(from = self.state.name(), to = target.name(), "State transition");
        self.state = target;
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;

    fn uncreated() -> Coordinator<MemorySink> {
        Coordinator::new(CoordinatorConfig::default(), MemorySink::new())
    }

    // These tests exercise precondition checks only; no kernel objects
    // are touched. Full lifecycle coverage lives in tests/.

    #[test]
    fn test_write_before_attach_fails() {
        let mut coordinator = uncreated();
        let err = coordinator.write("hi").unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InvalidState {
                operation: "write",
                ..
            }
        ));
        assert_eq!(coordinator.state(), LifecycleState::Uncreated);
    }

    #[test]
    fn test_read_before_attach_fails() {
        let mut coordinator = uncreated();
        assert!(matches!(
            coordinator.read().unwrap_err(),
            CoordinatorError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_detach_before_attach_fails() {
        let mut coordinator = uncreated();
        assert!(matches!(
            coordinator.detach().unwrap_err(),
            CoordinatorError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_cleanup_before_create_fails() {
        let mut coordinator = uncreated();
        assert!(matches!(
            coordinator.cleanup().unwrap_err(),
            CoordinatorError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_attach_before_create_fails() {
        let mut coordinator = uncreated();
        assert!(matches!(
            coordinator.attach().unwrap_err(),
            CoordinatorError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_reset_from_uncreated_is_harmless() {
        let mut coordinator = uncreated();
        coordinator.reset();
        assert_eq!(coordinator.state(), LifecycleState::Uncreated);
        let sink = coordinator.into_sink();
        assert_eq!(sink.of_kind(EventKind::System).len(), 1);
    }
}
