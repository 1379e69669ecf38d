// SPDX-License-Identifier: Apache-2.0

//! Error types for the shared-region coordinator.
//!
//! Explicit enum variants per failure class - no `Box<dyn Error>`,
//! no `anyhow::Result`. Every operation failure is recovered locally by
//! the caller: the operation becomes a no-op and the coordinator's
//! lifecycle state is left unchanged.

use thiserror::Error;

use crate::state::LifecycleState;

/// Failures surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Allocation or initialization of a kernel object failed.
    #[error("Failed to create {resource}: {reason}")]
    ResourceCreation {
        resource: &'static str,
        reason: String,
    },

    /// Operation invoked outside its required lifecycle state.
    #[error("Operation '{operation}' is invalid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Mapping the segment into the process address space failed.
    #[error("Failed to attach shared memory segment: {reason}")]
    Attach { reason: String },

    /// Unmapping or removing a kernel object failed.
    #[error("Failed to release {resource}: {reason}")]
    Release {
        resource: &'static str,
        reason: String,
    },

    /// A semaphore operation (lock/unlock/inspect) failed.
    #[error("Semaphore operation '{operation}' failed: {reason}")]
    Gate {
        operation: &'static str,
        reason: String,
    },

    /// An IPC key failed validation.
    #[error("Invalid IPC key: {reason}")]
    InvalidKey { reason: String },
}

/// Result type alias using CoordinatorError.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_display() {
        let err = CoordinatorError::InvalidState {
            operation: "write",
            state: LifecycleState::Uncreated,
        };
        assert!(err.to_string().contains("write"));
        assert!(err.to_string().contains("Uncreated"));
    }

    #[test]
    fn test_resource_creation_display() {
        let err = CoordinatorError::ResourceCreation {
            resource: "shared memory segment",
            reason: "No space left on device".to_string(),
        };
        assert!(err.to_string().contains("shared memory segment"));
    }
}
