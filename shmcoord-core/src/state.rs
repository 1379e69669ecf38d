// SPDX-License-Identifier: Apache-2.0

//! Process-local lifecycle state machine.
//!
//! Each process tracks its own position in the lifecycle
//! Uncreated → Created → Attached → Detached, with Cleaned reachable from
//! any state that still owns kernel objects and Uncreated reachable from
//! anywhere via reset. The state is never shared between processes.

use serde::{Deserialize, Serialize};

/// Lifecycle states of a coordinator within a single process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No kernel objects have been created (or reset was issued).
    Uncreated,

    /// Segment and gate exist but are not mapped into this process.
    Created,

    /// Segment is mapped; write/read are legal.
    Attached,

    /// Segment was unmapped; kernel objects still exist.
    Detached,

    /// Kernel objects were removed; a fresh create() is required.
    Cleaned,
}

impl LifecycleState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uncreated => "Uncreated",
            Self::Created => "Created",
            Self::Attached => "Attached",
            Self::Detached => "Detached",
            Self::Cleaned => "Cleaned",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        matches!(
            (self, target),
            // create(): fresh allocation, also after cleanup
            (Self::Uncreated, Self::Created) |
            (Self::Cleaned, Self::Created) |
            // attach(): requires existing kernel objects
            (Self::Created, Self::Attached) |
            (Self::Detached, Self::Attached) |
            // detach(): unmap only
            (Self::Attached, Self::Detached) |
            // cleanup(): removes kernel objects
            (Self::Created, Self::Cleaned) |
            (Self::Attached, Self::Cleaned) |
            (Self::Detached, Self::Cleaned) |
            // reset(): always allowed
            (_, Self::Uncreated)
        )
    }

    /// Whether the segment and gate exist at the OS level in this state.
    pub fn has_kernel_objects(&self) -> bool {
        matches!(self, Self::Created | Self::Attached | Self::Detached)
    }

    /// Whether write/read/snapshot are legal.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(LifecycleState::Uncreated.can_transition_to(LifecycleState::Created));
        assert!(LifecycleState::Created.can_transition_to(LifecycleState::Attached));
        assert!(LifecycleState::Attached.can_transition_to(LifecycleState::Detached));
        assert!(LifecycleState::Detached.can_transition_to(LifecycleState::Attached));
    }

    #[test]
    fn test_cleanup_transitions() {
        assert!(LifecycleState::Created.can_transition_to(LifecycleState::Cleaned));
        assert!(LifecycleState::Attached.can_transition_to(LifecycleState::Cleaned));
        assert!(LifecycleState::Detached.can_transition_to(LifecycleState::Cleaned));
        // Nothing to remove in these states
        assert!(!LifecycleState::Uncreated.can_transition_to(LifecycleState::Cleaned));
        assert!(!LifecycleState::Cleaned.can_transition_to(LifecycleState::Cleaned));
    }

    #[test]
    fn test_create_after_cleanup() {
        assert!(LifecycleState::Cleaned.can_transition_to(LifecycleState::Created));
    }

    #[test]
    fn test_reset_from_anywhere() {
        for state in [
            LifecycleState::Uncreated,
            LifecycleState::Created,
            LifecycleState::Attached,
            LifecycleState::Detached,
            LifecycleState::Cleaned,
        ] {
            assert!(state.can_transition_to(LifecycleState::Uncreated));
        }
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot attach without kernel objects
        assert!(!LifecycleState::Uncreated.can_transition_to(LifecycleState::Attached));
        assert!(!LifecycleState::Cleaned.can_transition_to(LifecycleState::Attached));
        // Cannot skip create
        assert!(!LifecycleState::Uncreated.can_transition_to(LifecycleState::Detached));
    }

    #[test]
    fn test_kernel_object_predicate() {
        assert!(!LifecycleState::Uncreated.has_kernel_objects());
        assert!(LifecycleState::Created.has_kernel_objects());
        assert!(LifecycleState::Attached.has_kernel_objects());
        assert!(LifecycleState::Detached.has_kernel_objects());
        assert!(!LifecycleState::Cleaned.has_kernel_objects());
    }
}
