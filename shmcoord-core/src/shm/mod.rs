// SPDX-License-Identifier: Apache-2.0

//! SysV IPC kernel-object wrappers.
//!
//! Owned resource types over the raw shmget/shmat/semget/semop calls.
//! The kernel objects themselves outlive any single process and are
//! destroyed only by an explicit remove, never by a handle being dropped;
//! only per-process resources (the mapping) are released on drop.

mod gate;
mod segment;

pub use gate::{Gate, GateGuard, GateStatus};
pub use segment::{Attachment, Segment};

/// Human-readable errno for the most recent failed syscall.
pub(crate) fn errno_string() -> String {
    std::io::Error::last_os_error().to_string()
}
