// SPDX-License-Identifier: Apache-2.0

//! The gate: a cross-process binary semaphore serializing region access.
//!
//! SysV semaphore set of one, value 1 meaning available. `lock()` blocks
//! indefinitely with no timeout, no fairness among waiters and no
//! ownership tracking. A process that dies while holding the gate
//! deadlocks every later locker - this is a documented limitation of the
//! protocol, deliberately not papered over with SEM_UNDO.

use serde::Serialize;

use crate::error::CoordinatorError;
use crate::shm::errno_string;
use crate::types::IpcKey;

/// Handle to the gate semaphore.
pub struct Gate {
    id: i32,
    key: IpcKey,
}

impl Gate {
    /// Create the semaphore, or open it if another process already did.
    ///
    /// A fresh SysV semaphore starts at 0, so a value of 0 here means no
    /// process has initialized it yet; the first creator sets it to 1
    /// (available). A non-zero value means initialization already
    /// happened and must not be repeated.
    pub fn create(key: IpcKey) -> Result<Self, CoordinatorError> {
        // SAFETY: plain syscall with a validated key
        let id = unsafe { libc::semget(key.value(), 1, libc::IPC_CREAT | 0o666) };
        if id < 0 {
            return Err(CoordinatorError::ResourceCreation {
                resource: "semaphore",
                reason: errno_string(),
            });
        }

        let gate = Self { id, key };
        if gate.value()? == 0 {
            // SAFETY: SETVAL takes the new value as the fourth argument
            let rc = unsafe { libc::semctl(id, 0, libc::SETVAL, 1) };
            if rc < 0 {
                return Err(CoordinatorError::ResourceCreation {
                    resource: "semaphore",
                    reason: errno_string(),
                });
            }
            tracing::debug!(key = %gate.key, id, "Initialized gate to available");
        }

        tracing::debug!(key = %gate.key, id, "Obtained gate semaphore");
        Ok(gate)
    }

    /// Kernel identifier of the semaphore.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn key(&self) -> IpcKey {
        self.key
    }

    /// Acquire the gate, blocking indefinitely if another process holds it.
    ///
    /// The returned guard releases the gate when dropped, so every exit
    /// path of a critical section unlocks.
    pub fn lock(&self) -> Result<GateGuard, CoordinatorError> {
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: -1,
            // No SEM_UNDO: a holder dying while locked must deadlock
            // later lockers rather than silently release
            sem_flg: 0,
        };

        // SAFETY: id refers to a semaphore obtained by create()
        let rc = unsafe { libc::semop(self.id, &mut op, 1) };
        if rc < 0 {
            return Err(CoordinatorError::Gate {
                operation: "lock",
                reason: errno_string(),
            });
        }

        Ok(GateGuard { sem_id: self.id })
    }

    /// Current semaphore value (1 = available, 0 = held).
    pub fn value(&self) -> Result<i32, CoordinatorError> {
        // SAFETY: GETVAL reads the counter, no semun needed
        let value = unsafe { libc::semctl(self.id, 0, libc::GETVAL) };
        if value < 0 {
            return Err(CoordinatorError::Gate {
                operation: "getval",
                reason: errno_string(),
            });
        }
        Ok(value)
    }

    /// Snapshot of the gate's availability.
    pub fn status(&self) -> Result<GateStatus, CoordinatorError> {
        let value = self.value()?;
        Ok(GateStatus {
            value,
            available: value > 0,
        })
    }

    /// Destroy the semaphore.
    ///
    /// Any process blocked in `lock()` is woken with an error; further
    /// operations on existing handles fail.
    pub fn remove(&self) -> Result<(), CoordinatorError> {
        // SAFETY: IPC_RMID destroys the set regardless of its value
        let rc = unsafe { libc::semctl(self.id, 0, libc::IPC_RMID) };
        if rc < 0 {
            return Err(CoordinatorError::Release {
                resource: "semaphore",
                reason: errno_string(),
            });
        }

        tracing::debug!(id = self.id, "Removed gate semaphore");
        Ok(())
    }
}

/// Scoped hold of the gate; unlocks on drop.
///
/// Holds the raw semaphore id rather than a borrow so the coordinator can
/// destroy the gate while a guard for it is still alive (cleanup path,
/// where the guard is forgotten because removal already released it).
#[must_use = "dropping the guard immediately releases the gate"]
pub struct GateGuard {
    sem_id: i32,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: 1,
            sem_flg: 0,
        };
        // SAFETY: sem_id was valid when the guard was created
        let rc = unsafe { libc::semop(self.sem_id, &mut op, 1) };
        if rc < 0 {
            tracing::error!(
                sem_id = self.sem_id,
                error = %std::io::Error::last_os_error(),
                "Failed to release gate"
            );
        }
    }
}

/// Availability snapshot used in memory-state records.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GateStatus {
    pub value: i32,
    pub available: bool,
}
