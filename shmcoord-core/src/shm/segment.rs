// SPDX-License-Identifier: Apache-2.0

//! Owned SysV shared-memory segment and its per-process mapping.
//!
//! `Segment` identifies the kernel object; `Attachment` owns the mapping
//! of that object into this process's address space and detaches exactly
//! once. Dropping a `Segment` never destroys the kernel object - removal
//! is an explicit lifecycle operation.

use std::ptr::NonNull;

use crate::error::CoordinatorError;
use crate::region::RawRegion;
use crate::shm::errno_string;
use crate::types::IpcKey;

/// Handle to the SysV shared-memory segment holding one `RawRegion`.
pub struct Segment {
    id: i32,
    key: IpcKey,
}

impl Segment {
    /// Create the segment, or open it if another process already did.
    ///
    /// The segment is sized to exactly one region; the kernel
    /// zero-initializes fresh segments.
    pub fn create(key: IpcKey) -> Result<Self, CoordinatorError> {
        let size = std::mem::size_of::<RawRegion>();

        // SAFETY: plain syscall; key and size are valid by construction
        let id = unsafe { libc::shmget(key.value(), size, libc::IPC_CREAT | 0o666) };
        if id < 0 {
            return Err(CoordinatorError::ResourceCreation {
                resource: "shared memory segment",
                reason: errno_string(),
            });
        }

        tracing::debug!(key = %key, id, size, "Obtained shared memory segment");
        Ok(Self { id, key })
    }

    /// Kernel identifier of the segment.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn key(&self) -> IpcKey {
        self.key
    }

    /// Map the segment into this process's address space.
    pub fn attach(&self) -> Result<Attachment, CoordinatorError> {
        // SAFETY: id refers to a segment obtained by create(); the kernel
        // picks the mapping address
        let ptr = unsafe { libc::shmat(self.id, std::ptr::null(), 0) };
        if ptr as isize == -1 {
            return Err(CoordinatorError::Attach {
                reason: errno_string(),
            });
        }

        let ptr = NonNull::new(ptr as *mut RawRegion).ok_or(CoordinatorError::Attach {
            reason: "shmat returned a null mapping".to_string(),
        })?;

        tracing::debug!(id = self.id, "Attached shared memory segment");
        Ok(Attachment {
            ptr,
            detached: false,
        })
    }

    /// Mark the segment for removal.
    ///
    /// The kernel destroys it once the last process detaches; every
    /// existing handle becomes invalid for new attaches.
    pub fn remove(&self) -> Result<(), CoordinatorError> {
        // SAFETY: IPC_RMID with a null buf is the documented removal form
        let rc = unsafe { libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(CoordinatorError::Release {
                resource: "shared memory segment",
                reason: errno_string(),
            });
        }

        tracing::debug!(id = self.id, "Removed shared memory segment");
        Ok(())
    }
}

/// A live mapping of the segment in this process.
///
/// Detaches at most once: explicitly via `detach()` for error reporting,
/// or best-effort on drop.
pub struct Attachment {
    ptr: NonNull<RawRegion>,
    detached: bool,
}

// SAFETY: the mapping is process-wide; cross-process access is serialized
// by the gate, and the coordinator is the only in-process user.
unsafe impl Send for Attachment {}

impl Attachment {
    /// Mutable view of the shared region.
    ///
    /// # Safety
    /// Caller must hold the gate: no other process may be reading or
    /// mutating the region for the lifetime of the returned reference.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn region_mut(&self) -> &mut RawRegion {
        &mut *self.ptr.as_ptr()
    }

    /// Unmap the segment from this process.
    ///
    /// Does not affect the kernel object or other processes' mappings.
    pub fn detach(&mut self) -> Result<(), CoordinatorError> {
        if self.detached {
            return Ok(());
        }

        // SAFETY: ptr came from shmat and has not been detached yet
        let rc = unsafe { libc::shmdt(self.ptr.as_ptr() as *const libc::c_void) };
        if rc < 0 {
            return Err(CoordinatorError::Release {
                resource: "shared memory mapping",
                reason: errno_string(),
            });
        }

        self.detached = true;
        tracing::debug!("Detached shared memory segment");
        Ok(())
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        // SAFETY: ptr came from shmat and has not been detached yet
        let rc = unsafe { libc::shmdt(self.ptr.as_ptr() as *const libc::c_void) };
        if rc < 0 {
            tracing::error!(
                error = %std::io::Error::last_os_error(),
                "Failed to detach shared memory mapping"
            );
        }
    }
}
