//! shmcoord core library
//!
//! Coordinates access to a single named shared-memory region used by
//! independent cooperating processes. All reads and writes go through a
//! binary SysV semaphore (the gate), so no process ever observes a torn
//! update. The library provides the lifecycle state machine, the owned
//! kernel-object wrappers, the region data model, and the event model
//! consumed by front-ends.

pub mod coordinator;
pub mod error;
pub mod event;
pub mod region;
pub mod shm;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{CoordinatorError, CoordinatorResult};
pub use event::{Event, EventKind, EventSink, MemorySink};
pub use region::{MemoryState, RegionSnapshot, MESSAGE_CAPACITY};
pub use state::LifecycleState;
pub use types::{BoundedMessage, IpcKey};
