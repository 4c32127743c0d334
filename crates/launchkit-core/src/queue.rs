//! Execution queue and event seams
//!
//! Queues and events are owned by the runtime around this crate. The
//! dispatcher only needs to enqueue a built [`DispatchUnit`], block on a
//! drain for multi-device barriers, and hook profiling events.

use crate::command::DispatchUnit;
use crate::device::DeviceId;
use crate::error::Result;

/// Outcome of handing a dispatch to a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    Accepted,
    /// The queue refused the operation, e.g. it is in an unrecoverable state
    Rejected,
}

/// An in-order (unless told otherwise) device execution queue
pub trait ExecQueue: Send + Sync {
    /// Device this queue submits to
    fn device(&self) -> DeviceId;

    /// Submit a dispatch; returns once the queue accepted or refused it
    fn enqueue(&self, unit: &DispatchUnit) -> EnqueueStatus;

    /// Block until all previously enqueued work has finished
    fn drain(&self);
}

/// Profiling/synchronization event attachable to a launch
pub trait LaunchEvent: Send + Sync {
    /// Stop events with this set only make device-local memory visible when signaled
    fn disables_system_fence(&self) -> bool {
        false
    }

    /// Record a start marker on `queue` ahead of the dispatch
    fn record_marker(&self, queue: &dyn ExecQueue) -> Result<()>;

    /// Tie the event to a dispatch that was just enqueued
    fn bind_command(&self, unit: &DispatchUnit, is_stop: bool);
}
