//! Dispatch unit construction and submission
//!
//! A [`DispatchUnit`] is built from a validated launch whose arguments are
//! already bound, handed to its queue by [`submit`], and dropped when
//! `submit` returns. Completion is observed through the queue, not here.
//!
//! ```text
//! validated geometry ──► clamp block ──► uniform check ──► NdRange
//!        bound args  ──► (+ hidden cooperative block)  ──► DispatchUnit
//!                                                             │
//!             start marker ─► enqueue ─► bind stop event ◄────┘
//! ```

use std::fmt;
use std::sync::Arc;

use launchkit_abi::CooperativeKernargs;

use crate::args::KernelArgs;
use crate::error::{LaunchError, Result};
use crate::function::DeviceFunction;
use crate::queue::{EnqueueStatus, ExecQueue, LaunchEvent};
use crate::types::{BlockDim, GlobalSize, LaunchFlags, LaunchGeometry, NdRange};

/// Lifecycle of a dispatch unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Enqueued,
    Completed,
    Failed,
}

impl CommandState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Ordering requested from the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingHint {
    InOrder,
    /// The queue may run the dispatch out of program order
    AnyOrder,
}

/// Memory made visible to the host when the stop event signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// Lightweight fence; device-local caches are not flushed to system scope
    DeviceLocal,
    System,
}

/// Placement of one grid inside a multi-device cooperative launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooperativePartition {
    pub grid_id: u32,
    pub num_grids: u32,
    /// Global elements of all grids dispatched before this one
    pub prev_grid_sum: u64,
    /// Global elements of the whole cooperative set
    pub all_grid_sum: u64,
    /// Device-table index of the first grid's device
    pub first_device: u32,
}

impl From<&CooperativePartition> for CooperativeKernargs {
    fn from(partition: &CooperativePartition) -> Self {
        CooperativeKernargs::new(
            partition.grid_id,
            partition.num_grids,
            partition.prev_grid_sum,
            partition.all_grid_sum,
            partition.first_device,
        )
    }
}

/// Start/stop events attached to a single launch
#[derive(Clone, Default)]
pub struct LaunchEvents {
    pub start: Option<Arc<dyn LaunchEvent>>,
    pub stop: Option<Arc<dyn LaunchEvent>>,
}

impl LaunchEvents {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(start: Option<Arc<dyn LaunchEvent>>, stop: Option<Arc<dyn LaunchEvent>>) -> Self {
        Self { start, stop }
    }

    pub fn is_profiled(&self) -> bool {
        self.start.is_some() || self.stop.is_some()
    }
}

/// A validated, bound launch ready for its queue
pub struct DispatchUnit {
    function: Arc<DeviceFunction>,
    range: NdRange,
    shared_mem_bytes: u32,
    queue: Arc<dyn ExecQueue>,
    args: KernelArgs,
    profiling: bool,
    scheduling: SchedulingHint,
    event_scope: EventScope,
    cooperative: LaunchFlags,
    partition: Option<CooperativePartition>,
    state: CommandState,
}

impl DispatchUnit {
    pub fn function(&self) -> &Arc<DeviceFunction> {
        &self.function
    }

    pub fn range(&self) -> &NdRange {
        &self.range
    }

    pub fn shared_mem_bytes(&self) -> u32 {
        self.shared_mem_bytes
    }

    pub fn queue(&self) -> &Arc<dyn ExecQueue> {
        &self.queue
    }

    pub fn args(&self) -> &KernelArgs {
        &self.args
    }

    pub fn is_profiled(&self) -> bool {
        self.profiling
    }

    pub fn scheduling(&self) -> SchedulingHint {
        self.scheduling
    }

    pub fn event_scope(&self) -> EventScope {
        self.event_scope
    }

    /// Cooperative bits of the launch flags
    pub fn cooperative_flags(&self) -> LaunchFlags {
        self.cooperative
    }

    pub fn partition(&self) -> Option<&CooperativePartition> {
        self.partition.as_ref()
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn global_elements(&self) -> u64 {
        self.range.global.total_elements()
    }
}

impl fmt::Debug for DispatchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchUnit")
            .field("function", &self.function.name())
            .field("device", &self.queue.device())
            .field("range", &self.range)
            .field("shared_mem_bytes", &self.shared_mem_bytes)
            .field("args", &self.args.len())
            .field("profiling", &self.profiling)
            .field("scheduling", &self.scheduling)
            .field("partition", &self.partition)
            .field("state", &self.state)
            .finish()
    }
}

/// Shrink each block axis to the global extent when the global extent is smaller
pub fn clamp_block(global: GlobalSize, block: BlockDim) -> BlockDim {
    BlockDim::new(block.x.min(global.x), block.y.min(global.y), block.z.min(global.z))
}

/// Build a dispatch unit from a validated launch with bound arguments.
pub fn build_dispatch(
    function: &Arc<DeviceFunction>,
    geometry: &LaunchGeometry,
    queue: Arc<dyn ExecQueue>,
    mut args: KernelArgs,
    events: &LaunchEvents,
    partition: Option<CooperativePartition>,
) -> Result<DispatchUnit> {
    let global = geometry.global;
    let local = clamp_block(global, geometry.block);

    if function.work_group().uniform_work_group_size
        && (global.x % local.x != 0 || global.y % local.y != 0 || global.z % local.z != 0)
    {
        return Err(LaunchError::invalid_value(format!(
            "kernel {} requires uniform work-groups but global {} is not a multiple of block {}",
            function.name(),
            global,
            local
        )));
    }

    let scheduling = if geometry.flags.contains(LaunchFlags::ANY_ORDER) {
        SchedulingHint::AnyOrder
    } else {
        SchedulingHint::InOrder
    };

    let event_scope = match &events.stop {
        Some(stop) if stop.disables_system_fence() => EventScope::DeviceLocal,
        _ => EventScope::System,
    };

    if let Some(partition) = &partition {
        args.append_cooperative(&CooperativeKernargs::from(partition))?;
    }

    let cooperative = geometry
        .flags
        .intersection(LaunchFlags::COOPERATIVE | LaunchFlags::COOPERATIVE_MULTI_DEVICE);

    Ok(DispatchUnit {
        function: Arc::clone(function),
        range: NdRange::new(global, local),
        shared_mem_bytes: geometry.shared_mem_bytes,
        queue,
        args,
        profiling: events.is_profiled(),
        scheduling,
        event_scope,
        cooperative,
        partition,
        state: CommandState::Created,
    })
}

/// Hand `unit` to its queue and release it.
///
/// The stop event is bound right after the queue accepts the dispatch and
/// before this returns, so it can never be observed signaled ahead of the
/// submission it measures.
pub fn submit(mut unit: DispatchUnit, events: &LaunchEvents) -> Result<()> {
    if let Some(start) = &events.start {
        start.record_marker(unit.queue.as_ref())?;
    }

    let queue = Arc::clone(&unit.queue);
    match queue.enqueue(&unit) {
        EnqueueStatus::Accepted => {
            unit.state = CommandState::Enqueued;
            if let Some(stop) = &events.stop {
                stop.bind_command(&unit, true);
            }
            launchkit_tracing::timing::record_dispatch(
                unit.function.name(),
                queue.device().id(),
                unit.global_elements(),
                unit.profiling,
            );
            Ok(())
        }
        EnqueueStatus::Rejected => {
            tracing::warn!(
                kernel = unit.function.name(),
                device = %queue.device(),
                "queue rejected dispatch"
            );
            Err(LaunchError::IllegalState(format!(
                "queue on {} rejected dispatch of {}",
                queue.device(),
                unit.function.name()
            )))
        }
    }
}
