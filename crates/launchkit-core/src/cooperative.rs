//! Multi-device launch coordination
//!
//! A multi-device launch runs in four phases:
//!
//! ```text
//! admission + geometry pass     nothing is touched; every error surfaces here first
//!         │
//! pre-sync barrier              drain every queue (unless NO_PRE_SYNC)
//!         │
//! ordered dispatch              caller order, stop at the first failing entry
//!         │
//! post-sync barrier             drain every dispatched queue (unless NO_POST_SYNC)
//! ```
//!
//! The geometry pass completes before anything is dispatched because every
//! grid carries the total element count of the whole set.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use launchkit_tracing::{launch_span, timed_block};
use launchkit_tracing::timing::record_barrier;

use crate::args::ArgumentSource;
use crate::command::{CooperativePartition, LaunchEvents};
use crate::device::DeviceId;
use crate::error::{LaunchError, Result};
use crate::function::{DeviceFunction, KernelRef};
use crate::launch::Launcher;
use crate::queue::ExecQueue;
use crate::types::{BlockDim, GridDim, GridLaunch, LaunchFlags};

/// Barrier control for multi-device launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SyncFlags(u32);

impl SyncFlags {
    pub const NONE: Self = Self(0);
    /// Skip draining the queues before dispatch
    pub const NO_PRE_SYNC: Self = Self(1 << 0);
    /// Skip draining the queues after dispatch
    pub const NO_POST_SYNC: Self = Self(1 << 1);

    const ALL: u32 = Self::NO_PRE_SYNC.0 | Self::NO_POST_SYNC.0;

    /// `None` if `bits` has anything outside the defined flags
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SyncFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Whether grids of a multi-device launch form one cooperative group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooperativeVariant {
    /// Grid-wide and cross-device synchronization
    Cooperative,
    /// Independent kernels sharing only the barriers
    Independent,
}

impl CooperativeVariant {
    pub const fn launch_flags(self) -> LaunchFlags {
        match self {
            Self::Cooperative => LaunchFlags::COOPERATIVE.union(LaunchFlags::COOPERATIVE_MULTI_DEVICE),
            Self::Independent => LaunchFlags::NONE,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cooperative => "cooperative",
            Self::Independent => "independent",
        }
    }
}

impl fmt::Display for CooperativeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device's share of a multi-device launch
#[derive(Clone)]
pub struct LaunchEntry<'a> {
    pub kernel: KernelRef,
    pub grid: GridDim,
    pub block: BlockDim,
    pub shared_mem_bytes: u32,
    pub queue: Option<Arc<dyn ExecQueue>>,
    pub args: ArgumentSource<'a>,
}

impl<'a> LaunchEntry<'a> {
    pub fn new(
        kernel: impl Into<KernelRef>,
        grid: GridDim,
        block: BlockDim,
        queue: Arc<dyn ExecQueue>,
        args: ArgumentSource<'a>,
    ) -> Self {
        Self {
            kernel: kernel.into(),
            grid,
            block,
            shared_mem_bytes: 0,
            queue: Some(queue),
            args,
        }
    }

    pub fn with_shared_mem(mut self, bytes: u32) -> Self {
        self.shared_mem_bytes = bytes;
        self
    }

    /// Global element count, saturating instead of wrapping
    pub fn global_elements(&self) -> u64 {
        [
            (self.grid.x, self.block.x),
            (self.grid.y, self.block.y),
            (self.grid.z, self.block.z),
        ]
        .iter()
        .map(|&(grid, block)| u64::from(grid) * u64::from(block))
        .fold(1u64, u64::saturating_mul)
    }
}

impl fmt::Debug for LaunchEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchEntry")
            .field("kernel", &self.kernel)
            .field("grid", &self.grid)
            .field("block", &self.block)
            .field("shared_mem_bytes", &self.shared_mem_bytes)
            .field("device", &self.queue.as_ref().map(|queue| queue.device()))
            .finish()
    }
}

/// Partitions issued by a successful multi-device launch, in dispatch order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooperativeReport {
    partitions: Vec<CooperativePartition>,
}

impl CooperativeReport {
    pub fn partitions(&self) -> &[CooperativePartition] {
        &self.partitions
    }

    pub fn all_grid_sum(&self) -> u64 {
        self.partitions.first().map_or(0, |partition| partition.all_grid_sum)
    }

    pub fn first_device(&self) -> Option<u32> {
        self.partitions.first().map(|partition| partition.first_device)
    }
}

struct PlannedGrid<'e> {
    function: Arc<DeviceFunction>,
    queue: &'e Arc<dyn ExecQueue>,
    global_elements: u64,
}

/// Run the multi-device protocol over `entries`.
pub(crate) fn coordinate(
    launcher: &Launcher,
    entries: &[LaunchEntry<'_>],
    raw_sync_flags: u32,
    variant: CooperativeVariant,
) -> Result<CooperativeReport> {
    let active = launcher.registry().active_device_count();
    if entries.is_empty() || entries.len() > active {
        return Err(LaunchError::invalid_value(format!(
            "multi-device launch needs 1..={} entries, got {}",
            active,
            entries.len()
        )));
    }
    let sync = SyncFlags::from_bits(raw_sync_flags)
        .ok_or_else(|| LaunchError::invalid_value(format!("unknown sync flags {raw_sync_flags:#x}")))?;

    let _timer = launch_span!("multi_device", grids = entries.len(), variant = variant.as_str());

    let (plan, all_grid_sum) = plan_grids(launcher, entries)?;
    let first_queue = plan[0].queue;
    let first_device = launcher.registry().device_index(first_queue.device()).ok_or_else(|| {
        LaunchError::invalid_handle(format!("{} is not in the device table", first_queue.device()))
    })?;

    if !sync.contains(SyncFlags::NO_PRE_SYNC) {
        drain_all(plan.iter().map(|grid| grid.queue), "pre");
    }

    let num_grids = plan.len() as u32;
    let mut partitions = Vec::with_capacity(plan.len());
    let mut prev_grid_sum = 0u64;
    let mut failure = None;

    for (grid_id, (entry, grid)) in entries.iter().zip(&plan).enumerate() {
        let partition = CooperativePartition {
            grid_id: grid_id as u32,
            num_grids,
            prev_grid_sum,
            all_grid_sum,
            first_device,
        };

        let dispatched = GridLaunch::new(entry.grid, entry.block)
            .with_shared_mem(entry.shared_mem_bytes)
            .with_flags(variant.launch_flags())
            .to_geometry_unchecked_grid()
            .and_then(|geometry| {
                launcher.dispatch(
                    Some(&grid.function),
                    &geometry,
                    Some(grid.queue),
                    &entry.args,
                    &LaunchEvents::none(),
                    Some(partition),
                )
            });

        match dispatched {
            Ok(()) => {
                partitions.push(partition);
                prev_grid_sum += grid.global_elements;
            }
            Err(err) => {
                tracing::debug!(grid_id, device = %grid.queue.device(), error = %err, "multi-device dispatch stopped");
                failure = Some(err);
                break;
            }
        }
    }

    if !sync.contains(SyncFlags::NO_POST_SYNC) {
        drain_all(plan[..partitions.len()].iter().map(|grid| grid.queue), "post");
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(CooperativeReport { partitions }),
    }
}

/// Check every entry and resolve its function before anything is dispatched.
fn plan_grids<'e>(launcher: &Launcher, entries: &'e [LaunchEntry<'_>]) -> Result<(Vec<PlannedGrid<'e>>, u64)> {
    let mut plan = Vec::with_capacity(entries.len());
    let mut seen: Vec<DeviceId> = Vec::with_capacity(entries.len());
    let mut all_grid_sum = 0u64;

    for (index, entry) in entries.iter().enumerate() {
        if entry.block.total_threads() == 0 {
            return Err(LaunchError::invalid_configuration(format!(
                "entry {index} has an empty block {}",
                entry.block
            )));
        }
        let global_elements = entry.global_elements();
        all_grid_sum = all_grid_sum.saturating_add(global_elements);

        let queue = entry
            .queue
            .as_ref()
            .ok_or_else(|| LaunchError::invalid_handle(format!("entry {index} has no queue")))?;
        let device = queue.device();
        if seen.contains(&device) {
            return Err(LaunchError::DeviceDuplication { device });
        }
        seen.push(device);

        let function = match &entry.kernel {
            KernelRef::Function(function) => Arc::clone(function),
            KernelRef::Handle(handle) => launcher.resolver().resolve(*handle, device)?,
        };

        plan.push(PlannedGrid {
            function,
            queue,
            global_elements,
        });
    }

    Ok((plan, all_grid_sum))
}

fn drain_all<'q>(queues: impl ExactSizeIterator<Item = &'q Arc<dyn ExecQueue>>, phase: &str) {
    let count = queues.len();
    let ((), duration_us) = timed_block!("barrier_drain", {
        for queue in queues {
            queue.drain();
        }
    });
    record_barrier(phase, count, duration_us);
}
