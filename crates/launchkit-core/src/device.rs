//! Device identity, capability tables and the device-enumeration seam
//!
//! Device discovery lives outside this crate. A [`DeviceRegistry`]
//! implementation hands the dispatcher immutable capability tables and the
//! index of each device in the process-wide device table.

use std::fmt;

use crate::error::Result;
use crate::function::DeviceFunction;

/// Physical device identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub const fn new(id: u32) -> Self {
        DeviceId(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Limits consulted by launch validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub name: String,
    /// Largest block (work-items per work-group) the device accepts
    pub max_work_group_size: u32,
    /// Local (shared) memory available to one compute unit, in bytes
    pub local_mem_per_cu: u64,
    pub compute_units: u32,
    pub cooperative_groups: bool,
    pub cooperative_multi_device: bool,
}

impl DeviceCapabilities {
    pub fn new(name: impl Into<String>, max_work_group_size: u32, local_mem_per_cu: u64) -> Self {
        Self {
            name: name.into(),
            max_work_group_size,
            local_mem_per_cu,
            compute_units: 1,
            cooperative_groups: false,
            cooperative_multi_device: false,
        }
    }

    pub fn with_compute_units(mut self, compute_units: u32) -> Self {
        self.compute_units = compute_units;
        self
    }

    pub fn with_cooperative_groups(mut self, single_device: bool, multi_device: bool) -> Self {
        self.cooperative_groups = single_device;
        self.cooperative_multi_device = multi_device;
        self
    }
}

/// Device enumeration collaborator
pub trait DeviceRegistry: Send + Sync {
    /// Capability table for `device`, `None` if the device is unknown
    fn capabilities(&self, device: DeviceId) -> Option<&DeviceCapabilities>;

    /// Position of `device` in the process-wide device table
    fn device_index(&self, device: DeviceId) -> Option<u32>;

    /// Number of devices currently active in the process
    fn active_device_count(&self) -> usize;
}

/// Result of an occupancy query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Resident blocks per compute unit
    pub blocks_per_cu: u32,
    /// Resident blocks across the whole device
    pub max_blocks_per_grid: u64,
}

/// Occupancy collaborator used by the cooperative-launch size check
pub trait OccupancyCalculator: Send + Sync {
    fn max_active_blocks(
        &self,
        function: &DeviceFunction,
        caps: &DeviceCapabilities,
        block_size: u32,
        shared_mem_bytes: u32,
    ) -> Result<Occupancy>;
}
