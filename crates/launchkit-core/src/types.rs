//! Launch geometry types

use std::fmt;
use std::ops::BitOr;


use crate::config::GridLimits;
use crate::error::{LaunchError, Result};

/// Grid dimensions: number of blocks along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridDim {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    pub const fn total_blocks(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl Default for GridDim {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl fmt::Display for GridDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block dimensions: work-items per block along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl BlockDim {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    /// Work-items per block, computed in 64 bits so it cannot wrap
    pub const fn total_threads(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    pub const fn has_zero(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }
}

impl Default for BlockDim {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl fmt::Display for BlockDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Global work size: total work-items along each axis (grid * block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GlobalSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    pub const fn total_elements(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    pub const fn has_zero(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }

    /// `grid * block` per axis; `None` if any axis exceeds `u32::MAX`
    pub fn from_grid(grid: GridDim, block: BlockDim) -> Option<Self> {
        Some(Self {
            x: grid.x.checked_mul(block.x)?,
            y: grid.y.checked_mul(block.y)?,
            z: grid.z.checked_mul(block.z)?,
        })
    }
}

impl fmt::Display for GlobalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Launch flags carried from the API boundary to the dispatch unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LaunchFlags(u32);

impl LaunchFlags {
    pub const NONE: Self = Self(0);
    /// Grid-wide synchronization within one device
    pub const COOPERATIVE: Self = Self(1 << 0);
    /// Synchronization across every device of a multi-device launch
    pub const COOPERATIVE_MULTI_DEVICE: Self = Self(1 << 1);
    /// The queue may run this dispatch out of program order
    pub const ANY_ORDER: Self = Self(1 << 2);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_cooperative(self) -> bool {
        self.0 & (Self::COOPERATIVE.0 | Self::COOPERATIVE_MULTI_DEVICE.0) != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl BitOr for LaunchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Fully resolved launch geometry: global work size, block size, shared memory, flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub global: GlobalSize,
    pub block: BlockDim,
    pub shared_mem_bytes: u32,
    pub flags: LaunchFlags,
}

impl LaunchGeometry {
    pub const fn new(global: GlobalSize, block: BlockDim) -> Self {
        Self {
            global,
            block,
            shared_mem_bytes: 0,
            flags: LaunchFlags::NONE,
        }
    }

    pub const fn with_shared_mem(mut self, bytes: u32) -> Self {
        self.shared_mem_bytes = bytes;
        self
    }

    pub const fn with_flags(mut self, flags: LaunchFlags) -> Self {
        self.flags = flags;
        self
    }

    pub const fn global_elements(&self) -> u64 {
        self.global.total_elements()
    }

    pub const fn block_threads(&self) -> u64 {
        self.block.total_threads()
    }
}

impl fmt::Display for LaunchGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "global={}, block={}, shared_mem={}B",
            self.global, self.block, self.shared_mem_bytes
        )
    }
}

/// Launch expressed in blocks rather than work-items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLaunch {
    pub grid: GridDim,
    pub block: BlockDim,
    pub shared_mem_bytes: u32,
    pub flags: LaunchFlags,
}

impl GridLaunch {
    pub const fn new(grid: GridDim, block: BlockDim) -> Self {
        Self {
            grid,
            block,
            shared_mem_bytes: 0,
            flags: LaunchFlags::NONE,
        }
    }

    pub const fn with_shared_mem(mut self, bytes: u32) -> Self {
        self.shared_mem_bytes = bytes;
        self
    }

    pub const fn with_flags(mut self, flags: LaunchFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Global element count across the whole grid, in 64 bits
    pub const fn global_elements(&self) -> u64 {
        self.grid.total_blocks() * self.block.total_threads()
    }

    /// Convert to a work-item geometry, enforcing the grid-dimension limits
    /// of the plain launch entry point before the overflow check.
    pub fn to_geometry(&self, limits: &GridLimits) -> Result<LaunchGeometry> {
        if self.grid.x > limits.max_grid_x || self.grid.y > limits.max_grid_yz || self.grid.z > limits.max_grid_yz {
            return Err(LaunchError::invalid_value(format!(
                "grid {} exceeds limits (x <= {}, y/z <= {})",
                self.grid, limits.max_grid_x, limits.max_grid_yz
            )));
        }
        self.to_geometry_unchecked_grid()
    }

    /// Convert to a work-item geometry, only rejecting per-axis overflow.
    pub fn to_geometry_unchecked_grid(&self) -> Result<LaunchGeometry> {
        let global = GlobalSize::from_grid(self.grid, self.block).ok_or_else(|| {
            LaunchError::invalid_configuration(format!(
                "grid {} * block {} overflows 32-bit global size",
                self.grid, self.block
            ))
        })?;
        Ok(LaunchGeometry {
            global,
            block: self.block,
            shared_mem_bytes: self.shared_mem_bytes,
            flags: self.flags,
        })
    }
}

/// N-dimensional range handed to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    pub offset: [u32; 3],
    pub global: GlobalSize,
    pub local: BlockDim,
}

impl NdRange {
    /// Range with zero offset
    pub const fn new(global: GlobalSize, local: BlockDim) -> Self {
        Self {
            offset: [0; 3],
            global,
            local,
        }
    }
}
