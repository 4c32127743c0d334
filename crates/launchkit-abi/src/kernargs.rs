//! Hidden argument layouts written into the kernarg segment

use bytemuck::{Pod, Zeroable};

/// Current kernarg ABI version
pub const ABI_VERSION: u32 = 1;

/// Hidden arguments start at the next multiple of this after the explicit parameters
pub const HIDDEN_ARG_ALIGNMENT: usize = 8;

/// Multi-grid partition block read by device-side cooperative-group primitives.
///
/// `prev_grid_sum` and `all_grid_sum` let a work-item compute a thread index
/// that is unique across every device in the cooperative set:
/// `global_id = prev_grid_sum + local_linear_id`, with `all_grid_sum` the
/// extent of the combined iteration space.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CooperativeKernargs {
    pub prev_grid_sum: u64,
    pub all_grid_sum: u64,
    pub grid_id: u32,
    pub num_grids: u32,
    pub first_device: u32,
    pub abi_version: u32,
}

impl CooperativeKernargs {
    /// Size of the block in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(grid_id: u32, num_grids: u32, prev_grid_sum: u64, all_grid_sum: u64, first_device: u32) -> Self {
        Self {
            prev_grid_sum,
            all_grid_sum,
            grid_id,
            num_grids,
            first_device,
            abi_version: ABI_VERSION,
        }
    }

    /// Raw bytes as they land in the kernarg segment
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode from a kernarg slice; `None` if the slice is too short
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes
            .get(..Self::SIZE)
            .map(bytemuck::pod_read_unaligned::<Self>)
    }
}
