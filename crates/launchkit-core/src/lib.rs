//! Kernel launch dispatch for GPU runtimes
//!
//! This crate provides:
//! - **Launch Validator**: geometry, resource and capability checks
//! - **Argument Binder**: per-launch kernarg images from flat buffers or pointer arrays
//! - **Dispatch Command Builder**: dispatch units with profiling and scheduling hooks
//! - **Cooperative Coordinator**: ordered multi-device launches with barriers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Launcher                          │
//! │  launch / launch_grid / launch_cooperative / multi-dev   │
//! └──────────────┬────────────────────────────┬──────────────┘
//!                │ single device              │ N devices
//!                │                            ▼
//!                │             ┌──────────────────────────────┐
//!                │             │ admission, geometry pass,    │
//!                │             │ pre-sync, ordered dispatch,  │
//!                │             │ post-sync                    │
//!                │             └──────────────┬───────────────┘
//!                ▼                            ▼
//!   validate ─► bind arguments ─► build dispatch unit ─► ExecQueue
//! ```
//!
//! Devices, occupancy, function resolution, queues and events are
//! collaborator traits implemented by the surrounding runtime.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use launchkit_core::{
//!     ArgumentSource, BlockDim, DeviceCapabilities, DeviceFunction, DeviceId, DeviceRegistry,
//!     DispatchUnit, EnqueueStatus, ExecQueue, GlobalSize, LaunchGeometry, LaunchRequest, Launcher,
//!     Occupancy, OccupancyCalculator, ParameterDescriptor, WorkGroupInfo,
//! };
//!
//! struct Gpu(DeviceCapabilities);
//!
//! impl DeviceRegistry for Gpu {
//!     fn capabilities(&self, _: DeviceId) -> Option<&DeviceCapabilities> {
//!         Some(&self.0)
//!     }
//!     fn device_index(&self, device: DeviceId) -> Option<u32> {
//!         Some(device.id())
//!     }
//!     fn active_device_count(&self) -> usize {
//!         1
//!     }
//! }
//!
//! struct Residency;
//!
//! impl OccupancyCalculator for Residency {
//!     fn max_active_blocks(
//!         &self,
//!         _: &DeviceFunction,
//!         caps: &DeviceCapabilities,
//!         _: u32,
//!         _: u32,
//!     ) -> launchkit_core::Result<Occupancy> {
//!         Ok(Occupancy { blocks_per_cu: 8, max_blocks_per_grid: 8 * u64::from(caps.compute_units) })
//!     }
//! }
//!
//! struct Queue;
//!
//! impl ExecQueue for Queue {
//!     fn device(&self) -> DeviceId {
//!         DeviceId(0)
//!     }
//!     fn enqueue(&self, unit: &DispatchUnit) -> EnqueueStatus {
//!         assert_eq!(unit.args().as_bytes(), &[16u8, 0, 0, 0]);
//!         EnqueueStatus::Accepted
//!     }
//!     fn drain(&self) {}
//! }
//!
//! # fn main() -> launchkit_core::Result<()> {
//! let launcher = Launcher::new(
//!     Arc::new(Gpu(DeviceCapabilities::new("gpu0", 1024, 65_536))),
//!     Arc::new(Residency),
//! );
//! let fill = Arc::new(DeviceFunction::new(
//!     "fill",
//!     DeviceId(0),
//!     vec![ParameterDescriptor::value("n", 0, 4)],
//!     WorkGroupInfo::new(1024, 65_536),
//! ));
//!
//! let n = 16u32.to_le_bytes();
//! launcher.launch(LaunchRequest::new(
//!     fill,
//!     LaunchGeometry::new(GlobalSize::linear(16), BlockDim::linear(64)),
//!     Arc::new(Queue),
//!     ArgumentSource::FlatBuffer(&n),
//! ))?;
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod command;
pub mod config;
pub mod cooperative;
pub mod device;
pub mod error;
pub mod function;
pub mod globals;
pub mod launch;
pub mod queue;
pub mod types;
pub mod validate;

// Re-export public API
pub use args::{bind_arguments, ArgumentSource, BoundArgument, ExtraParam, KernelArgs};
pub use command::{
    build_dispatch, clamp_block, submit, CommandState, CooperativePartition, DispatchUnit, EventScope, LaunchEvents,
    SchedulingHint,
};
pub use config::{DispatchConfig, GridLimits};
pub use cooperative::{CooperativeReport, CooperativeVariant, LaunchEntry, SyncFlags};
pub use device::{DeviceCapabilities, DeviceId, DeviceRegistry, Occupancy, OccupancyCalculator};
pub use error::{ErrorKind, LaunchError, Result};
pub use function::{
    DeviceFunction, FunctionAttribute, FunctionResolver, HostFunctionHandle, KernelRef, NoResolver, ParamType,
    ParameterDescriptor, WorkGroupInfo,
};
pub use globals::{lookup_global, GlobalResolver, GlobalSymbol, ModuleHandle};
pub use launch::{LaunchRequest, Launcher};
pub use queue::{EnqueueStatus, ExecQueue, LaunchEvent};
pub use types::{BlockDim, GlobalSize, GridDim, GridLaunch, LaunchFlags, LaunchGeometry, NdRange};
pub use validate::validate_launch;
