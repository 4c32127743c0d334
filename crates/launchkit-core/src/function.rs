//! Device functions: kernels resolved against one device
//!
//! A [`DeviceFunction`] is produced by the module loader once per
//! (kernel, device) pair and shared by every launch of that kernel on that
//! device. Its parameter descriptors define the exact kernarg layout the
//! argument binder must reproduce.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::device::DeviceId;
use crate::error::{LaunchError, Result};

/// Logical type of a kernel parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Plain value copied by bytes
    Value,
    /// Device pointer; tracked for memory dependencies
    Pointer,
    Image,
    Sampler,
}

/// One entry of a kernel's parameter signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub ty: ParamType,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, offset: usize, size: usize, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            ty,
        }
    }

    pub fn value(name: impl Into<String>, offset: usize, size: usize) -> Self {
        Self::new(name, offset, size, ParamType::Value)
    }

    /// 64-bit device pointer parameter
    pub fn pointer(name: impl Into<String>, offset: usize) -> Self {
        Self::new(name, offset, 8, ParamType::Pointer)
    }

    pub const fn is_device_pointer(&self) -> bool {
        matches!(self.ty, ParamType::Pointer)
    }

    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Per-device work-group limits and resource usage of a compiled kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkGroupInfo {
    /// Work-group size limit of this kernel on this device
    pub max_threads_per_block: u32,
    /// Ceiling declared by the kernel's launch bounds, if any
    pub launch_bound: Option<u32>,
    /// Local (shared) memory available to one work-group
    pub available_local_mem: u64,
    /// Local memory consumed by the kernel's static allocations
    pub static_local_mem: u64,
    pub private_mem: u64,
    pub registers: u32,
    /// Global size must be a multiple of the block size on every axis
    pub uniform_work_group_size: bool,
}

impl WorkGroupInfo {
    pub fn new(max_threads_per_block: u32, available_local_mem: u64) -> Self {
        Self {
            max_threads_per_block,
            launch_bound: None,
            available_local_mem,
            static_local_mem: 0,
            private_mem: 0,
            registers: 0,
            uniform_work_group_size: false,
        }
    }

    /// Largest block this kernel can be launched with
    pub fn thread_ceiling(&self) -> u32 {
        self.launch_bound.unwrap_or(self.max_threads_per_block)
    }
}

/// Attributes queryable on a device function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionAttribute {
    SharedSizeBytes,
    MaxThreadsPerBlock,
    ConstSizeBytes,
    LocalSizeBytes,
    NumRegs,
    PtxVersion,
    BinaryVersion,
    CacheModeCa,
    MaxDynamicSharedSizeBytes,
    PreferredSharedMemoryCarveout,
}

/// A kernel entry point resolved for one device
pub struct DeviceFunction {
    name: String,
    device: DeviceId,
    params: Vec<ParameterDescriptor>,
    work_group: WorkGroupInfo,
    has_entry_point: bool,
    binary_version: u32,
    // Held from validation through enqueue
    launch_lock: Mutex<()>,
}

impl DeviceFunction {
    pub fn new(
        name: impl Into<String>,
        device: DeviceId,
        params: Vec<ParameterDescriptor>,
        work_group: WorkGroupInfo,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            params,
            work_group,
            has_entry_point: true,
            binary_version: 0,
            launch_lock: Mutex::new(()),
        }
    }

    /// Mark the function as having no code object for its device
    pub fn without_entry_point(mut self) -> Self {
        self.has_entry_point = false;
        self
    }

    pub fn with_binary_version(mut self, version: u32) -> Self {
        self.binary_version = version;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn work_group(&self) -> &WorkGroupInfo {
        &self.work_group
    }

    /// True if this function has code for `device`
    pub fn has_entry_point_on(&self, device: DeviceId) -> bool {
        self.has_entry_point && self.device == device
    }

    /// Size of the explicit kernarg segment
    pub fn kernarg_size(&self) -> usize {
        self.params.iter().map(ParameterDescriptor::end).max().unwrap_or(0)
    }

    /// Serialize launches of this function object
    pub fn lock_launch(&self) -> MutexGuard<'_, ()> {
        self.launch_lock.lock()
    }

    pub fn is_launch_locked(&self) -> bool {
        self.launch_lock.is_locked()
    }

    pub fn attribute(&self, attribute: FunctionAttribute) -> i64 {
        let wg = &self.work_group;
        match attribute {
            FunctionAttribute::SharedSizeBytes => wg.static_local_mem as i64,
            FunctionAttribute::MaxThreadsPerBlock => wg.thread_ceiling() as i64,
            FunctionAttribute::ConstSizeBytes => 0,
            FunctionAttribute::LocalSizeBytes => wg.private_mem as i64,
            FunctionAttribute::NumRegs => wg.registers as i64,
            FunctionAttribute::PtxVersion => 30,
            FunctionAttribute::BinaryVersion => self.binary_version as i64,
            FunctionAttribute::CacheModeCa => 0,
            FunctionAttribute::MaxDynamicSharedSizeBytes => {
                wg.available_local_mem.saturating_sub(wg.static_local_mem) as i64
            }
            FunctionAttribute::PreferredSharedMemoryCarveout => 0,
        }
    }
}

impl fmt::Debug for DeviceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFunction")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("params", &self.params.len())
            .field("work_group", &self.work_group)
            .field("has_entry_point", &self.has_entry_point)
            .finish()
    }
}

/// Host-side handle of a kernel, resolved to a [`DeviceFunction`] per device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostFunctionHandle(pub u64);

impl fmt::Display for HostFunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{:#x}", self.0)
    }
}

/// Module/symbol resolution collaborator
pub trait FunctionResolver: Send + Sync {
    fn resolve(&self, handle: HostFunctionHandle, device: DeviceId) -> Result<Arc<DeviceFunction>>;
}

/// Resolver used when a launcher is only ever given resolved functions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl FunctionResolver for NoResolver {
    fn resolve(&self, handle: HostFunctionHandle, device: DeviceId) -> Result<Arc<DeviceFunction>> {
        Err(LaunchError::invalid_handle(format!(
            "no function resolver configured for {handle} on {device}"
        )))
    }
}

/// Either a resolved function or a host handle to resolve per device
#[derive(Debug, Clone)]
pub enum KernelRef {
    Function(Arc<DeviceFunction>),
    Handle(HostFunctionHandle),
}

impl From<Arc<DeviceFunction>> for KernelRef {
    fn from(function: Arc<DeviceFunction>) -> Self {
        KernelRef::Function(function)
    }
}

impl From<HostFunctionHandle> for KernelRef {
    fn from(handle: HostFunctionHandle) -> Self {
        KernelRef::Handle(handle)
    }
}
