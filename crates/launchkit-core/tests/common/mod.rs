//! Mock collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use launchkit_core::{
    CooperativePartition, DeviceCapabilities, DeviceFunction, DeviceId, DeviceRegistry, DispatchUnit, EnqueueStatus,
    EventScope, ExecQueue, FunctionResolver, HostFunctionHandle, LaunchError, LaunchEvent, Occupancy,
    OccupancyCalculator, ParameterDescriptor, Result, WorkGroupInfo,
};
use parking_lot::Mutex;

/// Everything the mock queues observed, in global order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Drain(DeviceId),
    Enqueue(Dispatched),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub device: DeviceId,
    pub kernel: String,
    pub image: Vec<u8>,
    pub partition: Option<CooperativePartition>,
    pub event_scope: EventScope,
    pub profiled: bool,
}

pub type EventLog = Arc<Mutex<Vec<QueueEvent>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

type EnqueueHook = Box<dyn Fn(&DispatchUnit) + Send + Sync>;

pub struct MockQueue {
    device: DeviceId,
    log: EventLog,
    reject: AtomicBool,
    drains: AtomicUsize,
    on_enqueue: Option<EnqueueHook>,
}

impl MockQueue {
    pub fn new(device: u32, log: &EventLog) -> Self {
        Self {
            device: DeviceId(device),
            log: Arc::clone(log),
            reject: AtomicBool::new(false),
            drains: AtomicUsize::new(0),
            on_enqueue: None,
        }
    }

    pub fn rejecting(self) -> Self {
        self.reject.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_hook(mut self, hook: impl Fn(&DispatchUnit) + Send + Sync + 'static) -> Self {
        self.on_enqueue = Some(Box::new(hook));
        self
    }

    pub fn drain_count(&self) -> usize {
        self.drains.load(Ordering::SeqCst)
    }
}

impl ExecQueue for MockQueue {
    fn device(&self) -> DeviceId {
        self.device
    }

    fn enqueue(&self, unit: &DispatchUnit) -> EnqueueStatus {
        if let Some(hook) = &self.on_enqueue {
            hook(unit);
        }
        if self.reject.load(Ordering::SeqCst) {
            return EnqueueStatus::Rejected;
        }
        self.log.lock().push(QueueEvent::Enqueue(Dispatched {
            device: self.device,
            kernel: unit.function().name().to_string(),
            image: unit.args().as_bytes().to_vec(),
            partition: unit.partition().copied(),
            event_scope: unit.event_scope(),
            profiled: unit.is_profiled(),
        }));
        EnqueueStatus::Accepted
    }

    fn drain(&self) {
        self.drains.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(QueueEvent::Drain(self.device));
    }
}

pub fn enqueued(log: &EventLog) -> Vec<Dispatched> {
    log.lock()
        .iter()
        .filter_map(|event| match event {
            QueueEvent::Enqueue(dispatched) => Some(dispatched.clone()),
            QueueEvent::Drain(_) => None,
        })
        .collect()
}

pub fn drained(log: &EventLog) -> Vec<DeviceId> {
    log.lock()
        .iter()
        .filter_map(|event| match event {
            QueueEvent::Drain(device) => Some(*device),
            QueueEvent::Enqueue(_) => None,
        })
        .collect()
}

/// Devices `0..n`, each at table index `index_base + id`
pub struct MockRegistry {
    devices: Vec<DeviceCapabilities>,
    index_base: u32,
}

impl MockRegistry {
    pub fn new(count: usize) -> Self {
        Self::with_caps(vec![gpu_caps(); count])
    }

    pub fn with_caps(devices: Vec<DeviceCapabilities>) -> Self {
        Self { devices, index_base: 0 }
    }

    pub fn with_index_base(mut self, base: u32) -> Self {
        self.index_base = base;
        self
    }
}

impl DeviceRegistry for MockRegistry {
    fn capabilities(&self, device: DeviceId) -> Option<&DeviceCapabilities> {
        self.devices.get(device.id() as usize)
    }

    fn device_index(&self, device: DeviceId) -> Option<u32> {
        ((device.id() as usize) < self.devices.len()).then(|| self.index_base + device.id())
    }

    fn active_device_count(&self) -> usize {
        self.devices.len()
    }
}

pub fn gpu_caps() -> DeviceCapabilities {
    DeviceCapabilities::new("mock-gpu", 1024, 65_536)
        .with_compute_units(60)
        .with_cooperative_groups(true, true)
}

/// Occupancy with a fixed device-wide residency
pub struct FixedOccupancy(pub u64);

impl OccupancyCalculator for FixedOccupancy {
    fn max_active_blocks(&self, _: &DeviceFunction, caps: &DeviceCapabilities, _: u32, _: u32) -> Result<Occupancy> {
        Ok(Occupancy {
            blocks_per_cu: (self.0 / u64::from(caps.compute_units.max(1))) as u32,
            max_blocks_per_grid: self.0,
        })
    }
}

/// Host handles registered per device
#[derive(Default)]
pub struct MapResolver {
    functions: HashMap<(u64, DeviceId), Arc<DeviceFunction>>,
}

impl MapResolver {
    pub fn register(mut self, handle: u64, function: Arc<DeviceFunction>) -> Self {
        self.functions.insert((handle, function.device()), function);
        self
    }
}

impl FunctionResolver for MapResolver {
    fn resolve(&self, handle: HostFunctionHandle, device: DeviceId) -> Result<Arc<DeviceFunction>> {
        self.functions
            .get(&(handle.0, device))
            .cloned()
            .ok_or_else(|| LaunchError::invalid_handle(format!("{handle} is not loaded on {device}")))
    }
}

/// Event that records which hooks ran
#[derive(Default)]
pub struct MockEvent {
    pub device_local: bool,
    pub markers: AtomicUsize,
    pub bound: AtomicUsize,
}

impl MockEvent {
    pub fn device_local() -> Self {
        Self {
            device_local: true,
            ..Self::default()
        }
    }
}

impl LaunchEvent for MockEvent {
    fn disables_system_fence(&self) -> bool {
        self.device_local
    }

    fn record_marker(&self, _queue: &dyn ExecQueue) -> Result<()> {
        self.markers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn bind_command(&self, _unit: &DispatchUnit, _is_stop: bool) {
        self.bound.fetch_add(1, Ordering::SeqCst);
    }
}

/// `axpy(n: u32, x: *f32, alpha: f32)` compiled for `device`
pub fn axpy(device: u32) -> Arc<DeviceFunction> {
    Arc::new(DeviceFunction::new(
        "axpy",
        DeviceId(device),
        vec![
            ParameterDescriptor::value("n", 0, 4),
            ParameterDescriptor::pointer("x", 8),
            ParameterDescriptor::value("alpha", 16, 4),
        ],
        WorkGroupInfo::new(1024, 65_536),
    ))
}

/// A kernel with a single `u32` parameter
pub fn counter(device: u32) -> Arc<DeviceFunction> {
    Arc::new(DeviceFunction::new(
        "counter",
        DeviceId(device),
        vec![ParameterDescriptor::value("n", 0, 4)],
        WorkGroupInfo::new(1024, 65_536),
    ))
}

/// Flat kernarg image for [`axpy`]
pub fn axpy_args(n: u32, x: u64, alpha: f32) -> Vec<u8> {
    let mut image = vec![0u8; 20];
    image[0..4].copy_from_slice(&n.to_le_bytes());
    image[8..16].copy_from_slice(&x.to_le_bytes());
    image[16..20].copy_from_slice(&alpha.to_le_bytes());
    image
}
