//! Launch entry points
//!
//! [`Launcher`] owns the collaborators a launch needs and runs every form of
//! launch through the same single-device path:
//!
//! ```text
//! lock function ─► validate ─► bind arguments ─► build dispatch ─► submit ─► unlock
//! ```
//!
//! The grid-dims and cooperative forms only differ in how they turn their
//! input into a [`LaunchGeometry`] before entering that path.

use std::sync::Arc;

use launchkit_tracing::timing::LaunchTimer;

use crate::args::{bind_arguments, ArgumentSource};
use crate::command::{build_dispatch, submit, CooperativePartition, LaunchEvents};
use crate::config::DispatchConfig;
use crate::cooperative::{self, CooperativeReport, CooperativeVariant, LaunchEntry};
use crate::device::{DeviceRegistry, OccupancyCalculator};
use crate::error::{LaunchError, Result};
use crate::function::{DeviceFunction, FunctionResolver, HostFunctionHandle, NoResolver};
use crate::queue::ExecQueue;
use crate::types::{GridLaunch, LaunchFlags, LaunchGeometry};
use crate::validate::validate_launch;

/// A single-device launch expressed in work-items
#[derive(Clone)]
pub struct LaunchRequest<'a> {
    pub function: Option<Arc<DeviceFunction>>,
    pub geometry: LaunchGeometry,
    pub queue: Option<Arc<dyn ExecQueue>>,
    pub args: ArgumentSource<'a>,
    pub events: LaunchEvents,
}

impl<'a> LaunchRequest<'a> {
    pub fn new(
        function: Arc<DeviceFunction>,
        geometry: LaunchGeometry,
        queue: Arc<dyn ExecQueue>,
        args: ArgumentSource<'a>,
    ) -> Self {
        Self {
            function: Some(function),
            geometry,
            queue: Some(queue),
            args,
            events: LaunchEvents::none(),
        }
    }

    pub fn with_events(mut self, events: LaunchEvents) -> Self {
        self.events = events;
        self
    }

    fn kernel_name(&self) -> &str {
        self.function.as_deref().map_or("<null>", DeviceFunction::name)
    }
}

/// Kernel launcher bound to one set of device collaborators
pub struct Launcher {
    registry: Arc<dyn DeviceRegistry>,
    occupancy: Arc<dyn OccupancyCalculator>,
    resolver: Arc<dyn FunctionResolver>,
    config: DispatchConfig,
}

impl Launcher {
    /// Launcher that only accepts already resolved functions
    pub fn new(registry: Arc<dyn DeviceRegistry>, occupancy: Arc<dyn OccupancyCalculator>) -> Self {
        Self {
            registry,
            occupancy,
            resolver: Arc::new(NoResolver),
            config: DispatchConfig::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FunctionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &dyn DeviceRegistry {
        self.registry.as_ref()
    }

    pub(crate) fn resolver(&self) -> &dyn FunctionResolver {
        self.resolver.as_ref()
    }

    /// Launch `request.function` over a work-item geometry.
    #[tracing::instrument(skip(self, request), fields(kernel = request.kernel_name(), geometry = %request.geometry))]
    pub fn launch(&self, request: LaunchRequest<'_>) -> Result<()> {
        let timer = LaunchTimer::new(request.kernel_name(), self.config.launch_threshold_us);
        let _entered = timer.enter();

        self.dispatch(
            request.function.as_ref(),
            &request.geometry,
            request.queue.as_ref(),
            &request.args,
            &request.events,
            None,
        )
    }

    /// Launch over a grid of blocks, enforcing the grid-dimension limits.
    #[tracing::instrument(skip(self, function, queue, args, events), fields(grid = %grid.grid, block = %grid.block))]
    pub fn launch_grid(
        &self,
        function: Option<Arc<DeviceFunction>>,
        grid: GridLaunch,
        queue: Option<Arc<dyn ExecQueue>>,
        args: ArgumentSource<'_>,
        events: LaunchEvents,
    ) -> Result<()> {
        let geometry = grid.to_geometry(&self.config.grid_limits)?;
        let request = LaunchRequest {
            function,
            geometry,
            queue,
            args,
            events,
        };
        self.launch(request)
    }

    /// Single-device cooperative launch of a resolved function.
    #[tracing::instrument(skip(self, function, queue, args, events), fields(grid = %grid.grid, block = %grid.block))]
    pub fn launch_cooperative(
        &self,
        function: Option<Arc<DeviceFunction>>,
        grid: GridLaunch,
        queue: Option<Arc<dyn ExecQueue>>,
        args: ArgumentSource<'_>,
        events: LaunchEvents,
    ) -> Result<()> {
        let geometry = grid
            .with_flags(grid.flags | LaunchFlags::COOPERATIVE)
            .to_geometry_unchecked_grid()?;
        let request = LaunchRequest {
            function,
            geometry,
            queue,
            args,
            events,
        };
        self.launch(request)
    }

    /// Single-device cooperative launch of a host function handle.
    ///
    /// The handle is resolved against the queue's device before any geometry
    /// check, and an oversized block is a configuration error in this form.
    #[tracing::instrument(skip(self, queue, args, events), fields(handle = %handle, grid = %grid.grid))]
    pub fn launch_cooperative_by_handle(
        &self,
        handle: HostFunctionHandle,
        grid: GridLaunch,
        queue: Option<Arc<dyn ExecQueue>>,
        args: ArgumentSource<'_>,
        events: LaunchEvents,
    ) -> Result<()> {
        let queue = queue.ok_or_else(|| LaunchError::invalid_handle("queue is null"))?;
        let device = queue.device();
        let function = self.resolver.resolve(handle, device)?;

        let caps = self
            .registry
            .capabilities(device)
            .ok_or_else(|| LaunchError::invalid_handle(format!("unknown device {device}")))?;
        if grid.block.total_threads() > u64::from(caps.max_work_group_size) {
            return Err(LaunchError::invalid_configuration(format!(
                "block {} exceeds maximum work-group size {} on {}",
                grid.block, caps.max_work_group_size, caps.name
            )));
        }

        self.launch_cooperative(Some(function), grid, Some(queue), args, events)
    }

    /// Cooperative launch spanning several devices.
    ///
    /// `sync_flags` is the raw flag word; bits other than
    /// [`crate::SyncFlags::NO_PRE_SYNC`] and [`crate::SyncFlags::NO_POST_SYNC`]
    /// are rejected.
    #[tracing::instrument(skip(self, entries), fields(grids = entries.len()))]
    pub fn launch_cooperative_multi_device(
        &self,
        entries: &[LaunchEntry<'_>],
        sync_flags: u32,
    ) -> Result<CooperativeReport> {
        cooperative::coordinate(self, entries, sync_flags, CooperativeVariant::Cooperative)
    }

    /// Launch independent kernels on several devices with the multi-device
    /// barriers but without cooperative-group semantics.
    #[tracing::instrument(skip(self, entries), fields(grids = entries.len()))]
    pub fn launch_multi_kernel_multi_device(
        &self,
        entries: &[LaunchEntry<'_>],
        sync_flags: u32,
    ) -> Result<CooperativeReport> {
        cooperative::coordinate(self, entries, sync_flags, CooperativeVariant::Independent)
    }

    /// The single-device path shared by every entry point.
    pub(crate) fn dispatch(
        &self,
        function: Option<&Arc<DeviceFunction>>,
        geometry: &LaunchGeometry,
        queue: Option<&Arc<dyn ExecQueue>>,
        args: &ArgumentSource<'_>,
        events: &LaunchEvents,
        partition: Option<CooperativePartition>,
    ) -> Result<()> {
        let function = function.ok_or_else(|| LaunchError::invalid_handle("function is null"))?;
        let queue = queue.ok_or_else(|| LaunchError::invalid_handle("queue is null"))?;
        let device = queue.device();
        let caps = self
            .registry
            .capabilities(device)
            .ok_or_else(|| LaunchError::invalid_handle(format!("unknown device {device}")))?;

        // Held until the queue has the unit
        let _launch_guard = function.lock_launch();

        if let Err(err) = validate_launch(
            Some(function.as_ref()),
            geometry,
            args,
            device,
            caps,
            self.occupancy.as_ref(),
        ) {
            tracing::debug!(kernel = function.name(), %device, error = %err, "launch rejected");
            return Err(err);
        }

        let bound = bind_arguments(args, function.params())?;
        let unit = build_dispatch(function, geometry, Arc::clone(queue), bound, events, partition)?;
        submit(unit, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DispatchUnit;
    use crate::device::{DeviceCapabilities, DeviceId, Occupancy};
    use crate::function::{ParameterDescriptor, WorkGroupInfo};
    use crate::queue::EnqueueStatus;
    use crate::types::{BlockDim, GlobalSize, GridDim};
    use parking_lot::Mutex;

    struct OneDevice(DeviceCapabilities);

    impl DeviceRegistry for OneDevice {
        fn capabilities(&self, device: DeviceId) -> Option<&DeviceCapabilities> {
            (device == DeviceId(0)).then_some(&self.0)
        }

        fn device_index(&self, device: DeviceId) -> Option<u32> {
            (device == DeviceId(0)).then_some(0)
        }

        fn active_device_count(&self) -> usize {
            1
        }
    }

    struct Unlimited;

    impl OccupancyCalculator for Unlimited {
        fn max_active_blocks(&self, _: &DeviceFunction, _: &DeviceCapabilities, _: u32, _: u32) -> Result<Occupancy> {
            Ok(Occupancy {
                blocks_per_cu: 64,
                max_blocks_per_grid: u64::MAX,
            })
        }
    }

    #[derive(Default)]
    struct CapturingQueue {
        images: Mutex<Vec<Vec<u8>>>,
    }

    impl ExecQueue for CapturingQueue {
        fn device(&self) -> DeviceId {
            DeviceId(0)
        }

        fn enqueue(&self, unit: &DispatchUnit) -> EnqueueStatus {
            self.images.lock().push(unit.args().as_bytes().to_vec());
            EnqueueStatus::Accepted
        }

        fn drain(&self) {}
    }

    fn launcher() -> Launcher {
        let caps = DeviceCapabilities::new("gpu0", 1024, 65_536).with_cooperative_groups(true, false);
        Launcher::new(Arc::new(OneDevice(caps)), Arc::new(Unlimited))
    }

    fn scale() -> Arc<DeviceFunction> {
        Arc::new(DeviceFunction::new(
            "scale",
            DeviceId(0),
            vec![ParameterDescriptor::value("n", 0, 4)],
            WorkGroupInfo::new(1024, 65_536),
        ))
    }

    #[test]
    fn test_launch_enqueues_bound_image() {
        let queue = Arc::new(CapturingQueue::default());
        let request = LaunchRequest::new(
            scale(),
            LaunchGeometry::new(GlobalSize::linear(1024), BlockDim::linear(256)),
            queue.clone(),
            ArgumentSource::FlatBuffer(&[42, 0, 0, 0]),
        );
        launcher().launch(request).unwrap();
        assert_eq!(*queue.images.lock(), vec![vec![42, 0, 0, 0]]);
    }

    #[test]
    fn test_null_function_and_queue() {
        let queue: Arc<dyn ExecQueue> = Arc::new(CapturingQueue::default());
        let geometry = LaunchGeometry::new(GlobalSize::linear(64), BlockDim::linear(64));

        let mut request = LaunchRequest::new(scale(), geometry, queue, ArgumentSource::FlatBuffer(&[0; 4]));
        request.function = None;
        assert!(matches!(
            launcher().launch(request.clone()),
            Err(LaunchError::InvalidResourceHandle(_))
        ));

        request.function = Some(scale());
        request.queue = None;
        assert!(matches!(launcher().launch(request), Err(LaunchError::InvalidResourceHandle(_))));
    }

    #[test]
    fn test_launch_grid_limits() {
        let queue: Arc<dyn ExecQueue> = Arc::new(CapturingQueue::default());
        let too_tall = GridLaunch::new(GridDim::new(1, 65_537, 1), BlockDim::linear(1));
        let err = launcher()
            .launch_grid(
                Some(scale()),
                too_tall,
                Some(queue.clone()),
                ArgumentSource::FlatBuffer(&[0; 4]),
                LaunchEvents::none(),
            )
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidValue(_)));

        let overflowing = GridLaunch::new(GridDim::linear(1 << 23), BlockDim::linear(1024));
        let err = launcher()
            .launch_grid(
                Some(scale()),
                overflowing,
                Some(queue),
                ArgumentSource::FlatBuffer(&[0; 4]),
                LaunchEvents::none(),
            )
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_cooperative_by_handle_without_resolver() {
        let queue: Arc<dyn ExecQueue> = Arc::new(CapturingQueue::default());
        let grid = GridLaunch::new(GridDim::linear(4), BlockDim::linear(64));
        let err = launcher()
            .launch_cooperative_by_handle(
                HostFunctionHandle(0x10),
                grid,
                Some(queue),
                ArgumentSource::Empty,
                LaunchEvents::none(),
            )
            .unwrap_err();
        assert!(matches!(err, LaunchError::InvalidResourceHandle(_)));
    }
}
