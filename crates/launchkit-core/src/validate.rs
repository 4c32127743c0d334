//! Launch validation against device and kernel limits
//!
//! Pure checks: nothing here binds arguments, touches a queue, or mutates the
//! function. Checks run in a fixed order and the first failure wins.

use crate::args::ArgumentSource;
use crate::device::{DeviceCapabilities, DeviceId, OccupancyCalculator};
use crate::error::{LaunchError, Result};
use crate::function::DeviceFunction;
use crate::types::{LaunchFlags, LaunchGeometry};

/// Validate a launch of `function` with `geometry` on `device`.
pub fn validate_launch(
    function: Option<&DeviceFunction>,
    geometry: &LaunchGeometry,
    args: &ArgumentSource<'_>,
    device: DeviceId,
    caps: &DeviceCapabilities,
    occupancy: &dyn OccupancyCalculator,
) -> Result<()> {
    let function = function.ok_or_else(|| LaunchError::invalid_handle("function is null"))?;

    // Ambiguous argument sources cannot be represented past ArgumentSource::from_raw.

    if geometry.global.has_zero() || geometry.block.has_zero() {
        return Err(LaunchError::invalid_value(format!(
            "zero dimension in {} for kernel {}",
            geometry,
            function.name()
        )));
    }

    if u64::from(geometry.shared_mem_bytes) > caps.local_mem_per_cu {
        return Err(LaunchError::invalid_value(format!(
            "shared memory request {}B exceeds {}B per compute unit on {}",
            geometry.shared_mem_bytes, caps.local_mem_per_cu, caps.name
        )));
    }

    let block_threads = geometry.block_threads();
    if block_threads > u64::from(caps.max_work_group_size) {
        return Err(LaunchError::invalid_value(format!(
            "block {} has {} work-items, device maximum is {}",
            geometry.block, block_threads, caps.max_work_group_size
        )));
    }

    if !function.has_entry_point_on(device) {
        return Err(LaunchError::invalid_handle(format!(
            "kernel {} has no entry point on {}",
            function.name(),
            device
        )));
    }

    let ceiling = function.work_group().thread_ceiling();
    if block_threads > u64::from(ceiling) {
        tracing::debug!(
            kernel = function.name(),
            block = %geometry.block,
            ceiling,
            "launch exceeds kernel launch bounds"
        );
        return Err(LaunchError::launch_failure(format!(
            "block {} is larger than the launch bound {} of kernel {}",
            geometry.block,
            ceiling,
            function.name()
        )));
    }

    if geometry.flags.contains(LaunchFlags::COOPERATIVE) {
        validate_cooperative(function, geometry, caps, occupancy)?;
    }

    if geometry.flags.contains(LaunchFlags::COOPERATIVE_MULTI_DEVICE) && !caps.cooperative_multi_device {
        return Err(LaunchError::launch_failure(format!(
            "{} does not support multi-device cooperative groups",
            caps.name
        )));
    }

    validate_argument_shape(function, args)
}

fn validate_cooperative(
    function: &DeviceFunction,
    geometry: &LaunchGeometry,
    caps: &DeviceCapabilities,
    occupancy: &dyn OccupancyCalculator,
) -> Result<()> {
    if !caps.cooperative_groups {
        return Err(LaunchError::launch_failure(format!(
            "{} does not support cooperative groups",
            caps.name
        )));
    }

    // Bounded by max_work_group_size above
    let block_size = geometry.block_threads() as u32;
    let residency = occupancy.max_active_blocks(function, caps, block_size, geometry.shared_mem_bytes)?;
    let requested_blocks = geometry.global_elements() / geometry.block_threads();
    if requested_blocks > residency.max_blocks_per_grid {
        return Err(LaunchError::CooperativeLaunchTooLarge {
            requested_blocks,
            max_blocks: residency.max_blocks_per_grid,
        });
    }
    Ok(())
}

fn validate_argument_shape(function: &DeviceFunction, args: &ArgumentSource<'_>) -> Result<()> {
    let expected = function.params().len();
    if expected == 0 {
        return Ok(());
    }
    match args {
        ArgumentSource::Empty => Err(LaunchError::invalid_value(format!(
            "kernel {} takes {} parameters but no arguments were supplied",
            function.name(),
            expected
        ))),
        ArgumentSource::FlatBuffer(buffer) if buffer.is_empty() => Err(LaunchError::invalid_value(format!(
            "flat argument buffer for kernel {} is empty",
            function.name()
        ))),
        ArgumentSource::PointerArray(pointers) if pointers.len() != expected => {
            Err(LaunchError::invalid_value(format!(
                "kernel {} takes {} parameters, {} supplied",
                function.name(),
                expected,
                pointers.len()
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Occupancy;
    use crate::function::{ParameterDescriptor, WorkGroupInfo};
    use crate::types::{BlockDim, GlobalSize};

    struct FixedOccupancy(u64);

    impl OccupancyCalculator for FixedOccupancy {
        fn max_active_blocks(&self, _: &DeviceFunction, _: &DeviceCapabilities, _: u32, _: u32) -> Result<Occupancy> {
            Ok(Occupancy {
                blocks_per_cu: 1,
                max_blocks_per_grid: self.0,
            })
        }
    }

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities::new("test-gpu", 1024, 65_536).with_cooperative_groups(true, true)
    }

    fn kernel(launch_bound: Option<u32>) -> DeviceFunction {
        let mut wg = WorkGroupInfo::new(1024, 65_536);
        wg.launch_bound = launch_bound;
        DeviceFunction::new("k", DeviceId(0), vec![ParameterDescriptor::value("n", 0, 4)], wg)
    }

    fn geometry(global: u32, block: u32) -> LaunchGeometry {
        LaunchGeometry::new(GlobalSize::linear(global), BlockDim::linear(block))
    }

    fn check(f: Option<&DeviceFunction>, g: &LaunchGeometry, args: &ArgumentSource<'_>) -> Result<()> {
        validate_launch(f, g, args, DeviceId(0), &caps(), &FixedOccupancy(16))
    }

    const N: [u8; 4] = [1, 0, 0, 0];

    #[test]
    fn test_valid_launch() {
        let f = kernel(None);
        assert!(check(Some(&f), &geometry(4096, 256), &ArgumentSource::FlatBuffer(&N)).is_ok());
    }

    #[test]
    fn test_null_function() {
        let err = check(None, &geometry(64, 64), &ArgumentSource::Empty).unwrap_err();
        assert!(matches!(err, LaunchError::InvalidResourceHandle(_)));
    }

    #[test]
    fn test_zero_dimension() {
        let f = kernel(None);
        let g = LaunchGeometry::new(GlobalSize::new(64, 0, 1), BlockDim::linear(64));
        assert!(matches!(
            check(Some(&f), &g, &ArgumentSource::FlatBuffer(&N)),
            Err(LaunchError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_shared_memory_budget() {
        let f = kernel(None);
        let at_limit = geometry(64, 64).with_shared_mem(65_536);
        let over = geometry(64, 64).with_shared_mem(65_537);
        assert!(check(Some(&f), &at_limit, &ArgumentSource::FlatBuffer(&N)).is_ok());
        assert!(matches!(
            check(Some(&f), &over, &ArgumentSource::FlatBuffer(&N)),
            Err(LaunchError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_block_over_device_max() {
        let f = kernel(None);
        let g = LaunchGeometry::new(GlobalSize::new(64, 64, 1), BlockDim::new(64, 32, 1));
        assert!(matches!(
            check(Some(&f), &g, &ArgumentSource::FlatBuffer(&N)),
            Err(LaunchError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_missing_entry_point() {
        let f = kernel(None).without_entry_point();
        assert!(matches!(
            check(Some(&f), &geometry(64, 64), &ArgumentSource::FlatBuffer(&N)),
            Err(LaunchError::InvalidResourceHandle(_))
        ));
    }

    #[test]
    fn test_launch_bound_is_launch_failure() {
        let f = kernel(Some(128));
        assert!(check(Some(&f), &geometry(1024, 128), &ArgumentSource::FlatBuffer(&N)).is_ok());
        assert!(matches!(
            check(Some(&f), &geometry(1024, 256), &ArgumentSource::FlatBuffer(&N)),
            Err(LaunchError::LaunchFailure(_))
        ));
    }

    #[test]
    fn test_cooperative_too_large() {
        let f = kernel(None);
        let fits = geometry(16 * 64, 64).with_flags(LaunchFlags::COOPERATIVE);
        let too_many = geometry(17 * 64, 64).with_flags(LaunchFlags::COOPERATIVE);
        assert!(check(Some(&f), &fits, &ArgumentSource::FlatBuffer(&N)).is_ok());
        assert_eq!(
            check(Some(&f), &too_many, &ArgumentSource::FlatBuffer(&N)),
            Err(LaunchError::CooperativeLaunchTooLarge {
                requested_blocks: 17,
                max_blocks: 16
            })
        );
    }

    #[test]
    fn test_cooperative_unsupported() {
        let f = kernel(None);
        let plain = DeviceCapabilities::new("plain", 1024, 65_536);
        let g = geometry(64, 64).with_flags(LaunchFlags::COOPERATIVE);
        let err = validate_launch(
            Some(&f),
            &g,
            &ArgumentSource::FlatBuffer(&N),
            DeviceId(0),
            &plain,
            &FixedOccupancy(16),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailure(_)));

        let single_only = DeviceCapabilities::new("single", 1024, 65_536).with_cooperative_groups(true, false);
        let g = geometry(64, 64).with_flags(LaunchFlags::COOPERATIVE | LaunchFlags::COOPERATIVE_MULTI_DEVICE);
        let err = validate_launch(
            Some(&f),
            &g,
            &ArgumentSource::FlatBuffer(&N),
            DeviceId(0),
            &single_only,
            &FixedOccupancy(16),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailure(_)));
    }

    #[test]
    fn test_missing_arguments() {
        let f = kernel(None);
        let g = geometry(64, 64);
        for args in [
            ArgumentSource::Empty,
            ArgumentSource::FlatBuffer(&[]),
            ArgumentSource::PointerArray(vec![&N[..], &N[..]]),
        ] {
            assert!(matches!(check(Some(&f), &g, &args), Err(LaunchError::InvalidValue(_))));
        }
    }

    #[test]
    fn test_no_parameters_no_arguments() {
        let f = DeviceFunction::new("noop", DeviceId(0), Vec::new(), WorkGroupInfo::new(1024, 0));
        assert!(check(Some(&f), &geometry(64, 64), &ArgumentSource::Empty).is_ok());
    }
}
