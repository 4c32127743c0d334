//! Dispatch configuration
//!
//! Defaults match the limits of the plain grid-dims entry point. Every field
//! can be overridden from the environment with [`DispatchConfig::from_env`]:
//!
//! - `LAUNCHKIT_MAX_GRID_X` - largest grid x extent accepted by `launch_grid`
//! - `LAUNCHKIT_MAX_GRID_YZ` - largest grid y/z extent accepted by `launch_grid`
//! - `LAUNCHKIT_LAUNCH_THRESHOLD_US` - minimum launch duration worth logging;
//!   this is the only place the threshold is read, `Launcher` hands it to
//!   every `LaunchTimer` it starts

use std::env;

/// Grid-dimension limits enforced before the overflow check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLimits {
    pub max_grid_x: u32,
    pub max_grid_yz: u32,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            max_grid_x: i32::MAX as u32,
            max_grid_yz: u16::MAX as u32 + 1,
        }
    }
}

/// Configuration shared by every launch issued through a [`crate::Launcher`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    pub grid_limits: GridLimits,
    /// Launches faster than this are not logged; `None` logs all of them
    pub launch_threshold_us: Option<u64>,
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = parse_var::<u32>("LAUNCHKIT_MAX_GRID_X") {
            config.grid_limits.max_grid_x = value;
        }
        if let Some(value) = parse_var::<u32>("LAUNCHKIT_MAX_GRID_YZ") {
            config.grid_limits.max_grid_yz = value;
        }
        if let Some(value) = parse_var::<u64>("LAUNCHKIT_LAUNCH_THRESHOLD_US") {
            config.launch_threshold_us = Some(value);
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable dispatch setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn reset_env() {
        for key in ["LAUNCHKIT_MAX_GRID_X", "LAUNCHKIT_MAX_GRID_YZ", "LAUNCHKIT_LAUNCH_THRESHOLD_US"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_limits() {
        let limits = GridLimits::default();
        assert_eq!(limits.max_grid_x, 2_147_483_647);
        assert_eq!(limits.max_grid_yz, 65_536);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        reset_env();
        env::set_var("LAUNCHKIT_MAX_GRID_X", "4096");
        env::set_var("LAUNCHKIT_LAUNCH_THRESHOLD_US", " 50 ");

        let config = DispatchConfig::from_env();
        assert_eq!(config.grid_limits.max_grid_x, 4096);
        assert_eq!(config.grid_limits.max_grid_yz, 65_536);
        assert_eq!(config.launch_threshold_us, Some(50));
        reset_env();
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        reset_env();
        env::set_var("LAUNCHKIT_MAX_GRID_YZ", "lots");

        assert_eq!(DispatchConfig::from_env(), DispatchConfig::default());
        reset_env();
    }
}
