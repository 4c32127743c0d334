//! Error types for launch operations

use crate::device::DeviceId;

/// Result type for launch operations
pub type Result<T> = std::result::Result<T, LaunchError>;

/// Errors surfaced by validation, binding, dispatch construction and
/// cooperative coordination.
///
/// Every variant is detected before any argument is bound or any command is
/// enqueued, except [`LaunchError::IllegalState`] which reports a queue
/// refusing an already constructed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// Malformed geometry, ambiguous or missing arguments, bad sentinel sequence, out-of-range flags
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Missing function, missing queue, or a function with no entry point on the target device
    #[error("invalid resource handle: {0}")]
    InvalidResourceHandle(String),

    /// Dimension products outside the representable range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The compiled kernel or the device cannot honor the requested launch
    #[error("launch failure: {0}")]
    LaunchFailure(String),

    /// Cooperative grid larger than what can be co-resident on the device
    #[error("cooperative launch too large: {requested_blocks} blocks requested, at most {max_blocks} can be resident")]
    CooperativeLaunchTooLarge { requested_blocks: u64, max_blocks: u64 },

    /// Two entries of a multi-device launch target the same device
    #[error("device {device} appears more than once in the multi-device launch")]
    DeviceDuplication { device: DeviceId },

    /// The queue refused the dispatch outright
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Command construction could not allocate
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    /// Named symbol does not exist in the module
    #[error("not found: {0}")]
    NotFound(String),
}

/// Coarse classification of a [`LaunchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidValue,
    InvalidResourceHandle,
    InvalidConfiguration,
    LaunchFailure,
    CooperativeLaunchTooLarge,
    DeviceDuplication,
    IllegalState,
    OutOfMemory,
    NotFound,
}

impl ErrorKind {
    /// True for mistakes the caller fixes by changing the launch arguments.
    ///
    /// The remaining kinds come from resource exhaustion or device/queue state
    /// and will fail again if retried with the same arguments.
    pub const fn is_configuration(self) -> bool {
        matches!(
            self,
            Self::InvalidValue
                | Self::InvalidResourceHandle
                | Self::InvalidConfiguration
                | Self::CooperativeLaunchTooLarge
                | Self::DeviceDuplication
                | Self::NotFound
        )
    }
}

impl LaunchError {
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn invalid_handle(msg: impl Into<String>) -> Self {
        Self::InvalidResourceHandle(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn launch_failure(msg: impl Into<String>) -> Self {
        Self::LaunchFailure(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidValue(_) => ErrorKind::InvalidValue,
            Self::InvalidResourceHandle(_) => ErrorKind::InvalidResourceHandle,
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::LaunchFailure(_) => ErrorKind::LaunchFailure,
            Self::CooperativeLaunchTooLarge { .. } => ErrorKind::CooperativeLaunchTooLarge,
            Self::DeviceDuplication { .. } => ErrorKind::DeviceDuplication,
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}
