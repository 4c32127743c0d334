//! Device-visible calling convention for launchkit dispatches
//!
//! This crate holds the pieces of the launch ABI that both the host-side
//! dispatcher and device-side code must agree on byte-for-byte:
//!
//! - [`CooperativeKernargs`] - hidden arguments appended after a kernel's
//!   explicit parameters when it takes part in a multi-device cooperative launch
//! - [`KernargReader`] - little-endian reads at exact offsets of a packed kernarg image

pub mod kernargs;
pub mod reader;

pub use kernargs::{CooperativeKernargs, ABI_VERSION, HIDDEN_ARG_ALIGNMENT};
pub use reader::{KernargError, KernargReader};
