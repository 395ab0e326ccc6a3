//! `nr-device` - Accelerator device abstraction for npu-runtime.
//!
//! This crate provides:
//! - The `Device` trait: register networks, run inferences, query capabilities
//! - `EmulatedDevice`, a deterministic software backend for development and tests
//! - Hardware capability reporting (`Capabilities`)
//! - Performance monitor plumbing (`PmuConfig`, `InferenceReport`)

pub mod capabilities;
pub mod device;
pub mod emulated;
pub mod error;

// Re-export primary types at the crate root for convenience.
pub use capabilities::{Capabilities, HardwareConfig, HardwareId};
pub use device::{
    Device, InferenceReport, IoKind, NetworkHandle, PmuConfig, MAX_IO_BUFFERS, PMU_EVENT_SLOTS,
};
pub use emulated::EmulatedDevice;
pub use error::{DeviceError, Result};
