use std::time::Duration;

use thiserror::Error;

use crate::device::IoKind;

/// Errors surfaced by device backends.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device refused the network blob at registration.
    #[error("network rejected: {0}")]
    InvalidNetwork(String),

    /// An inference referenced a handle that is not registered.
    #[error("unknown network handle {0}")]
    UnknownNetwork(u64),

    /// An inference supplied more buffers than the device supports.
    #[error("too many {kind} buffers: {count} (device limit {limit})")]
    TooManyBuffers {
        kind: IoKind,
        count: usize,
        limit: usize,
    },

    /// The device reported a hardware fault while running.
    #[error("device fault: {0}")]
    Fault(String),

    /// The inference did not complete within the caller's deadline.
    #[error("inference timed out after {waited:?}")]
    Timeout { waited: Duration },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, DeviceError>;
