use thiserror::Error;

use nr_device::{DeviceError, IoKind};
use nr_model::ModelError;
use nr_tensor::{ElemType, Shape, TensorError};

/// Errors surfaced by the interpreter, one variant per failure class.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// The model container could not be read or parsed.
    #[error("failed to load model: {0}")]
    Load(#[from] ModelError),

    /// The device refused the network at registration.
    #[error("device rejected network: {0}")]
    Rejected(DeviceError),

    /// An input or output index beyond the model's tensor count.
    #[error("{kind} tensor index {index} out of range ({count} available)")]
    IndexOutOfRange {
        kind: IoKind,
        index: usize,
        count: usize,
    },

    /// A supplied buffer's element type differs from the descriptor's.
    #[error("input {index} element type mismatch: expected {expected}, got {got}")]
    ElemTypeMismatch {
        index: usize,
        expected: ElemType,
        got: ElemType,
    },

    /// A supplied buffer's shape differs from the descriptor's.
    #[error("input {index} shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        index: usize,
        expected: Shape,
        got: Shape,
    },

    /// `invoke` was called while an input had no data bound.
    #[error("input {index} has not been set")]
    InputNotSet { index: usize },

    /// The device failed during dispatch or a capability query.
    #[error("device error: {0}")]
    Execution(#[from] DeviceError),

    /// An output was read before a successful `invoke`.
    #[error("no completed inference; call invoke first")]
    NotInvoked,

    /// Buffer or view bookkeeping failed.
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, InterpreterError>;
