use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("byte length mismatch: shape {shape:?} as {elem_type} needs {expected} bytes, got {got}")]
    ByteLengthMismatch {
        shape: Vec<usize>,
        elem_type: String,
        expected: usize,
        got: usize,
    },
    #[error("buffer window out of range: offset {offset} + size {size} exceeds capacity {capacity}")]
    WindowOutOfRange {
        offset: usize,
        size: usize,
        capacity: usize,
    },
    #[error("unsupported element type code: {0}")]
    UnsupportedElemType(i8),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
