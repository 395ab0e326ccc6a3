use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid file identifier: expected 'TFL3', got {0:?}")]
    InvalidIdentifier([u8; 4]),
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u32),
    #[error("malformed model: {0}")]
    Malformed(String),
    #[error("unsupported element type code {code} for tensor {tensor}")]
    UnsupportedElemType { code: i8, tensor: String },
    #[error("invalid dimension {dim} for tensor {tensor}")]
    InvalidDimension { tensor: String, dim: i64 },
    #[error("tensor error: {0}")]
    Tensor(#[from] nr_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
