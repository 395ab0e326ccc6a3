//! `nr-tensor` - Tensor metadata and host-side buffers for npu-runtime.
//!
//! This crate provides:
//! - A `Shape` type wrapping dimension sizes
//! - Element type definitions keyed by the model container's type codes
//! - Affine quantization parameters (`QuantParams`)
//! - A `HostBuffer` with a fixed capacity and a movable data window
//! - A borrowed `TensorView` with typed decoding to f32

pub mod buffer;
pub mod elem_type;
pub mod error;
pub mod quant;
pub mod shape;
pub mod view;

// Re-export primary types at the crate root for convenience.
pub use buffer::HostBuffer;
pub use elem_type::ElemType;
pub use error::{Result, TensorError};
pub use quant::QuantParams;
pub use shape::Shape;
pub use view::TensorView;
