//! `nr-model` - Compiled model container parsing for npu-runtime.
//!
//! Models arrive as FlatBuffers files carrying the `TFL3` identifier, the
//! format the accelerator toolchain emits. This crate reads them without
//! generated schema code:
//! - `flatbuf` walks the raw FlatBuffers structures with bounds checks
//! - `reader` memory-maps a file and extracts the I/O tensor descriptors
//! - `tensor_info` is the descriptor type those extractions produce
//! - `writer` builds small synthetic containers for tests and fixtures

pub mod error;
pub mod flatbuf;
pub mod reader;
mod schema;
pub mod tensor_info;
pub mod writer;

// Re-export primary types at the crate root for convenience.
pub use error::{ModelError, Result};
pub use reader::{ModelFile, NPU_CUSTOM_OP};
pub use tensor_info::TensorInfo;
pub use writer::{quantized_classifier, ModelBuilder};
