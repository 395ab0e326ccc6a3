//! `nr-interp` - Inference interpreter for npu-runtime.
//!
//! This crate provides:
//! - `Interpreter`: load a model, bind inputs, invoke on a device, read outputs
//! - `InterpreterOptions`: invoke deadline and performance counter setup
//! - `InterpreterError` with one variant per failure class

pub mod error;
pub mod interpreter;

// Re-export primary types at the crate root for convenience.
pub use error::{InterpreterError, Result};
pub use interpreter::{Interpreter, InterpreterOptions, DEFAULT_TIMEOUT};
