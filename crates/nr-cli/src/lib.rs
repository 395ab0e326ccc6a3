//! Label-image demo library
//!
//! Classifies an image with a compiled model on the emulated NPU and
//! prints the top-k labels.

pub mod app;
pub mod classify;
pub mod cli;
pub mod imageprep;
pub mod labels;

pub use cli::Args;
