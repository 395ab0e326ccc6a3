//! Field ids for the subset of the container schema this crate touches.
//!
//! Field id `N` lives at vtable slot `4 + 2N`. Absent fields fall back to
//! their schema defaults (0 for scalars).

pub(crate) const FILE_IDENTIFIER: &[u8; 4] = b"TFL3";
pub(crate) const SCHEMA_VERSION: u32 = 3;

// Model
pub(crate) const MODEL_VERSION: u16 = 0;
pub(crate) const MODEL_OPERATOR_CODES: u16 = 1;
pub(crate) const MODEL_SUBGRAPHS: u16 = 2;
pub(crate) const MODEL_DESCRIPTION: u16 = 3;
pub(crate) const MODEL_BUFFERS: u16 = 4;

// SubGraph
pub(crate) const SUBGRAPH_TENSORS: u16 = 0;
pub(crate) const SUBGRAPH_INPUTS: u16 = 1;
pub(crate) const SUBGRAPH_OUTPUTS: u16 = 2;
pub(crate) const SUBGRAPH_OPERATORS: u16 = 3;

// Tensor
pub(crate) const TENSOR_SHAPE: u16 = 0;
pub(crate) const TENSOR_TYPE: u16 = 1;
pub(crate) const TENSOR_BUFFER: u16 = 2;
pub(crate) const TENSOR_NAME: u16 = 3;
pub(crate) const TENSOR_QUANTIZATION: u16 = 4;

// QuantizationParameters
pub(crate) const QUANT_SCALE: u16 = 2;
pub(crate) const QUANT_ZERO_POINT: u16 = 3;

// OperatorCode
pub(crate) const OPCODE_DEPRECATED_BUILTIN: u16 = 0;
pub(crate) const OPCODE_CUSTOM_CODE: u16 = 1;
pub(crate) const OPCODE_BUILTIN: u16 = 3;

// Operator
pub(crate) const OP_OPCODE_INDEX: u16 = 0;
pub(crate) const OP_INPUTS: u16 = 1;
pub(crate) const OP_OUTPUTS: u16 = 2;

// Buffer
pub(crate) const BUFFER_DATA: u16 = 0;

/// Builtin operator code marking a custom operator.
pub(crate) const BUILTIN_CUSTOM: i32 = 32;
