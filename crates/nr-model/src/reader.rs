use std::ops::Range;
use std::path::Path;

use memmap2::Mmap;

use nr_tensor::{ElemType, QuantParams, Shape};

use crate::error::{ModelError, Result};
use crate::flatbuf::{FlatBuffer, Table, Vector};
use crate::schema;
use crate::tensor_info::TensorInfo;

/// Custom operator code marking an operator as accelerator-offloaded.
pub const NPU_CUSTOM_OP: &str = "ethos-u";

/// A parsed model container backed by a memory-mapped region.
///
/// Parsing walks the container once up front and extracts everything the
/// runtime needs: the network's input and output tensor descriptors, a count
/// of accelerator operators, and the location of the first command stream.
/// Tensor data stays in the mapped file and is never copied.
#[derive(Debug)]
pub struct ModelFile {
    /// Memory-mapped file contents.
    mmap: Mmap,
    /// Container schema version.
    version: u32,
    /// Optional human-readable description embedded by the converter.
    description: Option<String>,
    /// Descriptors for the first subgraph's input tensors.
    inputs: Vec<TensorInfo>,
    /// Descriptors for the last subgraph's output tensors.
    outputs: Vec<TensorInfo>,
    /// Number of accelerator custom operators across all subgraphs.
    npu_op_count: usize,
    /// Byte range of the first accelerator operator's command stream.
    command_stream: Option<Range<usize>>,
}

struct Parsed {
    version: u32,
    description: Option<String>,
    inputs: Vec<TensorInfo>,
    outputs: Vec<TensorInfo>,
    npu_op_count: usize,
    command_stream: Option<Range<usize>>,
}

impl ModelFile {
    /// Open and parse a model container from disk.
    ///
    /// The file is memory-mapped and validated in one pass; the descriptor
    /// tables survive in owned form so later lookups never touch the
    /// container encoding again.
    pub fn open(path: &Path) -> Result<ModelFile> {
        let file = std::fs::File::open(path)?;

        // Memory-map the entire file.
        let mmap = unsafe { Mmap::map(&file)? };
        let parsed = parse(&mmap)?;

        Ok(ModelFile {
            mmap,
            version: parsed.version,
            description: parsed.description,
            inputs: parsed.inputs,
            outputs: parsed.outputs,
            npu_op_count: parsed.npu_op_count,
            command_stream: parsed.command_stream,
        })
    }

    /// Container schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Converter-embedded description, if present.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Descriptors for the network's input tensors.
    ///
    /// Inputs come from the first subgraph: when a model is split into a
    /// pre-processing graph and an accelerated core, the caller-facing
    /// inputs are the first subgraph's.
    pub fn input_info(&self) -> &[TensorInfo] {
        &self.inputs
    }

    /// Descriptors for the network's output tensors, from the last subgraph.
    pub fn output_info(&self) -> &[TensorInfo] {
        &self.outputs
    }

    /// Number of accelerator custom operators in the container.
    pub fn npu_op_count(&self) -> usize {
        self.npu_op_count
    }

    /// Command stream bytes of the first accelerator operator, if any.
    pub fn command_stream(&self) -> Option<&[u8]> {
        self.command_stream.clone().map(|r| &self.mmap[r])
    }

    /// The complete container, as registered with a device.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

fn parse(bytes: &[u8]) -> Result<Parsed> {
    let fb = FlatBuffer::new(bytes);

    let ident = fb
        .identifier()
        .ok_or_else(|| ModelError::Malformed(format!("file too short: {} bytes", bytes.len())))?;
    if &ident != schema::FILE_IDENTIFIER {
        return Err(ModelError::InvalidIdentifier(ident));
    }

    let root = fb.root_table()?;

    let version = fb.table_u32(root, schema::MODEL_VERSION, 0)?;
    if version != schema::SCHEMA_VERSION {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let description = fb
        .table_string(root, schema::MODEL_DESCRIPTION)?
        .map(String::from);

    let subgraphs = fb
        .table_vector(root, schema::MODEL_SUBGRAPHS, 4)?
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ModelError::Malformed("model contains no subgraphs".into()))?;

    // Network inputs are read from the first subgraph and outputs from the
    // last, so containers whose converter split pre/post-processing into
    // separate subgraphs still expose the end-to-end interface.
    let first = fb.vector_table(subgraphs, 0)?;
    let last = fb.vector_table(subgraphs, subgraphs.len() - 1)?;
    let inputs = io_tensors(&fb, first, schema::SUBGRAPH_INPUTS)?;
    let outputs = io_tensors(&fb, last, schema::SUBGRAPH_OUTPUTS)?;

    let (npu_op_count, command_stream) = scan_npu_ops(&fb, root, subgraphs)?;

    Ok(Parsed {
        version,
        description,
        inputs,
        outputs,
        npu_op_count,
        command_stream,
    })
}

/// Resolve one subgraph's input or output tensor list into descriptors.
fn io_tensors(fb: &FlatBuffer, subgraph: Table, io_field: u16) -> Result<Vec<TensorInfo>> {
    let tensors = fb
        .table_vector(subgraph, schema::SUBGRAPH_TENSORS, 4)?
        .ok_or_else(|| ModelError::Malformed("subgraph has no tensor table".into()))?;

    let io = match fb.table_vector(subgraph, io_field, 4)? {
        Some(v) => v,
        None => return Ok(Vec::new()),
    };

    let mut infos = Vec::with_capacity(io.len());
    for slot in 0..io.len() {
        let tensor_idx = fb.vector_i32(io, slot)?;
        if tensor_idx < 0 || tensor_idx as usize >= tensors.len() {
            return Err(ModelError::Malformed(format!(
                "tensor index {tensor_idx} out of range (subgraph has {} tensors)",
                tensors.len()
            )));
        }
        let table = fb.vector_table(tensors, tensor_idx as usize)?;
        infos.push(read_tensor_info(fb, table, slot)?);
    }
    Ok(infos)
}

fn read_tensor_info(fb: &FlatBuffer, tensor: Table, slot: usize) -> Result<TensorInfo> {
    let name = fb.table_string(tensor, schema::TENSOR_NAME)?.map(String::from);
    let label = name.clone().unwrap_or_else(|| format!("#{slot}"));

    let code = fb.table_i8(tensor, schema::TENSOR_TYPE, 0)?;
    let elem_type = ElemType::from_type_code(code).ok_or(ModelError::UnsupportedElemType {
        code,
        tensor: label.clone(),
    })?;

    let mut dims = Vec::new();
    if let Some(shape) = fb.table_vector(tensor, schema::TENSOR_SHAPE, 4)? {
        dims.reserve(shape.len());
        for i in 0..shape.len() {
            let d = fb.vector_i32(shape, i)?;
            if d <= 0 {
                return Err(ModelError::InvalidDimension {
                    tensor: label,
                    dim: d as i64,
                });
            }
            dims.push(d as usize);
        }
    }

    let quant = match fb.table_table(tensor, schema::TENSOR_QUANTIZATION)? {
        Some(q) => match fb.table_vector(q, schema::QUANT_SCALE, 4)? {
            Some(scales) if !scales.is_empty() => {
                let scale = fb.vector_f32(scales, 0)?;
                let zero_point = match fb.table_vector(q, schema::QUANT_ZERO_POINT, 8)? {
                    Some(zps) if !zps.is_empty() => fb.vector_i64(zps, 0)?,
                    _ => 0,
                };
                Some(QuantParams::new(scale, zero_point))
            }
            _ => None,
        },
        None => None,
    };

    Ok(TensorInfo {
        index: slot,
        name,
        elem_type,
        shape: Shape::new(dims),
        quant,
    })
}

/// Count accelerator operators and locate the first command stream.
///
/// By convention the first input of an accelerator custom operator is the
/// compiled command stream tensor, backed by a constant buffer.
fn scan_npu_ops(
    fb: &FlatBuffer,
    root: Table,
    subgraphs: Vector,
) -> Result<(usize, Option<Range<usize>>)> {
    let opcodes = fb.table_vector(root, schema::MODEL_OPERATOR_CODES, 4)?;
    let buffers = fb.table_vector(root, schema::MODEL_BUFFERS, 4)?;

    let mut count = 0;
    let mut stream = None;

    for sg_idx in 0..subgraphs.len() {
        let subgraph = fb.vector_table(subgraphs, sg_idx)?;
        let operators = match fb.table_vector(subgraph, schema::SUBGRAPH_OPERATORS, 4)? {
            Some(v) => v,
            None => continue,
        };
        for op_idx in 0..operators.len() {
            let op = fb.vector_table(operators, op_idx)?;
            let opcode_index = fb.table_u32(op, schema::OP_OPCODE_INDEX, 0)?;
            if !opcode_is_npu(fb, opcodes, opcode_index)? {
                continue;
            }
            count += 1;
            if stream.is_none() {
                stream = op_command_stream(fb, subgraph, op, buffers)?;
            }
        }
    }
    Ok((count, stream))
}

fn opcode_is_npu(fb: &FlatBuffer, opcodes: Option<Vector>, index: u32) -> Result<bool> {
    let opcodes = match opcodes {
        Some(v) => v,
        None => return Ok(false),
    };
    if index as usize >= opcodes.len() {
        return Ok(false);
    }
    let code = fb.vector_table(opcodes, index as usize)?;
    Ok(fb.table_string(code, schema::OPCODE_CUSTOM_CODE)? == Some(NPU_CUSTOM_OP))
}

fn op_command_stream(
    fb: &FlatBuffer,
    subgraph: Table,
    op: Table,
    buffers: Option<Vector>,
) -> Result<Option<Range<usize>>> {
    let buffers = match buffers {
        Some(v) => v,
        None => return Ok(None),
    };
    let tensors = match fb.table_vector(subgraph, schema::SUBGRAPH_TENSORS, 4)? {
        Some(v) => v,
        None => return Ok(None),
    };
    let inputs = match fb.table_vector(op, schema::OP_INPUTS, 4)? {
        Some(v) => v,
        None => return Ok(None),
    };

    for i in 0..inputs.len() {
        let tensor_idx = fb.vector_i32(inputs, i)?;
        // Negative indices mark optional absent operands.
        if tensor_idx < 0 || tensor_idx as usize >= tensors.len() {
            continue;
        }
        let tensor = fb.vector_table(tensors, tensor_idx as usize)?;
        let buffer_idx = fb.table_u32(tensor, schema::TENSOR_BUFFER, 0)?;
        // Buffer 0 is the shared empty buffer for variable tensors.
        if buffer_idx == 0 || buffer_idx as usize >= buffers.len() {
            continue;
        }
        let buffer = fb.vector_table(buffers, buffer_idx as usize)?;
        if let Some(data) = fb.table_vector(buffer, schema::BUFFER_DATA, 1)? {
            if !data.is_empty() {
                return Ok(Some(fb.vector_byte_range(data)?));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::writer::{quantized_classifier, Builder, ModelBuilder, TableBuilder};
    use nr_tensor::ElemType;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_classifier_fixture_round_trip() {
        let bytes = quantized_classifier(1001);
        assert_eq!(&bytes[4..8], b"TFL3");

        let f = write_temp(&bytes);
        let model = ModelFile::open(f.path()).unwrap();

        assert_eq!(model.version(), 3);
        assert_eq!(model.description(), Some("synthetic quantized classifier"));

        let inputs = model.input_info();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].index, 0);
        assert_eq!(inputs[0].name.as_deref(), Some("input"));
        assert_eq!(inputs[0].elem_type, ElemType::U8);
        assert_eq!(inputs[0].shape.dims(), &[1, 224, 224, 3]);
        assert_eq!(inputs[0].byte_size(), 150_528);
        let q = inputs[0].quant.unwrap();
        assert_eq!(q.zero_point, 128);

        let outputs = model.output_info();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name.as_deref(), Some("output"));
        assert_eq!(outputs[0].shape.dims(), &[1, 1001]);
        assert_eq!(outputs[0].byte_size(), 1001);
        let q = outputs[0].quant.unwrap();
        assert!((q.scale - 1.0 / 255.0).abs() < 1e-9);
        assert_eq!(q.zero_point, 0);

        assert_eq!(model.npu_op_count(), 1);
        let stream = model.command_stream().unwrap();
        assert_eq!(stream.len(), 32);
        assert_eq!(&stream[..4], b"COP1");

        assert_eq!(model.bytes(), &bytes[..]);
    }

    #[test]
    fn test_rejects_bad_identifier() {
        let mut bytes = quantized_classifier(10);
        bytes[4..8].copy_from_slice(b"GGUF");
        let f = write_temp(&bytes);
        match ModelFile::open(f.path()) {
            Err(ModelError::InvalidIdentifier(id)) => assert_eq!(&id, b"GGUF"),
            other => panic!("expected InvalidIdentifier, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_truncated_file() {
        let f = write_temp(&[0u8; 6]);
        match ModelFile::open(f.path()) {
            Err(ModelError::Malformed(msg)) => assert!(msg.contains("too short")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let mut mb = ModelBuilder::new();
        mb.version(9);
        let input = mb.add_tensor("in", ElemType::U8, &[1], None);
        mb.declare_input(input);
        let f = write_temp(&mb.build());
        match ModelFile::open(f.path()) {
            Err(ModelError::UnsupportedVersion(9)) => {}
            other => panic!("expected UnsupportedVersion(9), got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_zero_dimension() {
        let mut mb = ModelBuilder::new();
        let input = mb.add_tensor("in", ElemType::U8, &[1, 0], None);
        mb.declare_input(input);
        let f = write_temp(&mb.build());
        match ModelFile::open(f.path()) {
            Err(ModelError::InvalidDimension { tensor, dim }) => {
                assert_eq!(tensor, "in");
                assert_eq!(dim, 0);
            }
            other => panic!("expected InvalidDimension, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unsupported_elem_type() {
        let mut mb = ModelBuilder::new();
        // Type code 5 is the string type, which host buffers cannot carry.
        let input = mb.add_tensor_with_type_code("in", 5, &[1], None);
        mb.declare_input(input);
        let f = write_temp(&mb.build());
        match ModelFile::open(f.path()) {
            Err(ModelError::UnsupportedElemType { code: 5, tensor }) => {
                assert_eq!(tensor, "in");
            }
            other => panic!("expected UnsupportedElemType, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_missing_subgraphs() {
        // Hand-build a model table whose subgraph vector is empty.
        let mut b = Builder::new();
        let subgraphs = b.push_offset_vector(&[]);
        let mut model = TableBuilder::new();
        model.scalar_u32(crate::schema::MODEL_VERSION, 3);
        model.offset(crate::schema::MODEL_SUBGRAPHS, subgraphs);
        let root = model.finish(&mut b);
        let f = write_temp(&b.finish(root, b"TFL3"));
        match ModelFile::open(f.path()) {
            Err(ModelError::Malformed(msg)) => assert!(msg.contains("no subgraphs")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_no_quantization_yields_none() {
        let mut mb = ModelBuilder::new();
        let input = mb.add_tensor("in", ElemType::F32, &[2, 3], None);
        mb.declare_input(input);
        mb.declare_output(input);
        let f = write_temp(&mb.build());
        let model = ModelFile::open(f.path()).unwrap();
        assert!(model.input_info()[0].quant.is_none());
        assert_eq!(model.input_info()[0].byte_size(), 24);
        assert_eq!(model.npu_op_count(), 0);
        assert!(model.command_stream().is_none());
    }
}
