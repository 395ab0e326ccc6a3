//! Synthetic model container construction.
//!
//! `Builder` is a minimal FlatBuffers writer and `ModelBuilder` assembles
//! whole containers from tensor and operator declarations. Real models come
//! out of the compiler toolchain; these exist so tests and fixtures can make
//! small, valid containers without shipping binary blobs.
//!
//! FlatBuffers files are written back to front: referenced data (strings,
//! vectors, sub-tables) must sit at higher file positions than the tables
//! referencing it, so the builder grows a reversed byte stack and prepends
//! each finished element. A `Ref` records an element's distance from the
//! end of the file, which is all the uoffset arithmetic needs.

use nr_tensor::{ElemType, QuantParams};

use crate::reader::NPU_CUSTOM_OP;
use crate::schema;

/// Handle to an element already written into a `Builder`, measured as the
/// distance from the element's start to the end of the finished file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ref(usize);

/// Back-to-front FlatBuffers writer.
pub struct Builder {
    // File contents in reverse byte order; push = prepend to the file.
    data: Vec<u8>,
    max_align: usize,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            data: Vec::new(),
            max_align: 4,
        }
    }

    fn push_rev(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().rev());
    }

    fn push_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    fn push_u32(&mut self, v: u32) {
        self.push_rev(&v.to_le_bytes());
    }

    fn push_i32(&mut self, v: i32) {
        self.push_rev(&v.to_le_bytes());
    }

    fn pad(&mut self, n: usize) {
        self.data.resize(self.data.len() + n, 0);
    }

    /// Pad so that once `payload` more bytes are pushed, the cursor sits on
    /// an `align` boundary relative to the end of the file. `finish` pads
    /// the file head to `max_align`, which turns these end-relative
    /// boundaries into absolute ones.
    fn align_for(&mut self, payload: usize, align: usize) {
        self.max_align = self.max_align.max(align);
        let rem = (self.data.len() + payload) % align;
        if rem != 0 {
            self.pad(align - rem);
        }
    }

    fn here(&self) -> Ref {
        Ref(self.data.len())
    }

    fn push_uoffset(&mut self, target: Ref) {
        let val = (self.data.len() + 4 - target.0) as u32;
        self.push_u32(val);
    }

    /// Write a string (u32 length, bytes, nul terminator).
    pub fn push_string(&mut self, s: &str) -> Ref {
        self.align_for(s.len() + 1 + 4, 4);
        self.push_u8(0);
        self.push_rev(s.as_bytes());
        self.push_u32(s.len() as u32);
        self.here()
    }

    /// Write a vector of raw bytes.
    pub fn push_bytes_vector(&mut self, bytes: &[u8]) -> Ref {
        self.align_for(bytes.len() + 4, 4);
        self.push_rev(bytes);
        self.push_u32(bytes.len() as u32);
        self.here()
    }

    pub fn push_i32_vector(&mut self, values: &[i32]) -> Ref {
        self.align_for(4 * values.len(), 4);
        for v in values.iter().rev() {
            self.push_i32(*v);
        }
        self.push_u32(values.len() as u32);
        self.here()
    }

    pub fn push_f32_vector(&mut self, values: &[f32]) -> Ref {
        self.align_for(4 * values.len(), 4);
        for v in values.iter().rev() {
            self.push_rev(&v.to_le_bytes());
        }
        self.push_u32(values.len() as u32);
        self.here()
    }

    pub fn push_i64_vector(&mut self, values: &[i64]) -> Ref {
        self.align_for(8 * values.len(), 8);
        for v in values.iter().rev() {
            self.push_rev(&v.to_le_bytes());
        }
        self.push_u32(values.len() as u32);
        self.here()
    }

    /// Write a vector of uoffsets to previously written elements.
    pub fn push_offset_vector(&mut self, targets: &[Ref]) -> Ref {
        self.align_for(0, 4);
        for t in targets.iter().rev() {
            self.push_uoffset(*t);
        }
        self.push_u32(targets.len() as u32);
        self.here()
    }

    /// Seal the file: pad the head so the total size lands on the largest
    /// alignment used, then write the identifier and the root uoffset.
    pub fn finish(mut self, root: Ref, identifier: &[u8; 4]) -> Vec<u8> {
        let align = self.max_align;
        let rem = (self.data.len() + 8) % align;
        if rem != 0 {
            self.pad(align - rem);
        }
        self.push_rev(identifier);
        self.push_uoffset(root);
        self.data.reverse();
        self.data
    }
}

/// Accumulates one table's inline fields, then writes the table and its
/// vtable into a `Builder`.
pub struct TableBuilder {
    // (field id, field offset from table start) pairs for the vtable.
    slots: Vec<(u16, u16)>,
    // Inline field area in forward layout, excluding the leading soffset.
    area: Vec<u8>,
    // uoffset fields to patch once the table position is known.
    patches: Vec<(usize, Ref)>,
}

impl TableBuilder {
    pub fn new() -> Self {
        TableBuilder {
            slots: Vec::new(),
            area: Vec::new(),
            patches: Vec::new(),
        }
    }

    fn place(&mut self, id: u16, align: usize) {
        while (4 + self.area.len()) % align != 0 {
            self.area.push(0);
        }
        self.slots.push((id, (4 + self.area.len()) as u16));
    }

    pub fn scalar_i8(&mut self, id: u16, v: i8) {
        self.place(id, 1);
        self.area.push(v as u8);
    }

    pub fn scalar_u32(&mut self, id: u16, v: u32) {
        self.place(id, 4);
        self.area.extend_from_slice(&v.to_le_bytes());
    }

    pub fn scalar_i32(&mut self, id: u16, v: i32) {
        self.place(id, 4);
        self.area.extend_from_slice(&v.to_le_bytes());
    }

    pub fn offset(&mut self, id: u16, target: Ref) {
        self.place(id, 4);
        self.patches.push((self.area.len(), target));
        self.area.extend_from_slice(&[0u8; 4]);
    }

    /// Write the table (vtable immediately before it) and return its `Ref`.
    pub fn finish(self, b: &mut Builder) -> Ref {
        let vt_count = self
            .slots
            .iter()
            .map(|(id, _)| *id as usize + 1)
            .max()
            .unwrap_or(0);
        let vt_size = 4 + 2 * vt_count;
        let table_size = 4 + self.area.len();

        b.align_for(table_size, 4);
        // Distance from the table's first byte to the end of the file,
        // fixed once padding is in place.
        let table_end_offset = b.data.len() + table_size;

        let mut area = self.area;
        for (off, target) in &self.patches {
            let field_end_offset = table_end_offset - (4 + *off);
            let val = (field_end_offset - target.0) as u32;
            area[*off..*off + 4].copy_from_slice(&val.to_le_bytes());
        }
        b.push_rev(&area);
        // soffset: the vtable sits immediately before the table.
        b.push_i32(vt_size as i32);
        let table = b.here();

        let mut vt = Vec::with_capacity(vt_size);
        vt.extend_from_slice(&(vt_size as u16).to_le_bytes());
        vt.extend_from_slice(&(table_size as u16).to_le_bytes());
        let mut voffsets = vec![0u16; vt_count];
        for (id, off) in &self.slots {
            voffsets[*id as usize] = *off;
        }
        for v in voffsets {
            vt.extend_from_slice(&v.to_le_bytes());
        }
        b.push_rev(&vt);
        table
    }
}

struct TensorDecl {
    name: String,
    type_code: i8,
    dims: Vec<i32>,
    buffer: u32,
    quant: Option<QuantParams>,
}

struct OperatorDecl {
    opcode: u32,
    inputs: Vec<i32>,
    outputs: Vec<i32>,
}

struct OpcodeDecl {
    custom: Option<String>,
    builtin: i32,
}

/// Declarative assembly of a single-subgraph model container.
pub struct ModelBuilder {
    version: u32,
    description: Option<String>,
    opcodes: Vec<OpcodeDecl>,
    operators: Vec<OperatorDecl>,
    tensors: Vec<TensorDecl>,
    inputs: Vec<i32>,
    outputs: Vec<i32>,
    // Buffer 0 stays empty; variable tensors point at it.
    buffers: Vec<Vec<u8>>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        ModelBuilder {
            version: schema::SCHEMA_VERSION,
            description: None,
            opcodes: Vec::new(),
            operators: Vec::new(),
            tensors: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            buffers: vec![Vec::new()],
        }
    }

    /// Override the schema version written to the container.
    pub fn version(&mut self, version: u32) -> &mut Self {
        self.version = version;
        self
    }

    pub fn description(&mut self, text: &str) -> &mut Self {
        self.description = Some(text.to_string());
        self
    }

    /// Add a constant data buffer, returning its buffer index.
    pub fn add_buffer(&mut self, data: &[u8]) -> u32 {
        self.buffers.push(data.to_vec());
        (self.buffers.len() - 1) as u32
    }

    /// Add a variable tensor (backed by the empty buffer), returning its
    /// tensor index.
    pub fn add_tensor(
        &mut self,
        name: &str,
        elem_type: ElemType,
        dims: &[i32],
        quant: Option<QuantParams>,
    ) -> i32 {
        self.add_tensor_with_type_code(name, elem_type.type_code(), dims, quant)
    }

    /// Add a tensor with a raw type code. Codes outside the supported set
    /// produce a container that readers must reject; fixtures use this to
    /// exercise that path.
    pub fn add_tensor_with_type_code(
        &mut self,
        name: &str,
        type_code: i8,
        dims: &[i32],
        quant: Option<QuantParams>,
    ) -> i32 {
        self.tensors.push(TensorDecl {
            name: name.to_string(),
            type_code,
            dims: dims.to_vec(),
            buffer: 0,
            quant,
        });
        (self.tensors.len() - 1) as i32
    }

    /// Add a tensor backed by a new constant buffer holding `data`.
    pub fn add_const_tensor(
        &mut self,
        name: &str,
        elem_type: ElemType,
        dims: &[i32],
        quant: Option<QuantParams>,
        data: &[u8],
    ) -> i32 {
        let buffer = self.add_buffer(data);
        self.tensors.push(TensorDecl {
            name: name.to_string(),
            type_code: elem_type.type_code(),
            dims: dims.to_vec(),
            buffer,
            quant,
        });
        (self.tensors.len() - 1) as i32
    }

    /// Mark a tensor as a subgraph input.
    pub fn declare_input(&mut self, tensor: i32) -> &mut Self {
        self.inputs.push(tensor);
        self
    }

    /// Mark a tensor as a subgraph output.
    pub fn declare_output(&mut self, tensor: i32) -> &mut Self {
        self.outputs.push(tensor);
        self
    }

    /// Add an accelerator custom operator over the given tensors, creating
    /// the custom opcode entry on first use.
    pub fn add_npu_operator(&mut self, inputs: &[i32], outputs: &[i32]) -> &mut Self {
        let opcode = match self
            .opcodes
            .iter()
            .position(|c| c.custom.as_deref() == Some(NPU_CUSTOM_OP))
        {
            Some(i) => i as u32,
            None => {
                self.opcodes.push(OpcodeDecl {
                    custom: Some(NPU_CUSTOM_OP.to_string()),
                    builtin: schema::BUILTIN_CUSTOM,
                });
                (self.opcodes.len() - 1) as u32
            }
        };
        self.operators.push(OperatorDecl {
            opcode,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
        });
        self
    }

    /// Serialize the container.
    pub fn build(&self) -> Vec<u8> {
        let mut b = Builder::new();

        let buffer_refs: Vec<Ref> = self
            .buffers
            .iter()
            .map(|data| {
                let mut t = TableBuilder::new();
                if !data.is_empty() {
                    let bytes = b.push_bytes_vector(data);
                    t.offset(schema::BUFFER_DATA, bytes);
                }
                t.finish(&mut b)
            })
            .collect();
        let buffers = b.push_offset_vector(&buffer_refs);

        let opcode_refs: Vec<Ref> = self
            .opcodes
            .iter()
            .map(|c| {
                let custom = c.custom.as_ref().map(|s| b.push_string(s));
                let mut t = TableBuilder::new();
                t.scalar_i8(
                    schema::OPCODE_DEPRECATED_BUILTIN,
                    c.builtin.clamp(i8::MIN as i32, i8::MAX as i32) as i8,
                );
                if let Some(r) = custom {
                    t.offset(schema::OPCODE_CUSTOM_CODE, r);
                }
                t.scalar_i32(schema::OPCODE_BUILTIN, c.builtin);
                t.finish(&mut b)
            })
            .collect();
        let operator_codes = b.push_offset_vector(&opcode_refs);

        let tensor_refs: Vec<Ref> = self
            .tensors
            .iter()
            .map(|d| {
                let shape = b.push_i32_vector(&d.dims);
                let name = b.push_string(&d.name);
                let quant = d.quant.map(|q| {
                    let scale = b.push_f32_vector(&[q.scale]);
                    let zero_point = b.push_i64_vector(&[q.zero_point]);
                    let mut t = TableBuilder::new();
                    t.offset(schema::QUANT_SCALE, scale);
                    t.offset(schema::QUANT_ZERO_POINT, zero_point);
                    t.finish(&mut b)
                });
                let mut t = TableBuilder::new();
                t.offset(schema::TENSOR_SHAPE, shape);
                t.scalar_i8(schema::TENSOR_TYPE, d.type_code);
                t.scalar_u32(schema::TENSOR_BUFFER, d.buffer);
                t.offset(schema::TENSOR_NAME, name);
                if let Some(q) = quant {
                    t.offset(schema::TENSOR_QUANTIZATION, q);
                }
                t.finish(&mut b)
            })
            .collect();
        let tensors = b.push_offset_vector(&tensor_refs);

        let operator_refs: Vec<Ref> = self
            .operators
            .iter()
            .map(|op| {
                let inputs = b.push_i32_vector(&op.inputs);
                let outputs = b.push_i32_vector(&op.outputs);
                let mut t = TableBuilder::new();
                t.scalar_u32(schema::OP_OPCODE_INDEX, op.opcode);
                t.offset(schema::OP_INPUTS, inputs);
                t.offset(schema::OP_OUTPUTS, outputs);
                t.finish(&mut b)
            })
            .collect();
        let operators = b.push_offset_vector(&operator_refs);

        let sg_inputs = b.push_i32_vector(&self.inputs);
        let sg_outputs = b.push_i32_vector(&self.outputs);
        let mut sg = TableBuilder::new();
        sg.offset(schema::SUBGRAPH_TENSORS, tensors);
        sg.offset(schema::SUBGRAPH_INPUTS, sg_inputs);
        sg.offset(schema::SUBGRAPH_OUTPUTS, sg_outputs);
        sg.offset(schema::SUBGRAPH_OPERATORS, operators);
        let subgraph = sg.finish(&mut b);
        let subgraphs = b.push_offset_vector(&[subgraph]);

        let description = self.description.as_ref().map(|s| b.push_string(s));

        let mut model = TableBuilder::new();
        model.scalar_u32(schema::MODEL_VERSION, self.version);
        model.offset(schema::MODEL_OPERATOR_CODES, operator_codes);
        model.offset(schema::MODEL_SUBGRAPHS, subgraphs);
        if let Some(d) = description {
            model.offset(schema::MODEL_DESCRIPTION, d);
        }
        model.offset(schema::MODEL_BUFFERS, buffers);
        let root = model.finish(&mut b);

        b.finish(root, schema::FILE_IDENTIFIER)
    }
}

/// Build a quantized image classifier container: a uint8 NHWC input
/// `[1, 224, 224, 3]`, a uint8 output `[1, classes]` with the usual softmax
/// quantization (scale 1/255, zero point 0), and one accelerator operator
/// carrying a synthetic command stream.
pub fn quantized_classifier(classes: usize) -> Vec<u8> {
    let mut mb = ModelBuilder::new();
    mb.description("synthetic quantized classifier");
    let input = mb.add_tensor(
        "input",
        ElemType::U8,
        &[1, 224, 224, 3],
        Some(QuantParams::new(1.0 / 128.0, 128)),
    );
    let output = mb.add_tensor(
        "output",
        ElemType::U8,
        &[1, classes as i32],
        Some(QuantParams::new(1.0 / 255.0, 0)),
    );
    let mut stream = vec![0u8; 32];
    stream[..4].copy_from_slice(b"COP1");
    let cms = mb.add_const_tensor("_command_stream", ElemType::U8, &[32], None, &stream);
    let flash = mb.add_const_tensor("_flash", ElemType::U8, &[16], None, &[0u8; 16]);
    mb.declare_input(input);
    mb.declare_output(output);
    mb.add_npu_operator(&[cms, flash, input], &[output]);
    mb.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatbuf::FlatBuffer;

    #[test]
    fn test_tiny_table_round_trip() {
        let mut b = Builder::new();
        let s = b.push_string("ab");
        let mut t = TableBuilder::new();
        t.scalar_u32(0, 7);
        t.offset(1, s);
        let root = t.finish(&mut b);
        let bytes = b.finish(root, b"TFL3");

        assert_eq!(&bytes[4..8], b"TFL3");
        let fb = FlatBuffer::new(&bytes);
        let root = fb.root_table().unwrap();
        assert_eq!(fb.table_u32(root, 0, 0).unwrap(), 7);
        assert_eq!(fb.table_string(root, 1).unwrap(), Some("ab"));
        // Absent field falls back to the caller's default.
        assert_eq!(fb.table_u32(root, 2, 42).unwrap(), 42);
    }

    #[test]
    fn test_empty_table() {
        let mut b = Builder::new();
        let root = TableBuilder::new().finish(&mut b);
        let bytes = b.finish(root, b"TFL3");
        let fb = FlatBuffer::new(&bytes);
        let root = fb.root_table().unwrap();
        assert_eq!(fb.table_i8(root, 0, -1).unwrap(), -1);
        assert!(fb.table_string(root, 3).unwrap().is_none());
    }

    #[test]
    fn test_vectors_round_trip() {
        let mut b = Builder::new();
        let v32 = b.push_i32_vector(&[1, -2, 3]);
        let v64 = b.push_i64_vector(&[-9, 1 << 40]);
        let vf = b.push_f32_vector(&[0.5]);
        let raw = b.push_bytes_vector(b"xyz");
        let mut t = TableBuilder::new();
        t.offset(0, v32);
        t.offset(1, v64);
        t.offset(2, vf);
        t.offset(3, raw);
        let root = t.finish(&mut b);
        let bytes = b.finish(root, b"TFL3");

        // An i64 vector forces 8-byte total alignment.
        assert_eq!(bytes.len() % 8, 0);

        let fb = FlatBuffer::new(&bytes);
        let root = fb.root_table().unwrap();
        let v = fb.table_vector(root, 0, 4).unwrap().unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(fb.vector_i32(v, 0).unwrap(), 1);
        assert_eq!(fb.vector_i32(v, 1).unwrap(), -2);
        let v = fb.table_vector(root, 1, 8).unwrap().unwrap();
        assert_eq!(fb.vector_i64(v, 1).unwrap(), 1 << 40);
        let v = fb.table_vector(root, 2, 4).unwrap().unwrap();
        assert_eq!(fb.vector_f32(v, 0).unwrap(), 0.5);
        let v = fb.table_vector(root, 3, 1).unwrap().unwrap();
        assert_eq!(fb.vector_bytes(v).unwrap(), b"xyz");
    }

    #[test]
    fn test_table_vector_indirection() {
        let mut b = Builder::new();
        let mut inner = TableBuilder::new();
        inner.scalar_i32(0, -5);
        let inner = inner.finish(&mut b);
        let vec_ref = b.push_offset_vector(&[inner, inner]);
        let mut outer = TableBuilder::new();
        outer.offset(0, vec_ref);
        let root = outer.finish(&mut b);
        let bytes = b.finish(root, b"TFL3");

        let fb = FlatBuffer::new(&bytes);
        let root = fb.root_table().unwrap();
        let v = fb.table_vector(root, 0, 4).unwrap().unwrap();
        assert_eq!(v.len(), 2);
        for i in 0..2 {
            let t = fb.vector_table(v, i).unwrap();
            assert_eq!(fb.table_i32(t, 0, 0).unwrap(), -5);
        }
    }

    #[test]
    fn test_mixed_inline_field_alignment() {
        // An i8 field followed by a u32 field must leave the u32 4-aligned
        // within the table.
        let mut b = Builder::new();
        let mut t = TableBuilder::new();
        t.scalar_i8(0, 3);
        t.scalar_u32(1, 0xAABBCCDD);
        let root = t.finish(&mut b);
        let bytes = b.finish(root, b"TFL3");

        let fb = FlatBuffer::new(&bytes);
        let root = fb.root_table().unwrap();
        assert_eq!(fb.table_i8(root, 0, 0).unwrap(), 3);
        assert_eq!(fb.table_u32(root, 1, 0).unwrap(), 0xAABBCCDD);
    }
}
