use crate::elem_type::ElemType;
use crate::error::{Result, TensorError};
use crate::quant::QuantParams;
use crate::shape::Shape;

/// A borrowed, typed view over raw tensor bytes.
///
/// The view does not own the bytes; it carries the element type, shape, and
/// optional quantization parameters needed to interpret them. Byte length is
/// validated against the shape at construction, so accessors cannot run past
/// the end of the slice.
#[derive(Debug, Clone)]
pub struct TensorView<'a> {
    elem_type: ElemType,
    shape: Shape,
    quant: Option<QuantParams>,
    bytes: &'a [u8],
}

impl<'a> TensorView<'a> {
    /// Create a view, validating that `bytes` holds exactly
    /// `numel * size_in_bytes` bytes for `shape`.
    pub fn new(
        elem_type: ElemType,
        shape: Shape,
        quant: Option<QuantParams>,
        bytes: &'a [u8],
    ) -> Result<TensorView<'a>> {
        let expected = shape
            .dims()
            .iter()
            .try_fold(elem_type.size_in_bytes(), |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| TensorError::Other("tensor byte size overflows usize".to_string()))?;
        if bytes.len() != expected {
            return Err(TensorError::ByteLengthMismatch {
                shape: shape.dims().to_vec(),
                elem_type: elem_type.to_string(),
                expected,
                got: bytes.len(),
            });
        }
        Ok(TensorView {
            elem_type,
            shape,
            quant,
            bytes,
        })
    }

    /// Convenience constructor for uint8 tensors.
    pub fn from_u8(
        shape: Shape,
        quant: Option<QuantParams>,
        bytes: &'a [u8],
    ) -> Result<TensorView<'a>> {
        TensorView::new(ElemType::U8, shape, quant, bytes)
    }

    pub fn elem_type(&self) -> ElemType {
        self.elem_type
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn quant(&self) -> Option<QuantParams> {
        self.quant
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decode the raw bytes to f32 values in element order.
    ///
    /// Integer types are dequantized through the view's `QuantParams` when
    /// present; float types are converted directly and booleans decode to
    /// 0.0 / 1.0.
    pub fn to_f32(&self) -> Vec<f32> {
        let dequant = |q: f64| -> f32 {
            match self.quant {
                Some(params) => params.dequantize(q),
                None => q as f32,
            }
        };

        match self.elem_type {
            ElemType::F32 => self
                .bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            ElemType::F16 => self
                .bytes
                .chunks_exact(2)
                .map(|c| half::f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            ElemType::I32 => self
                .bytes
                .chunks_exact(4)
                .map(|c| dequant(i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64))
                .collect(),
            ElemType::U8 => self.bytes.iter().map(|&b| dequant(b as f64)).collect(),
            ElemType::I64 => self
                .bytes
                .chunks_exact(8)
                .map(|c| {
                    let v = i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]);
                    dequant(v as f64)
                })
                .collect(),
            ElemType::Bool => self
                .bytes
                .iter()
                .map(|&b| if b != 0 { 1.0 } else { 0.0 })
                .collect(),
            ElemType::I16 => self
                .bytes
                .chunks_exact(2)
                .map(|c| dequant(i16::from_le_bytes([c[0], c[1]]) as f64))
                .collect(),
            ElemType::I8 => self.bytes.iter().map(|&b| dequant(b as i8 as f64)).collect(),
        }
    }
}
