use std::fmt;

use nr_tensor::{ElemType, QuantParams, Shape};

/// Descriptor for one model input or output tensor.
///
/// `index` is the tensor's position within the model's input or output list,
/// which is also the slot index used to bind or read it at run time.
#[derive(Debug, Clone)]
pub struct TensorInfo {
    pub index: usize,
    pub name: Option<String>,
    pub elem_type: ElemType,
    pub shape: Shape,
    pub quant: Option<QuantParams>,
}

impl TensorInfo {
    /// Size in bytes of a densely packed tensor with this descriptor.
    pub fn byte_size(&self) -> usize {
        self.shape.numel() * self.elem_type.size_in_bytes()
    }
}

impl fmt::Display for TensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.index, self.elem_type, self.shape)?;
        if let Some(q) = self.quant {
            write!(f, " scale={} zero_point={}", q.scale, q.zero_point)?;
        }
        if let Some(name) = &self.name {
            write!(f, " \"{}\"", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size() {
        let info = TensorInfo {
            index: 0,
            name: None,
            elem_type: ElemType::U8,
            shape: Shape::new(vec![1, 224, 224, 3]),
            quant: None,
        };
        assert_eq!(info.byte_size(), 150_528);

        let info = TensorInfo {
            index: 1,
            name: None,
            elem_type: ElemType::F32,
            shape: Shape::new(vec![1, 1001]),
            quant: None,
        };
        assert_eq!(info.byte_size(), 4004);
    }

    #[test]
    fn test_display() {
        let info = TensorInfo {
            index: 0,
            name: Some("input".to_string()),
            elem_type: ElemType::U8,
            shape: Shape::new(vec![1, 224, 224, 3]),
            quant: Some(QuantParams::new(0.5, 128)),
        };
        let line = info.to_string();
        assert!(line.starts_with("0: uint8 [1, 224, 224, 3]"));
        assert!(line.contains("scale=0.5 zero_point=128"));
        assert!(line.ends_with("\"input\""));
    }
}
