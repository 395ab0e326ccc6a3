use std::fmt;

/// Element types a model container can declare for an I/O tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    /// 32-bit floating point.
    F32,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 32-bit signed integer.
    I32,
    /// 8-bit unsigned integer (the common quantized image input/output type).
    U8,
    /// 64-bit signed integer.
    I64,
    /// Boolean, stored one byte per element.
    Bool,
    /// 16-bit signed integer.
    I16,
    /// 8-bit signed integer.
    I8,
}

impl ElemType {
    /// Converts a container type code to an `ElemType`.
    ///
    /// Type codes:
    /// - 0 => F32
    /// - 1 => F16
    /// - 2 => I32
    /// - 3 => U8
    /// - 4 => I64
    /// - 6 => Bool
    /// - 7 => I16
    /// - 9 => I8
    ///
    /// Codes for string, complex, and other exotic types map to `None`.
    pub fn from_type_code(code: i8) -> Option<ElemType> {
        match code {
            0 => Some(ElemType::F32),
            1 => Some(ElemType::F16),
            2 => Some(ElemType::I32),
            3 => Some(ElemType::U8),
            4 => Some(ElemType::I64),
            6 => Some(ElemType::Bool),
            7 => Some(ElemType::I16),
            9 => Some(ElemType::I8),
            _ => None,
        }
    }

    /// Returns the container type code for this `ElemType`.
    pub fn type_code(&self) -> i8 {
        match self {
            ElemType::F32 => 0,
            ElemType::F16 => 1,
            ElemType::I32 => 2,
            ElemType::U8 => 3,
            ElemType::I64 => 4,
            ElemType::Bool => 6,
            ElemType::I16 => 7,
            ElemType::I8 => 9,
        }
    }

    /// Returns the size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElemType::F32 | ElemType::I32 => 4,
            ElemType::F16 | ElemType::I16 => 2,
            ElemType::U8 | ElemType::I8 | ElemType::Bool => 1,
            ElemType::I64 => 8,
        }
    }

    /// Returns true for the integer types (quantized tensors use these).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ElemType::I32 | ElemType::U8 | ElemType::I64 | ElemType::I16 | ElemType::I8
        )
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElemType::F32 => write!(f, "float32"),
            ElemType::F16 => write!(f, "float16"),
            ElemType::I32 => write!(f, "int32"),
            ElemType::U8 => write!(f, "uint8"),
            ElemType::I64 => write!(f, "int64"),
            ElemType::Bool => write!(f, "bool"),
            ElemType::I16 => write!(f, "int16"),
            ElemType::I8 => write!(f, "int8"),
        }
    }
}
