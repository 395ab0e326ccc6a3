/// Per-tensor affine quantization parameters.
///
/// A quantized value `q` maps to the real value `scale * (q - zero_point)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i64,
}

impl QuantParams {
    pub fn new(scale: f32, zero_point: i64) -> Self {
        QuantParams { scale, zero_point }
    }

    /// Dequantize a single raw value.
    pub fn dequantize(&self, q: f64) -> f32 {
        (self.scale as f64 * (q - self.zero_point as f64)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dequantize_u8_softmax() {
        // The common uint8 softmax output quantization.
        let q = QuantParams::new(1.0 / 255.0, 0);
        assert_relative_eq!(q.dequantize(0.0), 0.0);
        assert_relative_eq!(q.dequantize(255.0), 1.0);
        assert_relative_eq!(q.dequantize(128.0), 128.0 / 255.0);
    }

    #[test]
    fn test_dequantize_i8() {
        let q = QuantParams::new(0.5, -4);
        assert_relative_eq!(q.dequantize(-4.0), 0.0);
        assert_relative_eq!(q.dequantize(6.0), 5.0);
        assert_relative_eq!(q.dequantize(-10.0), -3.0);
    }
}
