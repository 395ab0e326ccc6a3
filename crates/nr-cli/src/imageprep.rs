//! Image loading and conversion to model input bytes.

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::imageops::FilterType;

use nr_model::TensorInfo;
use nr_tensor::ElemType;

/// Load an image and convert it to the raw bytes the input descriptor wants.
///
/// The image is resized to the descriptor's height and width and flattened
/// to NHWC RGB. Unsigned 8-bit inputs take the pixels as they are; signed
/// 8-bit inputs are recentered through the descriptor's zero point.
pub fn prepare(path: &Path, info: &TensorInfo) -> Result<Vec<u8>> {
    let dims = info.shape.dims();
    if dims.len() != 4 {
        bail!("input tensor must be NHWC, got shape {}", info.shape);
    }
    if dims[0] != 1 {
        bail!("input tensor must have batch size 1, got {}", dims[0]);
    }
    if dims[3] != 3 {
        bail!("input tensor must have 3 channels, got {}", dims[3]);
    }
    let height = dims[1] as u32;
    let width = dims[2] as u32;

    let img = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?;
    let pixels = img
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8()
        .into_raw();

    match info.elem_type {
        ElemType::U8 => Ok(pixels),
        ElemType::I8 => {
            // Without quantization parameters, assume the usual full-range
            // zero point of -128.
            let zero_point = info.quant.map_or(-128, |q| q.zero_point);
            Ok(pixels
                .iter()
                .map(|&p| (i64::from(p) + zero_point).clamp(-128, 127) as i8 as u8)
                .collect())
        }
        other => bail!("unsupported input element type {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nr_tensor::{QuantParams, Shape};

    fn save_test_image(dir: &Path, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join("test.bmp");
        let img = image::ImageBuffer::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 200u8])
        });
        img.save(&path).unwrap();
        path
    }

    fn u8_info(dims: &[usize]) -> TensorInfo {
        TensorInfo {
            index: 0,
            name: None,
            elem_type: ElemType::U8,
            shape: Shape::from_slice(dims),
            quant: None,
        }
    }

    #[test]
    fn test_prepare_resizes_to_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_test_image(dir.path(), 64, 48);
        let data = prepare(&path, &u8_info(&[1, 224, 224, 3])).unwrap();
        assert_eq!(data.len(), 224 * 224 * 3);
    }

    #[test]
    fn test_prepare_i8_recenters_through_zero_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.bmp");
        // A uniform image makes every output byte predictable.
        let img = image::ImageBuffer::from_pixel(8, 8, image::Rgb([200u8, 200, 200]));
        img.save(&path).unwrap();

        let info = TensorInfo {
            index: 0,
            name: None,
            elem_type: ElemType::I8,
            shape: Shape::from_slice(&[1, 8, 8, 3]),
            quant: Some(QuantParams::new(1.0 / 255.0, -128)),
        };
        let data = prepare(&path, &info).unwrap();
        assert_eq!(data.len(), 8 * 8 * 3);
        // 200 - 128 = 72 for every channel.
        assert!(data.iter().all(|&b| b as i8 == 72));
    }

    #[test]
    fn test_prepare_rejects_wrong_rank() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_test_image(dir.path(), 8, 8);
        let err = prepare(&path, &u8_info(&[224, 224, 3])).unwrap_err();
        assert!(err.to_string().contains("NHWC"));
    }

    #[test]
    fn test_prepare_rejects_batched_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_test_image(dir.path(), 8, 8);
        let err = prepare(&path, &u8_info(&[2, 224, 224, 3])).unwrap_err();
        assert!(err.to_string().contains("batch size 1"));
    }

    #[test]
    fn test_prepare_rejects_missing_image() {
        let err = prepare(Path::new("/no/such.bmp"), &u8_info(&[1, 8, 8, 3])).unwrap_err();
        assert!(err.to_string().contains("failed to open image"));
    }
}
