use crate::{CapturedImage, DecodeError, PixelFormat};
use image::{Rgb, RgbImage};

/// Converts a raw capture buffer into an RGB image.
///
/// YUV buffers are converted with the full-range BT.601 coefficients used by JFIF. Chroma planes
/// are half the luma resolution, rounded up, with half the luma stride (rounded up).
pub fn decode(image: &CapturedImage) -> Result<RgbImage, DecodeError> {
    let (width, height) = (image.width as usize, image.height as usize);
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroSized);
    }
    if image.data.is_empty() {
        return Err(DecodeError::MissingImage);
    }
    let stride = image.stride() as usize;
    if stride < width {
        return Err(DecodeError::Unsupported(format!(
            "stride of {} pixels for an image {} pixels wide",
            stride, width
        )));
    }
    let expected = required_len(image.format, stride, height).ok_or_else(|| {
        DecodeError::Unsupported(format!(
            "image of {}x{} pixels with a stride of {} is too large",
            width, height, stride
        ))
    })?;
    if image.data.len() < expected {
        return Err(DecodeError::BufferTooSmall {
            expected,
            actual: image.data.len(),
        });
    }

    let data = &image.data;
    let luma_len = stride * height;
    let chroma_stride = (stride + 1) / 2;
    let chroma_rows = (height + 1) / 2;
    let pixel = |x: usize, y: usize| -> Rgb<u8> {
        match image.format {
            PixelFormat::Nv21 => {
                let vu = luma_len + (y / 2) * 2 * chroma_stride + (x / 2) * 2;
                ycbcr_to_rgb(data[y * stride + x], data[vu + 1], data[vu])
            }
            PixelFormat::Yv12 => {
                let v = luma_len + (y / 2) * chroma_stride + x / 2;
                let u = v + chroma_stride * chroma_rows;
                ycbcr_to_rgb(data[y * stride + x], data[u], data[v])
            }
            PixelFormat::Rgba8888Swizzled => {
                let p = &data[(y * stride + x) * 4..][..4];
                Rgb([p[3], p[1], p[2]])
            }
        }
    };
    Ok(RgbImage::from_fn(image.width, image.height, |x, y| {
        pixel(x as usize, y as usize)
    }))
}

/// The number of bytes a buffer of this format and geometry must hold, or `None` if that does not
/// fit in a `usize`.
pub fn required_len(format: PixelFormat, stride: usize, height: usize) -> Option<usize> {
    let luma = stride.checked_mul(height)?;
    match format {
        PixelFormat::Nv21 | PixelFormat::Yv12 => {
            let chroma = (stride / 2 + stride % 2).checked_mul(height / 2 + height % 2)?;
            luma.checked_add(chroma.checked_mul(2)?)
        }
        PixelFormat::Rgba8888Swizzled => luma.checked_mul(4),
    }
}

fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> Rgb<u8> {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let clamp = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    Rgb([
        clamp(y + 1.402 * cr),
        clamp(y - 0.344_136 * cb - 0.714_136 * cr),
        clamp(y + 1.772 * cb),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> CapturedImage {
        CapturedImage {
            data,
            format,
            width,
            height,
            stride: None,
            timestamp: 0.0,
        }
    }

    #[test]
    fn neutral_chroma_is_gray() {
        // 2x2 luma, one V/U pair.
        let image = captured(PixelFormat::Nv21, 2, 2, vec![0, 64, 128, 255, 128, 128]);
        let rgb = decode(&image).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([64, 64, 64]));
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn nv21_orders_v_before_u() {
        // Strong red: Cr high, Cb low.
        let image = captured(PixelFormat::Nv21, 2, 2, vec![76, 76, 76, 76, 255, 85]);
        let red = *decode(&image).unwrap().get_pixel(0, 0);
        assert!(red[0] > 240 && red[1] < 20 && red[2] < 20, "{:?}", red);

        let image = captured(PixelFormat::Yv12, 2, 2, vec![76, 76, 76, 76, 255, 85]);
        let yv12 = *decode(&image).unwrap().get_pixel(0, 0);
        assert_eq!(red, yv12);
    }

    #[test]
    fn swizzled_rgba_swaps_first_and_last_byte() {
        let image = captured(PixelFormat::Rgba8888Swizzled, 1, 1, vec![255, 20, 30, 10]);
        assert_eq!(decode(&image).unwrap().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn stride_skips_padding() {
        let mut image = captured(
            PixelFormat::Rgba8888Swizzled,
            1,
            2,
            vec![0, 1, 1, 1, 9, 9, 9, 9, 0, 2, 2, 2, 9, 9, 9, 9],
        );
        image.stride = Some(2);
        let rgb = decode(&image).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([1, 1, 1]));
        assert_eq!(rgb.get_pixel(0, 1), &Rgb([2, 2, 2]));
    }

    #[test]
    fn odd_geometry_rounds_chroma_up() {
        assert_eq!(required_len(PixelFormat::Yv12, 3, 3), Some(9 + 2 * 2 * 2));
        let image = captured(PixelFormat::Yv12, 3, 3, vec![128; 17]);
        assert!(decode(&image).is_ok());
    }

    #[test]
    fn rejects_bad_buffers() {
        assert_eq!(
            decode(&captured(PixelFormat::Nv21, 4, 4, vec![0; 10])),
            Err(DecodeError::BufferTooSmall {
                expected: 24,
                actual: 10
            })
        );
        assert_eq!(
            decode(&captured(PixelFormat::Nv21, 0, 4, vec![0; 10])),
            Err(DecodeError::ZeroSized)
        );
        assert_eq!(
            decode(&captured(PixelFormat::Nv21, 2, 2, vec![])),
            Err(DecodeError::MissingImage)
        );
    }

    #[test]
    fn oversized_geometry_is_rejected() {
        let huge = 1u32 << 31;
        for format in [PixelFormat::Rgba8888Swizzled, PixelFormat::Nv21, PixelFormat::Yv12] {
            let result = decode(&captured(format, huge, huge, vec![0; 8]));
            assert!(
                matches!(
                    result,
                    Err(DecodeError::Unsupported(_)) | Err(DecodeError::BufferTooSmall { .. })
                ),
                "{:?}",
                result.map(|image| image.dimensions())
            );
        }
        assert_eq!(required_len(PixelFormat::Rgba8888Swizzled, usize::MAX, 2), None);
        assert_eq!(required_len(PixelFormat::Nv21, usize::MAX / 2, 2), None);
    }
}
