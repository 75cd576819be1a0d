use crate::Result;
use image::{codecs::jpeg::JpegEncoder, io::Reader, ColorType, ImageFormat, RgbImage};
use std::io::Cursor;

/// Compresses `image` as a baseline JPEG with the given quality (1 to 100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Reads the pixel dimensions from a JPEG stream without decoding it.
pub fn jpeg_dimensions(jpeg: &[u8]) -> Result<(u32, u32)> {
    let mut reader = Reader::new(Cursor::new(jpeg));
    reader.set_format(ImageFormat::Jpeg);
    Ok(reader.into_dimensions()?)
}
