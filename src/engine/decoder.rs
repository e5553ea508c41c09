// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), WebP (libwebp), rest via image crate.

use crate::engine::{ImageType, MAX_DIMENSION, MAX_PIXELS};
use crate::error::{PixelmillError, Result};
use image::{DynamicImage, ImageReader, RgbImage};
use img_parts::{jpeg::Jpeg, png::Png, ImageICC};
use mozjpeg::Decompress;
use std::io::Cursor;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Route JPEG to mozjpeg, WebP to libwebp, others to the image crate
/// - Return decoded image and detected format
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, ImageType)> {
    let detected = ImageType::detect(bytes);
    let img = match detected {
        ImageType::Jpeg => decode_jpeg_mozjpeg(bytes)?,
        ImageType::Webp => decode_webp_libwebp(bytes)?,
        _ => decode_with_image_crate(bytes)?,
    };
    Ok((img, detected))
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo), significantly faster
/// than the pure Rust decoder.
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<DynamicImage> {
    if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
        return Err(PixelmillError::decode_failed(
            "mozjpeg: missing JPEG EOI marker",
        ));
    }

    let decompress = Decompress::new_mem(data).map_err(|e| {
        PixelmillError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
    })?;

    let mut decompress = decompress.rgb().map_err(|e| {
        PixelmillError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
    })?;

    let width = decompress.width();
    let height = decompress.height();
    if width > MAX_DIMENSION as usize || height > MAX_DIMENSION as usize {
        return Err(PixelmillError::dimension_exceeds_limit(
            width.max(height) as u32,
            MAX_DIMENSION,
        ));
    }
    let width = width as u32;
    let height = height as u32;
    check_dimensions(width, height)?;

    let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
        PixelmillError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
    })?;
    let flat: Vec<u8> = pixels.into_iter().flatten().collect();

    let rgb = RgbImage::from_raw(width, height, flat).ok_or_else(|| {
        PixelmillError::decode_failed("mozjpeg: failed to create image from raw data")
    })?;
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Decode WebP using libwebp. Animated WebP falls back to the image crate,
/// which decodes the first frame.
pub fn decode_webp_libwebp(data: &[u8]) -> Result<DynamicImage> {
    // Parse the header first to avoid allocating huge buffers on malformed files
    let features = BitstreamFeatures::new(data).ok_or_else(|| {
        PixelmillError::decode_failed("webp: failed to read bitstream features")
    })?;

    if features.has_animation() {
        return image::load_from_memory(data).map_err(|e| {
            PixelmillError::decode_failed(format!("webp (animated) decode failed: {e}"))
        });
    }

    check_dimensions(features.width(), features.height())?;

    let decoded = WebPDecoder::new(data)
        .decode()
        .ok_or_else(|| PixelmillError::decode_failed("webp: decode failed"))?;
    check_dimensions(decoded.width(), decoded.height())?;

    Ok(decoded.to_image())
}

/// Decode any other supported container through the image crate.
pub fn decode_with_image_crate(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| PixelmillError::decode_failed(format!("decode failed: {e}")))
}

/// Check that image dimensions are within safe limits.
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PixelmillError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(PixelmillError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Inspect the container header and reject oversized images before any pixel
/// allocation. Headers that cannot be parsed are left for the decoder to
/// report on.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return check_dimensions(width, height);
        }
    }
    Ok(())
}

/// Extract the EXIF Orientation tag (1-8). Returns None if missing or invalid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    let orientation = value as u16;
    if (1..=8).contains(&orientation) {
        Some(orientation)
    } else {
        None
    }
}

/// Pull the ICC profile out of a JPEG or PNG container, if present.
/// Other containers carry no profile the engine can re-embed.
pub fn extract_icc(bytes: &[u8], format: ImageType) -> Option<Vec<u8>> {
    use img_parts::Bytes;
    match format {
        ImageType::Jpeg => Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
            .ok()?
            .icc_profile()
            .map(|b| b.to_vec()),
        ImageType::Png => Png::from_bytes(Bytes::copy_from_slice(bytes))
            .ok()?
            .icc_profile()
            .map(|b| b.to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgb};

    fn encode_webp(width: u32, height: u32) -> Vec<u8> {
        let rgb: Vec<u8> = std::iter::repeat([10u8, 20u8, 30u8])
            .take((width * height) as usize)
            .flatten()
            .collect();
        webp::Encoder::from_rgb(&rgb, width, height)
            .encode_lossless()
            .to_vec()
    }

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |_, _| Rgb([0, 0, 0]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([9, 8, 7])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn test_ensure_dimensions_safe_allows_small_image() {
        let data = encode_png(64, 64);
        assert!(ensure_dimensions_safe(&data).is_ok());
    }

    #[test]
    fn test_check_dimensions_rejects_oversized() {
        let err = check_dimensions(MAX_DIMENSION + 1, 1).unwrap_err();
        assert!(matches!(err, PixelmillError::DimensionExceedsLimit { .. }));

        let err = check_dimensions(20_000, 20_000).unwrap_err();
        assert!(matches!(err, PixelmillError::PixelCountExceedsLimit { .. }));
    }

    #[test]
    fn test_decode_image_routes_jpeg_to_mozjpeg() {
        let jpeg = encode_jpeg(2, 2);
        let (img, fmt) = decode_image(&jpeg).unwrap();
        assert_eq!(fmt, ImageType::Jpeg);
        assert_eq!(img.dimensions(), (2, 2));
    }

    #[test]
    fn test_decode_image_routes_webp_to_libwebp() {
        let data = encode_webp(3, 2);
        let (img, fmt) = decode_image(&data).unwrap();
        assert_eq!(fmt, ImageType::Webp);
        assert_eq!(img.dimensions(), (3, 2));
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_image_routes_png_to_image_crate() {
        let png = encode_png(3, 1);
        let (img, fmt) = decode_image(&png).unwrap();
        assert_eq!(fmt, ImageType::Png);
        assert_eq!(img.dimensions(), (3, 1));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not pixels").unwrap_err();
        assert!(matches!(err, PixelmillError::DecodeFailed { .. }));
    }

    #[test]
    fn test_decode_jpeg_requires_eoi_marker() {
        let mut jpeg = encode_jpeg(2, 2);
        // Strip the EOI marker so the truncation check fires.
        while jpeg.len() >= 2 && jpeg[jpeg.len() - 2..] != [0xFF, 0xD9] {
            jpeg.pop();
        }
        jpeg.pop();
        jpeg.pop();
        let err = decode_jpeg_mozjpeg(&jpeg).unwrap_err();
        assert!(matches!(err, PixelmillError::DecodeFailed { .. }));
    }

    #[test]
    fn test_exif_orientation_absent() {
        let png = encode_png(2, 2);
        assert_eq!(detect_exif_orientation(&png), None);
    }

    #[test]
    fn test_extract_icc_absent() {
        let png = encode_png(2, 2);
        assert_eq!(extract_icc(&png, ImageType::Png), None);
        let jpeg = encode_jpeg(2, 2);
        assert_eq!(extract_icc(&jpeg, ImageType::Jpeg), None);
    }
}
