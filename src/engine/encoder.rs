// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG with compression level, WebP
// (libwebp), GIF/TIFF via the image crate. ICC profiles from the source are
// re-embedded into JPEG/PNG/WebP outputs.

use crate::engine::{EngineOptions, ImageType, MAX_DIMENSION};
use crate::error::{PixelmillError, Result};
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use img_parts::{jpeg::Jpeg, png::Png, ImageICC};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;

/// Encode the image into the requested output format.
pub fn encode(
    img: &DynamicImage,
    format: ImageType,
    opts: &EngineOptions,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>> {
    match format {
        ImageType::Jpeg => encode_jpeg(img, opts.quality, opts.background, icc),
        ImageType::Png => encode_png(img, opts.compression, icc),
        ImageType::Webp => encode_webp(img, opts.quality, icc),
        ImageType::Gif => encode_with_image_crate(img, ImageFormat::Gif, "gif"),
        ImageType::Tiff => encode_with_image_crate(img, ImageFormat::Tiff, "tiff"),
        ImageType::Unknown => Err(PixelmillError::unsupported_format("unknown")),
    }
}

/// Encode to JPEG using mozjpeg. Alpha is flattened onto the background color
/// first since JPEG has no alpha channel.
pub fn encode_jpeg(
    img: &DynamicImage,
    quality: u8,
    background: Option<[u8; 3]>,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let rgb = flatten_to_rgb(img, background);
    let (w, h) = rgb.dimensions();

    if w == 0 || h == 0 {
        return Err(PixelmillError::encode_failed(
            "jpeg",
            "image has zero width or height",
        ));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(PixelmillError::dimension_exceeds_limit(
            w.max(h),
            MAX_DIMENSION,
        ));
    }

    let pixels: &[u8] = rgb.as_raw();
    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(w as usize, h as usize);
    comp.set_color_space(ColorSpace::JCS_YCbCr);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);
    comp.set_optimize_scans(true);
    comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

    let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
    let mut output = Vec::with_capacity(estimated_size);

    let encoded = {
        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            PixelmillError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = w as usize * 3;
        for row in pixels.chunks(stride) {
            writer.write_scanlines(row).map_err(|e| {
                PixelmillError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to write scanlines: {e:?}"),
                )
            })?;
        }

        writer.finish().map_err(|e| {
            PixelmillError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
        })?;
        output
    };

    match icc {
        Some(icc_data) => embed_icc_jpeg(encoded, icc_data),
        None => Ok(encoded),
    }
}

/// Encode to PNG. The 0-9 compression level maps onto the encoder's
/// fast/default/best presets.
pub fn encode_png(img: &DynamicImage, compression: u8, icc: Option<&[u8]>) -> Result<Vec<u8>> {
    let level = match compression.min(9) {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    };

    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        Cursor::new(&mut buf),
        level,
        PngFilterType::Adaptive,
    );
    let color: ExtendedColorType = img.color().into();
    encoder
        .write_image(img.as_bytes(), img.width(), img.height(), color)
        .map_err(|e| PixelmillError::encode_failed("png", format!("PNG encode failed: {e}")))?;

    match icc {
        Some(icc_data) => embed_icc_png(buf, icc_data),
        None => Ok(buf),
    }
}

/// Encode to WebP via libwebp.
pub fn encode_webp(img: &DynamicImage, quality: u8, icc: Option<&[u8]>) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100) as f32;

    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        webp::Encoder::from_rgba(&rgba, w, h).encode(quality).to_vec()
    } else {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        webp::Encoder::from_rgb(&rgb, w, h).encode(quality).to_vec()
    };

    if encoded.is_empty() {
        return Err(PixelmillError::encode_failed("webp", "WebP encode failed"));
    }

    match icc {
        Some(icc_data) => embed_icc_webp(encoded, icc_data),
        None => Ok(encoded),
    }
}

fn encode_with_image_crate(
    img: &DynamicImage,
    format: ImageFormat,
    name: &'static str,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    // GIF encoding only supports 8-bit RGBA frames.
    let normalized;
    let source = if format == ImageFormat::Gif {
        normalized = DynamicImage::ImageRgba8(img.to_rgba8());
        &normalized
    } else {
        img
    };
    source
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| PixelmillError::encode_failed(name, format!("encode failed: {e}")))?;
    Ok(buf)
}

/// Embed an ICC profile into a JPEG using img-parts.
pub fn embed_icc_jpeg(jpeg_data: Vec<u8>, icc: &[u8]) -> Result<Vec<u8>> {
    use img_parts::Bytes;

    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_data)).map_err(|e| {
        PixelmillError::encode_failed("jpeg", format!("failed to parse JPEG for ICC: {e}"))
    })?;
    jpeg.set_icc_profile(Some(Bytes::copy_from_slice(icc)));

    let mut output = Vec::new();
    jpeg.encoder().write_to(&mut output).map_err(|e| {
        PixelmillError::encode_failed("jpeg", format!("failed to write JPEG with ICC: {e}"))
    })?;
    Ok(output)
}

/// Embed an ICC profile into a PNG using img-parts.
pub fn embed_icc_png(png_data: Vec<u8>, icc: &[u8]) -> Result<Vec<u8>> {
    use img_parts::Bytes;

    let mut png = Png::from_bytes(Bytes::from(png_data)).map_err(|e| {
        PixelmillError::encode_failed("png", format!("failed to parse PNG for ICC: {e}"))
    })?;
    png.set_icc_profile(Some(Bytes::copy_from_slice(icc)));

    let mut output = Vec::new();
    png.encoder().write_to(&mut output).map_err(|e| {
        PixelmillError::encode_failed("png", format!("failed to write PNG with ICC: {e}"))
    })?;
    Ok(output)
}

/// Embed an ICC profile into a WebP using img-parts.
pub fn embed_icc_webp(webp_data: Vec<u8>, icc: &[u8]) -> Result<Vec<u8>> {
    use img_parts::webp::WebP;
    use img_parts::Bytes;

    let mut webp = WebP::from_bytes(Bytes::from(webp_data)).map_err(|e| {
        PixelmillError::encode_failed("webp", format!("failed to parse WebP for ICC: {e}"))
    })?;
    webp.set_icc_profile(Some(Bytes::copy_from_slice(icc)));

    let mut output = Vec::new();
    webp.encoder().write_to(&mut output).map_err(|e| {
        PixelmillError::encode_failed("webp", format!("failed to write WebP with ICC: {e}"))
    })?;
    Ok(output)
}

/// Flatten transparency onto the background color (default black). Opaque
/// images convert straight to RGB.
fn flatten_to_rgb(img: &DynamicImage, background: Option<[u8; 3]>) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let bg = background.unwrap_or([0, 0, 0]);
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = RgbImage::new(w, h);
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let alpha = src.0[3] as u16;
        let inv = 255 - alpha;
        dst.0 = [
            ((src.0[0] as u16 * alpha + bg[0] as u16 * inv) / 255) as u8,
            ((src.0[1] as u16 * alpha + bg[1] as u16 * inv) / 255) as u8,
            ((src.0[2] as u16 * alpha + bg[2] as u16 * inv) / 255) as u8,
        ];
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 16, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 16) as u8, 99])
        }))
    }

    fn default_opts() -> EngineOptions {
        EngineOptions::default()
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_signature() {
        let buf = encode(&test_image(), ImageType::Jpeg, &default_opts(), None).unwrap();
        assert_eq!(&buf[..2], &[0xFF, 0xD8]);
        assert_eq!(ImageType::detect(&buf), ImageType::Jpeg);
    }

    #[test]
    fn test_encode_png_produces_png_signature() {
        let buf = encode(&test_image(), ImageType::Png, &default_opts(), None).unwrap();
        assert_eq!(&buf[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_encode_webp_detectable() {
        let buf = encode(&test_image(), ImageType::Webp, &default_opts(), None).unwrap();
        assert_eq!(ImageType::detect(&buf), ImageType::Webp);
    }

    #[test]
    fn test_encode_gif_and_tiff() {
        let gif = encode(&test_image(), ImageType::Gif, &default_opts(), None).unwrap();
        assert_eq!(ImageType::detect(&gif), ImageType::Gif);
        let tiff = encode(&test_image(), ImageType::Tiff, &default_opts(), None).unwrap();
        assert_eq!(ImageType::detect(&tiff), ImageType::Tiff);
    }

    #[test]
    fn test_encode_unknown_fails() {
        let err = encode(&test_image(), ImageType::Unknown, &default_opts(), None).unwrap_err();
        assert!(matches!(err, PixelmillError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_flatten_uses_background_color() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let rgb = flatten_to_rgb(&img, Some([255, 0, 0]));
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_flatten_defaults_to_black() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 0])));
        let rgb = flatten_to_rgb(&img, None);
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_jpeg_roundtrip_decodes_to_same_dimensions() {
        let buf = encode_jpeg(&test_image(), 80, None, None).unwrap();
        let decoded = image::load_from_memory(&buf).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_png_compression_bands() {
        // All bands must produce a decodable PNG.
        for level in [0u8, 5, 9] {
            let buf = encode_png(&test_image(), level, None).unwrap();
            let decoded = image::load_from_memory(&buf).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (16, 16));
        }
    }

    #[test]
    fn test_icc_profile_roundtrip_png() {
        let icc = vec![0u8; 128];
        let buf = encode_png(&test_image(), 6, Some(&icc)).unwrap();
        let png = Png::from_bytes(img_parts::Bytes::from(buf)).unwrap();
        assert_eq!(png.icc_profile().map(|b| b.len()), Some(128));
    }
}
