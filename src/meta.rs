// src/meta.rs
//
// Metadata inspector: decode the image header and report its properties as a
// JSON payload.

use crate::engine;
use crate::error::{PixelmillError, Result};
use crate::Image;
use serde::{Deserialize, Serialize};

/// Image details serialized for the caller. Field names follow the wire
/// contract: camelCase with `type` for the format name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "type")]
    pub image_type: String,
    pub space: String,
    pub has_alpha: bool,
    pub has_profile: bool,
    pub channels: u8,
    pub orientation: u16,
}

/// Inspect the buffer and return its properties as `application/json`.
/// A buffer that cannot be decoded is the caller's mistake, so the failure is
/// classified as bad input rather than a processing error.
pub fn info(buf: &[u8]) -> Result<Image> {
    let meta = engine::metadata(buf)
        .map_err(|err| PixelmillError::metadata_failed(err.to_string()))?;

    let info = ImageInfo {
        width: meta.width,
        height: meta.height,
        image_type: meta.image_type.name().to_string(),
        space: meta.space.to_string(),
        has_alpha: meta.has_alpha,
        has_profile: meta.has_profile,
        channels: meta.channels,
        orientation: meta.orientation,
    };

    let body = serde_json::to_vec(&info)
        .map_err(|err| PixelmillError::processing(format!("metadata serialization failed: {err}")))?;

    Ok(Image {
        body,
        mime: "application/json".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn rgba_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_info_reports_png_properties() {
        let image = info(&rgba_png(8, 6)).unwrap();
        assert_eq!(image.mime, "application/json");

        let parsed: ImageInfo = serde_json::from_slice(&image.body).unwrap();
        assert_eq!(parsed.width, 8);
        assert_eq!(parsed.height, 6);
        assert_eq!(parsed.image_type, "png");
        assert_eq!(parsed.space, "srgb");
        assert!(parsed.has_alpha);
        assert_eq!(parsed.channels, 4);
        assert_eq!(parsed.orientation, 1);
    }

    #[test]
    fn test_info_json_field_names() {
        let image = info(&rgba_png(2, 2)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&image.body).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "width",
            "height",
            "type",
            "space",
            "hasAlpha",
            "hasProfile",
            "channels",
            "orientation",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn test_info_decode_failure_is_bad_request() {
        let err = info(b"garbage").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(matches!(err, PixelmillError::MetadataFailed { .. }));
    }
}
