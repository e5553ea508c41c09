// src/engine.rs
//
// In-process image engine: decode, geometry, encode, watermark.
// The public surface is `resize()` and `metadata()`; everything above this
// module goes through the gateway, which absorbs codec panics.

pub mod decoder;
pub mod encoder;
pub mod transform;
pub mod watermark;

use crate::error::{PixelmillError, Result};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

/// Maximum allowed image dimension (width or height) in pixels.
/// Images larger than this are rejected to prevent memory exhaustion.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixel count (width * height).
/// 100 megapixels, a reasonable limit against decompression bombs.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Output and input image formats the engine can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
    Gif,
    Tiff,
    Unknown,
}

impl ImageType {
    /// Parse a format name as supplied by a caller. `jpg` is accepted as an
    /// alias for `jpeg`. Unrecognized names return None.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Detect the format of an encoded buffer from its magic bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => Self::Jpeg,
            Ok(ImageFormat::Png) => Self::Png,
            Ok(ImageFormat::WebP) => Self::Webp,
            Ok(ImageFormat::Gif) => Self::Gif,
            Ok(ImageFormat::Tiff) => Self::Tiff,
            _ => Self::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Unknown => "unknown",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
            // Unreachable from encoded output; kept so the function is total.
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Crop anchor used when a cover-resize has to discard pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Centre,
    North,
    South,
    East,
    West,
}

impl Gravity {
    /// Lenient parse: anything unrecognized anchors at the centre.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "north" => Self::North,
            "south" => Self::South,
            "east" => Self::East,
            "west" => Self::West,
            _ => Self::Centre,
        }
    }
}

/// Fill used when `embed` pads the image onto a larger canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extend {
    #[default]
    Black,
    White,
    Background,
}

impl Extend {
    /// Lenient parse: unrecognized modes fall back to black.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "white" => Self::White,
            "background" => Self::Background,
            _ => Self::Black,
        }
    }
}

/// Output color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colorspace {
    #[default]
    Srgb,
    Bw,
}

impl Colorspace {
    /// Lenient parse: unrecognized names keep sRGB.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "bw" | "b-w" => Self::Bw,
            _ => Self::Srgb,
        }
    }
}

/// Text watermark configuration. Zero-valued `dpi` and `opacity` take the
/// conventional defaults (150 dpi, 0.2) at render time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatermarkOptions {
    pub text: String,
    pub font: String,
    pub dpi: u32,
    pub margin: u32,
    pub text_width: u32,
    pub opacity: f32,
    pub no_replicate: bool,
    pub background: Option<[u8; 3]>,
}

/// Fully resolved engine parameters for one transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub width: u32,
    pub height: u32,
    pub area_width: u32,
    pub area_height: u32,
    pub top: u32,
    pub left: u32,
    pub rotate: i32,
    pub zoom: f32,
    pub quality: u8,
    pub compression: u8,
    pub flip: bool,
    pub flop: bool,
    pub crop: bool,
    pub embed: bool,
    pub enlarge: bool,
    pub force: bool,
    pub no_auto_rotation: bool,
    pub no_profile: bool,
    pub gravity: Gravity,
    pub extend: Extend,
    pub colorspace: Colorspace,
    pub background: Option<[u8; 3]>,
    pub image_type: Option<ImageType>,
    pub watermark: Option<WatermarkOptions>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            area_width: 0,
            area_height: 0,
            top: 0,
            left: 0,
            rotate: 0,
            zoom: 0.0,
            quality: 80,
            compression: 6,
            flip: false,
            flop: false,
            crop: false,
            embed: false,
            enlarge: false,
            force: false,
            no_auto_rotation: false,
            no_profile: false,
            gravity: Gravity::Centre,
            extend: Extend::Black,
            colorspace: Colorspace::Srgb,
            background: None,
            image_type: None,
            watermark: None,
        }
    }
}

/// Decoded image properties as reported by `metadata()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub width: u32,
    pub height: u32,
    pub image_type: ImageType,
    pub space: &'static str,
    pub has_alpha: bool,
    pub has_profile: bool,
    pub channels: u8,
    pub orientation: u16,
}

/// Transform an encoded buffer according to `opts` and return the re-encoded
/// result. This is the single engine entry point for all pixel-touching
/// operations; callers reach it through the gateway.
pub fn resize(buf: &[u8], opts: &EngineOptions) -> Result<Vec<u8>> {
    if buf.is_empty() {
        return Err(PixelmillError::decode_failed("empty input buffer"));
    }

    decoder::ensure_dimensions_safe(buf)?;
    let (img, detected) = decoder::decode_image(buf)?;
    debug!(
        width = img.width(),
        height = img.height(),
        format = detected.name(),
        "decoded input"
    );

    let orientation = if opts.no_auto_rotation {
        1
    } else {
        decoder::detect_exif_orientation(buf).unwrap_or(1)
    };

    let img = transform::apply(img, opts, orientation)?;

    let img = match &opts.watermark {
        Some(wm) if !wm.text.is_empty() => watermark::apply(img, wm)?,
        _ => img,
    };

    let out_type = output_type(opts.image_type, detected);
    let icc = if opts.no_profile {
        None
    } else {
        decoder::extract_icc(buf, detected)
    };

    debug!(
        format = out_type.name(),
        width = img.width(),
        height = img.height(),
        icc = icc.is_some(),
        "encoding output"
    );
    encoder::encode(&img, out_type, opts, icc.as_deref())
}

/// Decode just enough of the buffer to report its properties.
pub fn metadata(buf: &[u8]) -> Result<Metadata> {
    if buf.is_empty() {
        return Err(PixelmillError::decode_failed("empty input buffer"));
    }

    decoder::ensure_dimensions_safe(buf)?;
    let (img, detected) = decoder::decode_image(buf)?;
    let orientation = decoder::detect_exif_orientation(buf).unwrap_or(1);
    let has_profile = decoder::extract_icc(buf, detected).is_some();

    Ok(Metadata {
        width: img.width(),
        height: img.height(),
        image_type: detected,
        space: color_space_name(&img),
        has_alpha: img.color().has_alpha(),
        has_profile,
        channels: img.color().channel_count(),
        orientation,
    })
}

/// Requested type wins; otherwise keep the detected input format; JPEG as the
/// last resort when the input format has no encoder of its own.
fn output_type(requested: Option<ImageType>, detected: ImageType) -> ImageType {
    match requested {
        Some(t) => t,
        None if detected != ImageType::Unknown => detected,
        None => ImageType::Jpeg,
    }
}

fn color_space_name(img: &DynamicImage) -> &'static str {
    match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => "b-w",
        _ => "srgb",
    }
}
