// src/ops.rs
//
// Operation catalog. Each operation is a stateless function
// (buffer, ImageOptions) -> Result<Image>: it validates its required
// parameters, layers its own flags onto the mapped engine options, and hands
// off to the gateway. Validation failures are bad-input errors raised before
// anything is decoded.

use crate::engine::{ImageType, WatermarkOptions};
use crate::error::{PixelmillError, Result};
use crate::options::{rgb_triple, ImageOptions};
use crate::{gateway, meta, Image};
use tracing::debug;

/// The fixed set of supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Info,
    Resize,
    Enlarge,
    Extract,
    Crop,
    Rotate,
    Flip,
    Flop,
    Thumbnail,
    Zoom,
    Convert,
    Watermark,
}

impl Operation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "resize" => Some(Self::Resize),
            "enlarge" => Some(Self::Enlarge),
            "extract" => Some(Self::Extract),
            "crop" => Some(Self::Crop),
            "rotate" => Some(Self::Rotate),
            "flip" => Some(Self::Flip),
            "flop" => Some(Self::Flop),
            "thumbnail" => Some(Self::Thumbnail),
            "zoom" => Some(Self::Zoom),
            "convert" => Some(Self::Convert),
            "watermark" => Some(Self::Watermark),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Resize => "resize",
            Self::Enlarge => "enlarge",
            Self::Extract => "extract",
            Self::Crop => "crop",
            Self::Rotate => "rotate",
            Self::Flip => "flip",
            Self::Flop => "flop",
            Self::Thumbnail => "thumbnail",
            Self::Zoom => "zoom",
            Self::Convert => "convert",
            Self::Watermark => "watermark",
        }
    }

    /// Perform the image transformation.
    pub fn run(&self, buf: &[u8], opts: &ImageOptions) -> Result<Image> {
        debug!(operation = self.name(), "dispatching");
        match self {
            Self::Info => info(buf, opts),
            Self::Resize => resize(buf, opts),
            Self::Enlarge => enlarge(buf, opts),
            Self::Extract => extract(buf, opts),
            Self::Crop => crop(buf, opts),
            Self::Rotate => rotate(buf, opts),
            Self::Flip => flip(buf, opts),
            Self::Flop => flop(buf, opts),
            Self::Thumbnail => thumbnail(buf, opts),
            Self::Zoom => zoom(buf, opts),
            Self::Convert => convert(buf, opts),
            Self::Watermark => watermark(buf, opts),
        }
    }
}

/// Report image properties as JSON without transforming any pixels.
pub fn info(buf: &[u8], _opts: &ImageOptions) -> Result<Image> {
    meta::info(buf)
}

/// Resize by width or height, maintaining aspect ratio. Crops to the exact
/// box by default; `no_crop` keeps the whole fitted image instead.
pub fn resize(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.width == 0 && o.height == 0 {
        return Err(PixelmillError::missing_param("height or width"));
    }

    let mut opts = o.to_engine_options();
    opts.embed = true;
    if !o.no_crop {
        opts.crop = true;
    }
    gateway::process(buf, opts)
}

/// Enlarge the image to the given width AND height.
pub fn enlarge(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.width == 0 || o.height == 0 {
        return Err(PixelmillError::missing_params("height, width"));
    }

    let mut opts = o.to_engine_options();
    opts.enlarge = true;
    if !o.no_crop {
        opts.crop = true;
    }
    gateway::process(buf, opts)
}

/// Extract a rectangular area from the image.
pub fn extract(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.area_width == 0 || o.area_height == 0 {
        return Err(PixelmillError::missing_params("areawidth or areaheight"));
    }

    let mut opts = o.to_engine_options();
    opts.top = o.top;
    opts.left = o.left;
    opts.area_width = o.area_width;
    opts.area_height = o.area_height;
    gateway::process(buf, opts)
}

/// Crop to the given box, keeping aspect ratio and trimming with gravity.
pub fn crop(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.width == 0 && o.height == 0 {
        return Err(PixelmillError::missing_param("height or width"));
    }

    let mut opts = o.to_engine_options();
    opts.crop = true;
    gateway::process(buf, opts)
}

/// Rotate by a multiple of 90 degrees.
pub fn rotate(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.rotate == 0 {
        return Err(PixelmillError::missing_param("rotate"));
    }
    gateway::process(buf, o.to_engine_options())
}

/// Mirror the image horizontally.
pub fn flip(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    let mut opts = o.to_engine_options();
    opts.flip = true;
    gateway::process(buf, opts)
}

/// Mirror the image vertically.
pub fn flop(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    let mut opts = o.to_engine_options();
    opts.flop = true;
    gateway::process(buf, opts)
}

/// Produce a thumbnail: a plain fit-inside resize with no implicit crop or
/// embed.
pub fn thumbnail(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.width == 0 && o.height == 0 {
        return Err(PixelmillError::missing_params("width or height"));
    }
    gateway::process(buf, o.to_engine_options())
}

/// Zoom into the image by a factor. An extraction rectangle is honored, and
/// required, only when a top or left offset is supplied.
pub fn zoom(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.factor == 0.0 {
        return Err(PixelmillError::missing_param("factor"));
    }

    let mut opts = o.to_engine_options();

    if o.top > 0 || o.left > 0 {
        if o.area_width == 0 && o.area_height == 0 {
            return Err(PixelmillError::missing_params("areawidth, areaheight"));
        }

        opts.top = o.top;
        opts.left = o.left;
        opts.area_width = o.area_width;
        opts.area_height = o.area_height;

        if !o.no_crop {
            opts.crop = true;
        }
    }

    opts.zoom = o.factor;
    gateway::process(buf, opts)
}

/// Convert the image to another format. A missing type and an unrecognized
/// type are distinct errors.
pub fn convert(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.image_type.is_empty() {
        return Err(PixelmillError::missing_param("type"));
    }
    if ImageType::from_name(&o.image_type).is_none() {
        return Err(PixelmillError::invalid_image_type(o.image_type.clone()));
    }
    gateway::process(buf, o.to_engine_options())
}

/// Draw a text watermark over the image. Color lists shorter than three
/// components leave the ink at its default.
pub fn watermark(buf: &[u8], o: &ImageOptions) -> Result<Image> {
    if o.text.is_empty() {
        return Err(PixelmillError::missing_param("text"));
    }

    let mut opts = o.to_engine_options();
    opts.watermark = Some(WatermarkOptions {
        text: o.text.clone(),
        font: o.font.clone(),
        dpi: o.dpi,
        margin: o.margin,
        text_width: o.text_width,
        opacity: o.opacity,
        no_replicate: o.no_replicate,
        background: rgb_triple(&o.color),
    });
    gateway::process(buf, opts)
}
