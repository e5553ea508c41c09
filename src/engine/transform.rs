// src/engine/transform.rs
//
// Geometry chain. Stages run in a fixed order:
// auto-orient, extract, rotate, flip, flop, zoom, size, colorspace.

use crate::engine::{decoder, Colorspace, EngineOptions, Extend, Gravity};
use crate::error::{PixelmillError, Result};
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{DynamicImage, Rgba, RgbaImage, RgbImage};
use tracing::debug;

/// Apply the full geometry chain for one request.
pub fn apply(img: DynamicImage, opts: &EngineOptions, orientation: u16) -> Result<DynamicImage> {
    let mut img = auto_orient(img, orientation);

    if opts.area_width > 0 || opts.area_height > 0 {
        img = extract(img, opts.left, opts.top, opts.area_width, opts.area_height)?;
        debug!(width = img.width(), height = img.height(), "extracted area");
    }

    if opts.rotate != 0 {
        img = rotate(img, opts.rotate)?;
    }

    if opts.flip {
        img = img.fliph();
    }
    if opts.flop {
        img = img.flipv();
    }

    if opts.zoom > 0.0 && (opts.zoom - 1.0).abs() > f32::EPSILON {
        img = zoom(img, opts.zoom)?;
        debug!(width = img.width(), height = img.height(), factor = opts.zoom, "zoomed");
    }

    if opts.width > 0 || opts.height > 0 {
        img = size(img, opts)?;
        debug!(width = img.width(), height = img.height(), "sized");
    }

    if opts.colorspace == Colorspace::Bw {
        img = DynamicImage::ImageLuma8(img.to_luma8());
    }

    Ok(img)
}

/// Undo the EXIF orientation so pixels are upright before any geometry.
/// Values outside 1-8 are ignored.
pub fn auto_orient(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Cut the requested rectangle out of the image. A single missing area
/// dimension defaults to the other, producing a square area.
pub fn extract(
    img: DynamicImage,
    left: u32,
    top: u32,
    area_width: u32,
    area_height: u32,
) -> Result<DynamicImage> {
    let width = if area_width > 0 { area_width } else { area_height };
    let height = if area_height > 0 { area_height } else { area_width };

    let (img_w, img_h) = (img.width(), img.height());
    if width == 0
        || height == 0
        || left.checked_add(width).map_or(true, |r| r > img_w)
        || top.checked_add(height).map_or(true, |b| b > img_h)
    {
        return Err(PixelmillError::invalid_extract_area(
            left, top, width, height, img_w, img_h,
        ));
    }

    Ok(img.crop_imm(left, top, width, height))
}

/// Rotate by a multiple of 90 degrees. Negative angles rotate the other way.
pub fn rotate(img: DynamicImage, degrees: i32) -> Result<DynamicImage> {
    let normalized = degrees.rem_euclid(360);
    match normalized {
        0 => Ok(img),
        90 => Ok(img.rotate90()),
        180 => Ok(img.rotate180()),
        270 => Ok(img.rotate270()),
        _ => Err(PixelmillError::invalid_rotation_angle(degrees)),
    }
}

/// Scale both dimensions by the zoom factor.
pub fn zoom(img: DynamicImage, factor: f32) -> Result<DynamicImage> {
    let width = ((img.width() as f64 * factor as f64).round() as u32).max(1);
    let height = ((img.height() as f64 * factor as f64).round() as u32).max(1);
    decoder::check_dimensions(width, height)?;
    fast_resize(img, width, height)
}

/// Sizing stage. `force` resizes to the exact box ignoring aspect ratio,
/// `crop` covers the box and trims with gravity, otherwise the image is fitted
/// inside the box. `embed` pads the fitted result onto a canvas of the
/// requested size. Upscaling only happens with `enlarge` or `force`.
fn size(img: DynamicImage, opts: &EngineOptions) -> Result<DynamicImage> {
    let (orig_w, orig_h) = (img.width(), img.height());
    let target_w = if opts.width > 0 { Some(opts.width) } else { None };
    let target_h = if opts.height > 0 { Some(opts.height) } else { None };

    if opts.force {
        let (w, h) = match (target_w, target_h) {
            (Some(w), Some(h)) => (w, h),
            _ => calc_resize_dimensions(orig_w, orig_h, target_w, target_h),
        };
        decoder::check_dimensions(w, h)?;
        return fast_resize(img, w, h);
    }

    if opts.crop {
        // A single given dimension derives the other from the source aspect
        // ratio, so a width-only crop still scales the image down.
        let (box_w, box_h) = match (target_w, target_h) {
            (Some(w), Some(h)) => (w, h),
            _ => calc_resize_dimensions(orig_w, orig_h, target_w, target_h),
        };
        decoder::check_dimensions(box_w, box_h)?;

        let (mut cover_w, mut cover_h) = calc_cover_resize_dimensions(orig_w, orig_h, box_w, box_h);
        if !opts.enlarge && (cover_w > orig_w || cover_h > orig_h) {
            // Without enlarge the cover resize must not upscale; crop what fits.
            cover_w = orig_w;
            cover_h = orig_h;
        }
        let resized = if (cover_w, cover_h) == (orig_w, orig_h) {
            img
        } else {
            fast_resize(img, cover_w, cover_h)?
        };
        return Ok(gravity_crop(resized, box_w, box_h, opts.gravity));
    }

    let (fit_w, fit_h) = calc_resize_dimensions(orig_w, orig_h, target_w, target_h);
    decoder::check_dimensions(fit_w, fit_h)?;
    let upscale = fit_w > orig_w || fit_h > orig_h;
    let fitted = if (fit_w, fit_h) == (orig_w, orig_h) || (upscale && !opts.enlarge) {
        img
    } else {
        fast_resize(img, fit_w, fit_h)?
    };

    if opts.embed {
        let canvas_w = target_w.unwrap_or(fitted.width()).max(fitted.width());
        let canvas_h = target_h.unwrap_or(fitted.height()).max(fitted.height());
        return Ok(embed(fitted, canvas_w, canvas_h, opts.extend, opts.background));
    }

    Ok(fitted)
}

/// Calculate resize dimensions maintaining aspect ratio (fit inside).
pub fn calc_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
) -> (u32, u32) {
    match (target_w, target_h) {
        (Some(w), Some(h)) => {
            let orig_ratio = orig_w as f64 / orig_h as f64;
            let target_ratio = w as f64 / h as f64;
            if orig_ratio > target_ratio {
                let ratio = w as f64 / orig_w as f64;
                (w, ((orig_h as f64 * ratio).round() as u32).max(1))
            } else {
                let ratio = h as f64 / orig_h as f64;
                (((orig_w as f64 * ratio).round() as u32).max(1), h)
            }
        }
        (Some(w), None) => {
            let ratio = w as f64 / orig_w as f64;
            (w, ((orig_h as f64 * ratio).round() as u32).max(1))
        }
        (None, Some(h)) => {
            let ratio = h as f64 / orig_h as f64;
            (((orig_w as f64 * ratio).round() as u32).max(1), h)
        }
        (None, None) => (orig_w, orig_h),
    }
}

/// Smallest dimensions that cover the target box while keeping aspect ratio.
pub fn calc_cover_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: u32,
    target_h: u32,
) -> (u32, u32) {
    if orig_w == 0 || orig_h == 0 {
        return (target_w.max(1), target_h.max(1));
    }
    let scale_w = target_w as f64 / orig_w as f64;
    let scale_h = target_h as f64 / orig_h as f64;
    let scale = scale_w.max(scale_h);
    let resize_w = ((orig_w as f64 * scale).ceil() as u32).max(1);
    let resize_h = ((orig_h as f64 * scale).ceil() as u32).max(1);
    (resize_w, resize_h)
}

/// Crop to the target box, anchored by gravity. The crop never exceeds the
/// image itself.
pub fn gravity_crop(img: DynamicImage, target_w: u32, target_h: u32, gravity: Gravity) -> DynamicImage {
    let crop_w = target_w.min(img.width()).max(1);
    let crop_h = target_h.min(img.height()).max(1);
    let slack_x = img.width() - crop_w;
    let slack_y = img.height() - crop_h;

    let (x, y) = match gravity {
        Gravity::Centre => (slack_x / 2, slack_y / 2),
        Gravity::North => (slack_x / 2, 0),
        Gravity::South => (slack_x / 2, slack_y),
        Gravity::West => (0, slack_y / 2),
        Gravity::East => (slack_x, slack_y / 2),
    };
    img.crop_imm(x, y, crop_w, crop_h)
}

/// Pad the image onto a canvas of the requested size, centered, filled with
/// the extend color.
fn embed(
    img: DynamicImage,
    canvas_w: u32,
    canvas_h: u32,
    extend: Extend,
    background: Option<[u8; 3]>,
) -> DynamicImage {
    if (canvas_w, canvas_h) == (img.width(), img.height()) {
        return img;
    }

    let fill = match extend {
        Extend::Black => [0, 0, 0],
        Extend::White => [255, 255, 255],
        Extend::Background => background.unwrap_or([0, 0, 0]),
    };
    let mut canvas = RgbaImage::from_pixel(
        canvas_w,
        canvas_h,
        Rgba([fill[0], fill[1], fill[2], 255]),
    );
    let x = (canvas_w - img.width()) / 2;
    let y = (canvas_h - img.height()) / 2;
    image::imageops::overlay(&mut canvas, &img.to_rgba8(), x as i64, y as i64);
    DynamicImage::ImageRgba8(canvas)
}

/// Resample with fast_image_resize (Lanczos3). RGB and RGBA buffers go
/// straight to the resizer; everything else is normalized to RGBA first.
pub fn fast_resize(img: DynamicImage, dst_width: u32, dst_height: u32) -> Result<DynamicImage> {
    let src_width = img.width();
    let src_height = img.height();

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(PixelmillError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }

    let (pixel_type, mut src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let resize_err = |reason: String| {
        PixelmillError::resize_failed((src_width, src_height), (dst_width, dst_height), reason)
    };

    let src_image = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    ) {
        Ok(src) => resize_with_source(src, pixel_type, dst_width, dst_height),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src_width, src_height, pixel_type);
            let buffer = aligned.buffer_mut();
            let len = buffer.len().min(src_pixels.len());
            buffer[..len].copy_from_slice(&src_pixels[..len]);
            resize_with_source(aligned, pixel_type, dst_width, dst_height)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    src_image.map_err(resize_err)
}

fn resize_with_source(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);
    let options =
        ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));

    let needs_premultiply = pixel_type == PixelType::U8x4;
    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to create rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to create rgba image from resized data".to_string()),
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}
