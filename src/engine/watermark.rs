// src/engine/watermark.rs
//
// Text watermark: rasterize the text into an RGBA tile, then overlay it once
// at the margin offset or replicate it across the whole image.

use crate::engine::WatermarkOptions;
use crate::error::{PixelmillError, Result};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_DPI: u32 = 150;
const DEFAULT_OPACITY: f32 = 0.2;
const DEFAULT_POINT_SIZE: f32 = 10.0;

/// Environment variable naming a TTF/OTF file to use when the font spec does
/// not point at one.
pub const FONT_ENV: &str = "PIXELMILL_WATERMARK_FONT";

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// Render the watermark text onto the image.
pub fn apply(img: DynamicImage, wm: &WatermarkOptions) -> Result<DynamicImage> {
    let font = resolve_font(&wm.font)?;

    let dpi = if wm.dpi > 0 { wm.dpi } else { DEFAULT_DPI };
    let opacity = if wm.opacity > 0.0 {
        wm.opacity.min(1.0)
    } else {
        DEFAULT_OPACITY
    };
    let point_size = parse_point_size(&wm.font);
    // Point sizes assume 72 dots per inch.
    let px = point_size * dpi as f32 / 72.0;
    let ink = wm.background.unwrap_or([255, 255, 255]);

    let tile = render_tile(&font, &wm.text, px, ink, opacity, wm.text_width);
    debug!(
        tile_width = tile.width(),
        tile_height = tile.height(),
        replicate = !wm.no_replicate,
        "rendered watermark tile"
    );

    let mut canvas = img.to_rgba8();
    let margin = wm.margin;

    if wm.no_replicate {
        blend_tile(&mut canvas, &tile, margin as i64, margin as i64);
    } else {
        let step_x = (tile.width() + margin.max(1)) as i64;
        let step_y = (tile.height() + margin.max(1)) as i64;
        let mut y = margin as i64;
        while y < canvas.height() as i64 {
            let mut x = margin as i64;
            while x < canvas.width() as i64 {
                blend_tile(&mut canvas, &tile, x, y);
                x += step_x;
            }
            y += step_y;
        }
    }

    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Rasterize the text into a transparent tile. A nonzero `max_width` wraps
/// the text to that width at word boundaries; zero means unconstrained.
fn render_tile(
    font: &FontVec,
    text: &str,
    px: f32,
    ink: [u8; 3],
    opacity: f32,
    max_width: u32,
) -> RgbaImage {
    let scale = PxScale::from(px.max(1.0));
    let lines = if max_width > 0 {
        wrap_text(text, max_width as f32, |s| measure_width(font, s, scale))
    } else {
        vec![text.to_string()]
    };

    let text_h = px.ceil() as u32;
    let line_height = (text_h + text_h / 4).max(1);
    let width = lines
        .iter()
        .map(|line| measure_width(font, line, scale).ceil() as u32 + 2)
        .max()
        .unwrap_or(1)
        .max(1);
    let height = line_height * lines.len().max(1) as u32;

    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut tile = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    for (i, line) in lines.iter().enumerate() {
        draw_text_mut(
            &mut tile,
            Rgba([ink[0], ink[1], ink[2], alpha]),
            0,
            (i as u32 * line_height) as i32,
            scale,
            font,
            line,
        );
    }
    tile
}

/// Greedy word wrap against a measuring function. A word that alone exceeds
/// the limit gets its own line rather than being split mid-glyph.
fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if current.is_empty() || measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Advance width of the whole string at the given scale.
fn measure_width(font: &FontVec, text: &str, scale: PxScale) -> f32 {
    let scaled = font.as_scaled(scale);
    let mut width = 0.0;
    let mut prev = None;
    for c in text.chars() {
        let glyph = scaled.glyph_id(c);
        if let Some(p) = prev {
            width += scaled.kern(p, glyph);
        }
        width += scaled.h_advance(glyph);
        prev = Some(glyph);
    }
    width
}

/// Alpha-blend the tile onto the canvas at the given position. Pixels outside
/// the canvas are clipped.
fn blend_tile(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    for (tx, ty, px) in tile.enumerate_pixels() {
        let cx = x + tx as i64;
        let cy = y + ty as i64;
        if cx < 0 || cy < 0 || cx >= canvas.width() as i64 || cy >= canvas.height() as i64 {
            continue;
        }
        let alpha = px.0[3] as u32;
        if alpha == 0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        let inv = 255 - alpha;
        for i in 0..3 {
            dst.0[i] = ((px.0[i] as u32 * alpha + dst.0[i] as u32 * inv) / 255) as u8;
        }
    }
}

/// Last whitespace-separated token of a spec like `sans bold 12` is a point
/// size; everything else describes the face and is used for file lookup only.
fn parse_point_size(spec: &str) -> f32 {
    spec.split_whitespace()
        .last()
        .and_then(|tok| tok.parse::<f32>().ok())
        .filter(|size| *size > 0.0)
        .unwrap_or(DEFAULT_POINT_SIZE)
}

/// Resolve a usable TTF/OTF font. The spec may be a file path; otherwise the
/// `PIXELMILL_WATERMARK_FONT` variable and then the system font directories
/// are consulted.
fn resolve_font(spec: &str) -> Result<FontVec> {
    if let Some(path) = font_path_from_spec(spec) {
        return load_font(&path, spec);
    }

    if let Ok(env_path) = std::env::var(FONT_ENV) {
        let path = PathBuf::from(env_path);
        if path.is_file() {
            return load_font(&path, spec);
        }
    }

    for dir in FONT_DIRS {
        if let Some(path) = find_font_file(Path::new(dir)) {
            return load_font(&path, spec);
        }
    }

    Err(PixelmillError::font_unavailable(spec.to_string()))
}

fn font_path_from_spec(spec: &str) -> Option<PathBuf> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return None;
    }
    let path = Path::new(trimmed);
    let is_font_file = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ttf") | Some("otf")
    );
    (is_font_file && path.is_file()).then(|| path.to_path_buf())
}

fn load_font(path: &Path, spec: &str) -> Result<FontVec> {
    let data = std::fs::read(path)
        .map_err(|_| PixelmillError::font_unavailable(spec.to_string()))?;
    FontVec::try_from_vec(data).map_err(|_| PixelmillError::font_unavailable(spec.to_string()))
}

/// Depth-first scan for the first .ttf or .otf file under `dir`.
fn find_font_file(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf") {
                    return Some(path);
                }
            }
        } else if path.is_dir() {
            subdirs.push(path);
        }
    }
    for sub in subdirs {
        if let Some(found) = find_font_file(&sub) {
            return Some(found);
        }
    }
    None
}

/// Whether any usable font can be resolved in this environment. Tests use
/// this to skip rendering assertions on fontless systems.
pub fn font_available() -> bool {
    resolve_font("").is_ok()
}
