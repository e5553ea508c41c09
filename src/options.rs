// src/options.rs
//
// Flat request options as supplied by the caller, plus the mapper that turns
// them into fully resolved engine parameters.

use crate::engine::{Colorspace, EngineOptions, Extend, Gravity, ImageType};

const DEFAULT_QUALITY: u8 = 80;
const DEFAULT_COMPRESSION: u8 = 6;

/// Request parameters for one operation. Zero and empty values mean "unset";
/// each operation validates the fields it requires before anything is decoded.
///
/// `file` and `url` name the image source; resolving them into `buf` happens
/// upstream, before the operation runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub area_width: u32,
    pub area_height: u32,
    pub top: u32,
    pub left: u32,
    pub quality: u8,
    pub compression: u8,
    pub rotate: i32,
    pub factor: f32,
    pub margin: u32,
    pub dpi: u32,
    pub text_width: u32,
    pub opacity: f32,
    pub flip: bool,
    pub flop: bool,
    pub force: bool,
    pub embed: bool,
    pub no_crop: bool,
    pub no_replicate: bool,
    pub no_rotation: bool,
    pub no_profile: bool,
    pub text: String,
    pub font: String,
    pub image_type: String,
    pub gravity: String,
    pub colorspace: String,
    pub extend: String,
    pub background: Vec<u8>,
    pub color: Vec<u8>,
    pub file: String,
    pub url: String,
}

impl ImageOptions {
    /// Map request options onto engine parameters. Total and lenient:
    /// unrecognized enum strings fall back to their defaults, out-of-range
    /// numbers are clamped, and nothing here can fail. Operation-specific
    /// flags (crop, enlarge, the watermark block) are layered on by the
    /// individual operations afterwards.
    pub fn to_engine_options(&self) -> EngineOptions {
        EngineOptions {
            width: self.width,
            height: self.height,
            area_width: self.area_width,
            area_height: self.area_height,
            top: self.top,
            left: self.left,
            rotate: self.rotate,
            zoom: self.factor,
            quality: if self.quality == 0 {
                DEFAULT_QUALITY
            } else {
                self.quality.min(100)
            },
            compression: if self.compression == 0 {
                DEFAULT_COMPRESSION
            } else {
                self.compression.min(9)
            },
            flip: self.flip,
            flop: self.flop,
            crop: false,
            embed: self.embed,
            enlarge: false,
            force: self.force,
            no_auto_rotation: self.no_rotation,
            no_profile: self.no_profile,
            gravity: Gravity::parse(&self.gravity),
            extend: Extend::parse(&self.extend),
            colorspace: Colorspace::parse(&self.colorspace),
            background: rgb_triple(&self.background),
            image_type: ImageType::from_name(&self.image_type),
            watermark: None,
        }
    }
}

/// First three components of a color list, or None when fewer than three are
/// given.
pub(crate) fn rgb_triple(components: &[u8]) -> Option<[u8; 3]> {
    if components.len() > 2 {
        Some([components[0], components[1], components[2]])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let opts = ImageOptions::default().to_engine_options();
        assert_eq!(opts.quality, DEFAULT_QUALITY);
        assert_eq!(opts.compression, DEFAULT_COMPRESSION);
        assert_eq!(opts.gravity, Gravity::Centre);
        assert_eq!(opts.extend, Extend::Black);
        assert_eq!(opts.colorspace, Colorspace::Srgb);
        assert_eq!(opts.background, None);
        assert_eq!(opts.image_type, None);
        assert!(opts.watermark.is_none());
        assert!(!opts.crop);
        assert!(!opts.enlarge);
    }

    #[test]
    fn test_explicit_values_clamped() {
        let o = ImageOptions {
            quality: 150,
            compression: 12,
            ..ImageOptions::default()
        };
        let opts = o.to_engine_options();
        assert_eq!(opts.quality, 100);
        assert_eq!(opts.compression, 9);
    }

    #[test]
    fn test_unknown_enum_strings_fall_back() {
        let o = ImageOptions {
            gravity: "diagonal".to_string(),
            extend: "holographic".to_string(),
            colorspace: "cmyk".to_string(),
            image_type: "bmp2000".to_string(),
            ..ImageOptions::default()
        };
        let opts = o.to_engine_options();
        assert_eq!(opts.gravity, Gravity::Centre);
        assert_eq!(opts.extend, Extend::Black);
        assert_eq!(opts.colorspace, Colorspace::Srgb);
        assert_eq!(opts.image_type, None);
    }

    #[test]
    fn test_background_triple_rule() {
        assert_eq!(rgb_triple(&[]), None);
        assert_eq!(rgb_triple(&[1]), None);
        assert_eq!(rgb_triple(&[1, 2]), None);
        assert_eq!(rgb_triple(&[1, 2, 3]), Some([1, 2, 3]));
        assert_eq!(rgb_triple(&[1, 2, 3, 4]), Some([1, 2, 3]));
    }

    #[test]
    fn test_geometry_fields_pass_through() {
        let o = ImageOptions {
            width: 10,
            height: 20,
            area_width: 30,
            area_height: 40,
            top: 5,
            left: 6,
            rotate: 180,
            factor: 2.5,
            flip: true,
            no_rotation: true,
            ..ImageOptions::default()
        };
        let opts = o.to_engine_options();
        assert_eq!((opts.width, opts.height), (10, 20));
        assert_eq!((opts.area_width, opts.area_height), (30, 40));
        assert_eq!((opts.top, opts.left), (5, 6));
        assert_eq!(opts.rotate, 180);
        assert_eq!(opts.zoom, 2.5);
        assert!(opts.flip);
        assert!(opts.no_auto_rotation);
    }
}
