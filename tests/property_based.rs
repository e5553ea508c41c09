// tests/property_based.rs
//
// Property-based invariants: validation short-circuits fire before any
// decoding, and the option mapper is total under arbitrary input.

use pixelmill::{ops, ErrorKind, Gravity, ImageOptions};
use proptest::prelude::*;

fn arbitrary_options() -> impl Strategy<Value = ImageOptions> {
    (
        (0u32..5000, 0u32..5000, 0u32..5000, 0u32..5000),
        (0u32..5000, 0u32..5000),
        (0u8..=255, 0u8..=255, any::<i32>(), -10.0f32..10.0),
        ".{0,12}",
        ".{0,12}",
        ".{0,12}",
        ".{0,12}",
        proptest::collection::vec(any::<u8>(), 0..6),
        any::<bool>(),
    )
        .prop_map(
            |(
                (width, height, area_width, area_height),
                (top, left),
                (quality, compression, rotate, factor),
                image_type,
                gravity,
                colorspace,
                extend,
                background,
                no_crop,
            )| ImageOptions {
                width,
                height,
                area_width,
                area_height,
                top,
                left,
                quality,
                compression,
                rotate,
                factor,
                image_type,
                gravity,
                colorspace,
                extend,
                background,
                no_crop,
                ..ImageOptions::default()
            },
        )
}

proptest! {
    /// The mapper never panics and always produces in-range values, no matter
    /// what strings and numbers come in.
    #[test]
    fn mapper_is_total(o in arbitrary_options()) {
        let engine = o.to_engine_options();
        prop_assert!(engine.quality >= 1 && engine.quality <= 100);
        prop_assert!(engine.compression >= 1 && engine.compression <= 9);
        if o.background.len() > 2 {
            prop_assert_eq!(
                engine.background,
                Some([o.background[0], o.background[1], o.background[2]])
            );
        } else {
            prop_assert_eq!(engine.background, None);
        }
    }

    /// Unknown gravity strings always fall back to centre rather than failing.
    #[test]
    fn unknown_gravity_defaults_to_centre(s in "[a-z]{1,10}") {
        prop_assume!(!matches!(s.as_str(), "north" | "south" | "east" | "west"));
        let o = ImageOptions { gravity: s, ..ImageOptions::default() };
        prop_assert_eq!(o.to_engine_options().gravity, Gravity::Centre);
    }

    /// Missing dimensions short-circuit before the buffer is ever looked at:
    /// even a garbage buffer yields the validation error, classified as bad
    /// input.
    #[test]
    fn resize_validation_fires_before_decode(buf in proptest::collection::vec(any::<u8>(), 0..64)) {
        let o = ImageOptions::default();
        let err = ops::resize(&buf, &o).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::BadRequest);
        prop_assert_eq!(err.to_string(), "Missing required param: height or width");
    }

    #[test]
    fn zoom_validation_fires_before_decode(buf in proptest::collection::vec(any::<u8>(), 0..64)) {
        let o = ImageOptions::default();
        let err = ops::zoom(&buf, &o).unwrap_err();
        prop_assert_eq!(err.to_string(), "Missing required param: factor");
    }

    #[test]
    fn convert_rejects_unknown_types(s in "[a-z]{1,8}") {
        prop_assume!(!matches!(s.as_str(), "jpeg" | "jpg" | "png" | "webp" | "gif" | "tiff"));
        let o = ImageOptions { image_type: s.clone(), ..ImageOptions::default() };
        let err = ops::convert(b"irrelevant", &o).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::BadRequest);
        prop_assert_eq!(err.to_string(), format!("Invalid image type: {s}"));
    }

    /// Every validation error message is non-empty and names the parameter.
    #[test]
    fn validation_errors_are_never_empty(o in arbitrary_options()) {
        for op in [ops::resize, ops::enlarge, ops::extract, ops::crop, ops::rotate, ops::thumbnail, ops::zoom] {
            if let Err(err) = op(b"", &o) {
                prop_assert!(!err.to_string().is_empty());
            }
        }
    }
}
