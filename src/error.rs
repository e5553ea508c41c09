// src/error.rs
//
// Unified error handling for pixelmill.
// Uses thiserror for simple, type-safe error handling.
//
// Error taxonomy:
// - BadRequest: caller-fixable validation failure, raised before any engine call
// - Processing: engine-side failure during transformation, surfaced verbatim

use std::borrow::Cow;
use thiserror::Error;

/// Classification of an error as seen by the transport layer.
///
/// `BadRequest` errors are raised by operation preconditions (and by the
/// metadata inspector when the input cannot be decoded); the caller can fix
/// them. `Processing` errors come out of the engine and retrying with the
/// same input will not help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Processing,
}

/// pixelmill error types.
///
/// Message fields use `Cow<'static, str>` so static validation messages stay
/// allocation-free while engine messages can carry owned strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelmillError {
    // Validation errors (BadRequest)
    #[error("Missing required param: {name}")]
    MissingParam { name: Cow<'static, str> },

    #[error("Missing required params: {names}")]
    MissingParams { names: Cow<'static, str> },

    #[error("Invalid image type: {value}")]
    InvalidImageType { value: Cow<'static, str> },

    #[error("Cannot retrieve image metadata: {message}")]
    MetadataFailed { message: Cow<'static, str> },

    // Engine errors (Processing)
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Unsupported rotation angle: {degrees}. Only multiples of 90 are supported")]
    InvalidRotationAngle { degrees: i32 },

    #[error(
        "Extract area ({left}+{width}, {top}+{height}) exceeds image dimensions ({img_width}x{img_height})"
    )]
    InvalidExtractArea {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("No usable watermark font for '{spec}'")]
    FontUnavailable { spec: Cow<'static, str> },

    #[error("Engine terminated abnormally: {message}")]
    EnginePanic { message: Cow<'static, str> },

    #[error("{message}")]
    Processing { message: Cow<'static, str> },
}

// Constructor helpers
impl PixelmillError {
    pub fn missing_param(name: impl Into<Cow<'static, str>>) -> Self {
        Self::MissingParam { name: name.into() }
    }

    pub fn missing_params(names: impl Into<Cow<'static, str>>) -> Self {
        Self::MissingParams {
            names: names.into(),
        }
    }

    pub fn invalid_image_type(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidImageType {
            value: value.into(),
        }
    }

    pub fn metadata_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::MetadataFailed {
            message: message.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_rotation_angle(degrees: i32) -> Self {
        Self::InvalidRotationAngle { degrees }
    }

    pub fn invalid_extract_area(
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::InvalidExtractArea {
            left,
            top,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn font_unavailable(spec: impl Into<Cow<'static, str>>) -> Self {
        Self::FontUnavailable { spec: spec.into() }
    }

    pub fn engine_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::EnginePanic {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Processing {
            message: message.into(),
        }
    }

    /// Classify this error for the transport layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParam { .. }
            | Self::MissingParams { .. }
            | Self::InvalidImageType { .. }
            | Self::MetadataFailed { .. } => ErrorKind::BadRequest,

            Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::UnsupportedFormat { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::InvalidRotationAngle { .. }
            | Self::InvalidExtractArea { .. }
            | Self::ResizeFailed { .. }
            | Self::FontUnavailable { .. }
            | Self::EnginePanic { .. }
            | Self::Processing { .. } => ErrorKind::Processing,
        }
    }

    /// Check if this error is caller-fixable.
    pub fn is_bad_request(&self) -> bool {
        self.kind() == ErrorKind::BadRequest
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, PixelmillError>;
