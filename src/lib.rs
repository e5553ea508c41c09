// src/lib.rs
//
// pixelmill: a validated image transformation layer over an in-process codec
// engine.

//! Fixed catalog of image operations (resize, crop, extract, rotate,
//! flip/flop, zoom, convert, watermark, metadata) that validate their
//! parameters, map them onto engine options, and run the codec engine behind
//! a panic-absorbing gateway.
//!
//! ```no_run
//! use pixelmill::{ops, ImageOptions};
//!
//! let buf = std::fs::read("photo.jpg")?;
//! let opts = ImageOptions {
//!     width: 300,
//!     ..ImageOptions::default()
//! };
//! let out = ops::resize(&buf, &opts)?;
//! assert!(out.mime.starts_with("image/"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod error;
pub mod gateway;
pub mod meta;
pub mod ops;
pub mod options;

pub use engine::{Colorspace, EngineOptions, Extend, Gravity, ImageType, WatermarkOptions};
pub use error::{ErrorKind, PixelmillError, Result};
pub use meta::ImageInfo;
pub use ops::Operation;
pub use options::ImageOptions;

/// An image binary buffer and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub body: Vec<u8>,
    pub mime: String,
}
