//! Image encoding for raster previews.
//!
//! Raster bands are byte-scaled upstream; this crate only turns interleaved
//! 8-bit samples into PNG files.

pub mod png;

pub use png::{create_png, write_png, PngColorType, PngError};
