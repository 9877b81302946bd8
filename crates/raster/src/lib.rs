//! Raster access for the viewer.
//!
//! The service only talks to rasters through the narrow [`RasterEngine`] and
//! [`RasterDataset`] traits. [`GeoTiffEngine`] implements them in pure Rust:
//!
//! - [`geotiff`]: GeoTIFF decoding (affine transform, CRS, bands, metadata)
//! - [`sample`]: bands held in their stored sample type
//! - [`bounds`]: pixel extent and reprojection to WGS84
//! - [`stats`]: band statistics
//! - [`scale`]: linear byte scaling and PNG export
//! - [`writer`]: multi-band LZW GeoTIFF output
//! - [`merge`]: band-stacking merge of several rasters

pub mod bounds;
pub mod dataset;
pub mod engine;
pub mod error;
mod geokeys;
pub mod geotiff;
pub mod merge;
pub mod metadata;
pub mod sample;
pub mod scale;
pub mod stats;
pub mod writer;

pub use bounds::{pixel_extent, reproject_extent, resolve_bounds};
pub use dataset::{GeoTransform, RasterDataset};
pub use engine::{GeoTiffEngine, RasterEngine, Scaling, TranslateOptions};
pub use error::{RasterError, RasterResult};
pub use geotiff::{GeoTiffDataset, DEFAULT_DECODE_LIMIT};
pub use sample::{BandBuffer, Sample};
pub use scale::ByteRange;
pub use stats::BandStatistics;
pub use writer::FloatRaster;
