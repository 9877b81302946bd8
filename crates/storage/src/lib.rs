//! Storage for the GeoTIFF viewer.
//!
//! Provides:
//! - [`ImageCatalog`]: image records in SQLite
//! - [`MediaStore`]: the on-disk media layout (uploads, previews, composite)

pub mod catalog;
pub mod media;

pub use catalog::{CompositeUpsert, ConversionUpdate, ImageCatalog};
pub use media::{MediaStore, COMPOSITE_PNG, COMPOSITE_TIF};
