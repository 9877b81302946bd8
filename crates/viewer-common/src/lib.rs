//! Common types and utilities shared across the geotiff-viewer crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod record;

pub use bbox::BoundingBox;
pub use crs::Crs;
pub use error::{ViewerError, ViewerResult};
pub use record::{ImageRecord, RecordKind};
