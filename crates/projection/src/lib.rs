//! Coordinate reference system transformations.
//!
//! Definitions come from the bundled EPSG database in `crs-definitions` and
//! points are transformed with `proj4rs`, so no PROJ system library is needed.

pub mod definitions;
pub mod transform;

pub use definitions::{is_geographic, proj_definition};
pub use transform::CoordinateTransform;

use thiserror::Error;

/// Errors raised while building or applying a transformation.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("EPSG:{0} is not in the projection database")]
    UnknownEpsg(u16),

    #[error("Invalid projection definition '{definition}': {message}")]
    InvalidDefinition { definition: String, message: String },

    #[error("Transform from {source_crs} to {target_crs} failed at ({x}, {y}): {message}")]
    TransformFailed {
        source_crs: String,
        target_crs: String,
        x: f64,
        y: f64,
        message: String,
    },
}

impl From<ProjectionError> for viewer_common::ViewerError {
    fn from(err: ProjectionError) -> Self {
        viewer_common::ViewerError::ProjectionError(err.to_string())
    }
}
