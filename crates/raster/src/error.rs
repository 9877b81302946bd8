//! Error types for raster operations.

use std::path::PathBuf;

use thiserror::Error;
use viewer_common::ViewerError;

pub type RasterResult<T> = Result<T, RasterError>;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Could not open {}: {message}. Is it a valid GeoTIFF?", .path.display())]
    Open { path: PathBuf, message: String },

    #[error("Could not get geotransform from the image. Is it georeferenced?")]
    MissingGeoTransform,

    #[error("Band {band} out of range (raster has {count} bands)")]
    InvalidBand { band: usize, count: usize },

    #[error("Band {0} has no valid samples")]
    NoValidData(usize),

    #[error("Unsupported raster: {0}")]
    Unsupported(String),

    #[error("Raster of {width}x{height} pixels exceeds the {limit} byte decode limit")]
    DecodeLimit {
        width: usize,
        height: usize,
        limit: usize,
    },

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("LZW compression failed: {0}")]
    Lzw(String),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Projection(#[from] projection::ProjectionError),

    #[error(transparent)]
    Png(#[from] renderer::PngError),
}

impl RasterError {
    pub(crate) fn open(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RasterError::Open {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<RasterError> for ViewerError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::Open { .. } => ViewerError::RasterOpen(err.to_string()),
            RasterError::MissingGeoTransform => ViewerError::MissingGeoTransform(err.to_string()),
            RasterError::Projection(e) => ViewerError::ProjectionError(e.to_string()),
            RasterError::Png(e) => ViewerError::RenderError(e.to_string()),
            other => ViewerError::RasterError(other.to_string()),
        }
    }
}
