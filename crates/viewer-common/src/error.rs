//! Error types for geotiff-viewer services.

use thiserror::Error;

/// Result type alias using ViewerError.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Primary error type for viewer operations.
#[derive(Debug, Error)]
pub enum ViewerError {
    // === Request Errors ===
    #[error("{0}")]
    InvalidUpload(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Record not found: {0}")]
    RecordNotFound(i64),

    // === Raster Errors ===
    #[error("{0}")]
    RasterOpen(String),

    #[error("{0}")]
    MissingGeoTransform(String),

    #[error("{0}")]
    InvalidExtent(String),

    #[error("Raster processing failed: {0}")]
    RasterError(String),

    #[error("Projection error: {0}")]
    ProjectionError(String),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ViewerError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            ViewerError::InvalidUpload(_) | ViewerError::InvalidInput(_) => 400,

            ViewerError::RecordNotFound(_) => 404,

            _ => 500,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for ViewerError {
    fn from(err: std::io::Error) -> Self {
        ViewerError::StorageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ViewerError::InvalidInput("x".into()).http_status_code(), 400);
        assert_eq!(ViewerError::RecordNotFound(7).http_status_code(), 404);
        assert_eq!(ViewerError::InvalidExtent("x".into()).http_status_code(), 500);
        assert_eq!(ViewerError::RasterOpen("x".into()).http_status_code(), 500);
    }

    #[test]
    fn test_messages_pass_through() {
        let err = ViewerError::MissingGeoTransform("Composite has no geotransform".into());
        assert_eq!(err.to_string(), "Composite has no geotransform");
    }
}
