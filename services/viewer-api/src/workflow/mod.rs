//! Upload, conversion and composite workflows.
//!
//! Raster work blocks, so it runs on tokio's blocking pool; catalog and media
//! calls stay on the async side.

pub mod composite;
pub mod convert;
pub mod upload;

pub use composite::{merge_selected, parse_ids, CompositeOutcome};
pub use convert::convert_upload;
pub use upload::{process_upload, UploadFailure};

use viewer_common::{ViewerError, ViewerResult};

/// Run a blocking raster job and flatten a panicked or cancelled task into
/// an internal error.
pub(crate) async fn run_blocking<T, F>(job: F) -> ViewerResult<T>
where
    F: FnOnce() -> ViewerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ViewerError::InternalError(format!("Raster task failed: {e}")))?
}
