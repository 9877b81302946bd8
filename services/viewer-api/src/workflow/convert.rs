//! Single-image conversion: bounds plus a byte-scaled PNG preview.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use raster::{resolve_bounds, RasterEngine, TranslateOptions};
use storage::ConversionUpdate;
use tracing::{info, instrument, warn};
use viewer_common::record::{base_name, has_tiff_extension};
use viewer_common::{BoundingBox, ImageRecord, ViewerError, ViewerResult};

use crate::metrics::{Workflow, WorkflowTimer};
use crate::state::AppState;
use crate::workflow::run_blocking;

/// Convert a stored upload and persist its bounds, preview and display name.
///
/// Returns the absolute path of the written PNG. On failure the partial PNG
/// is removed and the record is left untouched.
#[instrument(skip(state, record), fields(id = record.id, source = %record.source_path))]
pub async fn convert_upload(state: &AppState, record: &ImageRecord) -> ViewerResult<PathBuf> {
    let timer = WorkflowTimer::start(Workflow::Conversion);
    let result = convert_inner(state, record).await;
    timer.finish(result.is_ok());
    result
}

async fn convert_inner(state: &AppState, record: &ImageRecord) -> ViewerResult<PathBuf> {
    if !has_tiff_extension(&record.source_path) {
        return Err(ViewerError::InvalidInput("File is not a TIFF file".to_string()));
    }

    let preview_path = state.media.preview_path_for(&record.source_path);
    let src = state.media.absolute(&record.source_path);
    let dst = state.media.absolute(&preview_path);

    let engine = Arc::clone(&state.engine);
    let (job_src, job_dst) = (src.clone(), dst.clone());
    let rendered = run_blocking(move || render_preview(engine.as_ref(), &job_src, &job_dst)).await;

    let bounding_box = match rendered {
        Ok(bbox) => bbox,
        Err(e) => {
            discard_partial(state, &preview_path).await;
            return Err(e);
        }
    };

    let update = ConversionUpdate {
        bounding_box,
        display_name: base_name(&preview_path).to_string(),
        preview_path: preview_path.clone(),
    };
    if let Err(e) = state.catalog.apply_conversion(record.id, &update).await {
        discard_partial(state, &preview_path).await;
        return Err(e);
    }

    info!(
        preview = %preview_path,
        min_lon = bounding_box.min_x,
        min_lat = bounding_box.min_y,
        max_lon = bounding_box.max_x,
        max_lat = bounding_box.max_y,
        "Converted upload"
    );
    Ok(dst)
}

/// Resolve the WGS84 bounds of `src` and export it to `dst` as PNG.
fn render_preview(engine: &dyn RasterEngine, src: &Path, dst: &Path) -> ViewerResult<BoundingBox> {
    let bounding_box = {
        let dataset = engine.open(src)?;
        resolve_bounds(dataset.as_ref())?
    };
    if !bounding_box.is_finite() {
        return Err(ViewerError::InvalidExtent(
            "Image extent is invalid (non-finite). Check the raster CRS/georeferencing."
                .to_string(),
        ));
    }

    engine.translate_to_png(src, dst, &TranslateOptions::default())?;

    if !dst.exists() {
        return Err(ViewerError::RenderError(format!(
            "Failed to create PNG at {}",
            dst.display()
        )));
    }
    Ok(bounding_box)
}

async fn discard_partial(state: &AppState, preview_path: &str) {
    if let Err(e) = state.media.remove(preview_path).await {
        warn!(preview = %preview_path, error = %e, "Could not remove partial preview");
    }
}
