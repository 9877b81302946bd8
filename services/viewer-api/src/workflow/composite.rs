//! Merge selected uploads into the single composite slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use raster::{resolve_bounds, RasterEngine, RasterError, TranslateOptions};
use storage::{CompositeUpsert, COMPOSITE_PNG, COMPOSITE_TIF};
use tracing::{debug, info, instrument, warn};
use viewer_common::record::{base_name, has_tiff_extension};
use viewer_common::{BoundingBox, ImageRecord, RecordKind, ViewerError, ViewerResult};

use crate::metrics::{Workflow, WorkflowTimer};
use crate::state::AppState;
use crate::workflow::run_blocking;

/// Range assumed when the composite cannot be reopened for statistics.
const FALLBACK_RANGE: (f64, f64) = (0.0, 65535.0);

/// What a merge hands back to the client.
#[derive(Debug, Clone)]
pub struct CompositeOutcome {
    pub png_url: String,
    pub extent: [f64; 4],
    pub record: ImageRecord,
}

/// Numeric ids of a comma-separated `pics` value. Anything else is ignored.
pub fn parse_ids(pics: &str) -> Vec<i64> {
    pics.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Stack-merge the uploads behind `ids` and upsert the composite record.
#[instrument(skip(state))]
pub async fn merge_selected(state: &AppState, ids: &[i64]) -> ViewerResult<CompositeOutcome> {
    let timer = WorkflowTimer::start(Workflow::Composite);
    let result = merge_inner(state, ids).await;
    timer.finish(result.is_ok());
    result
}

async fn merge_inner(state: &AppState, ids: &[i64]) -> ViewerResult<CompositeOutcome> {
    let records: Vec<ImageRecord> = state
        .catalog
        .find_by_ids(ids)
        .await?
        .into_iter()
        .filter(|r| r.kind == RecordKind::Upload)
        .collect();
    if records.is_empty() {
        return Err(ViewerError::InvalidInput("No images selected".to_string()));
    }

    let inputs = collect_inputs(state, &records).await?;

    state.media.ensure_layout().await?;
    state.media.remove(COMPOSITE_TIF).await?;
    state.media.remove(COMPOSITE_PNG).await?;

    let engine = Arc::clone(&state.engine);
    let tif = state.media.absolute(COMPOSITE_TIF);
    let png = state.media.absolute(COMPOSITE_PNG);
    let bounding_box = run_blocking(move || build_composite(engine.as_ref(), &inputs, &tif, &png)).await?;

    let record = state
        .catalog
        .upsert_composite(&CompositeUpsert {
            source_path: COMPOSITE_TIF.to_string(),
            preview_path: COMPOSITE_PNG.to_string(),
            display_name: base_name(COMPOSITE_PNG).to_string(),
            bounding_box,
        })
        .await?;

    let png_url = match record.preview_path.as_deref() {
        Some(preview) if !preview.is_empty() => state.media.url(preview),
        _ => state.media.url(&record.source_path),
    };

    info!(
        id = record.id,
        inputs = records.len(),
        png_url = %png_url,
        "Composite updated"
    );
    Ok(CompositeOutcome {
        png_url,
        extent: bounding_box.as_array(),
        record,
    })
}

/// Absolute input paths in id order, failing on the first unusable record.
async fn collect_inputs(state: &AppState, records: &[ImageRecord]) -> ViewerResult<Vec<PathBuf>> {
    let mut inputs = Vec::with_capacity(records.len());
    for record in records {
        let name = record.source_file_name();
        if !has_tiff_extension(&record.source_path) {
            return Err(ViewerError::InvalidInput(format!(
                "Invalid input (not a GeoTIFF): {name}"
            )));
        }
        let path = state.media.absolute(&record.source_path);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ViewerError::InvalidInput(format!(
                "Input file missing on disk: {name}"
            )));
        }
        inputs.push(path);
    }
    Ok(inputs)
}

/// Merge `inputs` into `tif`, resolve its bounds and export `png`.
fn build_composite(
    engine: &dyn RasterEngine,
    inputs: &[PathBuf],
    tif: &Path,
    png: &Path,
) -> ViewerResult<BoundingBox> {
    engine.merge_separate(inputs, tif)?;

    let bounding_box = {
        let dataset = engine.open(tif).map_err(|e| {
            warn!(error = %e, "Composite unreadable after merge");
            ViewerError::RasterOpen("Failed to open composite GeoTIFF".to_string())
        })?;
        resolve_bounds(dataset.as_ref()).map_err(|e| match e {
            RasterError::MissingGeoTransform => {
                ViewerError::MissingGeoTransform("Composite has no geotransform".to_string())
            }
            other => other.into(),
        })?
    };
    if !bounding_box.is_finite() {
        return Err(ViewerError::InvalidExtent(
            "Composite extent is invalid (non-finite). Check input rasters CRS/georeferencing."
                .to_string(),
        ));
    }

    let (band_count, (min, max)) = display_range(engine, tif);
    debug!(band_count, min, max, "Composite display range");

    let bands: Vec<usize> = if band_count >= 3 { vec![1, 2, 3] } else { vec![1] };
    let options = TranslateOptions::default()
        .with_bands(bands)
        .with_range(min, max);
    engine.translate_to_png(tif, png, &options)?;

    Ok(bounding_box)
}

/// Band count and the band 1 range used to stretch the preview.
///
/// Declared band 1 minimum/maximum win; otherwise statistics are computed.
fn display_range(engine: &dyn RasterEngine, tif: &Path) -> (usize, (f64, f64)) {
    let mut dataset = match engine.open(tif) {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!(error = %e, "Could not reopen composite, assuming one 16-bit band");
            return (1, FALLBACK_RANGE);
        }
    };

    let band_count = dataset.band_count();
    let range = match (dataset.band_minimum(1), dataset.band_maximum(1)) {
        (Some(min), Some(max)) => (min, max),
        _ => match dataset.compute_statistics(1) {
            Ok(stats) => (stats.min, stats.max),
            Err(e) => {
                warn!(error = %e, "Band 1 statistics unavailable, using the 16-bit range");
                FALLBACK_RANGE
            }
        },
    };
    (band_count, range)
}
