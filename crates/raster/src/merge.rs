//! Band-stacking merge.
//!
//! Every band of every input becomes one band of the output, in input
//! order. The output grid covers the union of the input extents at the
//! pixel size of the first input; each output pixel takes the input sample
//! under its centre (nearest neighbour) and cells no input covers stay 0.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use viewer_common::BoundingBox;

use crate::bounds::pixel_extent;
use crate::dataset::{GeoTransform, RasterDataset};
use crate::geotiff::GeoTiffDataset;
use crate::writer::FloatRaster;
use crate::{RasterError, RasterResult};

/// One opened input. Its bands are decoded only when placed.
struct MergeInput {
    name: String,
    dataset: GeoTiffDataset,
    geo_transform: GeoTransform,
    width: usize,
    height: usize,
}

impl MergeInput {
    fn open(path: &Path, decode_limit: usize) -> RasterResult<Self> {
        let dataset = GeoTiffDataset::open_with_limit(path, decode_limit)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let geo_transform = dataset.geo_transform().ok_or_else(|| {
            RasterError::Merge(format!("{name} has no geotransform"))
        })?;
        if !geo_transform.is_north_up() {
            return Err(RasterError::Merge(format!(
                "{name} is rotated; only north-up rasters can be merged"
            )));
        }
        let (width, height) = dataset.size();

        Ok(Self {
            name,
            dataset,
            geo_transform,
            width,
            height,
        })
    }

    fn extent(&self) -> BoundingBox {
        let e = pixel_extent(&self.geo_transform, self.width, self.height);
        // South-up rasters give min_y > max_y from the literal formula
        BoundingBox::new(
            e.min_x.min(e.max_x),
            e.min_y.min(e.max_y),
            e.min_x.max(e.max_x),
            e.min_y.max(e.max_y),
        )
    }

    /// Input column under each output column centre.
    fn columns(&self, grid: &GeoTransform, width: usize) -> Vec<Option<usize>> {
        (0..width)
            .map(|col| {
                let x = grid.origin_x() + (col as f64 + 0.5) * grid.pixel_width();
                axis_index(x, self.geo_transform.origin_x(), self.geo_transform.pixel_width(), self.width)
            })
            .collect()
    }

    /// Input row under each output row centre.
    fn rows(&self, grid: &GeoTransform, height: usize) -> Vec<Option<usize>> {
        (0..height)
            .map(|row| {
                let y = grid.origin_y() + (row as f64 + 0.5) * grid.pixel_height();
                axis_index(y, self.geo_transform.origin_y(), self.geo_transform.pixel_height(), self.height)
            })
            .collect()
    }
}

/// Cell along one axis containing `coord`, if inside `0..len`.
fn axis_index(coord: f64, origin: f64, step: f64, len: usize) -> Option<usize> {
    let i = ((coord - origin) / step).floor();
    (i >= 0.0 && i < len as f64).then_some(i as usize)
}

/// Merge `inputs` into a multi-band GeoTIFF at `dst`.
///
/// All inputs must be north-up and share the first input's CRS. Inputs are
/// decoded one at a time, and neither an input nor the merged stack may
/// exceed `decode_limit` bytes.
#[instrument(level = "debug", skip_all, fields(inputs = inputs.len(), dst = %dst.display()))]
pub fn merge_separate(inputs: &[PathBuf], dst: &Path, decode_limit: usize) -> RasterResult<()> {
    if inputs.is_empty() {
        return Err(RasterError::Merge("no input rasters".to_string()));
    }

    let mut opened: Vec<MergeInput> = Vec::with_capacity(inputs.len());
    for path in inputs {
        let input = MergeInput::open(path, decode_limit)?;
        if let Some(first) = opened.first() {
            if input.dataset.crs() != first.dataset.crs() {
                return Err(RasterError::Merge(format!(
                    "{} has a different coordinate reference system than the first input",
                    input.name
                )));
            }
        }
        opened.push(input);
    }

    let first = &opened[0];
    let crs = first.dataset.crs().cloned();
    let pixel_width = first.geo_transform.pixel_width();
    let pixel_height = first.geo_transform.pixel_height();
    if pixel_width == 0.0 || pixel_height == 0.0 {
        return Err(RasterError::Merge(format!(
            "{} has a zero pixel size",
            first.name
        )));
    }

    let extent = opened
        .iter()
        .skip(1)
        .fold(first.extent(), |acc, input| acc.union(&input.extent()));
    let width = ((extent.width() / pixel_width.abs()) + 0.5) as usize;
    let height = ((extent.height() / pixel_height.abs()) + 0.5) as usize;
    if width == 0 || height == 0 {
        return Err(RasterError::Merge(format!(
            "merged grid is empty ({width}x{height})"
        )));
    }

    let band_total: usize = opened.iter().map(|i| i.dataset.band_count()).sum();
    let output_bytes = width
        .checked_mul(height)
        .and_then(|p| p.checked_mul(band_total))
        .and_then(|s| s.checked_mul(std::mem::size_of::<f32>()));
    if output_bytes.map_or(true, |bytes| bytes > decode_limit) {
        return Err(RasterError::DecodeLimit {
            width,
            height,
            limit: decode_limit,
        });
    }

    // Keep the first input's axis directions
    let origin_x = if pixel_width > 0.0 { extent.min_x } else { extent.max_x };
    let origin_y = if pixel_height < 0.0 { extent.max_y } else { extent.min_y };
    let geo_transform = GeoTransform::north_up(origin_x, origin_y, pixel_width, pixel_height);

    let input_count = opened.len();
    let mut bands: Vec<Vec<f32>> = Vec::with_capacity(band_total);
    for input in opened {
        let cols = input.columns(&geo_transform, width);
        let rows = input.rows(&geo_transform, height);
        let name = input.name;
        let source_width = input.width;

        let decoded = input.dataset.into_bands()?;
        for band in &decoded {
            bands.push(band.resample_f32(&rows, &cols, source_width));
        }
        debug!(input = %name, bands = decoded.len(), "Placed input bands");
    }

    FloatRaster {
        width,
        height,
        bands,
        geo_transform,
        crs,
    }
    .write(dst)?;

    info!(
        inputs = input_count,
        bands = band_total,
        width,
        height,
        "Merged rasters"
    );
    Ok(())
}
