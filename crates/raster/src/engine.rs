//! The raster engine seam used by the service.

use std::path::{Path, PathBuf};

use renderer::{write_png, PngColorType};
use tracing::{debug, instrument, warn};

use crate::dataset::RasterDataset;
use crate::geotiff::{GeoTiffDataset, DEFAULT_DECODE_LIMIT};
use crate::merge;
use crate::scale::{interleave, ByteRange};
use crate::{RasterError, RasterResult};

/// PNG colour types stop at four channels.
const MAX_PNG_BANDS: usize = 4;

/// Source range for byte scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Scaling {
    /// Each band is stretched from its own computed min/max.
    #[default]
    Auto,
    /// Every band is stretched from the same explicit range.
    Range { src_min: f64, src_max: f64 },
}

/// Options for a byte-scaled PNG export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslateOptions {
    /// 1-based bands to export, in output channel order. `None` exports all.
    pub bands: Option<Vec<usize>>,
    pub scaling: Scaling,
}

impl TranslateOptions {
    pub fn with_bands(mut self, bands: impl Into<Vec<usize>>) -> Self {
        self.bands = Some(bands.into());
        self
    }

    pub fn with_range(mut self, src_min: f64, src_max: f64) -> Self {
        self.scaling = Scaling::Range { src_min, src_max };
        self
    }
}

/// Raster operations the viewer needs.
///
/// All methods block; async callers run them on a blocking thread.
pub trait RasterEngine: Send + Sync {
    fn open(&self, path: &Path) -> RasterResult<Box<dyn RasterDataset>>;

    /// Byte-scale bands of `src` and write them to `dst` as PNG.
    fn translate_to_png(
        &self,
        src: &Path,
        dst: &Path,
        options: &TranslateOptions,
    ) -> RasterResult<()>;

    /// Stack every band of `inputs` into one LZW GeoTIFF at `dst`.
    fn merge_separate(&self, inputs: &[PathBuf], dst: &Path) -> RasterResult<()>;
}

/// Pure-Rust GeoTIFF engine.
///
/// Every raster it opens or writes is bounded by one decode limit.
#[derive(Debug, Clone, Copy)]
pub struct GeoTiffEngine {
    decode_limit: usize,
}

impl GeoTiffEngine {
    pub fn new() -> Self {
        Self::with_decode_limit(DEFAULT_DECODE_LIMIT)
    }

    pub fn with_decode_limit(decode_limit: usize) -> Self {
        Self { decode_limit }
    }
}

impl Default for GeoTiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterEngine for GeoTiffEngine {
    fn open(&self, path: &Path) -> RasterResult<Box<dyn RasterDataset>> {
        Ok(Box::new(GeoTiffDataset::open_with_limit(path, self.decode_limit)?))
    }

    #[instrument(level = "debug", skip_all, fields(src = %src.display(), dst = %dst.display()))]
    fn translate_to_png(
        &self,
        src: &Path,
        dst: &Path,
        options: &TranslateOptions,
    ) -> RasterResult<()> {
        let mut dataset = GeoTiffDataset::open_with_limit(src, self.decode_limit)?;
        let band_count = dataset.band_count();
        let selected: Vec<usize> = match &options.bands {
            Some(bands) => bands.clone(),
            None => (1..=band_count).collect(),
        };
        if selected.is_empty() || selected.len() > MAX_PNG_BANDS {
            return Err(RasterError::Unsupported(format!(
                "PNG output needs 1 to {MAX_PNG_BANDS} bands, {} selected",
                selected.len()
            )));
        }

        let nodata = dataset.nodata();
        let mut scaled = Vec::with_capacity(selected.len());
        for &band in &selected {
            let range = match options.scaling {
                Scaling::Range { src_min, src_max } => ByteRange::new(src_min, src_max),
                Scaling::Auto => match dataset.compute_statistics(band) {
                    Ok(stats) => ByteRange::new(stats.min, stats.max),
                    Err(RasterError::NoValidData(_)) => {
                        warn!(band, "Band has no valid samples, exporting zeros");
                        ByteRange::new(0.0, 0.0)
                    }
                    Err(e) => return Err(e),
                },
            };
            debug!(band, min = range.min, max = range.max, "Scaling band");
            scaled.push(dataset.band(band)?.scale_to_byte(range, nodata));
        }

        let (width, height) = dataset.size();
        let color_type = PngColorType::from_channels(scaled.len())?;
        write_png(dst, &interleave(&scaled), width, height, color_type)?;
        Ok(())
    }

    fn merge_separate(&self, inputs: &[PathBuf], dst: &Path) -> RasterResult<()> {
        merge::merge_separate(inputs, dst, self.decode_limit)
    }
}
