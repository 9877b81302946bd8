//! The open-raster interface and its affine transform.

use viewer_common::Crs;

use crate::stats::BandStatistics;
use crate::RasterResult;

/// Six-coefficient affine transform from pixel (col, row) to map (x, y).
///
/// Coefficients follow the GDAL ordering:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
/// For north-up rasters `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform from an upper-left origin and pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn origin_x(&self) -> f64 {
        self.0[0]
    }

    pub fn origin_y(&self) -> f64 {
        self.0[3]
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    /// True when both rotation terms are zero.
    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    /// Map coordinates of a (possibly fractional) pixel position.
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let [x0, a, b, y0, d, e] = self.0;
        (x0 + col * a + row * b, y0 + col * d + row * e)
    }
}

/// An open raster.
///
/// Implementations own whatever file handle they need; dropping the value
/// releases it.
pub trait RasterDataset {
    /// Affine transform, or `None` when the raster is not georeferenced.
    fn geo_transform(&self) -> Option<GeoTransform>;

    /// `(width, height)` in pixels.
    fn size(&self) -> (usize, usize);

    /// Declared coordinate reference system, if any.
    fn crs(&self) -> Option<&Crs>;

    fn band_count(&self) -> usize;

    /// Minimum declared in the file's metadata for a 1-based band.
    fn band_minimum(&self, band: usize) -> Option<f64>;

    /// Maximum declared in the file's metadata for a 1-based band.
    fn band_maximum(&self, band: usize) -> Option<f64>;

    /// Scan a 1-based band and compute its statistics.
    fn compute_statistics(&mut self, band: usize) -> RasterResult<BandStatistics>;
}
