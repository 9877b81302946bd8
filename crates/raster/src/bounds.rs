//! Geographic bounds of a raster.
//!
//! The pixel extent comes straight from the affine transform. When the
//! raster declares a CRS, all four corners are reprojected to WGS84 and the
//! result is the min/max over the transformed corners: a reprojection can
//! rotate the footprint, so pairing corners along axes is not safe.

use projection::CoordinateTransform;
use tracing::debug;
use viewer_common::{BoundingBox, Crs};

use crate::dataset::{GeoTransform, RasterDataset};
use crate::{RasterError, RasterResult};

/// Extent spanned by `width` x `height` pixels.
///
/// Returns `(x0, y0 + h * pixel_height, x0 + w * pixel_width, y0)` as
/// `(min_x, min_y, max_x, max_y)`, for either sign of `pixel_height`.
pub fn pixel_extent(gt: &GeoTransform, width: usize, height: usize) -> BoundingBox {
    let x_min = gt.origin_x();
    let y_max = gt.origin_y();
    let x_max = x_min + gt.pixel_width() * width as f64;
    let y_min = y_max + gt.pixel_height() * height as f64;
    BoundingBox::new(x_min, y_min, x_max, y_max)
}

/// Reproject an extent to WGS84 lon/lat.
///
/// Without a CRS the extent is assumed to be geographic already and is
/// returned unchanged.
pub fn reproject_extent(extent: BoundingBox, crs: Option<&Crs>) -> RasterResult<BoundingBox> {
    let Some(crs) = crs else {
        return Ok(extent);
    };

    let transform = CoordinateTransform::to_wgs84(crs)?;
    if transform.is_identity() {
        return Ok(extent);
    }

    let mut corners = Vec::with_capacity(4);
    for (x, y) in extent.corners() {
        corners.push(transform.transform_point(x, y)?);
    }

    // from_points only fails on an empty iterator
    let reprojected = BoundingBox::from_points(corners).unwrap_or(extent);
    debug!(
        crs = %crs,
        min_lon = reprojected.min_x,
        min_lat = reprojected.min_y,
        max_lon = reprojected.max_x,
        max_lat = reprojected.max_y,
        "Reprojected raster extent"
    );
    Ok(reprojected)
}

/// WGS84 bounds of an open raster.
///
/// Fails when the raster has no affine transform. The result may contain
/// non-finite values; callers decide whether that is fatal.
pub fn resolve_bounds<D: RasterDataset + ?Sized>(dataset: &D) -> RasterResult<BoundingBox> {
    let gt = dataset
        .geo_transform()
        .ok_or(RasterError::MissingGeoTransform)?;
    let (width, height) = dataset.size();
    reproject_extent(pixel_extent(&gt, width, height), dataset.crs())
}
