//! Common test fixtures for viewer tests.

use std::path::{Path, PathBuf};

use crate::generators::{create_ramp_band, create_reflectance_band};
use crate::geotiff::{GeoTiffSpec, SyntheticBands};

/// Bytes just over the default 100 MiB upload limit.
pub const OVERSIZED_UPLOAD_BYTES: usize = 101 * 1024 * 1024;

/// 16x8 ramp over `[10, 18] x [46, 50]` in WGS84, values 0 to 1000.
pub fn small_wgs84() -> GeoTiffSpec {
    GeoTiffSpec::wgs84(16, 8, 10.0, 50.0, 0.5, create_ramp_band(16, 8, 0.0, 1000.0))
}

/// 20x20 ramp in UTM 33N with 30 m pixels, values -5 to 45.
pub fn small_utm() -> GeoTiffSpec {
    GeoTiffSpec::projected(
        20,
        20,
        32633,
        (500000.0, 6600000.0),
        30.0,
        create_ramp_band(20, 20, -5.0, 45.0),
    )
}

/// [`small_utm`] with its CRS written as user-defined transverse Mercator
/// keys equivalent to EPSG:32633.
pub fn small_utm_user_defined() -> GeoTiffSpec {
    let keys = vec![
        1, 1, 0, 10, //
        1024, 0, 1, 1, // GTModelType: projected
        1025, 0, 1, 1, // GTRasterType: pixel is area
        2048, 0, 1, 4326, // GeographicType
        3072, 0, 1, 32767, // ProjectedCSType: user-defined
        3075, 0, 1, 1, // ProjCoordTrans: transverse Mercator
        3076, 0, 1, 9001, // ProjLinearUnits: metre
        3080, 34736, 1, 0, // ProjNatOriginLong
        3082, 34736, 1, 1, // ProjFalseEasting
        3083, 34736, 1, 2, // ProjFalseNorthing
        3092, 34736, 1, 3, // ProjScaleAtNatOrigin
    ];
    small_utm().with_geo_keys(keys, vec![15.0, 500000.0, 0.0, 0.9996])
}

/// Three 16-bit reflectance bands on the [`small_wgs84`] grid.
pub fn rgb_wgs84() -> GeoTiffSpec {
    let band = create_reflectance_band(16, 8);
    small_wgs84().with_bands(SyntheticBands::UInt16(vec![band.clone(), band.clone(), band]))
}

/// Write `spec` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, spec: &GeoTiffSpec) -> PathBuf {
    let path = dir.join(name);
    if let Err(e) = spec.write(&path) {
        panic!("failed to write fixture {}: {e}", path.display());
    }
    path
}

/// Fresh temporary media root, removed when dropped.
pub fn temp_media_root() -> tempfile::TempDir {
    match tempfile::Builder::new().prefix("viewer-media-").tempdir() {
        Ok(dir) => dir,
        Err(e) => panic!("failed to create temporary media root: {e}"),
    }
}
