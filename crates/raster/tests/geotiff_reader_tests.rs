//! Reading synthetic GeoTIFFs and resolving their WGS84 bounds.

use raster::{resolve_bounds, BandBuffer, GeoTiffDataset, RasterDataset, RasterError};
use test_utils::{
    assert_approx_eq, create_constant_band, fixtures, temp_media_root, write_fixture, GeoTiffSpec,
};
use viewer_common::{Crs, ViewerError};

#[test]
fn test_wgs84_raster_header() {
    let dir = temp_media_root();
    let path = write_fixture(dir.path(), "small.tif", &fixtures::small_wgs84());

    let ds = GeoTiffDataset::open(&path).unwrap();
    assert_eq!(ds.size(), (16, 8));
    assert_eq!(ds.band_count(), 1);
    assert_eq!(ds.crs(), Some(&Crs::wgs84()));
    assert_eq!(
        ds.geo_transform().unwrap().0,
        [10.0, 0.5, 0.0, 50.0, 0.0, -0.5]
    );
}

#[test]
fn test_wgs84_bounds_are_pixel_extent() {
    let dir = temp_media_root();
    let path = write_fixture(dir.path(), "small.tif", &fixtures::small_wgs84());

    let ds = GeoTiffDataset::open(&path).unwrap();
    let bounds = resolve_bounds(&ds).unwrap();
    assert_eq!(bounds.as_array(), [10.0, 46.0, 18.0, 50.0]);
}

#[test]
fn test_raster_without_crs_returns_pixel_extent() {
    let dir = temp_media_root();
    let spec = fixtures::small_utm().without_crs();
    let path = write_fixture(dir.path(), "nocrs.tif", &spec);

    let ds = GeoTiffDataset::open(&path).unwrap();
    assert!(ds.crs().is_none());
    let bounds = resolve_bounds(&ds).unwrap();
    assert_eq!(bounds.as_array(), [500000.0, 6599400.0, 500600.0, 6600000.0]);
}

#[test]
fn test_utm_bounds_reprojected() {
    let dir = temp_media_root();
    let path = write_fixture(dir.path(), "utm.tif", &fixtures::small_utm());

    let ds = GeoTiffDataset::open(&path).unwrap();
    let bounds = resolve_bounds(&ds).unwrap();
    // Easting 500000 is the zone 33 central meridian (15°E)
    assert_approx_eq!(bounds.min_x, 15.0, 1e-6);
    assert!(bounds.max_x > 15.0 && bounds.max_x < 15.1);
    assert!(bounds.min_y > 59.0 && bounds.max_y < 60.0);
    assert!(bounds.min_y < bounds.max_y);
}

#[test]
fn test_missing_geotransform() {
    let dir = temp_media_root();
    let spec = fixtures::small_wgs84().without_georef();
    let path = write_fixture(dir.path(), "plain.tif", &spec);

    let ds = GeoTiffDataset::open(&path).unwrap();
    assert!(ds.geo_transform().is_none());

    let err = resolve_bounds(&ds).unwrap_err();
    assert!(matches!(err, RasterError::MissingGeoTransform));
    assert_eq!(
        err.to_string(),
        "Could not get geotransform from the image. Is it georeferenced?"
    );
}

#[test]
fn test_not_a_tiff_fails_to_open() {
    let dir = temp_media_root();
    let path = dir.path().join("fake.tif");
    std::fs::write(&path, b"this is not a tiff").unwrap();

    let err = GeoTiffDataset::open(&path).unwrap_err();
    assert!(matches!(err, RasterError::Open { .. }));
    assert!(err.to_string().contains("Is it a valid GeoTIFF?"));
    assert!(matches!(ViewerError::from(err), ViewerError::RasterOpen(_)));
}

#[test]
fn test_declared_statistics() {
    let dir = temp_media_root();
    let spec = fixtures::small_wgs84().with_statistics(vec![(-3.0, 1200.0)]);
    let path = write_fixture(dir.path(), "stats.tif", &spec);

    let ds = GeoTiffDataset::open(&path).unwrap();
    assert_eq!(ds.band_minimum(1), Some(-3.0));
    assert_eq!(ds.band_maximum(1), Some(1200.0));
    assert_eq!(ds.band_minimum(2), None);
}

#[test]
fn test_computed_statistics_skip_nodata() {
    let dir = temp_media_root();
    let mut band = create_constant_band(4, 4, 5.0);
    band[0] = -9999.0;
    band[15] = 25.0;
    let spec = GeoTiffSpec::wgs84(4, 4, 0.0, 4.0, 1.0, band).with_nodata(-9999.0);
    let path = write_fixture(dir.path(), "nodata.tif", &spec);

    let mut ds = GeoTiffDataset::open(&path).unwrap();
    assert_eq!(ds.nodata(), Some(-9999.0));
    assert!(ds.band_minimum(1).is_none());

    let stats = ds.compute_statistics(1).unwrap();
    assert_eq!(stats.min, 5.0);
    assert_eq!(stats.max, 25.0);
    assert_eq!(stats.valid_count, 15);
}

#[test]
fn test_multiband_uint16() {
    let dir = temp_media_root();
    let path = write_fixture(dir.path(), "rgb.tif", &fixtures::rgb_wgs84());

    let mut ds = GeoTiffDataset::open(&path).unwrap();
    assert_eq!(ds.band_count(), 3);
    let first = ds.band(1).unwrap().clone();
    assert!(matches!(first, BandBuffer::U16(_)));
    assert_eq!(ds.band(3).unwrap(), &first);

    let err = ds.band(4).unwrap_err();
    assert!(matches!(err, RasterError::InvalidBand { band: 4, count: 3 }));
}

#[test]
fn test_user_defined_crs_opens_and_reprojects() {
    let dir = temp_media_root();
    let custom = write_fixture(dir.path(), "custom.tif", &fixtures::small_utm_user_defined());
    let epsg = write_fixture(dir.path(), "utm.tif", &fixtures::small_utm());

    let ds = GeoTiffDataset::open(&custom).unwrap();
    let Some(Crs::Proj4(definition)) = ds.crs() else {
        panic!("expected a PROJ.4 CRS, got {:?}", ds.crs());
    };
    assert!(definition.starts_with("+proj=tmerc"), "{definition}");

    // Same projection as EPSG:32633, spelled out as keys
    let custom_bounds = resolve_bounds(&ds).unwrap();
    let epsg_bounds = resolve_bounds(&GeoTiffDataset::open(&epsg).unwrap()).unwrap();
    assert_approx_eq!(custom_bounds.min_x, epsg_bounds.min_x, 1e-7);
    assert_approx_eq!(custom_bounds.min_y, epsg_bounds.min_y, 1e-7);
    assert_approx_eq!(custom_bounds.max_x, epsg_bounds.max_x, 1e-7);
    assert_approx_eq!(custom_bounds.max_y, epsg_bounds.max_y, 1e-7);
}

#[test]
fn test_unsupported_user_defined_projection_opens_without_crs() {
    let dir = temp_media_root();
    // Projected, user-defined, with an unknown coordinate transformation
    let keys = vec![1, 1, 0, 3, 1024, 0, 1, 1, 3072, 0, 1, 32767, 3075, 0, 1, 99];
    let spec = fixtures::small_utm().with_geo_keys(keys, Vec::new());
    let path = write_fixture(dir.path(), "odd.tif", &spec);

    let ds = GeoTiffDataset::open(&path).unwrap();
    assert!(ds.crs().is_none());
    assert!(ds.geo_transform().is_some());
}

#[test]
fn test_declared_dimensions_over_decode_limit_are_refused() {
    let dir = temp_media_root();
    // Header claims 50000x50000 Float32 samples, the file carries 16
    let mut spec = GeoTiffSpec::wgs84(4, 4, 0.0, 4.0, 1.0, create_constant_band(4, 4, 1.0));
    spec.width = 50_000;
    spec.height = 50_000;
    let path = write_fixture(dir.path(), "bomb.tif", &spec);

    let mut ds = GeoTiffDataset::open(&path).unwrap();
    assert_eq!(ds.size(), (50_000, 50_000));
    let err = ds.compute_statistics(1).unwrap_err();
    assert!(matches!(
        err,
        RasterError::DecodeLimit { width: 50_000, height: 50_000, .. }
    ));
}
