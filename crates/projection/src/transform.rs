//! Point transformation between two coordinate reference systems.
//!
//! Geographic coordinates are always handled in traditional GIS order:
//! x is longitude, y is latitude, both in degrees.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use tracing::debug;
use viewer_common::Crs;

use crate::definitions::{is_geographic, proj_definition};
use crate::ProjectionError;

/// A reusable transformation from one CRS to another.
pub struct CoordinateTransform {
    source: Crs,
    target: Crs,
    pipeline: Option<Pipeline>,
}

struct Pipeline {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

impl CoordinateTransform {
    /// Build a transformation between two CRS descriptors.
    ///
    /// Identical descriptors produce an identity transform that returns
    /// points untouched.
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, ProjectionError> {
        if source == target {
            return Ok(Self {
                source: source.clone(),
                target: target.clone(),
                pipeline: None,
            });
        }

        let source_def = proj_definition(source)?;
        let target_def = proj_definition(target)?;

        let pipeline = Pipeline {
            source: parse_definition(&source_def)?,
            target: parse_definition(&target_def)?,
            source_geographic: is_geographic(&source_def),
            target_geographic: is_geographic(&target_def),
        };

        debug!(source = %source, target = %target, "Built coordinate transform");

        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            pipeline: Some(pipeline),
        })
    }

    /// Transformation from `source` to WGS84 lon/lat.
    pub fn to_wgs84(source: &Crs) -> Result<Self, ProjectionError> {
        Self::new(source, &Crs::wgs84())
    }

    pub fn is_identity(&self) -> bool {
        self.pipeline.is_none()
    }

    /// Transform a single point.
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let Some(pipeline) = &self.pipeline else {
            return Ok((x, y));
        };

        let mut point = if pipeline.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&pipeline.source, &pipeline.target, &mut point).map_err(|e| {
            ProjectionError::TransformFailed {
                source_crs: self.source.to_string(),
                target_crs: self.target.to_string(),
                x,
                y,
                message: format!("{:?}", e),
            }
        })?;

        if pipeline.target_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

fn parse_definition(definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition).map_err(|e| ProjectionError::InvalidDefinition {
        definition: definition.to_string(),
        message: format!("{:?}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_coords_approx_eq;

    #[test]
    fn test_same_crs_is_identity() {
        let t = CoordinateTransform::new(&Crs::wgs84(), &Crs::wgs84()).unwrap();
        assert!(t.is_identity());
        assert_eq!(t.transform_point(12.345678, -45.6).unwrap(), (12.345678, -45.6));
    }

    #[test]
    fn test_web_mercator_origin() {
        let t = CoordinateTransform::to_wgs84(&Crs::Epsg(3857)).unwrap();
        let (lon, lat) = t.transform_point(0.0, 0.0).unwrap();
        assert_coords_approx_eq!((lon, lat), (0.0, 0.0), 1e-9);
    }

    #[test]
    fn test_web_mercator_antimeridian() {
        let t = CoordinateTransform::to_wgs84(&Crs::Epsg(3857)).unwrap();
        let (lon, _) = t.transform_point(20037508.342789244, 0.0).unwrap();
        assert!((lon - 180.0).abs() < 1e-6, "lon = {}", lon);
    }

    #[test]
    fn test_utm_central_meridian() {
        // UTM zone 33N: false easting 500 km on the 15°E meridian
        let t = CoordinateTransform::to_wgs84(&Crs::Epsg(32633)).unwrap();
        let (lon, lat) = t.transform_point(500000.0, 0.0).unwrap();
        assert_coords_approx_eq!((lon, lat), (15.0, 0.0), 1e-6);
    }

    #[test]
    fn test_round_trip_through_mercator() {
        let forward = CoordinateTransform::new(&Crs::wgs84(), &Crs::Epsg(3857)).unwrap();
        let inverse = CoordinateTransform::to_wgs84(&Crs::Epsg(3857)).unwrap();

        for (lon, lat) in [(10.0, 51.5), (-122.4, 37.8), (139.7, 35.7)] {
            let (x, y) = forward.transform_point(lon, lat).unwrap();
            let (lon2, lat2) = inverse.transform_point(x, y).unwrap();
            assert_coords_approx_eq!((lon2, lat2), (lon, lat), 1e-6);
        }
    }

    #[test]
    fn test_unknown_source_fails() {
        assert!(CoordinateTransform::to_wgs84(&Crs::Epsg(1)).is_err());
    }
}
