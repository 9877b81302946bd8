//! Lookup of PROJ.4 definitions for CRS descriptors.

use std::borrow::Cow;

use viewer_common::Crs;

use crate::ProjectionError;

/// PROJ.4 definition string for a CRS.
pub fn proj_definition(crs: &Crs) -> Result<Cow<'_, str>, ProjectionError> {
    match crs {
        Crs::Epsg(code) => crs_definitions::from_code(*code)
            .map(|def| Cow::Borrowed(def.proj4))
            .ok_or(ProjectionError::UnknownEpsg(*code)),
        Crs::Proj4(def) => Ok(Cow::Borrowed(def.as_str())),
    }
}

/// Whether a PROJ.4 definition describes angular (lon/lat) coordinates.
///
/// proj4rs works in radians for these, so callers convert at the boundary.
pub fn is_geographic(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_is_geographic() {
        let crs = Crs::wgs84();
        let def = proj_definition(&crs).unwrap();
        assert!(is_geographic(&def));
    }

    #[test]
    fn test_web_mercator_is_projected() {
        let crs = Crs::Epsg(3857);
        let def = proj_definition(&crs).unwrap();
        assert!(!is_geographic(&def));
        assert!(def.contains("+proj=merc"));
    }

    #[test]
    fn test_unknown_code() {
        assert!(matches!(
            proj_definition(&Crs::Epsg(1)),
            Err(ProjectionError::UnknownEpsg(1))
        ));
    }

    #[test]
    fn test_raw_definition_passes_through() {
        let crs = Crs::Proj4("+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs".into());
        assert_eq!(
            proj_definition(&crs).unwrap(),
            "+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs"
        );
    }
}
