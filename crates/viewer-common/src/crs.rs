//! Coordinate reference system descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of WGS84 geographic coordinates (lon/lat in degrees).
pub const WGS84_EPSG: u16 = 4326;

/// A coordinate reference system as declared by a raster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// A registered EPSG code.
    Epsg(u16),
    /// A raw PROJ.4 definition string.
    Proj4(String),
}

impl Crs {
    /// WGS84 geographic coordinates.
    pub fn wgs84() -> Self {
        Crs::Epsg(WGS84_EPSG)
    }

    /// The EPSG code, if this CRS is identified by one.
    pub fn epsg(&self) -> Option<u16> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Proj4(_) => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj4(def) => write!(f, "{}", def),
        }
    }
}
