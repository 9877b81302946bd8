//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// An axis-aligned extent.
///
/// For geographic CRS (EPSG:4326) x is longitude and y is latitude, in degrees.
/// Rasters without a declared CRS carry their pixel-space extent in raw map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box enclosing every point. Returns `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(bbox)
    }

    /// The four corners in the order
    /// `(min_x, min_y), (min_x, max_y), (max_x, min_y), (max_x, max_y)`.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.min_x, self.max_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
        ]
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when all four coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }

    /// Compute the union of two bounding boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// `[min_x, min_y, max_x, max_y]`, the layout used by web map clients.
    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let bbox =
            BoundingBox::from_points([(3.0, -1.0), (-2.0, 4.0), (1.0, 1.0), (0.5, -7.5)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, -7.5, 3.0, 4.0));
        assert!(BoundingBox::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_is_finite() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_finite());
        assert!(!BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
        assert!(!BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_finite());
    }
}
