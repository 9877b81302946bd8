//! Linear byte scaling of raster bands.

use rayon::prelude::*;

use crate::sample::Sample;
use crate::stats::is_valid;

/// Inclusive source range mapped onto `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByteRange {
    pub min: f64,
    pub max: f64,
}

impl ByteRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Scale one sample.
    ///
    /// Invalid samples and degenerate ranges map to 0.
    #[inline]
    pub fn scale(&self, value: f64, nodata: Option<f64>) -> u8 {
        let span = self.max - self.min;
        if !is_valid(value, nodata) || !(span > 0.0) || !span.is_finite() {
            return 0;
        }
        ((value - self.min) * 255.0 / span).clamp(0.0, 255.0).round() as u8
    }
}

/// Scale a whole band to bytes.
pub fn scale_to_byte<T: Sample>(samples: &[T], range: ByteRange, nodata: Option<f64>) -> Vec<u8> {
    samples
        .par_iter()
        .map(|v| range.scale(v.to_f64(), nodata))
        .collect()
}

/// Interleave equally sized byte bands into pixel order.
pub fn interleave(bands: &[Vec<u8>]) -> Vec<u8> {
    match bands {
        [] => Vec::new(),
        [single] => single.clone(),
        _ => {
            let pixels = bands[0].len();
            let mut out = Vec::with_capacity(pixels * bands.len());
            for i in 0..pixels {
                out.extend(bands.iter().map(|b| b[i]));
            }
            out
        }
    }
}
