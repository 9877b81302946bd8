//! Band samples kept in the type they were stored in.
//!
//! Statistics, byte scaling and merging read samples through [`Sample`], so
//! an 8-bit band costs one byte per pixel in memory rather than eight.

use crate::scale::{self, ByteRange};
use crate::stats::BandStatistics;
use crate::RasterResult;

/// A numeric sample type a band can hold.
pub trait Sample: Copy + Send + Sync {
    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_sample!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// One decoded band.
#[derive(Debug, Clone, PartialEq)]
pub enum BandBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Run `$body` with `$samples` bound to the band's typed slice.
macro_rules! with_samples {
    ($buffer:expr, $samples:ident => $body:expr) => {
        match $buffer {
            BandBuffer::U8($samples) => $body,
            BandBuffer::U16($samples) => $body,
            BandBuffer::U32($samples) => $body,
            BandBuffer::U64($samples) => $body,
            BandBuffer::I8($samples) => $body,
            BandBuffer::I16($samples) => $body,
            BandBuffer::I32($samples) => $body,
            BandBuffer::I64($samples) => $body,
            BandBuffer::F32($samples) => $body,
            BandBuffer::F64($samples) => $body,
        }
    };
}

impl BandBuffer {
    pub fn len(&self) -> usize {
        with_samples!(self, samples => samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index` widened to `f64`.
    pub fn value(&self, index: usize) -> Option<f64> {
        with_samples!(self, samples => samples.get(index).map(|v| v.to_f64()))
    }

    pub fn statistics(&self, band: usize, nodata: Option<f64>) -> RasterResult<BandStatistics> {
        with_samples!(self, samples => BandStatistics::compute(band, samples, nodata))
    }

    pub fn scale_to_byte(&self, range: ByteRange, nodata: Option<f64>) -> Vec<u8> {
        with_samples!(self, samples => scale::scale_to_byte(samples, range, nodata))
    }

    /// Resample onto another grid as `f32`.
    ///
    /// `rows` and `cols` give, per output row and column, the source row
    /// and column underneath (or `None` outside this band's grid, which
    /// yields 0). `width` is this band's row length.
    pub fn resample_f32(
        &self,
        rows: &[Option<usize>],
        cols: &[Option<usize>],
        width: usize,
    ) -> Vec<f32> {
        with_samples!(self, samples => {
            let mut out = Vec::with_capacity(rows.len() * cols.len());
            for row in rows {
                match row {
                    Some(r) => out.extend(cols.iter().map(|col| {
                        col.map_or(0.0, |c| samples[r * width + c].to_f64() as f32)
                    })),
                    None => out.resize(out.len() + cols.len(), 0.0),
                }
            }
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_widens() {
        let band = BandBuffer::I16(vec![-3, 7]);
        assert_eq!(band.value(0), Some(-3.0));
        assert_eq!(band.value(2), None);
        assert_eq!(band.len(), 2);
    }

    #[test]
    fn test_statistics_on_native_samples() {
        let stats = BandBuffer::U8(vec![0, 10, 255]).statistics(1, Some(0.0)).unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 255.0);
        assert_eq!(stats.valid_count, 2);
    }

    #[test]
    fn test_resample_fills_outside_with_zero() {
        // 2x2 source placed in the top-left of a 3x3 grid
        let band = BandBuffer::U16(vec![1, 2, 3, 4]);
        let rows = [Some(0), Some(1), None];
        let cols = [Some(0), Some(1), None];
        assert_eq!(
            band.resample_f32(&rows, &cols, 2),
            vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
