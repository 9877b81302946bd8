//! Exact band statistics.

use rayon::prelude::*;

use crate::sample::Sample;
use crate::{RasterError, RasterResult};

/// Samples below this count are scanned on the calling thread.
const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Statistics over the valid samples of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub valid_count: usize,
}

/// A sample is valid when it is not NaN and not the nodata value.
#[inline]
pub fn is_valid(value: f64, nodata: Option<f64>) -> bool {
    !value.is_nan() && nodata.map_or(true, |nd| value != nd)
}

impl BandStatistics {
    /// Compute statistics for a 1-based `band` over `samples`.
    ///
    /// Fails with [`RasterError::NoValidData`] when every sample is invalid.
    pub fn compute<T: Sample>(band: usize, samples: &[T], nodata: Option<f64>) -> RasterResult<Self> {
        let summary = if samples.len() < PARALLEL_THRESHOLD {
            Summary::scan(samples, nodata)
        } else {
            let chunk = (samples.len() / rayon::current_num_threads()).max(PARALLEL_THRESHOLD);
            samples
                .par_chunks(chunk)
                .map(|c| Summary::scan(c, nodata))
                .reduce(Summary::default, Summary::merge)
        };

        if summary.count == 0 {
            return Err(RasterError::NoValidData(band));
        }

        let mean = summary.sum / summary.count as f64;
        // Second pass around the mean keeps the variance stable for large offsets
        let sq: f64 = if samples.len() < PARALLEL_THRESHOLD {
            squared_deviation(samples, nodata, mean)
        } else {
            samples
                .par_chunks(PARALLEL_THRESHOLD)
                .map(|c| squared_deviation(c, nodata, mean))
                .sum()
        };

        Ok(Self {
            min: summary.min,
            max: summary.max,
            mean,
            std_dev: (sq / summary.count as f64).sqrt(),
            valid_count: summary.count,
        })
    }
}

fn squared_deviation<T: Sample>(samples: &[T], nodata: Option<f64>, mean: f64) -> f64 {
    samples
        .iter()
        .map(|v| v.to_f64())
        .filter(|&v| is_valid(v, nodata))
        .map(|v| (v - mean) * (v - mean))
        .sum()
}

/// Running min/max/sum over a chunk.
#[derive(Debug, Clone, Copy)]
struct Summary {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

impl Summary {
    fn scan<T: Sample>(samples: &[T], nodata: Option<f64>) -> Self {
        let mut s = Self::default();
        for v in samples.iter().map(|v| v.to_f64()) {
            if is_valid(v, nodata) {
                s.min = s.min.min(v);
                s.max = s.max.max(v);
                s.sum += v;
                s.count += 1;
            }
        }
        s
    }

    fn merge(a: Self, b: Self) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
            sum: a.sum + b.sum,
            count: a.count + b.count,
        }
    }
}
