//! GeoTIFF reader.
//!
//! Georeferencing is read from the GeoTIFF tags:
//!
//! | tag   | meaning                                   |
//! |-------|-------------------------------------------|
//! | 33550 | ModelPixelScale `[sx, sy, sz]`            |
//! | 33922 | ModelTiepoint `[i, j, k, x, y, z]`        |
//! | 34264 | ModelTransformation (4x4, row major)      |
//! | 34735 | GeoKeyDirectory                           |
//! | 34736 | GeoDoubleParams                           |
//! | 42112 | GDAL metadata XML                         |
//! | 42113 | GDAL nodata                               |
//!
//! Bands are decoded on first access, in their stored sample type, and kept
//! for the lifetime of the dataset. Decoding is refused when the image would
//! need more than the dataset's decode limit.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::{debug, instrument};
use viewer_common::Crs;

use crate::dataset::{GeoTransform, RasterDataset};
use crate::geokeys::{GeoKeys, GEO_DOUBLE_PARAMS_TAG, GEO_KEY_DIRECTORY_TAG};
use crate::metadata::{parse_nodata, GdalMetadata, GDAL_METADATA_TAG, GDAL_NODATA_TAG};
use crate::sample::BandBuffer;
use crate::stats::BandStatistics;
use crate::{RasterError, RasterResult};

pub const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
pub const MODEL_TIEPOINT_TAG: u16 = 33922;
pub const MODEL_TRANSFORMATION_TAG: u16 = 34264;

/// Bytes a single decode may allocate unless a limit is given.
pub const DEFAULT_DECODE_LIMIT: usize = 1 << 30;

type TiffReader = Decoder<BufReader<File>>;

/// Build the affine transform from the model tags.
///
/// `ModelTransformation` wins when present. Otherwise a single tiepoint plus
/// a pixel scale gives a north-up transform. Several tiepoints without a
/// scale are ground control points, which have no affine form here.
pub(crate) fn geo_transform_from_tags(
    transformation: Option<&[f64]>,
    tiepoints: Option<&[f64]>,
    scale: Option<&[f64]>,
    pixel_is_point: bool,
) -> Option<GeoTransform> {
    let mut gt = if let Some(m) = transformation.filter(|m| m.len() >= 16) {
        GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]])
    } else {
        let tie = tiepoints.filter(|t| t.len() >= 6)?;
        let scale = scale.filter(|s| s.len() >= 2)?;
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        let (sx, sy) = (scale[0], scale[1]);
        GeoTransform([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy])
    };

    if pixel_is_point {
        // Tie to the pixel corner rather than its centre
        let [x0, a, b, y0, d, e] = gt.0;
        gt.0[0] = x0 - 0.5 * a - 0.5 * b;
        gt.0[3] = y0 - 0.5 * d - 0.5 * e;
    }

    Some(gt)
}

/// A GeoTIFF opened from disk.
pub struct GeoTiffDataset {
    path: PathBuf,
    decoder: TiffReader,
    width: usize,
    height: usize,
    band_count: usize,
    geo_transform: Option<GeoTransform>,
    crs: Option<Crs>,
    nodata: Option<f64>,
    metadata: GdalMetadata,
    decode_limit: usize,
    bands: Option<Vec<BandBuffer>>,
}

impl std::fmt::Debug for GeoTiffDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffDataset")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("band_count", &self.band_count)
            .field("geo_transform", &self.geo_transform)
            .field("crs", &self.crs)
            .finish_non_exhaustive()
    }
}

impl GeoTiffDataset {
    /// Open a GeoTIFF with the default decode limit.
    pub fn open(path: &Path) -> RasterResult<Self> {
        Self::open_with_limit(path, DEFAULT_DECODE_LIMIT)
    }

    /// Open a GeoTIFF and read its header, georeferencing and metadata.
    ///
    /// Pixel data is not read until a band is requested, and only when the
    /// decoded image fits in `decode_limit` bytes.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn open_with_limit(path: &Path, decode_limit: usize) -> RasterResult<Self> {
        let file = File::open(path).map_err(|e| RasterError::open(path, e))?;
        let mut limits = Limits::default();
        limits.decoding_buffer_size = decode_limit;
        limits.intermediate_buffer_size = decode_limit;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| RasterError::open(path, e))?
            .with_limits(limits);

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| RasterError::open(path, e))?;

        let band_count = find_u32(&mut decoder, Tag::SamplesPerPixel)?.unwrap_or(1) as usize;
        if let Some(planar) = find_u32(&mut decoder, Tag::PlanarConfiguration)? {
            if planar == 2 {
                return Err(RasterError::Unsupported(
                    "planar (band-separate) sample layout".to_string(),
                ));
            }
        }

        let double_params = find_f64s(&mut decoder, geo_tag(GEO_DOUBLE_PARAMS_TAG))?.unwrap_or_default();
        let keys = find_u16s(&mut decoder, geo_tag(GEO_KEY_DIRECTORY_TAG))?
            .map(|dir| GeoKeys::parse(&dir, &double_params))
            .unwrap_or_default();
        let crs = keys.crs();

        let transformation = find_f64s(&mut decoder, geo_tag(MODEL_TRANSFORMATION_TAG))?;
        let tiepoints = find_f64s(&mut decoder, geo_tag(MODEL_TIEPOINT_TAG))?;
        let scale = find_f64s(&mut decoder, geo_tag(MODEL_PIXEL_SCALE_TAG))?;
        let geo_transform = geo_transform_from_tags(
            transformation.as_deref(),
            tiepoints.as_deref(),
            scale.as_deref(),
            keys.is_pixel_is_point(),
        );

        let metadata = find_ascii(&mut decoder, geo_tag(GDAL_METADATA_TAG))?
            .map(|xml| GdalMetadata::parse(&xml))
            .unwrap_or_default();
        let nodata = find_ascii(&mut decoder, geo_tag(GDAL_NODATA_TAG))?.and_then(|s| parse_nodata(&s));

        debug!(
            width,
            height,
            band_count,
            crs = ?crs,
            has_transform = geo_transform.is_some(),
            "Opened GeoTIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            width: width as usize,
            height: height as usize,
            band_count,
            geo_transform,
            crs,
            nodata,
            metadata,
            decode_limit,
            bands: None,
        })
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// All bands, decoding the image on first call.
    pub fn bands(&mut self) -> RasterResult<&[BandBuffer]> {
        if self.bands.is_none() {
            let limit = self.decode_limit;
            let image = self.decoder.read_image().map_err(|e| match e {
                TiffError::LimitsExceeded => RasterError::DecodeLimit {
                    width: self.width,
                    height: self.height,
                    limit,
                },
                e => e.into(),
            })?;
            self.bands = Some(split_bands(image, self.width * self.height, self.band_count)?);
        }
        Ok(self.bands.as_deref().unwrap_or(&[]))
    }

    /// Samples of a 1-based band in row-major order.
    pub fn band(&mut self, band: usize) -> RasterResult<&BandBuffer> {
        self.check_band(band)?;
        Ok(&self.bands()?[band - 1])
    }

    /// Decoded bands, consuming the dataset.
    pub fn into_bands(mut self) -> RasterResult<Vec<BandBuffer>> {
        self.bands()?;
        Ok(self.bands.take().unwrap_or_default())
    }

    fn check_band(&self, band: usize) -> RasterResult<()> {
        if band == 0 || band > self.band_count {
            return Err(RasterError::InvalidBand {
                band,
                count: self.band_count,
            });
        }
        Ok(())
    }
}

impl RasterDataset for GeoTiffDataset {
    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    fn band_count(&self) -> usize {
        self.band_count
    }

    fn band_minimum(&self, band: usize) -> Option<f64> {
        self.metadata.band(band).minimum
    }

    fn band_maximum(&self, band: usize) -> Option<f64> {
        self.metadata.band(band).maximum
    }

    fn compute_statistics(&mut self, band: usize) -> RasterResult<BandStatistics> {
        let nodata = self.nodata;
        self.band(band)?.statistics(band, nodata)
    }
}

// ============================================================================
// Tag helpers
// ============================================================================

pub(crate) fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn find_u32(decoder: &mut TiffReader, tag: Tag) -> RasterResult<Option<u32>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_u32()?)),
        None => Ok(None),
    }
}

fn find_u16s(decoder: &mut TiffReader, tag: Tag) -> RasterResult<Option<Vec<u16>>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_u16_vec()?)),
        None => Ok(None),
    }
}

fn find_f64s(decoder: &mut TiffReader, tag: Tag) -> RasterResult<Option<Vec<f64>>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn find_ascii(decoder: &mut TiffReader, tag: Tag) -> RasterResult<Option<String>> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_string()?)),
        None => Ok(None),
    }
}

/// Split a decoded image into bands, keeping the sample type.
fn split_bands(
    image: DecodingResult,
    pixels: usize,
    band_count: usize,
) -> RasterResult<Vec<BandBuffer>> {
    macro_rules! split {
        ($samples:expr, $variant:ident) => {
            deinterleave($samples, pixels, band_count)?
                .into_iter()
                .map(BandBuffer::$variant)
                .collect()
        };
    }

    Ok(match image {
        DecodingResult::U8(v) => split!(v, U8),
        DecodingResult::U16(v) => split!(v, U16),
        DecodingResult::U32(v) => split!(v, U32),
        DecodingResult::U64(v) => split!(v, U64),
        DecodingResult::I8(v) => split!(v, I8),
        DecodingResult::I16(v) => split!(v, I16),
        DecodingResult::I32(v) => split!(v, I32),
        DecodingResult::I64(v) => split!(v, I64),
        DecodingResult::F32(v) => split!(v, F32),
        DecodingResult::F64(v) => split!(v, F64),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(RasterError::Unsupported(
                "sample format not supported".to_string(),
            ))
        }
    })
}

/// Split pixel-interleaved samples into one vector per band.
///
/// A single band takes the samples over without copying.
pub(crate) fn deinterleave<T: Copy>(
    samples: Vec<T>,
    pixels: usize,
    band_count: usize,
) -> RasterResult<Vec<Vec<T>>> {
    if band_count == 0 || samples.len() != pixels * band_count {
        return Err(RasterError::Unsupported(format!(
            "decoded {} samples, expected {} pixels x {} bands",
            samples.len(),
            pixels,
            band_count
        )));
    }
    if band_count == 1 {
        return Ok(vec![samples]);
    }

    let mut bands = vec![Vec::with_capacity(pixels); band_count];
    for pixel in samples.chunks_exact(band_count) {
        for (band, &value) in bands.iter_mut().zip(pixel) {
            band.push(value);
        }
    }
    Ok(bands)
}
