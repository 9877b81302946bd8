//! Multi-band Float32 GeoTIFF output.
//!
//! Samples are written pixel-interleaved in LZW-compressed strips, with the
//! georeferencing stored as a tiepoint + pixel scale (or a full model
//! transformation for rotated grids) and GeoKeys describing the CRS.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::{debug, instrument};
use viewer_common::Crs;
use weezl::{encode::Encoder as LzwEncoder, BitOrder};

use crate::dataset::GeoTransform;
use crate::geokeys::{self, GEO_DOUBLE_PARAMS_TAG, GEO_KEY_DIRECTORY_TAG};
use crate::geotiff::{geo_tag, MODEL_PIXEL_SCALE_TAG, MODEL_TIEPOINT_TAG, MODEL_TRANSFORMATION_TAG};
use crate::{RasterError, RasterResult};

/// Uncompressed bytes targeted per strip.
const STRIP_TARGET_BYTES: usize = 256 * 1024;

const COMPRESSION_LZW: u16 = 5;
const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
const PLANAR_CHUNKY: u16 = 1;
const SAMPLE_FORMAT_IEEE_FLOAT: u16 = 3;
const EXTRA_SAMPLE_UNSPECIFIED: u16 = 0;

/// A georeferenced stack of Float32 bands, all `width * height` long.
#[derive(Debug, Clone)]
pub struct FloatRaster {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Vec<f32>>,
    pub geo_transform: GeoTransform,
    pub crs: Option<Crs>,
}

impl FloatRaster {
    fn validate(&self) -> RasterResult<()> {
        if self.width == 0 || self.height == 0 || self.bands.is_empty() {
            return Err(RasterError::Unsupported(format!(
                "cannot write an empty raster ({}x{}, {} bands)",
                self.width,
                self.height,
                self.bands.len()
            )));
        }
        if self.bands.len() > u16::MAX as usize {
            return Err(RasterError::Unsupported(format!(
                "too many bands: {}",
                self.bands.len()
            )));
        }
        let pixels = self.width * self.height;
        if let Some(bad) = self.bands.iter().position(|b| b.len() != pixels) {
            return Err(RasterError::Unsupported(format!(
                "band {} has {} samples, expected {}",
                bad + 1,
                self.bands[bad].len(),
                pixels
            )));
        }
        Ok(())
    }

    fn rows_per_strip(&self) -> usize {
        let row_bytes = self.width * self.bands.len() * 4;
        (STRIP_TARGET_BYTES / row_bytes).clamp(1, self.height)
    }

    /// Little-endian interleaved bytes for rows `start..end`.
    fn strip_bytes(&self, start: usize, end: usize) -> Vec<u8> {
        let band_count = self.bands.len();
        let mut out = Vec::with_capacity((end - start) * self.width * band_count * 4);
        for i in start * self.width..end * self.width {
            for band in &self.bands {
                out.extend_from_slice(&band[i].to_le_bytes());
            }
        }
        out
    }

    /// Write as an LZW-compressed GeoTIFF.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn write(&self, path: &Path) -> RasterResult<()> {
        self.validate()?;
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = TiffEncoder::new(file)?;
        self.write_directory(&mut encoder)?;
        debug!(
            width = self.width,
            height = self.height,
            bands = self.bands.len(),
            "Wrote GeoTIFF"
        );
        Ok(())
    }

    fn write_directory<W: Write + Seek>(&self, encoder: &mut TiffEncoder<W>) -> RasterResult<()> {
        let band_count = self.bands.len();
        let mut dir = encoder.image_directory()?;

        dir.write_tag(Tag::ImageWidth, self.width as u32)?;
        dir.write_tag(Tag::ImageLength, self.height as u32)?;
        dir.write_tag(Tag::BitsPerSample, vec![32u16; band_count].as_slice())?;
        dir.write_tag(Tag::Compression, COMPRESSION_LZW)?;
        dir.write_tag(Tag::PhotometricInterpretation, PHOTOMETRIC_MIN_IS_BLACK)?;
        dir.write_tag(Tag::SamplesPerPixel, band_count as u16)?;
        dir.write_tag(
            Tag::SampleFormat,
            vec![SAMPLE_FORMAT_IEEE_FLOAT; band_count].as_slice(),
        )?;
        dir.write_tag(Tag::PlanarConfiguration, PLANAR_CHUNKY)?;
        if band_count > 1 {
            dir.write_tag(
                Tag::ExtraSamples,
                vec![EXTRA_SAMPLE_UNSPECIFIED; band_count - 1].as_slice(),
            )?;
        }

        self.write_geo_tags(&mut dir)?;

        let rows_per_strip = self.rows_per_strip();
        dir.write_tag(Tag::RowsPerStrip, rows_per_strip as u32)?;

        let mut offsets = Vec::new();
        let mut byte_counts = Vec::new();
        let mut row = 0;
        while row < self.height {
            let end = (row + rows_per_strip).min(self.height);
            let compressed = lzw_compress(&self.strip_bytes(row, end))?;
            let offset = dir.write_data(compressed.as_slice())?;
            offsets.push(u32::try_from(offset).map_err(|_| {
                RasterError::Unsupported("output exceeds 4 GiB classic TIFF limit".to_string())
            })?);
            byte_counts.push(compressed.len() as u32);
            row = end;
        }
        dir.write_tag(Tag::StripOffsets, offsets.as_slice())?;
        dir.write_tag(Tag::StripByteCounts, byte_counts.as_slice())?;

        dir.finish()?;
        Ok(())
    }

    fn write_geo_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> RasterResult<()> {
        let gt = &self.geo_transform;
        if gt.is_north_up() {
            let scale = [gt.pixel_width(), -gt.pixel_height(), 0.0];
            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x(), gt.origin_y(), 0.0];
            dir.write_tag(geo_tag(MODEL_PIXEL_SCALE_TAG), scale.as_slice())?;
            dir.write_tag(geo_tag(MODEL_TIEPOINT_TAG), tiepoint.as_slice())?;
        } else {
            let [x0, a, b, y0, d, e] = gt.0;
            let matrix = [
                a, b, 0.0, x0, //
                d, e, 0.0, y0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(geo_tag(MODEL_TRANSFORMATION_TAG), matrix.as_slice())?;
        }

        if let Some(directory) = self.crs.as_ref().and_then(geokeys::encode) {
            dir.write_tag(geo_tag(GEO_KEY_DIRECTORY_TAG), directory.keys.as_slice())?;
            if !directory.doubles.is_empty() {
                dir.write_tag(geo_tag(GEO_DOUBLE_PARAMS_TAG), directory.doubles.as_slice())?;
            }
        }
        Ok(())
    }
}

/// TIFF-flavoured LZW (MSB first, early code-size switch).
pub(crate) fn lzw_compress(data: &[u8]) -> RasterResult<Vec<u8>> {
    LzwEncoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(data)
        .map_err(|e| RasterError::Lzw(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RasterDataset;
    use crate::geotiff::GeoTiffDataset;
    use tempfile::TempDir;

    fn raster(width: usize, height: usize, bands: usize) -> FloatRaster {
        FloatRaster {
            width,
            height,
            bands: (0..bands)
                .map(|b| {
                    (0..width * height)
                        .map(|i| (b * 1000 + i) as f32)
                        .collect()
                })
                .collect(),
            geo_transform: GeoTransform::north_up(500000.0, 4100000.0, 30.0, -30.0),
            crs: Some(Crs::Epsg(32633)),
        }
    }

    #[test]
    fn test_empty_raster_rejected() {
        let dir = TempDir::new().unwrap();
        let mut r = raster(4, 4, 1);
        r.bands.clear();
        assert!(r.write(&dir.path().join("empty.tif")).is_err());
    }

    #[test]
    fn test_band_length_mismatch_rejected() {
        let mut r = raster(4, 4, 2);
        r.bands[1].pop();
        assert!(matches!(r.validate(), Err(RasterError::Unsupported(_))));
    }

    #[test]
    fn test_written_file_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack.tif");
        // Tall enough to span several strips
        let r = raster(300, 400, 3);
        r.write(&path).unwrap();

        let mut ds = GeoTiffDataset::open(&path).unwrap();
        assert_eq!(ds.size(), (300, 400));
        assert_eq!(ds.band_count(), 3);
        assert_eq!(ds.crs(), Some(&Crs::Epsg(32633)));
        assert_eq!(ds.geo_transform(), Some(r.geo_transform));

        let band3 = ds.band(3).unwrap();
        assert_eq!(band3.value(0), Some(2000.0));
        assert_eq!(band3.value(300 * 400 - 1), Some((2000 + 300 * 400 - 1) as f64));
    }

    #[test]
    fn test_strips_are_lzw_compressed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flat.tif");
        let mut r = raster(256, 256, 2);
        r.bands = vec![vec![7.0; 256 * 256]; 2];
        r.write(&path).unwrap();

        let mut decoder = tiff::decoder::Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.get_tag_u32(Tag::Compression).unwrap(), COMPRESSION_LZW as u32);
        let raw_bytes = (256 * 256 * 2 * 4) as u64;
        assert!(std::fs::metadata(&path).unwrap().len() < raw_bytes / 10);

        let mut ds = GeoTiffDataset::open(&path).unwrap();
        assert_eq!(ds.band(2).unwrap().value(256 * 256 - 1), Some(7.0));
    }

    #[test]
    fn test_rotated_transform_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotated.tif");
        let mut r = raster(8, 8, 1);
        r.geo_transform = GeoTransform([100.0, 1.0, 0.25, 200.0, 0.5, -1.0]);
        r.write(&path).unwrap();

        let ds = GeoTiffDataset::open(&path).unwrap();
        assert_eq!(ds.geo_transform(), Some(r.geo_transform));
    }

    #[test]
    fn test_user_defined_crs_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.tif");
        let mut r = raster(4, 4, 1);
        r.crs = Some(Crs::Proj4(
            "+proj=tmerc +lat_0=0 +lon_0=15 +k_0=0.9996 +x_0=500000 +y_0=0 +datum=WGS84 +units=m +no_defs"
                .to_string(),
        ));
        r.write(&path).unwrap();

        let ds = GeoTiffDataset::open(&path).unwrap();
        assert_eq!(ds.crs(), r.crs.as_ref());
    }

    #[test]
    fn test_inexpressible_crs_is_written_without_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("robin.tif");
        let mut r = raster(4, 4, 1);
        r.crs = Some(Crs::Proj4("+proj=robin +datum=WGS84 +no_defs".to_string()));
        r.write(&path).unwrap();

        let ds = GeoTiffDataset::open(&path).unwrap();
        assert_eq!(ds.crs(), None);
        assert_eq!(ds.geo_transform(), Some(r.geo_transform));
    }
}
