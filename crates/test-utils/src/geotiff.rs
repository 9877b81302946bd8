//! Synthetic GeoTIFF writer for tests.
//!
//! Produces small uncompressed GeoTIFFs with optional georeferencing, EPSG
//! or hand-written geokeys, GDAL statistics metadata and nodata, so tests
//! can exercise the reader without shipping binary fixtures.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffResult;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const GEO_DOUBLE_PARAMS_TAG: u16 = 34736;
const GDAL_METADATA_TAG: u16 = 42112;
const GDAL_NODATA_TAG: u16 = 42113;

/// Sample storage of the synthetic image.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntheticBands {
    Float32(Vec<Vec<f32>>),
    UInt16(Vec<Vec<u16>>),
}

impl SyntheticBands {
    fn len(&self) -> usize {
        match self {
            Self::Float32(b) => b.len(),
            Self::UInt16(b) => b.len(),
        }
    }
}

/// Description of a synthetic GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffSpec {
    pub width: u32,
    pub height: u32,
    pub bands: SyntheticBands,
    /// `(origin_x, origin_y, pixel_width, pixel_height)`; `pixel_height` is
    /// written as a positive scale. `None` writes a plain TIFF.
    pub georef: Option<(f64, f64, f64, f64)>,
    /// EPSG code and whether it is geographic.
    pub epsg: Option<(u16, bool)>,
    /// Raw GeoKeyDirectory and GeoDoubleParams, written instead of `epsg`.
    pub geo_keys: Option<(Vec<u16>, Vec<f64>)>,
    /// Declared `(min, max)` per band.
    pub statistics: Option<Vec<(f64, f64)>>,
    pub nodata: Option<f64>,
}

impl GeoTiffSpec {
    /// Single Float32 band on a WGS84 grid with its upper-left corner at
    /// `(origin_lon, origin_lat)`.
    pub fn wgs84(
        width: u32,
        height: u32,
        origin_lon: f64,
        origin_lat: f64,
        pixel_size: f64,
        band: Vec<f32>,
    ) -> Self {
        Self {
            width,
            height,
            bands: SyntheticBands::Float32(vec![band]),
            georef: Some((origin_lon, origin_lat, pixel_size, pixel_size)),
            epsg: Some((4326, true)),
            geo_keys: None,
            statistics: None,
            nodata: None,
        }
    }

    /// Single Float32 band in a projected EPSG CRS.
    pub fn projected(
        width: u32,
        height: u32,
        epsg: u16,
        origin: (f64, f64),
        pixel_size: f64,
        band: Vec<f32>,
    ) -> Self {
        Self {
            width,
            height,
            bands: SyntheticBands::Float32(vec![band]),
            georef: Some((origin.0, origin.1, pixel_size, pixel_size)),
            epsg: Some((epsg, false)),
            geo_keys: None,
            statistics: None,
            nodata: None,
        }
    }

    /// Same spec without georeferencing or CRS.
    pub fn without_georef(mut self) -> Self {
        self.georef = None;
        self.without_crs()
    }

    /// Same spec without a declared CRS.
    pub fn without_crs(mut self) -> Self {
        self.epsg = None;
        self.geo_keys = None;
        self
    }

    /// Declare the CRS through raw geokeys.
    pub fn with_geo_keys(mut self, directory: Vec<u16>, doubles: Vec<f64>) -> Self {
        self.epsg = None;
        self.geo_keys = Some((directory, doubles));
        self
    }

    pub fn with_statistics(mut self, stats: Vec<(f64, f64)>) -> Self {
        self.statistics = Some(stats);
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_bands(mut self, bands: SyntheticBands) -> Self {
        self.bands = bands;
        self
    }

    /// Encode to an in-memory GeoTIFF.
    pub fn to_bytes(&self) -> TiffResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor)?;
            self.write_directory(&mut encoder)?;
        }
        Ok(cursor.into_inner())
    }

    /// Encode and write to `path`.
    pub fn write(&self, path: &Path) -> TiffResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    fn write_directory<W: Write + Seek>(&self, encoder: &mut TiffEncoder<W>) -> TiffResult<()> {
        let band_count = self.bands.len();
        let (bits, sample_format) = match self.bands {
            SyntheticBands::Float32(_) => (32u16, 3u16),
            SyntheticBands::UInt16(_) => (16u16, 1u16),
        };

        let mut dir = encoder.image_directory()?;
        dir.write_tag(Tag::ImageWidth, self.width)?;
        dir.write_tag(Tag::ImageLength, self.height)?;
        dir.write_tag(Tag::BitsPerSample, vec![bits; band_count].as_slice())?;
        dir.write_tag(Tag::Compression, 1u16)?;
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, band_count as u16)?;
        dir.write_tag(Tag::SampleFormat, vec![sample_format; band_count].as_slice())?;
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::RowsPerStrip, self.height)?;
        if band_count > 1 {
            dir.write_tag(Tag::ExtraSamples, vec![0u16; band_count - 1].as_slice())?;
        }

        self.write_geo_tags(&mut dir)?;

        let data = self.interleaved_bytes();
        let offset = dir.write_data(data.as_slice())?;
        dir.write_tag(Tag::StripOffsets, offset as u32)?;
        dir.write_tag(Tag::StripByteCounts, data.len() as u32)?;
        dir.finish()
    }

    fn write_geo_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> TiffResult<()> {
        if let Some((x0, y0, sx, sy)) = self.georef {
            let scale = [sx, sy, 0.0];
            let tiepoint = [0.0, 0.0, 0.0, x0, y0, 0.0];
            dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), scale.as_slice())?;
            dir.write_tag(Tag::Unknown(MODEL_TIEPOINT_TAG), tiepoint.as_slice())?;
        }

        if let Some((code, geographic)) = self.epsg {
            let (model_type, crs_key) = if geographic { (2, 2048) } else { (1, 3072) };
            let keys: [u16; 16] = [
                1, 1, 0, 3, //
                1024, 0, 1, model_type, //
                1025, 0, 1, 1, //
                crs_key, 0, 1, code,
            ];
            dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), keys.as_slice())?;
        }

        if let Some((keys, doubles)) = &self.geo_keys {
            dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), keys.as_slice())?;
            if !doubles.is_empty() {
                dir.write_tag(Tag::Unknown(GEO_DOUBLE_PARAMS_TAG), doubles.as_slice())?;
            }
        }

        if let Some(stats) = &self.statistics {
            dir.write_tag(Tag::Unknown(GDAL_METADATA_TAG), gdal_metadata_xml(stats).as_str())?;
        }

        if let Some(nodata) = self.nodata {
            dir.write_tag(Tag::Unknown(GDAL_NODATA_TAG), nodata.to_string().as_str())?;
        }
        Ok(())
    }

    /// Samples as stored. Only as many pixels as the bands hold are
    /// written, so a spec may declare more pixels than it carries.
    fn interleaved_bytes(&self) -> Vec<u8> {
        let pixels = match &self.bands {
            SyntheticBands::Float32(bands) => bands.iter().map(Vec::len).min(),
            SyntheticBands::UInt16(bands) => bands.iter().map(Vec::len).min(),
        }
        .unwrap_or(0);
        let mut out = Vec::new();
        match &self.bands {
            SyntheticBands::Float32(bands) => {
                for i in 0..pixels {
                    for band in bands {
                        out.extend_from_slice(&band[i].to_le_bytes());
                    }
                }
            }
            SyntheticBands::UInt16(bands) => {
                for i in 0..pixels {
                    for band in bands {
                        out.extend_from_slice(&band[i].to_le_bytes());
                    }
                }
            }
        }
        out
    }
}

/// GDAL metadata document declaring per-band statistics.
pub fn gdal_metadata_xml(stats: &[(f64, f64)]) -> String {
    let mut xml = String::from("<GDALMetadata>\n");
    for (sample, (min, max)) in stats.iter().enumerate() {
        xml.push_str(&format!(
            "  <Item name=\"STATISTICS_MAXIMUM\" sample=\"{sample}\">{max}</Item>\n"
        ));
        xml.push_str(&format!(
            "  <Item name=\"STATISTICS_MINIMUM\" sample=\"{sample}\">{min}</Item>\n"
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::create_constant_band;
    use tiff::decoder::Decoder;

    #[test]
    fn test_bytes_decode_as_tiff() {
        let spec = GeoTiffSpec::wgs84(8, 4, 10.0, 50.0, 0.5, create_constant_band(8, 4, 1.0));
        let bytes = spec.to_bytes().unwrap();
        let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (8, 4));
    }

    #[test]
    fn test_metadata_xml() {
        let xml = gdal_metadata_xml(&[(1.0, 9.5)]);
        assert!(xml.contains(r#"<Item name="STATISTICS_MINIMUM" sample="0">1</Item>"#));
        assert!(xml.contains(r#"<Item name="STATISTICS_MAXIMUM" sample="0">9.5</Item>"#));
    }
}
