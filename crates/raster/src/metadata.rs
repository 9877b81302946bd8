//! GDAL private TIFF tags.
//!
//! GDAL stores per-band metadata as a small XML document in tag 42112:
//!
//! ```xml
//! <GDALMetadata>
//!   <Item name="STATISTICS_MINIMUM" sample="0">12.5</Item>
//!   <Item name="STATISTICS_MAXIMUM" sample="0">980</Item>
//! </GDALMetadata>
//! ```
//!
//! and the nodata value as an ASCII number in tag 42113.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

pub const GDAL_METADATA_TAG: u16 = 42112;
pub const GDAL_NODATA_TAG: u16 = 42113;

/// Declared statistics for one band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeclaredRange {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Per-band declared ranges keyed by 0-based sample index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GdalMetadata {
    bands: BTreeMap<usize, DeclaredRange>,
}

impl GdalMetadata {
    /// Declared range for a 1-based band.
    pub fn band(&self, band: usize) -> DeclaredRange {
        band.checked_sub(1)
            .and_then(|sample| self.bands.get(&sample).copied())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Parse the XML payload of tag 42112.
    ///
    /// Malformed documents yield whatever was read before the error; a
    /// missing statistic is never fatal.
    pub fn parse(xml: &str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut metadata = GdalMetadata::default();
        // (name, sample) of the <Item> being read
        let mut current: Option<(String, usize)> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.name().as_ref() == b"Item" => {
                    let mut name = None;
                    // Items without a sample attribute are dataset-level
                    let mut sample = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"name" => name = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                            b"sample" => {
                                sample = String::from_utf8_lossy(&attr.value).trim().parse().ok()
                            }
                            _ => {}
                        }
                    }
                    current = match (name, sample) {
                        (Some(name), Some(sample)) => Some((name, sample)),
                        _ => None,
                    };
                }
                Ok(Event::Text(t)) => {
                    let Some((name, sample)) = current.as_ref() else {
                        continue;
                    };
                    let Ok(text) = t.unescape() else {
                        continue;
                    };
                    let Ok(value) = text.trim().parse::<f64>() else {
                        continue;
                    };
                    let entry = metadata.bands.entry(*sample).or_default();
                    match name.as_str() {
                        "STATISTICS_MINIMUM" => entry.minimum = Some(value),
                        "STATISTICS_MAXIMUM" => entry.maximum = Some(value),
                        _ => {}
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"Item" => current = None,
                Ok(Event::Eof) => break,
                Err(e) => {
                    warn!(error = %e, "Malformed GDAL metadata, using partial result");
                    break;
                }
                _ => {}
            }
        }

        metadata.bands.retain(|_, r| r.minimum.is_some() || r.maximum.is_some());
        metadata
    }
}

/// Parse the ASCII payload of tag 42113.
pub fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<GDALMetadata>
  <Item name="STATISTICS_MAXIMUM" sample="0">255</Item>
  <Item name="STATISTICS_MEAN" sample="0">101.2</Item>
  <Item name="STATISTICS_MINIMUM" sample="0">3</Item>
  <Item name="STATISTICS_MINIMUM" sample="1">-12.5</Item>
  <Item name="AREA_OR_POINT">Area</Item>
</GDALMetadata>"#;

    #[test]
    fn test_parse_statistics() {
        let md = GdalMetadata::parse(SAMPLE);
        assert_eq!(
            md.band(1),
            DeclaredRange {
                minimum: Some(3.0),
                maximum: Some(255.0)
            }
        );
        assert_eq!(md.band(2).minimum, Some(-12.5));
        assert_eq!(md.band(2).maximum, None);
        assert_eq!(md.band(3), DeclaredRange::default());
        assert_eq!(md.band(0), DeclaredRange::default());
    }

    #[test]
    fn test_parse_without_statistics() {
        let md = GdalMetadata::parse(r#"<GDALMetadata><Item name="AREA_OR_POINT">Point</Item></GDALMetadata>"#);
        assert!(md.is_empty());
    }

    #[test]
    fn test_parse_truncated_document() {
        let md = GdalMetadata::parse(r#"<GDALMetadata><Item name="STATISTICS_MINIMUM" sample="0">7</Item><Item"#);
        assert_eq!(md.band(1).minimum, Some(7.0));
    }

    #[test]
    fn test_parse_nodata() {
        assert_eq!(parse_nodata("-9999\0"), Some(-9999.0));
        assert_eq!(parse_nodata(" 0 "), Some(0.0));
        assert!(parse_nodata("nan").is_some_and(f64::is_nan));
        assert_eq!(parse_nodata("abc"), None);
    }
}
