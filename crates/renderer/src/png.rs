//! PNG encoding for 8-bit interleaved image data.
//!
//! Supports the four non-indexed colour types a byte-scaled raster maps to:
//! - **Greyscale (color type 0)**: one band.
//! - **Greyscale + alpha (color type 4)**: two bands.
//! - **RGB (color type 2)**: three bands.
//! - **RGBA (color type 6)**: four bands.

use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

#[derive(Debug, Error)]
pub enum PngError {
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("PNG supports 1 to 4 channels, got {0}")]
    UnsupportedChannels(usize),

    #[error("Pixel buffer has {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("IDAT compression failed: {0}")]
    Compression(std::io::Error),

    #[error("Failed to write PNG: {0}")]
    Io(#[from] std::io::Error),
}

/// Colour layout of the interleaved samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngColorType {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl PngColorType {
    /// Colour type for a given number of channels (1 to 4).
    pub fn from_channels(channels: usize) -> Result<Self, PngError> {
        match channels {
            1 => Ok(Self::Gray),
            2 => Ok(Self::GrayAlpha),
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            n => Err(PngError::UnsupportedChannels(n)),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::GrayAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Value of the IHDR colour type byte.
    fn code(&self) -> u8 {
        match self {
            Self::Gray => 0,
            Self::GrayAlpha => 4,
            Self::Rgb => 2,
            Self::Rgba => 6,
        }
    }
}

/// Create a PNG image from interleaved 8-bit samples.
///
/// # Arguments
/// - `pixels`: interleaved samples, `width * height * channels` bytes
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
/// - `color_type`: layout of each pixel
pub fn create_png(
    pixels: &[u8],
    width: usize,
    height: usize,
    color_type: PngColorType,
) -> Result<Vec<u8>, PngError> {
    if width == 0 || height == 0 {
        return Err(PngError::InvalidDimensions { width, height });
    }

    let expected = width * height * color_type.channels();
    if pixels.len() != expected {
        return Err(PngError::BufferSizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(color_type.code());
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    // IDAT chunk (image data)
    let idat_data = deflate_idat(pixels, width * color_type.channels(), height)
        .map_err(PngError::Compression)?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    // IEND chunk
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Encode and write a PNG file.
pub fn write_png(
    path: &Path,
    pixels: &[u8],
    width: usize,
    height: usize,
    color_type: PngColorType,
) -> Result<(), PngError> {
    let png = create_png(pixels, width, height, color_type)?;
    std::fs::write(path, &png)?;
    debug!(
        path = %path.display(),
        width,
        height,
        channels = color_type.channels(),
        bytes = png.len(),
        "Wrote PNG"
    );
    Ok(())
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Deflate scanlines for the IDAT chunk.
fn deflate_idat(pixels: &[u8], row_bytes: usize, height: usize) -> std::io::Result<Vec<u8>> {
    // Each row is: filter byte (0 = none) + row_bytes samples
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));
    for row in pixels.chunks_exact(row_bytes) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_type_from_channels() {
        assert_eq!(PngColorType::from_channels(1).unwrap(), PngColorType::Gray);
        assert_eq!(PngColorType::from_channels(2).unwrap(), PngColorType::GrayAlpha);
        assert_eq!(PngColorType::from_channels(3).unwrap(), PngColorType::Rgb);
        assert_eq!(PngColorType::from_channels(4).unwrap(), PngColorType::Rgba);
        assert!(matches!(
            PngColorType::from_channels(5),
            Err(PngError::UnsupportedChannels(5))
        ));
    }

    #[test]
    fn test_signature_and_ihdr() {
        let png = create_png(&[0, 128, 255, 64, 32, 16], 3, 2, PngColorType::Gray).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(&png[16..20], &3u32.to_be_bytes());
        assert_eq!(&png[20..24], &2u32.to_be_bytes());
        assert_eq!(png[24], 8);
        assert_eq!(png[25], 0);
    }

    #[test]
    fn test_buffer_size_checked() {
        let err = create_png(&[0; 5], 2, 1, PngColorType::Rgb).unwrap_err();
        assert!(matches!(
            err,
            PngError::BufferSizeMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            create_png(&[], 0, 4, PngColorType::Gray),
            Err(PngError::InvalidDimensions { .. })
        ));
    }
}
