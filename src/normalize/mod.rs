//! Format normalizer - re-encode extracted streams to PNG.
//!
//! The detected format comes from the stream's own magic bytes, not from
//! the tag the scanner assigned. Every call returns bytes: the original
//! PNG, a converted PNG, a 100x100 placeholder, or (if even the
//! placeholder cannot be encoded) an empty buffer.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::carve::signatures::sniff_format;
use crate::core::{FormatKind, RawBuffer};
use crate::error::DrillError;

/// Placeholder edge length in pixels
pub const PLACEHOLDER_SIZE: u32 = 100;

/// Placeholder fill (light gray)
pub const PLACEHOLDER_FILL: [u8; 3] = [211, 211, 211];

/// Which path produced the output bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizeStatus {
    OriginalWasCanonical,
    Converted,
    Placeholder,
    Empty,
}

impl NormalizeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizeStatus::OriginalWasCanonical => "original-was-canonical",
            NormalizeStatus::Converted => "converted",
            NormalizeStatus::Placeholder => "placeholder",
            NormalizeStatus::Empty => "empty",
        }
    }
}

/// Why the real image could not be used
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum FallbackReason {
    #[error("no recognizable image signature")]
    Unrecognized,

    #[error("failed to decode {0}")]
    DecodeFailed(String),

    #[error("failed to encode PNG: {0}")]
    EncodeFailed(String),
}

impl From<FallbackReason> for DrillError {
    fn from(reason: FallbackReason) -> Self {
        DrillError::DecodeFailure(reason.to_string())
    }
}

/// Normalizer output
#[derive(Debug, Clone)]
pub enum Normalized {
    /// Real pixels from the input, as PNG
    Real { bytes: Vec<u8>, source: ImageFormat },
    /// Placeholder PNG, or empty bytes if the placeholder failed too
    Fallback { bytes: Vec<u8>, reason: FallbackReason },
}

impl Normalized {
    pub fn status(&self) -> NormalizeStatus {
        match self {
            Normalized::Real { source, .. } if *source == ImageFormat::Png => {
                NormalizeStatus::OriginalWasCanonical
            }
            Normalized::Real { .. } => NormalizeStatus::Converted,
            Normalized::Fallback { bytes, .. } if bytes.is_empty() => NormalizeStatus::Empty,
            Normalized::Fallback { .. } => NormalizeStatus::Placeholder,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Normalized::Real { bytes, .. } | Normalized::Fallback { bytes, .. } => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Normalized::Real { bytes, .. } | Normalized::Fallback { bytes, .. } => bytes,
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Normalized::Fallback { reason, .. } => Some(reason),
            Normalized::Real { .. } => None,
        }
    }
}

/// Detect a stream's image format: known magic first, then the codec's own sniffing
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    match sniff_format(data) {
        FormatKind::Png => Some(ImageFormat::Png),
        FormatKind::Jpeg => Some(ImageFormat::Jpeg),
        FormatKind::Bmp => Some(ImageFormat::Bmp),
        FormatKind::Gif => Some(ImageFormat::Gif),
        FormatKind::Webp => Some(ImageFormat::WebP),
        FormatKind::ContainerEmbedded | FormatKind::Unknown => image::guess_format(data).ok(),
    }
}

/// Normalize one stream to PNG. Never fails.
pub fn normalize_to_canonical(data: &[u8]) -> Normalized {
    let Some(format) = detect_format(data) else {
        return fallback(FallbackReason::Unrecognized, data.len());
    };

    tracing::debug!(?format, size = data.len(), "Detected image format");

    if format == ImageFormat::Png {
        return Normalized::Real {
            bytes: data.to_vec(),
            source: format,
        };
    }

    match convert_to_png(data, format) {
        Ok(bytes) => {
            tracing::debug!(?format, png_size = bytes.len(), "PNG conversion successful");
            Normalized::Real {
                bytes,
                source: format,
            }
        }
        Err(reason) => fallback(reason, data.len()),
    }
}

/// Read an image file and normalize it
pub fn normalize_file(path: &Path) -> Result<Normalized, DrillError> {
    let buf = RawBuffer::from_file(path)?;
    Ok(normalize_to_canonical(buf.as_bytes()))
}

fn convert_to_png(data: &[u8], format: ImageFormat) -> Result<Vec<u8>, FallbackReason> {
    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| FallbackReason::DecodeFailed(format!("{:?}: {}", format, e)))?;

    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    };

    encode_png(&img)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, FallbackReason> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| FallbackReason::EncodeFailed(e.to_string()))?;
    Ok(out.into_inner())
}

/// Solid light-gray 100x100 PNG
pub fn placeholder_png() -> Result<Vec<u8>, FallbackReason> {
    let img = RgbImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, Rgb(PLACEHOLDER_FILL));
    encode_png(&DynamicImage::ImageRgb8(img))
}

fn fallback(reason: FallbackReason, size: usize) -> Normalized {
    tracing::warn!(
        size,
        error = %DrillError::from(reason.clone()),
        "Using placeholder image"
    );
    let bytes = match placeholder_png() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Placeholder generation failed, returning empty image");
            Vec::new()
        }
    };
    Normalized::Fallback { bytes, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_unrecognized_bytes_get_placeholder() {
        let result = normalize_to_canonical(b"definitely not an image at all");
        assert_eq!(result.status(), NormalizeStatus::Placeholder);
        assert_eq!(result.fallback_reason(), Some(&FallbackReason::Unrecognized));

        let decoded =
            image::load_from_memory_with_format(result.bytes(), ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
        assert_eq!(decoded.get_pixel(50, 50), Rgba([211, 211, 211, 255]));
    }

    #[test]
    fn test_fallback_reason_is_decode_failure() {
        let err = DrillError::from(FallbackReason::DecodeFailed("Jpeg: bad SOF".into()));
        assert_eq!(err.kind(), crate::error::ErrorKind::DecodeFailure);
        assert_eq!(err.to_string(), "decode failure: failed to decode Jpeg: bad SOF");
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        assert_eq!(placeholder_png().unwrap(), placeholder_png().unwrap());
    }

    #[test]
    fn test_png_passes_through() {
        let png = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]))),
            ImageFormat::Png,
        );
        let result = normalize_to_canonical(&png);
        assert_eq!(result.status(), NormalizeStatus::OriginalWasCanonical);
        assert_eq!(result.bytes(), png.as_slice());
    }

    #[test]
    fn test_bmp_is_converted() {
        let bmp = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]))),
            ImageFormat::Bmp,
        );
        let result = normalize_to_canonical(&bmp);
        assert_eq!(result.status(), NormalizeStatus::Converted);

        let decoded =
            image::load_from_memory_with_format(result.bytes(), ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }

    #[test]
    fn test_gif_is_converted_with_alpha() {
        let gif = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]))),
            ImageFormat::Gif,
        );
        assert_eq!(detect_format(&gif), Some(ImageFormat::Gif));

        let result = normalize_to_canonical(&gif);
        assert_eq!(result.status(), NormalizeStatus::Converted);
        assert!(result.bytes().starts_with(crate::carve::signatures::PNG_MAGIC));
    }

    #[test]
    fn test_truncated_jpeg_falls_back() {
        let result = normalize_to_canonical(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9]);
        assert_eq!(result.status(), NormalizeStatus::Placeholder);
        assert!(matches!(
            result.fallback_reason(),
            Some(FallbackReason::DecodeFailed(_))
        ));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(NormalizeStatus::OriginalWasCanonical.as_str(), "original-was-canonical");
        assert_eq!(
            serde_json::to_string(&NormalizeStatus::Empty).unwrap(),
            "\"empty\""
        );
    }

    #[test]
    fn test_empty_fallback_status() {
        let empty = Normalized::Fallback {
            bytes: Vec::new(),
            reason: FallbackReason::EncodeFailed("no codec".into()),
        };
        assert_eq!(empty.status(), NormalizeStatus::Empty);
    }
}
