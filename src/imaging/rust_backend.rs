//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `image::ImageReader::with_guessed_format` |
//! | Geometry, channels, depth | `image::ImageDecoder` (header only, no pixel decode) |
//! | Density (DPI) | custom [`density`](super::density) reader (PNG `pHYs`, JFIF, EXIF) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality` (compression level follows quality) |
//! | Encode → WebP | `WebPEncoder::new_lossless` |
//! | Encode → GIF | `DynamicImage::write_to` |
//!
//! The `image` crate only ships a lossless WebP encoder, so WebP output ignores
//! the quality parameter and shrinks through the width factor alone.

use super::backend::{BackendError, ImageBackend, ImageInfo};
use super::density::read_density;
use super::params::ReencodeParams;
use crate::archive::ImageKind;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;

/// Below this quality PNG output switches to the slowest, tightest deflate.
const PNG_BEST_COMPRESSION_BELOW: u32 = 70;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_failed(e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("decode failed: {e}"))
}

fn encode_failed(format: ImageKind, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("{} encode failed: {e}", format.as_str()))
}

/// Encode a DynamicImage into the requested container.
fn encode(img: &DynamicImage, format: ImageKind, quality: u32) -> Result<Vec<u8>, BackendError> {
    let (width, height) = (img.width(), img.height());
    let mut out = Vec::new();

    match format {
        ImageKind::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality as u8)
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageKind::Png => {
            let compression = if quality < PNG_BEST_COMPRESSION_BELOW {
                CompressionType::Best
            } else {
                CompressionType::Default
            };
            let encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilter::Adaptive);
            let result = if img.color().has_alpha() {
                let rgba = img.to_rgba8();
                encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
            } else {
                let rgb = img.to_rgb8();
                encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            };
            result.map_err(|e| encode_failed(format, e))?;
        }
        ImageKind::Webp => {
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut out)
                .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageKind::Gif => {
            img.write_to(&mut Cursor::new(&mut out), ImageFormat::Gif)
                .map_err(|e| encode_failed(format, e))?;
        }
    }

    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, data: &[u8]) -> Result<ImageInfo, BackendError> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let format = reader.format().ok_or(BackendError::UnknownFormat)?;
        let decoder = reader.into_decoder().map_err(decode_failed)?;

        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();
        let channels = color.channel_count();
        let bit_depth = (color.bits_per_pixel() / channels.max(1) as u16) as u8;

        Ok(ImageInfo {
            width,
            height,
            format: format!("{format:?}").to_lowercase(),
            channels,
            bit_depth,
            density: read_density(data),
        })
    }

    fn reencode(&self, params: &ReencodeParams) -> Result<Vec<u8>, BackendError> {
        let img = image::load_from_memory(params.source).map_err(decode_failed)?;
        let resized = if (img.width(), img.height()) == (params.width, params.height) {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        encode(&resized, params.format, params.quality.value())
    }
}
