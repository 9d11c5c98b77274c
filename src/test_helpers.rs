//! Shared test utilities for the mailgate test suite.
//!
//! Provides archive builders, synthetic image encoders, and report lookups
//! so unit tests can describe an upload in a few lines instead of shipping
//! binary fixtures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let archive = archive_of(&[
//!     ("index.html", html_doc(r#"<img src="a.png" width="10" height="10">"#).into_bytes()),
//!     ("a.png", png_bytes(10, 10)),
//! ]);
//! let report = run_battery(&archive);
//! assert_check_passes(&report, "Image Dimensions");
//! ```

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::{Archive, ArchiveEntry};
use crate::report::{CheckResult, ValidationReport};

// =========================================================================
// Zip containers
// =========================================================================

/// Builds raw zip bytes, including the directory markers and odd paths
/// that intake has to cope with.
pub struct ZipBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    method: CompressionMethod,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            method: CompressionMethod::Deflated,
        }
    }

    /// Store entries uncompressed so their raw size drives the container size.
    pub fn stored(mut self) -> Self {
        self.method = CompressionMethod::Stored;
        self
    }

    pub fn file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        let options = SimpleFileOptions::default().compression_method(self.method);
        self.writer.start_file(path, options).unwrap();
        self.writer.write_all(content.as_ref()).unwrap();
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.writer
            .add_directory(path, SimpleFileOptions::default())
            .unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.writer.finish().unwrap().into_inner()
    }
}

/// In-memory archive from `(path, content)` pairs, in order.
pub fn archive_of<C: AsRef<[u8]>>(files: &[(&str, C)]) -> Archive {
    Archive::new(
        files
            .iter()
            .map(|(path, content)| ArchiveEntry::new(*path, content.as_ref().to_vec()))
            .collect(),
    )
}

/// Wrap a body fragment in a minimal, balanced document.
pub fn html_doc(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>t</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

// =========================================================================
// Synthetic images
// =========================================================================

/// Deterministic pseudo-random bytes (LCG). Compresses poorly, which is the
/// point: budget tests need entries whose zipped size tracks their raw size.
pub fn noise_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

fn gradient_rgb(width: u32, height: u32) -> image::RgbImage {
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Small valid JPEG with a smooth gradient and no density declaration.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    use image::ImageEncoder;
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 85)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// JPEG that declares `dpi` in its JFIF header.
pub fn jpeg_with_dpi(width: u32, height: u32, dpi: u16) -> Vec<u8> {
    use image::ImageEncoder;
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 85);
    encoder.set_pixel_density(image::codecs::jpeg::PixelDensity::dpi(dpi));
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// JPEG of random pixels at the given quality. Large for its dimensions and
/// shrinks substantially when re-encoded at lower quality.
pub fn noise_jpeg(width: u32, height: u32, quality: u8, seed: u64) -> Vec<u8> {
    use image::ImageEncoder;
    let pixels = noise_bytes((width * height * 3) as usize, seed);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(&pixels, width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Small valid PNG with a smooth gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(gradient_rgb(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

// =========================================================================
// Report lookups — panics with a clear message on miss
// =========================================================================

/// Find a check result by name. Panics if not found.
pub fn find_result<'a>(report: &'a ValidationReport, name: &str) -> &'a CheckResult {
    report
        .results
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
            panic!("check '{name}' not found. Available: {names:?}")
        })
}

/// Run the standard check battery with the pure-Rust backend and defaults.
pub fn run_battery(archive: &Archive) -> ValidationReport {
    let config = crate::config::ValidatorConfig::default();
    let backend = crate::imaging::RustBackend::new();
    crate::checks::run_all(archive, &backend, &config)
}

/// Rendered diagnostics of one result.
pub fn messages(result: &CheckResult) -> Vec<String> {
    result.diagnostics.iter().map(|d| d.to_string()).collect()
}

pub fn assert_check_passes(report: &ValidationReport, name: &str) {
    let result = find_result(report, name);
    assert!(
        result.success,
        "expected '{name}' to pass, got: {:#?}",
        messages(result)
    );
}

pub fn assert_check_fails_with(report: &ValidationReport, name: &str, needle: &str) {
    let result = find_result(report, name);
    assert!(!result.success, "expected '{name}' to fail");
    let all = messages(result);
    assert!(
        all.iter().any(|m| m.contains(needle)),
        "expected a '{name}' diagnostic containing {needle:?}, got: {all:#?}"
    );
}
