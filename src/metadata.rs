//! Image metadata validation.
//!
//! Every image entry is header-decoded through the [`ImageBackend`] and held
//! to two limits from `[limits]`: width at most `max_image_width`, and a
//! declared density (when the file states one) equal to `target_dpi`. Files
//! that do not declare a density are not judged on it.
//!
//! A corrupt image is a violation for that image only. An archive with no
//! images at all fails the check.

use crate::archive::Archive;
use crate::checks::{Check, CheckContext};
use crate::config::LimitsConfig;
use crate::imaging::{BackendError, ImageBackend, ImageInfo};
use crate::report::{CheckResult, Diagnostic};

/// Decoded metadata for one image entry.
#[derive(Debug)]
pub struct ImageReport {
    pub path: String,
    pub size: usize,
    pub info: Result<ImageInfo, BackendError>,
}

impl ImageReport {
    /// Limit violations for this image, in a fixed order (decode, width, density).
    pub fn violations(&self, limits: &LimitsConfig) -> Vec<String> {
        let info = match &self.info {
            Ok(info) => info,
            Err(e) => return vec![format!("Image could not be decoded: {e}")],
        };
        let mut found = Vec::new();
        if info.width > limits.max_image_width {
            found.push(format!(
                "Image width exceeds {} pixels (found {}px)",
                limits.max_image_width, info.width
            ));
        }
        if let Some(dpi) = info.density.filter(|d| *d != limits.target_dpi) {
            found.push(format!(
                "Image DPI is not {} (found {dpi})",
                limits.target_dpi
            ));
        }
        found
    }

    /// One-line summary: `path: WxH format, N ch, D-bit, DPI`.
    pub fn summary(&self) -> String {
        match &self.info {
            Ok(info) => format!(
                "{}: {}x{} {}, {} ch, {}-bit, {} dpi, {} bytes",
                self.path,
                info.width,
                info.height,
                info.format,
                info.channels,
                info.bit_depth,
                info.density
                    .map_or_else(|| "unset".to_string(), |d| d.to_string()),
                self.size
            ),
            Err(e) => format!("{}: unreadable ({e}), {} bytes", self.path, self.size),
        }
    }
}

/// Identify every image entry in archive order.
pub fn inspect(archive: &Archive, backend: &dyn ImageBackend) -> Vec<ImageReport> {
    archive
        .images()
        .map(|entry| ImageReport {
            path: entry.path.clone(),
            size: entry.len(),
            info: backend.identify(&entry.content),
        })
        .collect()
}

pub struct ImageMetadataCheck;

impl Check for ImageMetadataCheck {
    fn name(&self) -> &'static str {
        "Image Metadata"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let reports = inspect(ctx.archive, ctx.backend);
        if reports.is_empty() {
            return CheckResult::from_violations(
                self.name(),
                self.severity(),
                vec![Diagnostic::new("No images found in the archive")],
                "",
            );
        }

        let limits = &ctx.config.limits;
        let mut violations = Vec::new();
        let mut details = Vec::with_capacity(reports.len());
        for report in &reports {
            let found = report.violations(limits);
            if found.is_empty() {
                log::debug!("image ok: {}", report.summary());
            }
            violations.extend(
                found
                    .into_iter()
                    .map(|message| Diagnostic::in_file(message, &report.path)),
            );
            details.push(report.summary());
        }

        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "All images passed width and DPI validation",
        )
        .with_details(details)
    }
}
