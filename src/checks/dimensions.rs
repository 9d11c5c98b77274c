//! Declared vs. actual image geometry.
//!
//! For every `<img>`: take `src` (or the first URL of `srcset`), resolve it
//! to an archive entry, decode it, and compare against the declared size.
//! Declared size comes from the `width`/`height` attributes, falling back to
//! `width:`/`height:` in px inside the inline `style`. A side that is not
//! declared is not compared; percentage attributes count as not declared.
//!
//! Resolution order:
//!
//! 1. The reference relative to the HTML entry's directory.
//! 2. Any entry whose path ends with `/<reference>` or equals it.
//! 3. Any image entry with the same file name (logged; this hides a broken
//!    relative path but still lets the geometry be checked).

use super::html::Element;
use super::{Check, CheckContext};
use crate::archive::{Archive, ArchiveEntry};
use crate::report::{CheckResult, Diagnostic};
use regex::Regex;
use std::sync::LazyLock;

static LEADING_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)").unwrap());

static STYLE_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[;\s])width\s*:\s*(\d+)px").unwrap());

static STYLE_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[;\s])height\s*:\s*(\d+)px").unwrap());

pub struct DimensionsCheck;

impl Check for DimensionsCheck {
    fn name(&self) -> &'static str {
        "Image Dimensions"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut violations = Vec::new();
        let mut details = Vec::new();

        for (path, doc) in ctx.documents(&mut violations) {
            let html_dir = path.rsplit_once('/').map_or("", |(d, _)| d);
            for img in doc.elements_named("img") {
                let at = |message: String| match doc.line_of(img) {
                    Some(line) => Diagnostic::at(message, path, line),
                    None => Diagnostic::in_file(message, path),
                };

                let Some(src) = image_source(img) else {
                    violations.push(at("Missing 'src' in an <img> tag".to_string()));
                    continue;
                };

                let Some(entry) = resolve(ctx.archive, html_dir, &src) else {
                    violations.push(at(format!("Image file \"{src}\" not found in archive")));
                    continue;
                };

                let info = match ctx.backend.identify(&entry.content) {
                    Ok(info) => info,
                    Err(e) => {
                        violations.push(at(format!("Failed to read dimensions for \"{src}\": {e}")));
                        continue;
                    }
                };

                let (declared_w, declared_h) = declared_size(img);
                let width_off = declared_w.is_some_and(|w| w != info.width);
                let height_off = declared_h.is_some_and(|h| h != info.height);
                if width_off || height_off {
                    violations.push(at(format!(
                        "Dimension mismatch for \"{src}\" ({}): HTML ({}x{}) vs Actual ({}x{})",
                        entry.path,
                        show(declared_w),
                        show(declared_h),
                        info.width,
                        info.height
                    )));
                } else {
                    details.push(format!(
                        "{}: {}x{} matches declared ({}x{})",
                        entry.path,
                        info.width,
                        info.height,
                        show(declared_w),
                        show(declared_h)
                    ));
                }
            }
        }

        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "All image dimensions match the HTML",
        )
        .with_details(details)
    }
}

fn show(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

/// `src`, or the first URL of `srcset`, with query/fragment and leading
/// `./` or `/` removed.
fn image_source(img: &Element) -> Option<String> {
    let raw = img
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            img.attr("srcset")
                .and_then(|set| set.split(',').next())
                .and_then(|first| first.split_whitespace().next())
        })?;

    let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
    let cleaned = without_query
        .trim_start_matches("./")
        .trim_start_matches('/');
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn resolve<'a>(archive: &'a Archive, html_dir: &str, src: &str) -> Option<&'a ArchiveEntry> {
    let relative = if html_dir.is_empty() {
        src.to_string()
    } else {
        format!("{html_dir}/{src}")
    };
    if let Some(entry) = archive.find(&relative) {
        return Some(entry);
    }

    let suffix = format!("/{src}");
    if let Some(entry) = archive
        .entries()
        .iter()
        .find(|e| e.path == src || e.path.ends_with(&suffix))
    {
        return Some(entry);
    }

    let base = src.rsplit('/').next().unwrap_or(src);
    let fallback = archive.images().find(|e| e.file_name() == base);
    if let Some(entry) = fallback {
        log::debug!("resolved <img src=\"{src}\"> by file name to {}", entry.path);
    }
    fallback
}

fn declared_size(img: &Element) -> (Option<u32>, Option<u32>) {
    let attr = |name: &str| {
        img.attr(name).and_then(|v| {
            if v.trim_end().ends_with('%') {
                return None;
            }
            LEADING_INT
                .captures(v)
                .and_then(|c| c[1].parse::<u32>().ok())
        })
    };
    let style = img.attr("style").unwrap_or("");
    let from_style = |re: &Regex| re.captures(style).and_then(|c| c[1].parse::<u32>().ok());

    let width = attr("width").or_else(|| from_style(&STYLE_WIDTH));
    let height = attr("height").or_else(|| from_style(&STYLE_HEIGHT));
    (width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::html::Document;
    use crate::test_helpers::*;

    const NAME: &str = "Image Dimensions";

    fn img(markup: &str) -> Element {
        let doc = Document::parse(markup).unwrap();
        doc.elements_named("img")[0].clone()
    }

    #[test]
    fn source_cleanup() {
        assert_eq!(image_source(&img(r#"<img src="./a/b.png">"#)).as_deref(), Some("a/b.png"));
        assert_eq!(image_source(&img(r#"<img src="/b.png?v=2">"#)).as_deref(), Some("b.png"));
        assert_eq!(
            image_source(&img(r#"<img srcset="x@2x.png 2x, y.png 1x">"#)).as_deref(),
            Some("x@2x.png")
        );
        assert_eq!(image_source(&img(r#"<img alt="none">"#)), None);
    }

    #[test]
    fn declared_size_sources() {
        assert_eq!(declared_size(&img(r#"<img width="100" height="50">"#)), (Some(100), Some(50)));
        assert_eq!(declared_size(&img(r#"<img width="100px">"#)), (Some(100), None));
        assert_eq!(declared_size(&img(r#"<img width="100%">"#)), (None, None));
        assert_eq!(
            declared_size(&img(r#"<img style="width: 120px; height:60px">"#)),
            (Some(120), Some(60))
        );
        assert_eq!(
            declared_size(&img(r#"<img style="max-width:300px">"#)),
            (None, None)
        );
        assert_eq!(
            declared_size(&img(r#"<img height="5" style="width:7px;height:9px">"#)),
            (Some(7), Some(5))
        );
    }

    #[test]
    fn matching_dimensions_pass() {
        let archive = archive_of(&[
            ("index.html", html_doc(r#"<img src="a.png" width="100" height="50">"#).into_bytes()),
            ("a.png", png_bytes(100, 50)),
        ]);
        assert_check_passes(&run_battery(&archive), NAME);
    }

    #[test]
    fn one_mismatch_names_both_pairs() {
        let archive = archive_of(&[
            ("index.html", html_doc(r#"<img src="a.png" width="100" height="60">"#).into_bytes()),
            ("a.png", png_bytes(100, 50)),
        ]);
        let report = run_battery(&archive);
        let result = find_result(&report, NAME);
        assert!(!result.success);
        assert_eq!(result.diagnostics.len(), 1);
        let msg = &result.diagnostics[0].message;
        assert!(msg.contains("a.png"));
        assert!(msg.contains("HTML (100x60)"));
        assert!(msg.contains("Actual (100x50)"));
    }

    #[test]
    fn width_mismatch_alone_detected() {
        let archive = archive_of(&[
            ("index.html", html_doc(r#"<img src="a.png" width="99" height="50">"#).into_bytes()),
            ("a.png", png_bytes(100, 50)),
        ]);
        assert_check_fails_with(&run_battery(&archive), NAME, "HTML (99x50) vs Actual (100x50)");
    }

    #[test]
    fn nested_path_and_basename_fallback() {
        let archive = archive_of(&[
            (
                "mail/index.html",
                html_doc(r#"<img src="img/a.png" width="10" height="10"><img src="../elsewhere/b.png" width="8" height="8">"#)
                    .into_bytes(),
            ),
            ("mail/img/a.png", png_bytes(10, 10)),
            ("assets/b.png", png_bytes(8, 8)),
        ]);
        assert_check_passes(&run_battery(&archive), NAME);
    }

    #[test]
    fn missing_file_fails() {
        let archive = archive_of(&[("index.html", html_doc(r#"<img src="nope.png">"#))]);
        assert_check_fails_with(&run_battery(&archive), NAME, "\"nope.png\" not found");
    }

    #[test]
    fn missing_src_fails() {
        let archive = archive_of(&[("index.html", html_doc(r#"<img alt="x">"#))]);
        assert_check_fails_with(&run_battery(&archive), NAME, "Missing 'src'");
    }

    #[test]
    fn undecodable_image_fails_without_aborting_others() {
        let archive = archive_of(&[
            (
                "index.html",
                html_doc(r#"<img src="bad.png"><img src="ok.png" width="4" height="4">"#).into_bytes(),
            ),
            ("bad.png", b"not a png".to_vec()),
            ("ok.png", png_bytes(4, 4)),
        ]);
        let report = run_battery(&archive);
        let result = find_result(&report, NAME);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("Failed to read dimensions for \"bad.png\""));
        assert_eq!(result.details.len(), 1);
    }
}
