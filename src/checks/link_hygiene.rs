//! Link and width hygiene (opt-in via `checks.link_hygiene`).
//!
//! Four sub-verdicts per HTML entry, each failing on its first offender:
//!
//! | Sub-check | Fails on |
//! |---|---|
//! | External CSS | a stylesheet `<link>` with an `http(s)` href, or a local href not shaped like `dir/name.css` |
//! | Hard-coded URLs | an `href` not starting with `http://`, `https://`, `mailto:`, `tel:` or `#` |
//! | URL length | any `http(s)` URL longer than 1024 characters |
//! | Width | any `width="N"` attribute above the configured image width ceiling |
//!
//! The verdict lines land in the result details, one ✅/❌ line per
//! sub-check, so a passing run still shows what was looked at.

use super::html::{LineIndex, tag_end};
use super::{Check, CheckContext};
use crate::report::{CheckResult, Diagnostic, FAIL_MARK, PASS_MARK};
use regex::Regex;
use std::sync::LazyLock;

const MAX_URL_LEN: usize = 1024;

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<link\b").unwrap());

static STYLESHEET_REL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']?stylesheet\b"#).unwrap());

static QUOTED_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

static LOCAL_CSS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-./]+\.css$").unwrap());

static ABSOLUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s"'<>]+"#).unwrap());

static WIDTH_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)[\s"'](width\s*=\s*["']?(\d+)(?:px)?["']?)"#).unwrap());

const ALLOWED_HREF_PREFIXES: &[&str] = &["http://", "https://", "mailto:", "tel:", "#"];

pub struct LinkHygieneCheck;

impl Check for LinkHygieneCheck {
    fn name(&self) -> &'static str {
        "Link Hygiene"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut violations = Vec::new();
        let mut details = Vec::new();
        let max_width = ctx.config.limits.max_image_width;

        for source in &ctx.html {
            let path = source.path.as_str();
            let text = source.text.as_str();
            let lines = LineIndex::new(text);
            let at = |message: String, offset: usize| {
                Diagnostic::at(message, path, lines.line_of(offset))
            };

            let verdicts = [
                ("External CSS", external_css(text).map(|(m, o)| at(m, o))),
                ("Hard-coded URLs", hard_coded_href(text).map(|(m, o)| at(m, o))),
                ("URL length", long_url(text).map(|(m, o)| at(m, o))),
                ("Width", wide_attr(text, max_width).map(|(m, o)| at(m, o))),
            ];
            for (label, failure) in verdicts {
                match failure {
                    Some(diag) => {
                        details.push(format!("{FAIL_MARK} {label} ({path})"));
                        violations.push(diag);
                    }
                    None => details.push(format!("{PASS_MARK} {label} ({path})")),
                }
            }
        }

        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "Links, URLs and widths are email-safe",
        )
        .with_details(details)
    }
}

fn external_css(text: &str) -> Option<(String, usize)> {
    for m in LINK_TAG.find_iter(text) {
        let tag = &text[m.start()..tag_end(text, m.start())];
        if !STYLESHEET_REL.is_match(tag) {
            continue;
        }
        let Some(caps) = QUOTED_HREF.captures(tag) else {
            continue;
        };
        let href = caps[1].trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            return Some((format!("External CSS: {}", tag.trim()), m.start()));
        }
        if !LOCAL_CSS_PATH.is_match(href) {
            return Some((format!("Invalid CSS path: \"{href}\""), m.start()));
        }
    }
    None
}

fn hard_coded_href(text: &str) -> Option<(String, usize)> {
    QUOTED_HREF.captures_iter(text).find_map(|caps| {
        let m = caps.get(1)?;
        let url = m.as_str();
        let allowed = ALLOWED_HREF_PREFIXES.iter().any(|p| url.starts_with(p));
        (!allowed).then(|| (format!("Hardcoded/relative URL: \"{url}\""), m.start()))
    })
}

fn long_url(text: &str) -> Option<(String, usize)> {
    ABSOLUTE_URL.find_iter(text).find_map(|m| {
        let url = m.as_str();
        let len = url.chars().count();
        (len > MAX_URL_LEN).then(|| {
            let head: String = url.chars().take(100).collect();
            (format!("Long URL ({len} chars): {head}..."), m.start())
        })
    })
}

fn wide_attr(text: &str, max_width: u32) -> Option<(String, usize)> {
    WIDTH_ATTR.captures_iter(text).find_map(|caps| {
        let whole = caps.get(1)?;
        let value: u64 = caps[2].parse().ok()?;
        (value > max_width as u64)
            .then(|| (format!("Width >{max_width}px: {}", whole.as_str()), whole.start()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::imaging::RustBackend;
    use crate::test_helpers::*;

    fn run(body: &str) -> crate::report::ValidationReport {
        let mut config = ValidatorConfig::default();
        config.checks.link_hygiene = true;
        let archive = archive_of(&[("index.html", html_doc(body))]);
        crate::checks::run_all(&archive, &RustBackend::new(), &config)
    }

    #[test]
    fn external_stylesheet_detected() {
        let text = r#"<link rel="stylesheet" href="https://cdn.example.com/a.css">"#;
        let (msg, _) = external_css(text).unwrap();
        assert!(msg.starts_with("External CSS: <link"));
    }

    #[test]
    fn invalid_local_css_path() {
        let (msg, _) = external_css(r#"<link rel='stylesheet' href="my styles.css">"#).unwrap();
        assert_eq!(msg, "Invalid CSS path: \"my styles.css\"");
        assert!(external_css(r#"<link rel="stylesheet" href="css/main.css">"#).is_none());
        assert!(external_css(r#"<link rel="icon" href="https://x/y.ico">"#).is_none());
    }

    #[test]
    fn relative_href_detected() {
        let (msg, _) = hard_coded_href(r##"<a href="#top">t</a><a href="page.html">p</a>"##).unwrap();
        assert_eq!(msg, "Hardcoded/relative URL: \"page.html\"");
        assert!(hard_coded_href(r#"<a href="mailto:a@b.c">m</a><a href="tel:123">t</a>"#).is_none());
    }

    #[test]
    fn long_url_detected() {
        let url = format!("https://example.com/{}", "a".repeat(1100));
        let text = format!("<a href=\"{url}\">x</a>");
        let (msg, _) = long_url(&text).unwrap();
        assert!(msg.starts_with("Long URL (1120 chars)"));
        assert!(long_url("https://example.com/short").is_none());
    }

    #[test]
    fn width_over_ceiling_detected() {
        assert!(wide_attr(r#"<table width="600">"#, 600).is_none());
        let (msg, _) = wide_attr(r#"<table width="640px">"#, 600).unwrap();
        assert_eq!(msg, "Width >600px: width=\"640px\"");
    }

    #[test]
    fn width_lookalikes_ignored() {
        assert!(wide_attr(r#"<img data-width="900" src="a.png">"#, 600).is_none());
        assert!(wide_attr(r#"<div style="max-width=900px">x</div>"#, 600).is_none());
        let (msg, _) = wide_attr(r#"<td data-width="900" width="700">"#, 600).unwrap();
        assert_eq!(msg, "Width >600px: width=\"700\"");
    }

    #[test]
    fn clean_body_passes_with_four_verdicts() {
        let report = run(r#"<table width="600"><tr><td><a href="https://example.com">x</a></td></tr></table>"#);
        let result = find_result(&report, "Link Hygiene");
        assert!(result.success, "{:?}", messages(result));
        assert_eq!(result.details.len(), 4);
        assert!(result.details.iter().all(|d| d.starts_with(PASS_MARK)));
    }

    #[test]
    fn failure_points_at_line() {
        let report = run("<p>x</p>\n<a href=\"local.html\">x</a>");
        assert_check_fails_with(&report, "Link Hygiene", "in index.html (line 8)");
    }
}
