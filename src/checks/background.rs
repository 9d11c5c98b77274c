//! Background styling rules.
//!
//! - CSS entries: any `background-image` or `background-color` declaration.
//! - Inline `style` attributes: `background-image` always; `background-color`
//!   when an ancestor also declares one (nested backgrounds render
//!   inconsistently across mail clients) or when no `<table>` ancestor exists.
//!   A `<table>` carrying its own background-color is outside any table and
//!   fails; its cells pass.

use super::html::numbered_lines;
use super::{Check, CheckContext};
use crate::report::{CheckResult, Diagnostic};
use regex::Regex;
use std::sync::LazyLock;

static BG_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)background-image\s*:").unwrap());

static BG_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)background-color\s*:").unwrap());

pub struct BackgroundCheck;

impl Check for BackgroundCheck {
    fn name(&self) -> &'static str {
        "Background Styles"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut violations = Vec::new();

        for css in ctx.archive.css_entries() {
            for (line_no, line) in numbered_lines(&css.text()) {
                if BG_IMAGE.is_match(line) {
                    violations.push(Diagnostic::at("Background image found", &css.path, line_no));
                }
                if BG_COLOR.is_match(line) {
                    violations.push(Diagnostic::at("Background color used", &css.path, line_no));
                }
            }
        }

        for (path, doc) in ctx.documents(&mut violations) {
            doc.visit(&mut |el, ancestors| {
                let Some(style) = el.attr("style") else {
                    return;
                };
                let at = |message: &str| match doc.line_of(el) {
                    Some(line) => Diagnostic::at(message, path, line),
                    None => Diagnostic::in_file(message, path),
                };

                if BG_IMAGE.is_match(style) {
                    violations.push(at("Inline background image"));
                }
                if BG_COLOR.is_match(style) {
                    let nested = ancestors
                        .iter()
                        .any(|a| a.attr("style").is_some_and(|s| BG_COLOR.is_match(s)));
                    if nested {
                        violations.push(at("Nested background-color"));
                    }
                    if !ancestors.iter().any(|a| a.name == "table") {
                        violations.push(at("Background-color outside <table>"));
                    }
                }
            });
        }

        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "Background styles are table-scoped and image-free",
        )
    }
}
