//! `<map>` tags, structural soundness, and float/position rules.
//!
//! Four independent scans, all reported under one result:
//!
//! 1. Any standalone `.css` entry still present after inlining is rejected.
//! 2. Tree walk: a non-void element with neither child elements nor visible
//!    text is flagged as a suspect unclosed tag.
//! 3. Tag balance over the raw text (comments and script/style bodies
//!    masked): a closing tag pops everything opened after its match, each of
//!    which is reported unclosed; a closing tag with no match is reported
//!    unmatched; whatever is left open at the end is reported unclosed.
//! 4. Line scan for `<map>` and for `float` / `position` declarations whose
//!    value is one of `left`, `right`, `absolute`, `relative`, `fixed`,
//!    `sticky`. Other values (`float: none`, `position: static`) pass.
//!
//! With `checks.auto_fix` on and a structural problem found, the result
//! carries the tree serialized back to markup as a suggested fix. The
//! violations are reported regardless.

use super::html::{Document, LineIndex, is_void, mask_non_markup, numbered_lines};
use super::{Check, CheckContext};
use crate::report::{CheckResult, Diagnostic, SuggestedFix};
use regex::Regex;
use std::sync::LazyLock;

static MAP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<\s*map\b[^>]*>").unwrap());

static FLOAT_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfloat\s*:\s*(left|right)\b").unwrap());

static POSITION_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bposition\s*:\s*(absolute|relative|fixed|sticky)\b").unwrap()
});

static TAG_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)(\s[^>]*?)?(/?)>").unwrap());

pub struct MapCssCheck;

impl Check for MapCssCheck {
    fn name(&self) -> &'static str {
        "Map Tag and CSS Rules"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut violations = Vec::new();

        for css in ctx.archive.css_entries() {
            violations.push(Diagnostic::in_file(
                "External CSS file is not allowed; styles must be inline",
                &css.path,
            ));
        }

        let mut fix = None;
        let parsed = ctx.documents(&mut violations);
        for source in &ctx.html {
            let before = violations.len();

            if let Some((_, doc)) = parsed.iter().find(|(p, _)| *p == source.path) {
                empty_elements(&source.path, doc, &mut violations);
            }
            tag_balance(&source.path, &source.text, &mut violations);
            let structural = violations.len() > before;

            css_lines(&source.path, &source.text, true, &mut violations);

            if structural && ctx.config.checks.auto_fix && fix.is_none() {
                if let Some((_, doc)) = parsed.iter().find(|(p, _)| *p == source.path) {
                    fix = Some(SuggestedFix {
                        path: source.path.clone(),
                        content: doc.to_html(),
                    });
                }
            }
        }

        for css in ctx.archive.css_entries() {
            css_lines(&css.path, &css.text(), false, &mut violations);
        }

        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "No <map> tags, unclosed tags, or disallowed float/position rules",
        )
        .with_fix(fix)
    }
}

fn empty_elements(path: &str, doc: &Document, out: &mut Vec<Diagnostic>) {
    doc.visit(&mut |e, _| {
        if !is_void(&e.name) && e.is_empty() {
            let message = format!("Empty or unclosed tag <{}>", e.name);
            out.push(match doc.line_of(e) {
                Some(line) => Diagnostic::at(message, path, line),
                None => Diagnostic::in_file(message, path),
            });
        }
    });
}

fn tag_balance(path: &str, text: &str, out: &mut Vec<Diagnostic>) {
    let masked = mask_non_markup(text);
    let lines = LineIndex::new(&masked);
    let mut stack: Vec<(String, usize)> = Vec::new();

    for caps in TAG_TOKEN.captures_iter(&masked) {
        let Some(whole) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());
        let name = caps.get(2).map_or("", |m| m.as_str()).to_lowercase();
        let line = lines.line_of(whole.start());

        if is_void(&name) || self_closing {
            continue;
        }

        if !closing {
            stack.push((name, line));
            continue;
        }

        match stack.iter().rposition(|(open, _)| *open == name) {
            Some(pos) => {
                for (open, open_line) in stack.drain(pos + 1..) {
                    out.push(Diagnostic::at(
                        format!("Unclosed tag <{open}>"),
                        path,
                        open_line,
                    ));
                }
                stack.pop();
            }
            None => out.push(Diagnostic::at(
                format!("Unmatched closing tag </{name}>"),
                path,
                line,
            )),
        }
    }

    for (open, open_line) in stack {
        out.push(Diagnostic::at(format!("Unclosed tag <{open}>"), path, open_line));
    }
}

fn css_lines(path: &str, text: &str, check_map: bool, out: &mut Vec<Diagnostic>) {
    for (line_no, line) in numbered_lines(text) {
        if check_map && MAP_TAG.is_match(line) {
            out.push(Diagnostic::at("Found <map> tag", path, line_no));
        }
        if let Some(caps) = FLOAT_RULE.captures(line) {
            out.push(Diagnostic::at(
                format!("CSS float: {} used", caps[1].to_lowercase()),
                path,
                line_no,
            ));
        }
        if let Some(caps) = POSITION_RULE.captures(line) {
            out.push(Diagnostic::at(
                format!("CSS position: {} used", caps[1].to_lowercase()),
                path,
                line_no,
            ));
        }
    }
}
