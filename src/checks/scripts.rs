//! Disallowed scripts, plugins and executable references.
//!
//! Line scan over every HTML entry. One diagnostic per hit, so a line with a
//! `<script>` tag pointing at a `.js` file reports both the tag and the file
//! reference.

use super::html::numbered_lines;
use super::{Check, CheckContext};
use crate::report::{CheckResult, Diagnostic};
use regex::Regex;
use std::sync::LazyLock;

const DISALLOWED_TAGS: &[&str] = &["script", "embed", "object", "iframe", "applet"];

const DISALLOWED_KEYWORDS: &[&str] = &[
    "javascript:",
    "vbscript:",
    "data:text/html",
    "flash",
    "application/x-shockwave-flash",
];

static TAG_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DISALLOWED_TAGS
        .iter()
        .map(|tag| {
            let re = Regex::new(&format!(r"(?i)<\s*{tag}\b")).unwrap();
            (*tag, re)
        })
        .collect()
});

static FILE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:href|src)\s*=\s*["'][^"']*(\.js|\.swf|\.jar|\.exe|\.dll|\.vbs)["']"#)
        .unwrap()
});

pub struct ScriptsCheck;

impl Check for ScriptsCheck {
    fn name(&self) -> &'static str {
        "Scripts and Plugins"
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut violations = Vec::new();
        for source in &ctx.html {
            scan(&source.path, &source.text, &mut violations);
        }
        CheckResult::from_violations(
            self.name(),
            self.severity(),
            violations,
            "No scripts or plugins found",
        )
    }
}

fn scan(path: &str, text: &str, out: &mut Vec<Diagnostic>) {
    for (line_no, line) in numbered_lines(text) {
        for (tag, re) in TAG_PATTERNS.iter() {
            if re.is_match(line) {
                out.push(Diagnostic::at(
                    format!("Disallowed tag \"<{tag}>\" found"),
                    path,
                    line_no,
                ));
            }
        }

        let lower = line.to_lowercase();
        for keyword in DISALLOWED_KEYWORDS {
            if lower.contains(keyword) {
                out.push(Diagnostic::at(
                    format!("Disallowed keyword \"{keyword}\" found"),
                    path,
                    line_no,
                ));
            }
        }

        if let Some(caps) = FILE_REFERENCE.captures(line) {
            let ext = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            out.push(Diagnostic::at(
                format!("Suspicious file reference ({ext}) found"),
                path,
                line_no,
            ));
        }
    }
}
