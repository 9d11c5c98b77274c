//! Catch-all scan for structurally risky patterns.
//!
//! Advisory: some of these are legitimate in a given template, so a hit
//! fails this check without blocking publishing on its own (see
//! [`ValidationReport::blocking_success`](crate::report::ValidationReport::blocking_success)).

use super::html::numbered_lines;
use super::{Check, CheckContext};
use crate::report::{CheckResult, Diagnostic, Severity};
use regex::Regex;
use std::sync::LazyLock;

static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r#"(?i)\son[a-z]+\s*="#,
            "Inline event handler detected (e.g. onclick, onload)",
        ),
        (r"(?i)z-index\s*:", "Use of z-index (complex positioning)"),
        (
            r"(?i)base64,",
            "Base64-encoded resource detected (large inline images or files)",
        ),
        (
            r"(?i)<\s*iframe\b",
            "Iframe detected (may be used for embeds or tracking)",
        ),
        (
            r"(?i)visibility\s*:",
            "Use of CSS visibility property (may hide content)",
        ),
        (
            r"(?i)text-indent\s*:\s*-\s*\d",
            "Negative text indent (may be used for hiding text)",
        ),
        (r"(?i)display\s*:\s*none\b", "display:none used (may hide content)"),
        (
            r"(?i)font-size\s*:\s*0(?:\.0+)?(?:px|pt|em|rem|%)?\s*(?:[;'}\x22]|$)",
            "font-size:0 used (invisible text)",
        ),
        (
            r#"(?i)<\s*link\b[^>]*\brel\s*=\s*["']?import\b"#,
            "HTML Imports (deprecated)",
        ),
        (r"(?i)<\s*object\b", "Object tag detected (legacy plugin)"),
        (r"(?i)\bfilter\s*:", "CSS filter used (may create visual tricks)"),
    ]
    .into_iter()
    .map(|(pattern, reason)| (Regex::new(pattern).unwrap(), reason))
    .collect()
});

pub struct SuspiciousCheck;

impl Check for SuspiciousCheck {
    fn name(&self) -> &'static str {
        "Suspicious Patterns"
    }

    fn severity(&self) -> Severity {
        Severity::Advisory
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult {
        let mut warnings = Vec::new();
        for source in &ctx.html {
            for (line_no, line) in numbered_lines(&source.text) {
                for (re, reason) in PATTERNS.iter() {
                    if re.is_match(line) {
                        warnings.push(Diagnostic::at(*reason, &source.path, line_no));
                    }
                }
            }
        }
        CheckResult::from_violations(
            self.name(),
            self.severity(),
            warnings,
            "No suspicious patterns",
        )
    }
}
