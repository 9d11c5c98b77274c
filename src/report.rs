//! Check results and the aggregate validation report.
//!
//! A [`CheckResult`] always carries at least one [`Diagnostic`]: either a
//! pass marker or one entry per violation. Nothing is summarized away; the
//! renderers in [`output`](crate::output) print every diagnostic in order.

use serde::Serialize;
use std::fmt;

/// Prefix of the single diagnostic a passing check reports.
pub const PASS_MARK: &str = "✅";
/// Prefix for violation lines that are not tied to a source position.
pub const FAIL_MARK: &str = "❌";

/// Whether a failing check blocks publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Violation,
    /// Reported and fails the check, but callers may treat it as a warning.
    Advisory,
}

/// One human-readable finding, optionally positioned in an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            line: None,
        }
    }

    pub fn in_file(message: impl Into<String>, path: &str) -> Self {
        Self {
            message: message.into(),
            path: Some(path.to_string()),
            line: None,
        }
    }

    pub fn at(message: impl Into<String>, path: &str, line: usize) -> Self {
        Self {
            message: message.into(),
            path: Some(path.to_string()),
            line: Some(line),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        match (&self.path, self.line) {
            (Some(path), Some(line)) => write!(f, " in {path} (line {line})"),
            (Some(path), None) => write!(f, " in {path}"),
            _ => Ok(()),
        }
    }
}

/// A repaired document a check offers alongside its violations.
///
/// Never applied by the check itself; see `checks.apply_fixes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedFix {
    pub path: String,
    #[serde(skip)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub severity: Severity,
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Supplementary lines rendered under the diagnostics (per-image summaries etc).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<SuggestedFix>,
}

impl CheckResult {
    /// Build a result from collected violations: empty means a pass with
    /// `pass_message` as its only diagnostic.
    pub fn from_violations(
        name: &str,
        severity: Severity,
        violations: Vec<Diagnostic>,
        pass_message: &str,
    ) -> Self {
        let success = violations.is_empty();
        let diagnostics = if success {
            vec![Diagnostic::new(format!("{PASS_MARK} {pass_message}"))]
        } else {
            violations
        };
        Self {
            name: name.to_string(),
            severity,
            success,
            diagnostics,
            details: Vec::new(),
            suggested_fix: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_fix(mut self, fix: Option<SuggestedFix>) -> Self {
        self.suggested_fix = fix;
        self
    }

    pub fn violation_count(&self) -> usize {
        if self.success { 0 } else { self.diagnostics.len() }
    }
}

/// Ordered check results for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub results: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn new(results: Vec<CheckResult>) -> Self {
        Self { results }
    }

    /// AND of every result, advisory ones included.
    pub fn overall_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// AND of every non-advisory result.
    pub fn blocking_success(&self) -> bool {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Violation)
            .all(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn violation_count(&self) -> usize {
        self.results.iter().map(CheckResult::violation_count).sum()
    }

    /// First suggested fix any result carries, in report order.
    pub fn suggested_fix(&self) -> Option<&SuggestedFix> {
        self.results.iter().find_map(|r| r.suggested_fix.as_ref())
    }
}

/// Serialization view that includes the derived success flags.
pub struct ValidationReportSummary<'a>(pub &'a ValidationReport);

impl Serialize for ValidationReportSummary<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ValidationReport", 3)?;
        s.serialize_field("overall_success", &self.0.overall_success())?;
        s.serialize_field("blocking_success", &self.0.blocking_success())?;
        s.serialize_field("results", &self.0.results)?;
        s.end()
    }
}
