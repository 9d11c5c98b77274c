//! CLI output formatting for all pipeline stages.
//!
//! # Check-First Display
//!
//! Output is **check-centric, not file-centric**. Each block of the report
//! starts with the check's verdict and name; the diagnostics follow, indented,
//! with the archive entry (and line, when known) they point at. Files are
//! secondary context.
//!
//! # Output Format
//!
//! ## Report
//!
//! ```text
//! ✅ Inline External CSS
//!     ✅ All CSS (local and remote) successfully inlined.
//! ❌ Image Metadata
//!     Image width exceeds 600 pixels (found 700px) in hero.png
//!     hero.png: 700x300 png, 4 ch, 8-bit, unset dpi, 1204 bytes
//!
//! 1 of 9 checks failed (1 violation)
//! ```
//!
//! ## Error log
//!
//! ```text
//! Validation failed: 1 check, 1 violation
//!
//! Issue 1: Image Metadata
//!     - Image width exceeds 600 pixels (found 700px) in hero.png
//! ```
//!
//! ## Inspect
//!
//! ```text
//! 001 hero.png
//!     700x300 png, 4 ch, 8-bit, unset dpi, 1204 bytes
//!     Image width exceeds 600 pixels (found 700px)
//! ```
//!
//! ## Resize
//!
//! ```text
//! Resized 412.0 KB → 288.3 KB in 4 attempts (quality 60, width 100%)
//!     001 hero.jpg: 1200x800 → 600x400 (390.1 KB → 266.4 KB)
//!     002 logo.png: unchanged
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects. [`render_report_html`] is the one HTML renderer,
//! used by the notification collaborator.

use crate::config::LimitsConfig;
use crate::metadata::ImageReport;
use crate::pipeline::{Outcome, PipelineEvent, Status};
use crate::report::{CheckResult, FAIL_MARK, PASS_MARK, ValidationReport};
use crate::resize::{ImageSnapshot, ResizeOutcome};
use maud::{DOCTYPE, Markup, html};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn verdict(success: bool) -> &'static str {
    if success { PASS_MARK } else { FAIL_MARK }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable byte size: bytes under 1 KB, KB with one decimal above.
fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn check_header(result: &CheckResult) -> String {
    format!("{} {}", verdict(result.success), result.name)
}

// ============================================================================
// Report
// ============================================================================

/// Format the full report: one block per check, in report order, then a
/// one-line tally.
pub fn format_report(report: &ValidationReport) -> Vec<String> {
    let mut lines = Vec::new();
    for result in &report.results {
        lines.push(check_header(result));
        for diagnostic in &result.diagnostics {
            lines.push(format!("{}{}", indent(1), diagnostic));
        }
        for detail in &result.details {
            lines.push(format!("{}{}", indent(1), detail));
        }
    }

    lines.push(String::new());
    let failed = report.failed().count();
    if failed == 0 {
        lines.push(format!(
            "All {} passed",
            plural(report.results.len(), "check", "checks")
        ));
    } else {
        lines.push(format!(
            "{} of {} failed ({})",
            failed,
            plural(report.results.len(), "check", "checks"),
            plural(report.violation_count(), "violation", "violations")
        ));
    }
    lines
}

pub fn print_report(report: &ValidationReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

/// Numbered issue log covering every failed check. Empty for a passing report.
pub fn format_error_log(report: &ValidationReport) -> Vec<String> {
    let failed: Vec<&CheckResult> = report.failed().collect();
    if failed.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![format!(
        "Validation failed: {}, {}",
        plural(failed.len(), "check", "checks"),
        plural(report.violation_count(), "violation", "violations")
    )];
    for (i, result) in failed.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("Issue {}: {}", i + 1, result.name));
        for diagnostic in &result.diagnostics {
            lines.push(format!("{}- {}", indent(1), diagnostic));
        }
    }
    lines
}

pub fn print_error_log(report: &ValidationReport) {
    for line in format_error_log(report) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// HTML rendering
// ============================================================================

const REPORT_CSS: &str = "\
body{font-family:Arial,Helvetica,sans-serif;color:#222}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ccc;padding:6px 8px;text-align:left;vertical-align:top}\
th{background:#f3f3f3}\
.pass{color:#1a7f37}.fail{color:#cf222e}\
ul{margin:0;padding-left:18px}\
.details{color:#555;font-size:90%}";

fn render_result_row(result: &CheckResult) -> Markup {
    let class = if result.success { "pass" } else { "fail" };
    html! {
        tr {
            td { (result.name) }
            td class=(class) {
                @if result.success { "Pass" } @else { "Fail" }
            }
            td {
                ul {
                    @for diagnostic in &result.diagnostics {
                        li { (diagnostic.to_string()) }
                    }
                }
            }
            td.details {
                @if !result.details.is_empty() {
                    ul {
                        @for detail in &result.details {
                            li { (detail) }
                        }
                    }
                }
            }
        }
    }
}

/// Render the report as a standalone HTML document with one table row per
/// check (name, pass/fail, messages, details).
pub fn render_report_html(report: &ValidationReport) -> String {
    let title = if report.overall_success() {
        "Validation passed"
    } else {
        "Validation failed"
    };
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (title) }
                style { (REPORT_CSS) }
            }
            body {
                h1 { (title) }
                table {
                    thead {
                        tr {
                            th { "Check" }
                            th { "Result" }
                            th { "Messages" }
                            th { "Details" }
                        }
                    }
                    tbody {
                        @for result in &report.results {
                            (render_result_row(result))
                        }
                    }
                }
            }
        }
    };
    markup.into_string()
}

// ============================================================================
// Pipeline events
// ============================================================================

/// Format one progress event. Resize attempts are indented under the
/// intake line they follow.
pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::IntakeComplete {
            entries,
            upload_size,
            budget,
        } => {
            let verdict = if upload_size > budget {
                "over budget"
            } else {
                "within budget"
            };
            vec![format!(
                "Archive: {}, {} ({} of {})",
                plural(*entries, "entry", "entries"),
                format_size(*upload_size),
                verdict,
                format_size(*budget)
            )]
        }
        PipelineEvent::ResizeAttempt {
            attempt,
            quality,
            width_percent,
            size,
            budget,
        } => {
            let settings = match (quality, width_percent) {
                (Some(q), Some(w)) => format!("quality {q}, width {w}%"),
                _ => "original images".to_string(),
            };
            let fits = if size <= budget { "fits" } else { "too large" };
            vec![format!(
                "{}Attempt {}: {} → {} ({})",
                indent(1),
                attempt,
                settings,
                format_size(*size),
                fits
            )]
        }
        PipelineEvent::ResizeComplete {
            original_size,
            final_size,
            attempts,
        } => vec![format!(
            "Resized {} → {} in {}",
            format_size(*original_size),
            format_size(*final_size),
            plural(*attempts, "attempt", "attempts")
        )],
        PipelineEvent::CssInlined {
            inlined,
            unresolved,
        } => {
            let mut line = format!("CSS: inlined {}", plural(*inlined, "stylesheet", "stylesheets"));
            if *unresolved > 0 {
                line.push_str(&format!(", {} unresolved", unresolved));
            }
            vec![line]
        }
        PipelineEvent::ChecksComplete {
            round,
            passed,
            failed,
        } => vec![format!(
            "Checks (round {}): {} passed, {} failed",
            round, passed, failed
        )],
        PipelineEvent::FixApplied { path } => {
            vec![format!("Applied suggested fix to {}", path)]
        }
        PipelineEvent::Published { entries } => {
            vec![format!("Published {}", plural(*entries, "entry", "entries"))]
        }
        PipelineEvent::CollaboratorFailed {
            collaborator,
            message,
        } => vec![format!("Warning: {} failed: {}", collaborator, message)],
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Final verdict line for a completed (non-fatal) run.
pub fn format_status(outcome: &Outcome) -> Vec<String> {
    let mut lines = vec![match outcome.status {
        Status::Passed => format!("{PASS_MARK} Passed"),
        Status::PassedAfterFix => format!("{PASS_MARK} Passed after applying suggested fix"),
        Status::Failed => format!("{FAIL_MARK} Failed"),
    }];
    if !outcome.publishable.is_empty() {
        let names: Vec<&str> = outcome.publishable.iter().map(|e| e.path.as_str()).collect();
        lines.push(format!("{}Publishable: {}", indent(1), names.join(", ")));
    }
    for warning in &outcome.warnings {
        lines.push(format!("{}Warning: {}", indent(1), warning));
    }
    lines
}

pub fn print_status(outcome: &Outcome) {
    for line in format_status(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Image metadata table: one entry per image with its limit violations.
pub fn format_inspect(reports: &[ImageReport], limits: &LimitsConfig) -> Vec<String> {
    if reports.is_empty() {
        return vec!["No images found".to_string()];
    }
    let mut lines = Vec::new();
    for (i, report) in reports.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), report.path));
        let summary = report.summary();
        let body = summary
            .strip_prefix(&format!("{}: ", report.path))
            .unwrap_or(&summary);
        lines.push(format!("{}{}", indent(1), body));
        for violation in report.violations(limits) {
            lines.push(format!("{}{}", indent(1), violation));
        }
    }
    lines
}

pub fn print_inspect(reports: &[ImageReport], limits: &LimitsConfig) {
    for line in format_inspect(reports, limits) {
        println!("{}", line);
    }
}

// ============================================================================
// Resize
// ============================================================================

fn snapshot_dims(snapshot: &ImageSnapshot) -> String {
    format!("{}x{}", snapshot.width, snapshot.height)
}

pub fn format_resize(outcome: &ResizeOutcome) -> Vec<String> {
    let settings = match &outcome.final_state {
        Some(state) => format!(
            " (quality {}, width {}%)",
            state.quality, state.width_percent
        ),
        None => String::new(),
    };
    let mut lines = vec![format!(
        "Resized {} → {} in {}{}",
        format_size(outcome.original_size),
        format_size(outcome.final_size),
        plural(outcome.attempts, "attempt", "attempts"),
        settings
    )];
    for (i, info) in outcome.images.iter().enumerate() {
        if info.resized {
            lines.push(format!(
                "{}{} {}: {} → {} ({} → {})",
                indent(1),
                format_index(i + 1),
                info.path,
                snapshot_dims(&info.original),
                snapshot_dims(&info.new),
                format_size(info.original.size),
                format_size(info.new.size)
            ));
        } else {
            lines.push(format!(
                "{}{} {}: unchanged",
                indent(1),
                format_index(i + 1),
                info.path
            ));
        }
    }
    lines
}

pub fn print_resize(outcome: &ResizeOutcome) {
    for line in format_resize(outcome) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BackendError, ImageInfo};
    use crate::report::{Diagnostic, Severity};
    use crate::resize::{ResizeInfo, ResizeState};

    fn passing(name: &str) -> CheckResult {
        CheckResult::from_violations(name, Severity::Violation, Vec::new(), "All good")
    }

    fn failing(name: &str, messages: &[&str]) -> CheckResult {
        CheckResult::from_violations(
            name,
            Severity::Violation,
            messages.iter().map(|m| Diagnostic::new(*m)).collect(),
            "",
        )
    }

    fn sample_report() -> ValidationReport {
        ValidationReport::new(vec![
            passing("Inline External CSS"),
            failing("Scripts", &["Script tag found", "Event handler found"]),
            failing("Video", &["Video element found"]).with_details(vec!["clip.mp4".into()]),
        ])
    }

    // =========================================================================
    // Report
    // =========================================================================

    #[test]
    fn report_lists_every_check_in_order() {
        let lines = format_report(&sample_report());
        assert_eq!(lines[0], "✅ Inline External CSS");
        assert_eq!(lines[1], "    ✅ All good");
        assert_eq!(lines[2], "❌ Scripts");
        assert_eq!(lines[3], "    Script tag found");
        assert_eq!(lines[4], "    Event handler found");
        assert_eq!(lines[5], "❌ Video");
        assert_eq!(lines[7], "    clip.mp4");
        assert_eq!(lines.last().unwrap(), "2 of 3 checks failed (3 violations)");
    }

    #[test]
    fn report_tally_for_clean_run() {
        let report = ValidationReport::new(vec![passing("A")]);
        let lines = format_report(&report);
        assert_eq!(lines.last().unwrap(), "All 1 check passed");
    }

    #[test]
    fn diagnostic_positions_are_shown() {
        let report = ValidationReport::new(vec![CheckResult::from_violations(
            "HTML Structure",
            Severity::Violation,
            vec![Diagnostic::at("Unclosed <p> tag", "index.html", 4)],
            "",
        )]);
        let lines = format_report(&report);
        assert_eq!(lines[1], "    Unclosed <p> tag in index.html (line 4)");
    }

    #[test]
    fn error_log_numbers_failed_checks() {
        let lines = format_error_log(&sample_report());
        assert_eq!(lines[0], "Validation failed: 2 checks, 3 violations");
        assert!(lines.contains(&"Issue 1: Scripts".to_string()));
        assert!(lines.contains(&"Issue 2: Video".to_string()));
        assert!(lines.contains(&"    - Event handler found".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Inline External CSS")));
    }

    #[test]
    fn error_log_empty_on_success() {
        let report = ValidationReport::new(vec![passing("A"), passing("B")]);
        assert!(format_error_log(&report).is_empty());
    }

    // =========================================================================
    // HTML
    // =========================================================================

    #[test]
    fn html_has_row_per_check() {
        let html = render_report_html(&sample_report());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("<tr>").count(), 4);
        assert!(html.contains("<title>Validation failed</title>"));
        assert!(html.contains("<td class=\"fail\">Fail</td>"));
        assert!(html.contains("<li>clip.mp4</li>"));
    }

    #[test]
    fn html_escapes_messages() {
        let report = ValidationReport::new(vec![failing("HTML", &["Unclosed <div> tag"])]);
        let html = render_report_html(&report);
        assert!(html.contains("Unclosed &lt;div&gt; tag"));
        assert!(!html.contains("Unclosed <div> tag"));
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn intake_event_states_budget() {
        let lines = format_pipeline_event(&PipelineEvent::IntakeComplete {
            entries: 3,
            upload_size: 400 * 1024,
            budget: 300 * 1024,
        });
        assert_eq!(
            lines,
            vec!["Archive: 3 entries, 400.0 KB (over budget of 300.0 KB)"]
        );
    }

    #[test]
    fn resize_attempt_event() {
        let first = format_pipeline_event(&PipelineEvent::ResizeAttempt {
            attempt: 1,
            quality: None,
            width_percent: None,
            size: 2048,
            budget: 1024,
        });
        assert_eq!(first, vec!["    Attempt 1: original images → 2.0 KB (too large)"]);

        let later = format_pipeline_event(&PipelineEvent::ResizeAttempt {
            attempt: 3,
            quality: Some(60),
            width_percent: Some(100),
            size: 900,
            budget: 1024,
        });
        assert_eq!(later, vec!["    Attempt 3: quality 60, width 100% → 900 B (fits)"]);
    }

    #[test]
    fn css_event_mentions_unresolved_only_when_present() {
        let clean = format_pipeline_event(&PipelineEvent::CssInlined {
            inlined: 1,
            unresolved: 0,
        });
        assert_eq!(clean, vec!["CSS: inlined 1 stylesheet"]);
        let partial = format_pipeline_event(&PipelineEvent::CssInlined {
            inlined: 2,
            unresolved: 1,
        });
        assert_eq!(partial, vec!["CSS: inlined 2 stylesheets, 1 unresolved"]);
    }

    #[test]
    fn collaborator_failure_event() {
        let lines = format_pipeline_event(&PipelineEvent::CollaboratorFailed {
            collaborator: "notifier",
            message: "disk full".into(),
        });
        assert_eq!(lines, vec!["Warning: notifier failed: disk full"]);
    }

    // =========================================================================
    // Inspect / resize
    // =========================================================================

    #[test]
    fn inspect_lists_summary_and_violations() {
        let reports = vec![
            ImageReport {
                path: "hero.png".into(),
                size: 1204,
                info: Ok(ImageInfo {
                    width: 700,
                    height: 300,
                    format: "png".into(),
                    channels: 4,
                    bit_depth: 8,
                    density: None,
                }),
            },
            ImageReport {
                path: "bad.gif".into(),
                size: 3,
                info: Err(BackendError::ProcessingFailed("truncated".into())),
            },
        ];
        let lines = format_inspect(&reports, &LimitsConfig::default());
        assert_eq!(lines[0], "001 hero.png");
        assert_eq!(lines[1], "    700x300 png, 4 ch, 8-bit, unset dpi, 1204 bytes");
        assert_eq!(lines[2], "    Image width exceeds 600 pixels (found 700px)");
        assert_eq!(lines[3], "002 bad.gif");
        assert!(lines[4].starts_with("    unreadable ("));
    }

    #[test]
    fn inspect_without_images() {
        assert_eq!(
            format_inspect(&[], &LimitsConfig::default()),
            vec!["No images found"]
        );
    }

    fn snapshot(width: u32, height: u32, size: usize) -> ImageSnapshot {
        ImageSnapshot {
            width,
            height,
            size,
            format: "jpeg".into(),
            channels: 3,
            bit_depth: 8,
            density: None,
        }
    }

    #[test]
    fn resize_summary_lines() {
        let outcome = ResizeOutcome {
            archive: crate::archive::Archive::default(),
            images: vec![
                ResizeInfo {
                    path: "hero.jpg".into(),
                    resized: true,
                    original: snapshot(1200, 800, 4096),
                    new: snapshot(600, 400, 2048),
                },
                ResizeInfo {
                    path: "logo.png".into(),
                    resized: false,
                    original: snapshot(10, 10, 100),
                    new: snapshot(10, 10, 100),
                },
            ],
            original_size: 8192,
            final_size: 4096,
            attempts: 4,
            final_state: Some(ResizeState {
                quality: 60,
                width_percent: 100,
            }),
        };
        let lines = format_resize(&outcome);
        assert_eq!(
            lines[0],
            "Resized 8.0 KB → 4.0 KB in 4 attempts (quality 60, width 100%)"
        );
        assert_eq!(lines[1], "    001 hero.jpg: 1200x800 → 600x400 (4.0 KB → 2.0 KB)");
        assert_eq!(lines[2], "    002 logo.png: unchanged");
    }
}
