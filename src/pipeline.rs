//! Pipeline orchestration.
//!
//! The only component that knows the stage order and talks to collaborators:
//!
//! ```text
//! bytes ─► intake ─► [resize if over budget] ─► inline CSS ─► check battery ─► report
//!                                                                   │
//!                                              [apply fix, re-run] ◄┘ (checks.apply_fixes)
//! ```
//!
//! Each stage consumes the archive snapshot the previous one produced. Fatal
//! errors (intake failures, an unattainable budget) stop the run with a
//! [`PipelineError`] and no report. Everything else lands in the report.
//!
//! Collaborators are passed in explicitly: a [`CssFetcher`] for remote
//! stylesheets, a [`Publisher`] that receives accepted output, and a
//! [`Notifier`] that receives the rendered report. A collaborator failure is
//! recorded as an outcome warning; it never changes the verdict.

use crate::archive::{Archive, ArchiveEntry};
use crate::checks;
use crate::config::ValidatorConfig;
use crate::imaging::ImageBackend;
use crate::inline_css::{self, CssFetcher};
use crate::intake::{self, IntakeError};
use crate::report::{CheckResult, ValidationReport, ValidationReportSummary};
use crate::resize::{self, ResizeError, ResizeOutcome};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Resize(#[from] ResizeError),
}

/// Failure reported by a publisher or notifier.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// Receives the entries accepted for publishing.
pub trait Publisher: Sync {
    fn publish(&self, entries: &[ArchiveEntry], digest: &str) -> Result<(), CollaboratorError>;
}

/// Delivers a human-readable rendering of the report.
pub trait Notifier: Sync {
    fn notify(&self, report: &ValidationReport, rendered_html: &str)
    -> Result<(), CollaboratorError>;
}

/// Publisher and notifier that accept everything and do nothing.
pub struct Discard;

impl Publisher for Discard {
    fn publish(&self, _entries: &[ArchiveEntry], _digest: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

impl Notifier for Discard {
    fn notify(
        &self,
        _report: &ValidationReport,
        _rendered_html: &str,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Progress events, sent while the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    IntakeComplete {
        entries: usize,
        upload_size: usize,
        budget: usize,
    },
    /// One archive evaluation in the resize search. `quality` and
    /// `width_percent` are `None` for the upload as-is.
    ResizeAttempt {
        attempt: usize,
        quality: Option<u32>,
        width_percent: Option<u32>,
        size: usize,
        budget: usize,
    },
    ResizeComplete {
        original_size: usize,
        final_size: usize,
        attempts: usize,
    },
    CssInlined {
        inlined: usize,
        unresolved: usize,
    },
    ChecksComplete {
        round: usize,
        passed: usize,
        failed: usize,
    },
    FixApplied {
        path: String,
    },
    Published {
        entries: usize,
    },
    CollaboratorFailed {
        collaborator: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Passed,
    /// Passed only after adopting a suggested fix.
    PassedAfterFix,
    Failed,
}

/// Everything a successful (non-fatal) run produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Status,
    /// Ordered: inlining result first, then the battery.
    pub report: ValidationReport,
    /// Final archive snapshot, after resize, inlining and any adopted fix.
    pub archive: Archive,
    pub resize: Option<ResizeOutcome>,
    /// Entries eligible for publishing: the HTML entry on success, else none.
    pub publishable: Vec<ArchiveEntry>,
    pub upload_size: usize,
    /// SHA-256 of the uploaded bytes, lowercase hex.
    pub digest: String,
    pub warnings: Vec<String>,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.status != Status::Failed
    }

    pub fn audit_record(&self) -> AuditRecord<'_> {
        AuditRecord {
            status: self.status,
            upload_size: self.upload_size,
            digest: &self.digest,
            resize: self.resize.as_ref().map(|r| ResizeSummary {
                original_size: r.original_size,
                final_size: r.final_size,
                attempts: r.attempts,
                images: &r.images,
            }),
            report: ValidationReportSummary(&self.report),
            publishable: self.publishable.iter().map(|e| e.path.as_str()).collect(),
            warnings: self.warnings.iter().map(String::as_str).collect(),
        }
    }
}

/// JSON view of a run, for `--json`.
#[derive(Serialize)]
pub struct AuditRecord<'a> {
    pub status: Status,
    pub upload_size: usize,
    pub digest: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeSummary<'a>>,
    pub report: ValidationReportSummary<'a>,
    pub publishable: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<&'a str>,
}

#[derive(Serialize)]
pub struct ResizeSummary<'a> {
    pub original_size: usize,
    pub final_size: usize,
    pub attempts: usize,
    pub images: &'a [resize::ResizeInfo],
}

/// Renders a report for the notifier.
pub type RenderFn = fn(&ValidationReport) -> String;

pub struct Pipeline<'a> {
    config: &'a ValidatorConfig,
    backend: &'a dyn ImageBackend,
    fetcher: &'a dyn CssFetcher,
    publisher: &'a dyn Publisher,
    notifier: &'a dyn Notifier,
    render: RenderFn,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a ValidatorConfig,
        backend: &'a dyn ImageBackend,
        fetcher: &'a dyn CssFetcher,
    ) -> Self {
        Self {
            config,
            backend,
            fetcher,
            publisher: &Discard,
            notifier: &Discard,
            render: crate::output::render_report_html,
        }
    }

    pub fn with_publisher(mut self, publisher: &'a dyn Publisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run every stage over one upload.
    pub fn run(
        &self,
        bytes: &[u8],
        progress: Option<Sender<PipelineEvent>>,
    ) -> Result<Outcome, PipelineError> {
        let emit = |event: PipelineEvent| {
            if let Some(tx) = &progress {
                tx.send(event).ok();
            }
        };
        let budget = self.config.limits.budget_bytes;
        let digest = format!("{:x}", Sha256::digest(bytes));

        let uploaded = intake::read_archive(bytes)?;
        emit(PipelineEvent::IntakeComplete {
            entries: uploaded.len(),
            upload_size: bytes.len(),
            budget,
        });

        let (archive, resized) = if bytes.len() > budget {
            log::debug!("upload is {} bytes, budget {budget}: resizing", bytes.len());
            let outcome = resize::resize_to_budget(
                &uploaded,
                self.backend,
                &self.config.limits,
                &self.config.resize,
                progress.as_ref(),
            )?;
            emit(PipelineEvent::ResizeComplete {
                original_size: outcome.original_size,
                final_size: outcome.final_size,
                attempts: outcome.attempts,
            });
            (outcome.archive.clone(), Some(outcome))
        } else {
            (uploaded, None)
        };

        let inlined = inline_css::inline_external_css(&archive, self.fetcher);
        emit(PipelineEvent::CssInlined {
            inlined: inlined.inlined,
            unresolved: inlined.unresolved,
        });
        let mut archive = inlined.archive;

        let mut report = self.validate(&archive, &inlined.result, 1, &emit);
        let mut status = if report.overall_success() {
            Status::Passed
        } else {
            Status::Failed
        };

        if status == Status::Failed && self.config.checks.apply_fixes {
            if let Some(fix) = report.suggested_fix().cloned() {
                log::debug!("adopting repaired {}", fix.path);
                archive = archive.with_replaced(&fix.path, fix.content.into_bytes());
                emit(PipelineEvent::FixApplied { path: fix.path });
                report = self.validate(&archive, &inlined.result, 2, &emit);
                if report.overall_success() {
                    status = Status::PassedAfterFix;
                }
            }
        }

        let publishable: Vec<ArchiveEntry> = if status == Status::Failed {
            Vec::new()
        } else {
            archive.html_entry().cloned().into_iter().collect()
        };

        let mut warnings = Vec::new();
        let mut collaborator_failed = |collaborator: &'static str, e: CollaboratorError| {
            log::warn!("{collaborator} failed: {e}");
            warnings.push(format!("{collaborator} failed: {e}"));
            emit(PipelineEvent::CollaboratorFailed {
                collaborator,
                message: e.0,
            });
        };

        if !publishable.is_empty() {
            match self.publisher.publish(&publishable, &digest) {
                Ok(()) => emit(PipelineEvent::Published {
                    entries: publishable.len(),
                }),
                Err(e) => collaborator_failed("publisher", e),
            }
        }
        if let Err(e) = self.notifier.notify(&report, &(self.render)(&report)) {
            collaborator_failed("notifier", e);
        }

        Ok(Outcome {
            status,
            report,
            archive,
            resize: resized,
            publishable,
            upload_size: bytes.len(),
            digest,
            warnings,
        })
    }

    /// Inline result first, then the battery over `archive`.
    fn validate(
        &self,
        archive: &Archive,
        inline_result: &CheckResult,
        round: usize,
        emit: &impl Fn(PipelineEvent),
    ) -> ValidationReport {
        let battery = checks::run_all(archive, self.backend, self.config);
        let mut results = Vec::with_capacity(battery.results.len() + 1);
        results.push(inline_result.clone());
        results.extend(battery.results);
        let report = ValidationReport::new(results);
        let failed = report.failed().count();
        emit(PipelineEvent::ChecksComplete {
            round,
            passed: report.results.len() - failed,
            failed,
        });
        report
    }
}

/// Decode a base64 payload and run the pipeline on it.
pub fn run_base64(
    pipeline: &Pipeline,
    payload: &str,
    progress: Option<Sender<PipelineEvent>>,
) -> Result<Outcome, PipelineError> {
    use base64::Engine;
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(IntakeError::from)?;
    pipeline.run(&bytes, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline_css::OfflineFetcher;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::*;
    use std::sync::Mutex;

    const CLEAN_BODY: &str = r#"<table width="600">
<tr><td style="background-color:#ffffff">
<a href="https://example.com"><img src="img/logo.png" width="20" height="10" alt="logo"></a>
</td></tr>
</table>"#;

    fn clean_zip() -> Vec<u8> {
        ZipBuilder::new()
            .file("index.html", html_doc(CLEAN_BODY))
            .file("img/logo.png", png_bytes(20, 10))
            .build()
    }

    #[derive(Default)]
    struct Recorder {
        published: Mutex<Vec<(Vec<String>, String)>>,
        notified: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Publisher for Recorder {
        fn publish(&self, entries: &[ArchiveEntry], digest: &str) -> Result<(), CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError("storage offline".into()));
            }
            self.published.lock().unwrap().push((
                entries.iter().map(|e| e.path.clone()).collect(),
                digest.to_string(),
            ));
            Ok(())
        }
    }

    impl Notifier for Recorder {
        fn notify(
            &self,
            _report: &ValidationReport,
            rendered_html: &str,
        ) -> Result<(), CollaboratorError> {
            self.notified.lock().unwrap().push(rendered_html.to_string());
            Ok(())
        }
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[test]
    fn clean_upload_passes_and_publishes_html_only() {
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let recorder = Recorder::default();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher)
            .with_publisher(&recorder)
            .with_notifier(&recorder);

        let bytes = clean_zip();
        let outcome = pipeline.run(&bytes, None).unwrap();

        assert_eq!(outcome.status, Status::Passed, "{:#?}", outcome.report);
        assert!(outcome.resize.is_none());
        assert_eq!(outcome.report.results[0].name, inline_css::CHECK_NAME);
        assert_eq!(outcome.report.violation_count(), 0);
        let paths: Vec<&str> = outcome.publishable.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["index.html"]);

        let published = recorder.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, vec!["index.html"]);
        assert_eq!(published[0].1.len(), 64);
        assert_eq!(published[0].1, outcome.digest);
        assert_eq!(recorder.notified.lock().unwrap().len(), 1);
    }

    #[test]
    fn events_follow_stage_order() {
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let (tx, rx) = std::sync::mpsc::channel();
        pipeline.run(&clean_zip(), Some(tx)).unwrap();
        let events: Vec<PipelineEvent> = rx.into_iter().collect();
        assert!(matches!(events[0], PipelineEvent::IntakeComplete { entries: 2, .. }));
        assert!(matches!(
            events[1],
            PipelineEvent::CssInlined {
                inlined: 0,
                unresolved: 0
            }
        ));
        assert!(matches!(
            events[2],
            PipelineEvent::ChecksComplete {
                round: 1,
                failed: 0,
                ..
            }
        ));
        assert!(matches!(events[3], PipelineEvent::Published { entries: 1 }));
    }

    // =========================================================================
    // Fatal errors
    // =========================================================================

    #[test]
    fn intake_errors_are_fatal() {
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let recorder = Recorder::default();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher).with_notifier(&recorder);

        let two = ZipBuilder::new()
            .file("a.html", html_doc("x"))
            .file("b.html", html_doc("y"))
            .build();
        assert!(matches!(
            pipeline.run(&two, None),
            Err(PipelineError::Intake(IntakeError::MultipleHtml(_)))
        ));
        assert!(matches!(
            pipeline.run(b"", None),
            Err(PipelineError::Intake(IntakeError::Empty))
        ));
        // no report, so nothing to notify
        assert!(recorder.notified.lock().unwrap().is_empty());
    }

    #[test]
    fn unattainable_budget_is_fatal() {
        let mut config = ValidatorConfig::default();
        config.limits.budget_bytes = 100;
        let backend = MockBackend::with_dimensions(600, 600);
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let bytes = ZipBuilder::new()
            .file("index.html", html_doc("<p>x</p>"))
            .file("a.jpg", noise_bytes(5_000, 1))
            .build();
        assert!(matches!(
            pipeline.run(&bytes, None),
            Err(PipelineError::Resize(ResizeError::BudgetUnattainable { .. }))
        ));
    }

    // =========================================================================
    // Violations and fixes
    // =========================================================================

    #[test]
    fn violations_fail_without_publishing() {
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let recorder = Recorder::default();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher)
            .with_publisher(&recorder)
            .with_notifier(&recorder);
        let bytes = ZipBuilder::new()
            .file("index.html", html_doc("<script src=\"x.js\"></script>"))
            .file("a.png", png_bytes(4, 4))
            .build();
        let outcome = pipeline.run(&bytes, None).unwrap();
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.publishable.is_empty());
        assert!(recorder.published.lock().unwrap().is_empty());
        assert!(recorder.notified.lock().unwrap()[0].contains("Scripts and Plugins"));
    }

    #[test]
    fn adopted_fix_passes_on_second_round() {
        let mut config = ValidatorConfig::default();
        config.checks.auto_fix = true;
        config.checks.apply_fixes = true;
        let backend = RustBackend::new();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let bytes = ZipBuilder::new()
            .file("index.html", html_doc("<div>\n<p>unclosed\n</div>"))
            .file("a.png", png_bytes(4, 4))
            .build();

        let (tx, rx) = std::sync::mpsc::channel();
        let outcome = pipeline.run(&bytes, Some(tx)).unwrap();
        assert_eq!(outcome.status, Status::PassedAfterFix, "{:#?}", outcome.report);
        let events: Vec<PipelineEvent> = rx.into_iter().collect();
        assert!(events.contains(&PipelineEvent::FixApplied {
            path: "index.html".into()
        }));
        assert!(outcome.archive.html_entry().unwrap().text().contains("</p>"));
    }

    #[test]
    fn fix_not_adopted_unless_enabled() {
        let mut config = ValidatorConfig::default();
        config.checks.auto_fix = true;
        let backend = RustBackend::new();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let bytes = ZipBuilder::new()
            .file("index.html", html_doc("<table><tr><td>x</td></tr></table><div>"))
            .file("a.png", png_bytes(4, 4))
            .build();
        let outcome = pipeline.run(&bytes, None).unwrap();
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.report.suggested_fix().is_some());
    }

    #[test]
    fn publisher_failure_is_a_warning() {
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher).with_publisher(&recorder);
        let outcome = pipeline.run(&clean_zip(), None).unwrap();
        assert_eq!(outcome.status, Status::Passed);
        assert_eq!(outcome.warnings, vec!["publisher failed: storage offline"]);
    }

    // =========================================================================
    // Resize routing and audit record
    // =========================================================================

    #[test]
    fn over_budget_upload_is_resized_first() {
        let mut config = ValidatorConfig::default();
        config.limits.budget_bytes = 200_000;
        let backend = MockBackend::with_dimensions(600, 600);
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let bytes = ZipBuilder::new()
            .file("index.html", html_doc("<p>x</p>"))
            .file("a.jpg", noise_bytes(300_000, 5))
            .build();
        let outcome = pipeline.run(&bytes, None).unwrap();
        let resize = outcome.resize.as_ref().unwrap();
        assert!(resize.final_size <= 200_000);
        assert!(resize.images[0].resized);
        assert_eq!(outcome.archive.find("a.jpg").unwrap().len(), 180_000);
    }

    #[test]
    fn audit_record_serializes() {
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let outcome = pipeline.run(&clean_zip(), None).unwrap();
        let json = serde_json::to_value(outcome.audit_record()).unwrap();
        assert_eq!(json["status"], "Passed");
        assert_eq!(json["report"]["overall_success"], true);
        assert_eq!(json["publishable"][0], "index.html");
        assert!(json.get("resize").is_none());
        assert!(json.get("warnings").is_none());
        assert_eq!(json["digest"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn base64_payload_accepted() {
        use base64::Engine;
        let config = ValidatorConfig::default();
        let backend = RustBackend::new();
        let pipeline = Pipeline::new(&config, &backend, &OfflineFetcher);
        let encoded = base64::engine::general_purpose::STANDARD.encode(clean_zip());
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert!(run_base64(&pipeline, &wrapped, None).unwrap().passed());
        assert!(matches!(
            run_base64(&pipeline, "@@@", None),
            Err(PipelineError::Intake(IntakeError::Base64(_)))
        ));
    }
}
