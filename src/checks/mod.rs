//! Rule check engine.
//!
//! A fixed battery of independent checks. Each one reads the same immutable
//! [`CheckContext`] and returns a [`CheckResult`]; none sees another's output.
//! The battery runs on the rayon pool and results are collected back into
//! the fixed order below, never completion order, so identical input always
//! yields an identical report.
//!
//! | # | Check | Module | Strategy |
//! |---|---|---|---|
//! | 1 | Image Metadata | [`metadata`](crate::metadata) | binary header decode |
//! | 2 | Scripts and Plugins | [`scripts`] | line regex |
//! | 3 | Map Tag and CSS Rules | [`map_css`] | tree walk + tag-balance scan + line regex |
//! | 4 | Background Styles | [`background`] | tree walk (ancestors) + CSS line regex |
//! | 5 | Embedded Videos | [`video`] | tree walk |
//! | 6 | Image Dimensions | [`dimensions`] | tree walk + binary decode |
//! | 7 | Link Hygiene | [`link_hygiene`] | tree walk (opt-in via `checks.link_hygiene`) |
//! | 8 | Suspicious Patterns | [`suspicious`] | line regex, advisory |
//!
//! Checks never return errors. An HTML entry `tl` cannot parse becomes a
//! violation scoped to that entry in every tree-walking check.

pub mod background;
pub mod dimensions;
pub mod html;
pub mod link_hygiene;
pub mod map_css;
pub mod scripts;
pub mod suspicious;
pub mod video;

use crate::archive::Archive;
use crate::config::ValidatorConfig;
use crate::imaging::ImageBackend;
use crate::report::{CheckResult, Diagnostic, Severity, ValidationReport};
use html::Document;
use rayon::prelude::*;

/// A single validation rule.
pub trait Check: Sync {
    fn name(&self) -> &'static str;

    fn severity(&self) -> Severity {
        Severity::Violation
    }

    fn run(&self, ctx: &CheckContext) -> CheckResult;
}

/// One HTML entry, read and parsed once for the whole battery.
#[derive(Debug, Clone)]
pub struct HtmlSource {
    pub path: String,
    pub text: String,
    pub document: Result<Document, String>,
}

/// Read-only snapshot shared by every check in a run.
pub struct CheckContext<'a> {
    pub archive: &'a Archive,
    pub backend: &'a dyn ImageBackend,
    pub config: &'a ValidatorConfig,
    pub html: Vec<HtmlSource>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        archive: &'a Archive,
        backend: &'a dyn ImageBackend,
        config: &'a ValidatorConfig,
    ) -> Self {
        let html = archive
            .html_entries()
            .map(|entry| {
                let text = entry.text();
                let document = Document::parse(&text);
                HtmlSource {
                    path: entry.path.clone(),
                    text,
                    document,
                }
            })
            .collect();
        Self {
            archive,
            backend,
            config,
            html,
        }
    }

    /// Parsed documents, with a violation per entry that failed to parse.
    pub fn documents(&self, failures: &mut Vec<Diagnostic>) -> Vec<(&str, &Document)> {
        let mut docs = Vec::new();
        for source in &self.html {
            match &source.document {
                Ok(doc) => docs.push((source.path.as_str(), doc)),
                Err(e) => failures.push(Diagnostic::in_file(
                    format!("HTML could not be parsed: {e}"),
                    &source.path,
                )),
            }
        }
        docs
    }
}

/// The battery in report order. Link hygiene is included only when enabled.
pub fn battery(config: &ValidatorConfig) -> Vec<Box<dyn Check>> {
    let mut checks: Vec<Box<dyn Check>> = vec![
        Box::new(crate::metadata::ImageMetadataCheck),
        Box::new(scripts::ScriptsCheck),
        Box::new(map_css::MapCssCheck),
        Box::new(background::BackgroundCheck),
        Box::new(video::VideoCheck),
        Box::new(dimensions::DimensionsCheck),
    ];
    if config.checks.link_hygiene {
        checks.push(Box::new(link_hygiene::LinkHygieneCheck));
    }
    checks.push(Box::new(suspicious::SuspiciousCheck));
    checks
}

/// Run the whole battery against one archive snapshot.
pub fn run_all(
    archive: &Archive,
    backend: &dyn ImageBackend,
    config: &ValidatorConfig,
) -> ValidationReport {
    let ctx = CheckContext::new(archive, backend, config);
    let checks = battery(config);
    let results: Vec<CheckResult> = checks
        .par_iter()
        .map(|check| {
            let result = check.run(&ctx);
            log::debug!(
                "check '{}': {}",
                check.name(),
                if result.success { "pass" } else { "fail" }
            );
            result
        })
        .collect();
    ValidationReport::new(results)
}
