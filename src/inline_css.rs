//! External stylesheet inlining.
//!
//! Runs before the check battery so every rule sees a self-contained
//! document. For each `<link rel="stylesheet">` in an HTML entry:
//!
//! - `http://` / `https://` hrefs go through a [`CssFetcher`]. Transport
//!   failures, non-2xx statuses and bodies that do not look like CSS leave the
//!   link in place and record an error for that link only.
//! - Anything else is looked up among the archive's stylesheet entries:
//!   relative to the HTML entry's directory, then by exact path, then by
//!   comparing names with everything but ASCII alphanumerics stripped.
//!
//! A resolved link is replaced in the source text by
//! `<style>\n{css}\n</style>`; the rest of the markup is left byte-for-byte
//! as it was. Stylesheet entries that were inlined are dropped from the
//! returned archive, which makes a second pass a no-op.

use crate::archive::{Archive, ArchiveEntry, EntryKind};
use crate::checks::html::{Document, LineIndex, tag_end};
use crate::report::{CheckResult, Diagnostic, Severity};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

pub const CHECK_NAME: &str = "Inline External CSS";

static CSS_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[{}:;]\s*[\w-]+\s*[{}:;]").unwrap());

/// Cheap plausibility test: at least one `x: y;`-like fragment.
pub fn looks_like_css(content: &str) -> bool {
    CSS_SHAPE.is_match(content)
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
    #[error("Invalid CSS content")]
    InvalidCss,
    #[error("remote fetching is disabled")]
    Disabled,
}

/// Source of remote stylesheet text.
pub trait CssFetcher: Sync {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher with a global per-request timeout.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl CssFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            other => FetchError::Transport(other.to_string()),
        })?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// Refuses every remote URL. Used when `css.fetch_remote` is off.
pub struct OfflineFetcher;

impl CssFetcher for OfflineFetcher {
    fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError::Disabled)
    }
}

/// Archive after inlining plus the bookkeeping the pipeline reports.
#[derive(Debug, Clone)]
pub struct InlineOutcome {
    pub archive: Archive,
    pub result: CheckResult,
    /// Links replaced by a `<style>` block.
    pub inlined: usize,
    /// Links left in place because they could not be resolved.
    pub unresolved: usize,
}

struct Replacement {
    start: usize,
    end: usize,
    css: String,
}

pub fn inline_external_css(archive: &Archive, fetcher: &dyn CssFetcher) -> InlineOutcome {
    let sources: Vec<&ArchiveEntry> = archive
        .entries()
        .iter()
        .filter(|e| is_stylesheet_candidate(e))
        .filter(|e| looks_like_css(&e.text()))
        .collect();

    let mut current = archive.clone();
    let mut errors = Vec::new();
    let mut consumed: Vec<String> = Vec::new();
    let mut links_seen = 0;
    let mut inlined = 0;

    for entry in archive.html_entries() {
        let text = entry.text();
        let doc = match Document::parse(&text) {
            Ok(doc) => doc,
            Err(e) => {
                errors.push(Diagnostic::in_file(
                    format!("HTML could not be parsed: {e}"),
                    &entry.path,
                ));
                continue;
            }
        };
        let lines = LineIndex::new(&text);

        let mut replacements = Vec::new();
        for link in doc.elements_named("link") {
            if !is_stylesheet_link(link.attr("rel")) {
                continue;
            }
            links_seen += 1;
            let Some(href) = link.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
                continue;
            };
            let Some(start) = link.offset else {
                log::warn!("{}: <link href=\"{href}\"> has no source position", entry.path);
                continue;
            };
            let fail = |reason: String| {
                Diagnostic::at(
                    format!("CSS loading failed for {href}: {reason}"),
                    &entry.path,
                    lines.line_of(start),
                )
            };

            let css = if is_remote(href) {
                log::debug!("fetching remote stylesheet {href}");
                match fetcher.fetch(href).and_then(|body| {
                    if looks_like_css(&body) {
                        Ok(body)
                    } else {
                        Err(FetchError::InvalidCss)
                    }
                }) {
                    Ok(css) => css,
                    Err(e) => {
                        log::warn!("stylesheet {href} not inlined: {e}");
                        errors.push(fail(e.to_string()));
                        continue;
                    }
                }
            } else {
                match resolve_local(&sources, entry.dir(), href) {
                    Some(source) => {
                        if !consumed.contains(&source.path) {
                            consumed.push(source.path.clone());
                        }
                        source.text()
                    }
                    None => {
                        errors.push(fail("Local CSS not found".to_string()));
                        continue;
                    }
                }
            };

            replacements.push(Replacement {
                start,
                end: tag_end(&text, start),
                css,
            });
        }

        if replacements.is_empty() {
            continue;
        }
        inlined += replacements.len();
        replacements.sort_by_key(|r| r.start);
        let mut rewritten = String::with_capacity(text.len());
        let mut last = 0;
        for r in &replacements {
            rewritten.push_str(&text[last..r.start]);
            rewritten.push_str("<style>\n");
            rewritten.push_str(&r.css);
            rewritten.push_str("\n</style>");
            last = r.end;
        }
        rewritten.push_str(&text[last..]);
        current = current.with_replaced(&entry.path, rewritten.into_bytes());
    }

    if !consumed.is_empty() {
        let paths: Vec<&str> = consumed.iter().map(String::as_str).collect();
        current = current.without(&paths);
    }

    let unresolved = errors.len();
    let pass_message = if sources.is_empty() && links_seen == 0 {
        "No CSS found or referenced. Nothing to inline."
    } else {
        "All CSS (local and remote) successfully inlined."
    };
    let details = consumed
        .iter()
        .map(|path| format!("Inlined {path}"))
        .collect();
    let result = CheckResult::from_violations(CHECK_NAME, Severity::Violation, errors, pass_message)
        .with_details(details);

    InlineOutcome {
        archive: current,
        result,
        inlined,
        unresolved,
    }
}

fn is_remote(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

fn is_stylesheet_link(rel: Option<&str>) -> bool {
    rel.is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

/// `.css` entries, and extension-less files that may hold CSS.
fn is_stylesheet_candidate(entry: &ArchiveEntry) -> bool {
    entry.kind == EntryKind::Css
        || (entry.kind == EntryKind::Other && !entry.file_name().contains('.'))
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn resolve_local<'a>(
    sources: &[&'a ArchiveEntry],
    html_dir: &str,
    href: &str,
) -> Option<&'a ArchiveEntry> {
    let href = href.split(['?', '#']).next().unwrap_or(href);
    let cleaned = href.trim_start_matches("./").trim_start_matches('/');

    if !html_dir.is_empty() {
        let relative = format!("{html_dir}/{cleaned}");
        if let Some(found) = sources.iter().find(|s| s.path == relative) {
            return Some(*found);
        }
    }
    if let Some(found) = sources.iter().find(|s| s.path == cleaned) {
        return Some(*found);
    }

    let target = normalize(cleaned);
    if target.is_empty() {
        return None;
    }
    let fuzzy = sources.iter().find(|s| {
        let candidate = normalize(&s.path);
        candidate.ends_with(&target) || candidate.contains(&target)
    });
    if let Some(found) = fuzzy {
        log::debug!("stylesheet \"{href}\" matched {} by normalized name", found.path);
    }
    fuzzy.copied()
}
