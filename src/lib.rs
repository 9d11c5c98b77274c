//! # mailgate
//!
//! An acceptance gate for zipped HTML email templates. An upload is one zip
//! archive holding a single HTML document plus its images and optional
//! stylesheets; mailgate decides whether it can be published as-is.
//!
//! # Architecture: One Linear Pipeline
//!
//! ```text
//! 1. Intake    bytes    →  Archive          (zip → entries, exactly one HTML)
//! 2. Resize    Archive  →  Archive          (only when the upload is over budget)
//! 3. Inline    Archive  →  Archive + result (external stylesheets → <style>)
//! 4. Checks    Archive  →  ValidationReport (fixed battery, run in parallel)
//! ```
//!
//! Every stage takes an immutable [`archive::Archive`] snapshot and returns a
//! new one. Nothing is mutated in place, so any intermediate state can be
//! inspected or tested on its own.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`archive`] | In-memory archive model: ordered entries, kinds, zip re-encoding |
//! | [`intake`] | Zip (or base64 zip) bytes → [`archive::Archive`], fatal structural errors |
//! | [`resize`] | Budget-driven image re-encoding with a bounded quality/width search |
//! | [`inline_css`] | Replaces `<link rel="stylesheet">` with inline `<style>` blocks |
//! | [`checks`] | The rule battery: structure, scripts, map/CSS policy, backgrounds, video, dimensions, link hygiene, suspicious content |
//! | [`metadata`] | Image width and density validation (first check in the battery) |
//! | [`report`] | `CheckResult` / `ValidationReport` values |
//! | [`pipeline`] | Orchestrator, progress events, collaborator traits |
//! | [`config`] | `mailgate.toml` loading, stock defaults, validation |
//! | [`imaging`] | Image identification, density parsing, re-encoding |
//! | [`output`] | CLI text formatting and the HTML report renderer |
//!
//! # Design Decisions
//!
//! ## Violations Are Values
//!
//! A failing check is not an error. Checks return a [`report::CheckResult`]
//! with one diagnostic per violation; only structural problems (not a zip,
//! no HTML, several HTML files, an unreachable size budget) are `Err`. The
//! report is therefore always complete: one bad image never hides a script tag.
//!
//! ## Collaborators Are Injected
//!
//! Remote stylesheet fetching, publishing and notification go through traits
//! ([`inline_css::CssFetcher`], [`pipeline::Publisher`], [`pipeline::Notifier`])
//! handed to [`pipeline::Pipeline`]. The library holds no global clients, and
//! tests substitute in-memory stubs.
//!
//! ## Bounded Resize Search
//!
//! The resize engine walks quality down first, then width, always re-encoding
//! from the original images. The number of evaluations is fixed by the
//! `[resize]` config, so an archive that cannot fit ends in a
//! `BudgetUnattainable` error rather than a loop.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and encoding use the `image` crate; density is read
//! from PNG `pHYs` and JPEG JFIF/EXIF headers by a small parser. No system
//! libraries are required.

pub mod archive;
pub mod checks;
pub mod config;
pub mod imaging;
pub mod inline_css;
pub mod intake;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod resize;

#[cfg(test)]
pub(crate) mod test_helpers;
