//! Archive intake: raw bytes → [`Archive`].
//!
//! Runs in four steps, each a fast-fail before the next:
//!
//! 1. Zero bytes → [`IntakeError::Empty`].
//! 2. Container signature check on the first four bytes → [`IntakeError::NotZip`].
//!    This costs nothing and keeps arbitrary uploads away from the zip reader.
//! 3. Full decode with the `zip` crate → [`IntakeError::Malformed`] on any failure.
//! 4. Single-HTML invariant → [`IntakeError::MissingHtml`] / [`IntakeError::MultipleHtml`].
//!
//! Directory markers are skipped, as are macOS resource-fork entries under
//! `__MACOSX/` (those carry `._index.html` shadows that would otherwise trip
//! the single-HTML rule). Backslash separators written by some Windows zip
//! tools are normalized to `/`.

use crate::archive::{Archive, ArchiveEntry, EntryKind};
use base64::Engine;
use std::io::{Cursor, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("archive is empty (0 bytes)")]
    Empty,
    #[error("not a zip archive: bad signature {0:02x?}")]
    NotZip(Vec<u8>),
    #[error("malformed archive: {0}")]
    Malformed(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("archive contains no .html file")]
    MissingHtml,
    #[error("archive contains {} .html files, expected exactly one: {}", .0.len(), .0.join(", "))]
    MultipleHtml(Vec<String>),
}

const RESOURCE_FORK_DIR: &str = "__MACOSX/";

/// Check for a zip local-file, central-directory, end-of-central-directory,
/// or spanning marker signature.
pub fn is_zip_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4
        && bytes[0] == b'P'
        && bytes[1] == b'K'
        && matches!((bytes[2], bytes[3]), (3, 4) | (1, 2) | (5, 6) | (7, 8))
}

/// Decode a base64 transport payload, then run [`read_archive`].
///
/// Surrounding whitespace and line breaks (as produced by `base64 -w 76`)
/// are ignored.
pub fn read_base64_archive(payload: &str) -> Result<Archive, IntakeError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    read_archive(&bytes)
}

/// Decode raw archive bytes and enforce the single-HTML invariant.
pub fn read_archive(bytes: &[u8]) -> Result<Archive, IntakeError> {
    if bytes.is_empty() {
        return Err(IntakeError::Empty);
    }
    if !is_zip_magic(bytes) {
        let head = bytes.iter().take(4).copied().collect();
        return Err(IntakeError::NotZip(head));
    }

    let entries = decode_entries(bytes)?;
    let archive = Archive::new(entries);

    let html: Vec<String> = archive.html_entries().map(|e| e.path.clone()).collect();
    match html.len() {
        0 => Err(IntakeError::MissingHtml),
        1 => Ok(archive),
        _ => Err(IntakeError::MultipleHtml(html)),
    }
}

fn decode_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, IntakeError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IntakeError::Malformed(e.to_string()))?;

    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut file = zip
            .by_index(index)
            .map_err(|e| IntakeError::Malformed(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let path = normalize_path(file.name());
        if path.is_empty() || path.ends_with('/') || path.starts_with(RESOURCE_FORK_DIR) {
            continue;
        }

        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| IntakeError::Malformed(format!("{path}: {e}")))?;
        log::debug!(
            "intake: {path} ({} bytes, {:?})",
            content.len(),
            EntryKind::from_path(&path)
        );
        entries.push(ArchiveEntry::new(path, content));
    }
    Ok(entries)
}

fn normalize_path(name: &str) -> String {
    let forward = name.replace('\\', "/");
    forward.trim_start_matches("./").trim_start_matches('/').to_string()
}
