//! In-memory archive model.
//!
//! An [`Archive`] is an ordered list of [`ArchiveEntry`] values in the order
//! the source container listed them. It is value-like: transforms such as the
//! CSS inliner and the resize engine build a new archive with
//! [`Archive::with_replaced`] / [`Archive::without`] instead of mutating the
//! one a check might be reading. Entry content sits behind an `Arc<[u8]>`, so
//! cloning an archive copies paths and pointers, never image bytes.
//!
//! ## Entry classification
//!
//! | Lowercase extension | [`EntryKind`] |
//! |---|---|
//! | `html` | `Html` |
//! | `css` | `Css` |
//! | `png` | `Image(Png)` |
//! | `jpg`, `jpeg` | `Image(Jpeg)` |
//! | `gif` | `Image(Gif)` |
//! | `webp` | `Image(Webp)` |
//! | anything else | `Other` |
//!
//! `.htm` is deliberately `Other`: only `.html` counts toward the single-HTML
//! invariant enforced by [`intake`](crate::intake).

use serde::Serialize;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Image container formats accepted inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "format")]
pub enum EntryKind {
    Html,
    Css,
    Image(ImageKind),
    Other,
}

impl EntryKind {
    /// Classify a path by its lowercase extension.
    pub fn from_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return EntryKind::Other,
        };
        match ext.as_str() {
            "html" => EntryKind::Html,
            "css" => EntryKind::Css,
            "png" => EntryKind::Image(ImageKind::Png),
            "jpg" | "jpeg" => EntryKind::Image(ImageKind::Jpeg),
            "gif" => EntryKind::Image(ImageKind::Gif),
            "webp" => EntryKind::Image(ImageKind::Webp),
            _ => EntryKind::Other,
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, EntryKind::Image(_))
    }
}

/// One file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Archive-relative, forward-slash separated.
    pub path: String,
    pub content: Arc<[u8]>,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        let path = path.into();
        let kind = EntryKind::from_path(&path);
        Self {
            path,
            content: content.into(),
            kind,
        }
    }

    /// Content as text. Invalid UTF-8 is replaced rather than rejected;
    /// checks report on what they can read.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory part of the path, without trailing slash. Empty at the root.
    pub fn dir(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[..i],
            None => "",
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn new(entries: Vec<ArchiveEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn html_entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Html)
    }

    /// The first HTML entry. Past intake there is exactly one.
    pub fn html_entry(&self) -> Option<&ArchiveEntry> {
        self.html_entries().next()
    }

    pub fn images(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| e.kind.is_image())
    }

    pub fn css_entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Css)
    }

    pub fn find(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// New archive with the entry at `path` carrying `content`. Position and
    /// kind are kept; an unknown path returns an unchanged copy.
    pub fn with_replaced(&self, path: &str, content: impl Into<Arc<[u8]>>) -> Archive {
        let content = content.into();
        let entries = self
            .entries
            .iter()
            .map(|e| {
                if e.path == path {
                    ArchiveEntry {
                        path: e.path.clone(),
                        content: Arc::clone(&content),
                        kind: e.kind,
                    }
                } else {
                    e.clone()
                }
            })
            .collect();
        Archive { entries }
    }

    /// New archive without the entries whose paths are listed.
    pub fn without(&self, paths: &[&str]) -> Archive {
        let entries = self
            .entries
            .iter()
            .filter(|e| !paths.contains(&e.path.as_str()))
            .cloned()
            .collect();
        Archive { entries }
    }

    /// Sum of raw entry sizes, before compression.
    pub fn content_len(&self) -> usize {
        self.entries.iter().map(ArchiveEntry::len).sum()
    }

    /// Encode as a deflate-compressed zip container in entry order.
    pub fn to_zip_bytes(&self) -> zip::result::ZipResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(false);
        for entry in &self.entries {
            writer.start_file(entry.path.as_str(), options)?;
            writer.write_all(&entry.content)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    /// Size in bytes of the encoded container; what the budget is measured on.
    pub fn encoded_len(&self) -> zip::result::ZipResult<usize> {
        self.to_zip_bytes().map(|b| b.len())
    }
}
