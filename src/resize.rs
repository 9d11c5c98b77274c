//! Budget-driven image re-encoding.
//!
//! Only invoked when the encoded archive is larger than `limits.budget_bytes`.
//! The search walks a two-dimensional parameter space, quality first:
//!
//! ```text
//! attempt  1: originals, as uploaded
//! attempt  2: quality 70, width 100%
//!   ...
//! attempt  5: quality 40, width 100%
//! attempt  6: quality 40, width  90%
//!   ...
//! attempt 10: quality 40, width  50%   → BudgetUnattainable if still over
//! ```
//!
//! Every attempt re-encodes from the original bytes, never from the previous
//! attempt's output, so generational loss does not compound. Target width is
//! `min(original × factor, max_image_width)` with the aspect ratio kept.
//! Entries that are not images, and images the backend cannot decode, pass
//! through untouched.
//!
//! Each attempt is reported as [`PipelineEvent::ResizeAttempt`] when a
//! progress channel is attached.

use crate::archive::{Archive, ArchiveEntry, EntryKind};
use crate::config::{LimitsConfig, ResizeConfig};
use crate::imaging::{
    BackendError, ImageBackend, ImageInfo, Quality, ReencodeParams, calculate_target_dimensions,
};
use crate::pipeline::PipelineEvent;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error(
        "Cannot reduce archive below {budget} bytes after {attempts} attempts (smallest was {smallest} bytes)"
    )]
    BudgetUnattainable {
        budget: usize,
        attempts: usize,
        smallest: usize,
    },
    #[error("Failed to re-encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("Archive encoding failed: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Position in the search space. Width is held as an integer percentage so
/// repeated steps never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResizeState {
    pub quality: u32,
    pub width_percent: u32,
}

fn to_percent(factor: f64) -> u32 {
    (factor * 100.0).round() as u32
}

impl ResizeState {
    pub fn initial(config: &ResizeConfig) -> Self {
        Self {
            quality: config.start_quality,
            width_percent: to_percent(config.start_width_factor),
        }
    }

    /// The next, strictly smaller, state: lower quality until its floor,
    /// then narrower width until its floor. `None` once both are exhausted.
    pub fn next(self, config: &ResizeConfig) -> Option<Self> {
        if self.quality > config.min_quality {
            let quality = self
                .quality
                .saturating_sub(config.quality_step)
                .max(config.min_quality);
            return Some(Self { quality, ..self });
        }
        let floor = to_percent(config.min_width_factor);
        if self.width_percent > floor {
            let step = to_percent(config.width_factor_step).max(1);
            let width_percent = self.width_percent.saturating_sub(step).max(floor);
            return Some(Self {
                width_percent,
                ..self
            });
        }
        None
    }

    pub fn width_factor(self) -> f64 {
        self.width_percent as f64 / 100.0
    }
}

/// Upper bound on archive evaluations for a search configuration: the
/// original upload plus one per reachable state after the first.
pub fn max_attempts(config: &ResizeConfig) -> usize {
    let mut state = ResizeState::initial(config);
    let mut attempts = 1;
    while let Some(next) = state.next(config) {
        attempts += 1;
        state = next;
    }
    attempts
}

/// Image properties captured before and after the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSnapshot {
    pub width: u32,
    pub height: u32,
    pub size: usize,
    pub format: String,
    pub channels: u8,
    pub bit_depth: u8,
    pub density: Option<u32>,
}

impl ImageSnapshot {
    fn new(info: Option<&ImageInfo>, size: usize) -> Self {
        match info {
            Some(info) => Self {
                width: info.width,
                height: info.height,
                size,
                format: info.format.clone(),
                channels: info.channels,
                bit_depth: info.bit_depth,
                density: info.density,
            },
            None => Self {
                width: 0,
                height: 0,
                size,
                format: "unknown".to_string(),
                channels: 0,
                bit_depth: 0,
                density: None,
            },
        }
    }
}

/// Before/after record for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResizeInfo {
    pub path: String,
    /// Content or geometry differs from the upload.
    pub resized: bool,
    pub original: ImageSnapshot,
    pub new: ImageSnapshot,
}

#[derive(Debug, Clone)]
pub struct ResizeOutcome {
    pub archive: Archive,
    pub images: Vec<ResizeInfo>,
    pub original_size: usize,
    pub final_size: usize,
    pub attempts: usize,
    /// State that produced the accepted archive; `None` when the originals fit.
    pub final_state: Option<ResizeState>,
}

struct SourceImage<'a> {
    index: usize,
    entry: &'a ArchiveEntry,
    info: Option<ImageInfo>,
}

/// Re-encode images until the encoded archive fits `limits.budget_bytes`.
pub fn resize_to_budget(
    archive: &Archive,
    backend: &dyn ImageBackend,
    limits: &LimitsConfig,
    config: &ResizeConfig,
    progress: Option<&Sender<PipelineEvent>>,
) -> Result<ResizeOutcome, ResizeError> {
    let budget = limits.budget_bytes;
    let sources: Vec<SourceImage> = archive
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind.is_image())
        .map(|(index, entry)| {
            let info = match backend.identify(&entry.content) {
                Ok(info) => Some(info),
                Err(e) => {
                    log::warn!("{}: cannot decode ({e}); kept as uploaded", entry.path);
                    None
                }
            };
            SourceImage { index, entry, info }
        })
        .collect();

    let mut current: Vec<Arc<[u8]>> = sources.iter().map(|s| Arc::clone(&s.entry.content)).collect();
    let mut state: Option<ResizeState> = None;
    let mut attempts = 0;
    let mut original_size = 0;
    let mut smallest = usize::MAX;

    loop {
        let candidate = assemble(archive, &sources, &current);
        let size = candidate.encoded_len()?;
        attempts += 1;
        if attempts == 1 {
            original_size = size;
        }
        smallest = smallest.min(size);
        log::debug!("resize attempt {attempts}: {size} bytes (state {state:?})");
        if let Some(tx) = progress {
            tx.send(PipelineEvent::ResizeAttempt {
                attempt: attempts,
                quality: state.map(|s| s.quality),
                width_percent: state.map(|s| s.width_percent),
                size,
                budget,
            })
            .ok();
        }

        if size <= budget {
            let images = sources
                .iter()
                .zip(&current)
                .map(|(source, content)| describe(backend, source, content))
                .collect();
            return Ok(ResizeOutcome {
                archive: candidate,
                images,
                original_size,
                final_size: size,
                attempts,
                final_state: state,
            });
        }

        let next = match state {
            None => ResizeState::initial(config).next(config),
            Some(s) => s.next(config),
        };
        let Some(next) = next else {
            return Err(ResizeError::BudgetUnattainable {
                budget,
                attempts,
                smallest,
            });
        };
        state = Some(next);

        current = sources
            .iter()
            .map(|source| reencode(backend, source, next, limits.max_image_width))
            .collect::<Result<_, _>>()?;
    }
}

fn reencode(
    backend: &dyn ImageBackend,
    source: &SourceImage,
    state: ResizeState,
    max_width: u32,
) -> Result<Arc<[u8]>, ResizeError> {
    let (Some(info), EntryKind::Image(format)) = (&source.info, source.entry.kind) else {
        return Ok(Arc::clone(&source.entry.content));
    };
    let (width, height) =
        calculate_target_dimensions((info.width, info.height), state.width_percent, max_width);
    let bytes = backend
        .reencode(&ReencodeParams {
            source: &source.entry.content,
            format,
            width,
            height,
            quality: Quality::new(state.quality),
        })
        .map_err(|e| ResizeError::Encode {
            path: source.entry.path.clone(),
            source: e,
        })?;
    Ok(bytes.into())
}

/// The upload with image contents swapped in, entry order preserved.
fn assemble(archive: &Archive, sources: &[SourceImage], contents: &[Arc<[u8]>]) -> Archive {
    let mut entries = archive.entries().to_vec();
    for (source, content) in sources.iter().zip(contents) {
        entries[source.index].content = Arc::clone(content);
    }
    Archive::new(entries)
}

fn describe(backend: &dyn ImageBackend, source: &SourceImage, content: &Arc<[u8]>) -> ResizeInfo {
    let original = ImageSnapshot::new(source.info.as_ref(), source.entry.len());
    let unchanged = Arc::ptr_eq(content, &source.entry.content);
    let new = if unchanged {
        original.clone()
    } else {
        let info = backend.identify(content).ok();
        ImageSnapshot::new(info.as_ref(), content.len())
    };
    let resized = (!unchanged && content[..] != source.entry.content[..])
        || new.width != original.width
        || new.height != original.height;
    ResizeInfo {
        path: source.entry.path.clone(),
        resized,
        original,
        new,
    }
}
