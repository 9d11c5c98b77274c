//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the validator needs:
//! identify (header decode: geometry, format, channels, depth, density) and
//! reencode (decode, resize, encode back to the same container).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on top of the
//! `image` crate. Everything is statically linked into the binary.

use super::params::ReencodeParams;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Lowercase container name as detected from magic bytes (`png`, `jpeg`, ...).
    pub format: String,
    pub channels: u8,
    /// Bits per channel.
    pub bit_depth: u8,
    /// Declared horizontal density in DPI, when the file states one.
    pub density: Option<u32>,
}

/// Trait for image processing backends.
///
/// Both operations work on in-memory bytes: archive entries never touch disk.
pub trait ImageBackend: Sync {
    /// Read image geometry and format properties.
    fn identify(&self, data: &[u8]) -> Result<ImageInfo, BackendError>;

    /// Decode `params.source`, resize to the target dimensions, and encode
    /// as `params.format` at `params.quality`.
    fn reencode(&self, params: &ReencodeParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::archive::ImageKind;
    use crate::imaging::Quality;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// `identify` answers with `info` for every input except those starting
    /// with `b"corrupt"`. `reencode` returns noise whose length is
    /// `width × height × quality / 100`, so smaller parameters give smaller
    /// output deterministically.
    pub struct MockBackend {
        pub info: ImageInfo,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(usize),
        Reencode {
            format: ImageKind,
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn with_info(info: ImageInfo) -> Self {
            Self {
                info,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self::with_info(ImageInfo {
                width,
                height,
                format: "png".to_string(),
                channels: 3,
                bit_depth: 8,
                density: None,
            })
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn reencode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Reencode { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, data: &[u8]) -> Result<ImageInfo, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(data.len()));
            if data.starts_with(b"corrupt") {
                return Err(BackendError::UnknownFormat);
            }
            Ok(self.info.clone())
        }

        fn reencode(&self, params: &ReencodeParams) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Reencode {
                format: params.format,
                width: params.width,
                height: params.height,
                quality: params.quality.value(),
            });
            let len = params.width as usize * params.height as usize
                * params.quality.value() as usize
                / 100;
            Ok(crate::test_helpers::noise_bytes(len, params.width as u64))
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);

        let result = backend.identify(b"fake image").unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Identify(10)]);
    }

    #[test]
    fn mock_rejects_corrupt_input() {
        let backend = MockBackend::with_dimensions(10, 10);
        assert!(backend.identify(b"corrupt bytes").is_err());
    }

    #[test]
    fn mock_reencode_size_tracks_parameters() {
        let backend = MockBackend::with_dimensions(100, 100);

        let big = backend
            .reencode(&ReencodeParams {
                source: b"x",
                format: ImageKind::Jpeg,
                width: 100,
                height: 100,
                quality: Quality::new(80),
            })
            .unwrap();
        let small = backend
            .reencode(&ReencodeParams {
                source: b"x",
                format: ImageKind::Jpeg,
                width: 50,
                height: 50,
                quality: Quality::new(40),
            })
            .unwrap();

        assert_eq!(big.len(), 8000);
        assert_eq!(small.len(), 1000);
        assert_eq!(backend.reencode_count(), 2);
        assert!(matches!(
            &backend.get_operations()[1],
            RecordedOp::Reencode {
                width: 50,
                quality: 40,
                ..
            }
        ));
    }
}
