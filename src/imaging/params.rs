//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`resize`](crate::resize) engine (which decides the
//! quality and geometry of each attempt) and the [`backend`](super::backend)
//! (which does the pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing the search logic.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`ReencodeParams`] — One re-encode: source bytes, output format, target dimensions, quality.

use crate::archive::ImageKind;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Parameters for re-encoding one image from its original bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReencodeParams<'a> {
    pub source: &'a [u8],
    /// Output container; matches the entry's extension so paths stay valid.
    pub format: ImageKind,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
