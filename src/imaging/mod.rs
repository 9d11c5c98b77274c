//! Image processing — pure Rust, in memory.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageDecoder` header decode |
//! | **Density** | custom parser (PNG `pHYs`, JPEG JFIF + EXIF) |
//! | **Re-encode** | Lanczos3 + format-specific `image` encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for resize geometry and density units (unit testable)
//! - **Parameters**: Data structures describing a re-encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub(crate) mod density;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ImageInfo};
pub use calculations::{calculate_target_dimensions, dpcm_to_dpi, ppm_to_dpi};
pub use params::{Quality, ReencodeParams};
pub use rust_backend::RustBackend;
