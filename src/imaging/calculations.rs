//! Pure calculation functions for resize geometry and density units.
//!
//! All functions here are pure and testable without any I/O or images.

/// Metres per inch, for converting PNG pixels-per-metre to DPI.
const INCH_IN_METRES: f64 = 0.0254;
/// Centimetres per inch, for converting JFIF/EXIF dots-per-cm to DPI.
const INCH_IN_CM: f64 = 2.54;

/// Calculate the re-encode dimensions for a resize step.
///
/// The width is `original_width × width_percent / 100`, capped at
/// `max_width`; the height follows the source aspect ratio. Neither side is
/// allowed to collapse below one pixel.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `width_percent` - Width factor as an integer percentage (100 = unchanged)
/// * `max_width` - Hard ceiling on the output width
///
/// # Examples
/// ```
/// # use mailgate::imaging::calculate_target_dimensions;
/// // Under the ceiling, factor applies directly
/// assert_eq!(calculate_target_dimensions((400, 200), 50, 600), (200, 100));
///
/// // Over the ceiling, width is capped and height follows
/// assert_eq!(calculate_target_dimensions((1200, 800), 100, 600), (600, 400));
/// ```
pub fn calculate_target_dimensions(
    source: (u32, u32),
    width_percent: u32,
    max_width: u32,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return (src_w.max(1), src_h.max(1));
    }

    let scaled = (src_w as u64 * width_percent as u64 / 100) as u32;
    let w = scaled.min(max_width).max(1);
    let h = ((src_h as f64 * w as f64 / src_w as f64).round() as u32).max(1);
    (w, h)
}

/// Convert a pixels-per-metre density (PNG `pHYs`) to DPI.
///
/// 2835 px/m is the conventional encoding of 72 DPI.
pub fn ppm_to_dpi(pixels_per_metre: u32) -> u32 {
    (pixels_per_metre as f64 * INCH_IN_METRES).round() as u32
}

/// Convert a dots-per-centimetre density (JFIF unit 2, EXIF unit 3) to DPI.
pub fn dpcm_to_dpi(dots_per_cm: f64) -> u32 {
    (dots_per_cm * INCH_IN_CM).round() as u32
}
