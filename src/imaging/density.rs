//! Minimal pixel-density reader for PNG and JPEG headers.
//!
//! The `image` crate decodes pixels but does not surface the declared print
//! resolution, so this module walks the container headers directly:
//!
//! - PNG: the `pHYs` chunk (pixels per metre, unit byte 1 = metre).
//! - JPEG: EXIF `XResolution` + `ResolutionUnit` in APP1, falling back to the
//!   JFIF APP0 density fields.
//!
//! A density is only reported when the file states it in absolute units.
//! "Aspect ratio only" declarations (PNG unit 0, JFIF unit 0, EXIF unit 1)
//! report `None`. GIF and WebP have no density field we read.

use super::calculations::{dpcm_to_dpi, ppm_to_dpi};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JFIF_IDENT: &[u8] = b"JFIF\0";
const EXIF_IDENT: &[u8] = b"Exif\0\0";

const TAG_X_RESOLUTION: u16 = 0x011A;
const TAG_RESOLUTION_UNIT: u16 = 0x0128;

/// Read the declared horizontal density in DPI, dispatching on magic bytes.
/// Returns `None` when the format has no density or the header is unreadable.
pub fn read_density(data: &[u8]) -> Option<u32> {
    if data.starts_with(PNG_SIGNATURE) {
        read_png_density(data)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        read_jpeg_density(data)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// PNG: pHYs chunk
// ---------------------------------------------------------------------------

/// Walk PNG chunks until `pHYs` or the first `IDAT`.
///
/// Chunk layout: length (4, BE) + type (4) + data (length) + CRC (4).
/// `pHYs` data: x ppu (4, BE) + y ppu (4, BE) + unit (1).
fn read_png_density(data: &[u8]) -> Option<u32> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= data.len() {
        let length = be_u32(data, pos)? as usize;
        let kind = &data[pos + 4..pos + 8];
        let body_start = pos + 8;
        let body_end = body_start.checked_add(length)?;
        if body_end > data.len() {
            return None;
        }

        match kind {
            b"pHYs" if length >= 9 => {
                let x_ppu = be_u32(data, body_start)?;
                let unit = data[body_start + 8];
                return (unit == 1).then(|| ppm_to_dpi(x_ppu));
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }
        pos = body_end + 4;
    }
    None
}

// ---------------------------------------------------------------------------
// JPEG: EXIF APP1, then JFIF APP0
// ---------------------------------------------------------------------------

fn read_jpeg_density(data: &[u8]) -> Option<u32> {
    let mut jfif = None;
    let mut exif = None;

    for (marker, segment) in jpeg_segments(data) {
        match marker {
            0xE0 if segment.starts_with(JFIF_IDENT) => {
                jfif = jfif_density(&segment[JFIF_IDENT.len()..]);
            }
            0xE1 if segment.starts_with(EXIF_IDENT) => {
                exif = exif_density(&segment[EXIF_IDENT.len()..]);
            }
            _ => {}
        }
    }
    exif.or(jfif)
}

/// Iterate `(marker, payload)` pairs up to start-of-scan.
fn jpeg_segments(data: &[u8]) -> Vec<(u8, &[u8])> {
    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS: entropy-coded data follows
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        // Markers without length field
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            break;
        }
        let start = pos + 4;
        let end = (pos + 2 + seg_len).min(data.len());
        segments.push((marker, &data[start..end]));
        pos += 2 + seg_len;
    }
    segments
}

/// JFIF APP0 after the identifier: version (2) + units (1) + Xdensity (2) + Ydensity (2).
fn jfif_density(body: &[u8]) -> Option<u32> {
    if body.len() < 7 {
        return None;
    }
    let unit = body[2];
    let x = u16::from_be_bytes([body[3], body[4]]);
    match unit {
        1 => Some(x as u32),
        2 => Some(dpcm_to_dpi(x as f64)),
        _ => None,
    }
}

/// Read XResolution + ResolutionUnit from IFD0 of an EXIF TIFF block.
///
/// ResolutionUnit defaults to inches (2) when absent, as the TIFF spec says.
fn exif_density(tiff: &[u8]) -> Option<u32> {
    if tiff.len() < 8 {
        return None;
    }
    let big_endian = match &tiff[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let read_u16 = |offset: usize| -> Option<u16> {
        let b = tiff.get(offset..offset + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let read_u32 = |offset: usize| -> Option<u32> {
        let b = tiff.get(offset..offset + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    if read_u16(2)? != 42 {
        return None;
    }
    let ifd = read_u32(4)? as usize;
    let count = read_u16(ifd)? as usize;

    let mut x_resolution = None;
    let mut unit = 2u16;
    for i in 0..count {
        let entry = ifd + 2 + i * 12;
        let tag = read_u16(entry)?;
        match tag {
            TAG_X_RESOLUTION => {
                // RATIONAL: value is an offset to numerator/denominator
                let offset = read_u32(entry + 8)? as usize;
                let num = read_u32(offset)?;
                let den = read_u32(offset + 4)?;
                if den != 0 {
                    x_resolution = Some(num as f64 / den as f64);
                }
            }
            TAG_RESOLUTION_UNIT => unit = read_u16(entry + 8)?,
            _ => {}
        }
    }

    let x = x_resolution?;
    match unit {
        2 => Some(x.round() as u32),
        3 => Some(dpcm_to_dpi(x)),
        _ => None,
    }
}

fn be_u32(data: &[u8], pos: usize) -> Option<u32> {
    let b = data.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
