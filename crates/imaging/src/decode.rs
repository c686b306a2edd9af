//! In-memory image decoding.

use crate::{detect_format, DecodeError, SourceFormat};
use image::DynamicImage;

/// Decode raw bytes into a pixel buffer.
///
/// The byte signature selects the decoder; the detected format is
/// returned alongside the buffer so callers can re-encode in the source
/// format when no explicit target is requested. Truncated or damaged
/// data yields [`DecodeError::Corrupt`] and never panics.
pub fn decode(data: &[u8]) -> Result<(DynamicImage, SourceFormat), DecodeError> {
    let format = detect_format(data)?;
    let img = image::load_from_memory_with_format(data, format.as_image_format())
        .map_err(DecodeError::Corrupt)?;
    Ok((img, format))
}
