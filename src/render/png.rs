use std::sync::{Mutex, PoisonError};

use image::codecs::png::{CompressionType, FilterType, PngEncoder as ImagePngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use super::Canvas;
use crate::{Error, Result};

// One 72x72 RGBA frame plus PNG framing at the fast setting.
const INITIAL_CAPACITY: usize = 15_697;

/// Fast, unfiltered RGBA PNG encoder. The output buffer is reused across
/// frames and guarded by one lock, so concurrent encodes serialize.
#[derive(Default)]
pub struct PngEncoder {
    buffer: Mutex<Vec<u8>>,
}

impl PngEncoder {
    pub fn encode(&self, canvas: &Canvas) -> Result<Vec<u8>> {
        let mut out = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        out.clear();
        out.reserve(INITIAL_CAPACITY);
        ImagePngEncoder::new_with_quality(&mut *out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(
                canvas.as_raw(),
                canvas.width(),
                canvas.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| Error::Render(format!("png encode: {e}")))?;
        Ok(out.clone())
    }
}

/// Decode a placeholder image into an RGBA canvas.
pub fn decode(bytes: &[u8]) -> Result<Canvas> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| Error::Render(format!("png decode: {e}")))
}
