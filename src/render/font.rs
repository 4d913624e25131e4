use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rusttype::{point, Font, Scale};

use super::{blend, Canvas, Rgba};
use crate::{Error, Result};

/// A font bound to one pixel size.
pub struct Face {
    font: Arc<Font<'static>>,
    scale: Scale,
    size: f32,
}

impl Face {
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Line height used for baseline correction, rounded to whole pixels.
    pub fn height(&self) -> f32 {
        self.size.round()
    }

    pub fn advance(&self, ch: char) -> f32 {
        self.font.glyph(ch).scaled(self.scale).h_metrics().advance_width
    }

    pub fn text_width(&self, text: &str) -> f32 {
        text.chars().map(|c| self.advance(c)).sum()
    }

    /// Draw `text` with its baseline starting at (`x`, `baseline`).
    pub fn draw(&self, canvas: &mut Canvas, x: f32, baseline: f32, text: &str, color: Rgba) {
        for glyph in self.font.layout(text, self.scale, point(x, baseline)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    blend(canvas, bb.min.x + gx as i32, bb.min.y + gy as i32, color, coverage);
                });
            }
        }
    }
}

/// Loads the font file once and memoizes faces per size.
pub struct FontCache {
    path: PathBuf,
    font: Mutex<Option<Arc<Font<'static>>>>,
    faces: Mutex<HashMap<u32, Arc<Face>>>,
}

impl FontCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            font: Mutex::new(None),
            faces: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn face(&self, size: f32) -> Result<Arc<Face>> {
        let mut faces = self.faces.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(face) = faces.get(&size.to_bits()) {
            return Ok(face.clone());
        }
        let face = Arc::new(Face {
            font: self.font()?,
            scale: Scale::uniform(size),
            size,
        });
        faces.insert(size.to_bits(), face.clone());
        Ok(face)
    }

    fn font(&self) -> Result<Arc<Font<'static>>> {
        let mut slot = self.font.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(font) = slot.as_ref() {
            return Ok(font.clone());
        }
        let bytes = std::fs::read(&self.path).map_err(|e| {
            Error::Render(format!("read font {}: {e}", self.path.display()))
        })?;
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| Error::Render(format!("parse font {}", self.path.display())))?;
        let font = Arc::new(font);
        *slot = Some(font.clone());
        Ok(font)
    }
}
