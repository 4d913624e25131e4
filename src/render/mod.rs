//! Tile rendering: shared resource caches, canvas helpers, PNG encoding and
//! the rolling graph itself.

use std::path::PathBuf;

use image::{Pixel, RgbaImage};

pub mod color;
pub mod font;
pub mod graph;
pub mod png;
pub mod ring;

pub use color::{ColorCache, Rgba};
pub use font::{Face, FontCache};
pub use graph::{Graph, Label};
pub use png::PngEncoder;
pub use ring::RingBuffer;

pub const TILE_WIDTH: usize = 72;
pub const TILE_HEIGHT: usize = 72;
pub const DEFAULT_FONT_PATH: &str = "DejaVuSans-Bold.ttf";

/// Row-major RGBA8 pixel buffer every tile is drawn into.
pub type Canvas = RgbaImage;

/// Process-wide caches handed to every graph. Each one is internally locked,
/// so a single `Arc<Resources>` can be shared across tiles and threads.
pub struct Resources {
    pub colors: ColorCache,
    pub fonts: FontCache,
    pub png: PngEncoder,
}

impl Resources {
    pub fn new(font_path: impl Into<PathBuf>) -> Self {
        Self {
            colors: ColorCache::default(),
            fonts: FontCache::new(font_path),
            png: PngEncoder::default(),
        }
    }
}

/// Fully transparent canvas.
pub fn new_canvas(width: usize, height: usize) -> Canvas {
    RgbaImage::new(width as u32, height as u32)
}

pub fn filled_canvas(width: usize, height: usize, color: Rgba) -> Canvas {
    RgbaImage::from_pixel(width as u32, height as u32, color.into())
}

/// Composite `color` over the pixel with `coverage` in `0.0..=1.0`.
/// Coordinates off the canvas are ignored.
pub fn blend(canvas: &mut Canvas, x: i32, y: i32, color: Rgba, coverage: f32) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    let Some(px) = canvas.get_pixel_mut_checked(x, y) else {
        return;
    };
    let alpha = coverage.clamp(0.0, 1.0) * f32::from(color.a);
    if alpha <= 0.0 {
        return;
    }
    let mut src = image::Rgba::from(color);
    src.0[3] = alpha.round() as u8;
    px.blend(&src);
}

/// Shift every row one pixel left and clear the rightmost column.
pub fn shift_left(canvas: &mut Canvas) {
    let stride = canvas.width() as usize * 4;
    if stride < 4 {
        return;
    }
    for row in canvas.chunks_exact_mut(stride) {
        row.copy_within(4.., 0);
        row[stride - 4..].fill(0);
    }
}
