use std::sync::Arc;

use super::{new_canvas, shift_left, Canvas, Resources, Rgba, RingBuffer};
use crate::{Error, Result};

pub const LABEL_SLOTS: usize = 3;
pub const DEFAULT_FONT_SIZE: f32 = 10.5;
const LINE_HEIGHT: f32 = 12.0;

/// Text overlay drawn on top of the graph at encode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub y: f32,
    pub font_size: f32,
    pub color: Rgba,
}

/// Rolling histogram of one reading.
///
/// Each `update` appends a sample and redraws either the whole canvas (after
/// a color change) or only the newest column after shifting the rest left.
/// Samples are quantized to a row index with
/// `round((v - min) / (max - min) * (height - 1))`. The newest column is drawn
/// from the unclamped row, so values below `min` show as background and values
/// above `max` as a full foreground column. History keeps only the low byte of
/// the row, which is what a later full repaint draws from.
pub struct Graph {
    resources: Arc<Resources>,
    canvas: Canvas,
    scratch: Canvas,
    samples: RingBuffer<u8>,
    last_y: i32,
    min: i32,
    max: i32,
    fg: Rgba,
    bg: Rgba,
    hl: Rgba,
    labels: [Option<Label>; LABEL_SLOTS],
    drawn: bool,
    redraw: bool,
}

impl Graph {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resources: Arc<Resources>,
        width: usize,
        height: usize,
        min: i32,
        max: i32,
        fg: Rgba,
        bg: Rgba,
        hl: Rgba,
    ) -> Self {
        Self {
            resources,
            canvas: new_canvas(width, height),
            scratch: new_canvas(width, height),
            samples: RingBuffer::with_capacity(width),
            last_y: -1,
            min,
            max,
            fg,
            bg,
            hl,
            labels: Default::default(),
            drawn: false,
            redraw: false,
        }
    }

    pub fn width(&self) -> usize {
        self.canvas.width() as usize
    }

    pub fn height(&self) -> usize {
        self.canvas.height() as usize
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn samples(&self) -> &RingBuffer<u8> {
        &self.samples
    }

    pub fn colors(&self) -> (Rgba, Rgba, Rgba) {
        (self.fg, self.bg, self.hl)
    }

    pub fn set_foreground(&mut self, color: Rgba) {
        self.fg = color;
        self.redraw = true;
    }

    pub fn set_background(&mut self, color: Rgba) {
        self.bg = color;
        self.redraw = true;
    }

    pub fn set_highlight(&mut self, color: Rgba) {
        self.hl = color;
        self.redraw = true;
    }

    /// Scale changes apply to samples from now on; history keeps its rows.
    pub fn set_min(&mut self, min: i32) {
        self.min = min;
    }

    pub fn set_max(&mut self, max: i32) {
        self.max = max;
    }

    pub fn range(&self) -> (i32, i32) {
        (self.min, self.max)
    }

    pub fn set_label(&mut self, key: usize, text: &str, y: f32, color: Rgba) -> Result<()> {
        let slot = self.labels.get_mut(key).ok_or(Error::UnknownLabel(key))?;
        *slot = Some(Label {
            text: text.to_string(),
            y,
            font_size: DEFAULT_FONT_SIZE,
            color,
        });
        Ok(())
    }

    pub fn label(&self, key: usize) -> Option<&Label> {
        self.labels.get(key).and_then(Option::as_ref)
    }

    fn label_mut(&mut self, key: usize) -> Result<&mut Label> {
        self.labels
            .get_mut(key)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownLabel(key))
    }

    pub fn set_label_text(&mut self, key: usize, text: &str) -> Result<()> {
        let label = self.label_mut(key)?;
        if label.text != text {
            label.text = text.to_string();
        }
        Ok(())
    }

    pub fn set_label_font_size(&mut self, key: usize, size: f32) -> Result<()> {
        self.label_mut(key)?.font_size = size;
        Ok(())
    }

    pub fn set_label_color(&mut self, key: usize, color: Rgba) -> Result<()> {
        self.label_mut(key)?.color = color;
        Ok(())
    }

    pub fn quantize(&self, value: f64) -> i64 {
        let span = f64::from(self.max) - f64::from(self.min);
        let scaled = (value - f64::from(self.min)) / span * (self.height() as f64 - 1.0);
        // NaN and infinities from an empty span saturate instead of panicking.
        scaled.round() as i64
    }

    pub fn update(&mut self, value: f64) {
        let row = self.quantize(value);
        self.samples.push(row as u8);
        let y = row.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;

        if self.redraw {
            self.repaint();
            self.redraw = false;
            self.drawn = true;
        } else if self.drawn {
            shift_left(&mut self.canvas);
            let x = self.width().saturating_sub(1);
            self.draw_columns(x, x, y);
        } else {
            self.draw_columns(0, self.width().saturating_sub(1), y);
            self.drawn = true;
        }
    }

    /// Full repaint from history, oldest sample first. The oldest sample
    /// also fills any columns to its left that have no history yet.
    fn repaint(&mut self) {
        self.last_y = -1;
        let count = self.samples.len();
        let width = self.width();
        for idx in 0..count {
            let Some(y) = self.samples.get(idx) else {
                continue;
            };
            let x = (width + idx).saturating_sub(count);
            let from = if idx == 0 { 0 } else { x };
            self.draw_columns(from, x, i32::from(y));
        }
    }

    fn draw_columns(&mut self, from: usize, to: usize, vay: i32) {
        let height = self.height();
        for x in from..=to {
            let last = self.last_y;
            for y in 0..height as i32 {
                let rising = last != -1 && vay > last && y >= last && y <= vay;
                let falling = last != -1 && vay < last && y >= vay && y <= last;
                let color = if y == vay || rising || falling {
                    self.hl
                } else if vay > y {
                    self.fg
                } else {
                    self.bg
                };
                self.canvas
                    .put_pixel(x as u32, (height - 1 - y as usize) as u32, color.into());
            }
            self.last_y = vay;
        }
    }

    /// Composite labels onto a copy of the graph and encode it. The graph's
    /// own pixels stay untouched for the next incremental shift.
    pub fn encode_png(&mut self) -> Result<Vec<u8>> {
        self.scratch.copy_from_slice(self.canvas.as_raw());
        for label in self.labels.iter().flatten() {
            draw_label(&self.resources, &mut self.scratch, label);
        }
        self.resources.png.encode(&self.scratch)
    }
}

fn draw_label(resources: &Resources, canvas: &mut Canvas, label: &Label) {
    if label.text.is_empty() {
        return;
    }
    let face = match resources.fonts.face(label.font_size) {
        Ok(face) => face,
        Err(err) => {
            log::warn!("draw label: {err}");
            return;
        }
    };
    let mut baseline = label.y - (DEFAULT_FONT_SIZE - face.height()).trunc();
    let center = canvas.width() as f32 / 2.0;
    for line in split_lines(&label.text) {
        let x = center - face.text_width(line) / 2.0;
        face.draw(canvas, x, baseline, line, label.color);
        baseline += LINE_HEIGHT;
    }
}

/// Split on runs of real newlines and literal `\n` escapes.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let sep_len = separator_len(bytes, i);
        if sep_len == 0 {
            i += 1;
            continue;
        }
        lines.push(&text[start..i]);
        i += sep_len;
        loop {
            let more = separator_len(bytes, i);
            if more == 0 {
                break;
            }
            i += more;
        }
        start = i;
    }
    lines.push(&text[start..]);
    lines
}

fn separator_len(bytes: &[u8], i: usize) -> usize {
    match bytes.get(i) {
        Some(b'\n') => 1,
        Some(b'\\') if bytes.get(i + 1) == Some(&b'n') => 2,
        _ => 0,
    }
}
