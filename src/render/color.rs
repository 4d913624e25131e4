use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<Rgba> for image::Rgba<u8> {
    fn from(c: Rgba) -> Self {
        image::Rgba(c.to_array())
    }
}

impl From<image::Rgba<u8>> for Rgba {
    fn from(px: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = px.0;
        Rgba::new(r, g, b, a)
    }
}

/// Parse `#rgb` or `#rrggbb`. The short form widens each nibble by 17.
/// Channels that fail to parse come out as zero; the result is always opaque.
pub fn parse_hex(hex: &str) -> Rgba {
    let digits = hex.strip_prefix('#').unwrap_or("");
    if hex.len() == 4 {
        let mut ch = [0u8; 3];
        for (slot, c) in ch.iter_mut().zip(digits.chars()) {
            match c.to_digit(16) {
                Some(v) => *slot = v as u8 * 17,
                None => break,
            }
        }
        return Rgba::rgb(ch[0], ch[1], ch[2]);
    }
    let mut ch = [0u8; 3];
    for (i, slot) in ch.iter_mut().enumerate() {
        match digits
            .get(i * 2..i * 2 + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        {
            Some(v) => *slot = v,
            None => break,
        }
    }
    Rgba::rgb(ch[0], ch[1], ch[2])
}

/// Memoizes parsed hex colors keyed by their input string.
#[derive(Default)]
pub struct ColorCache {
    parsed: Mutex<HashMap<String, Rgba>>,
}

impl ColorCache {
    pub fn get(&self, hex: &str) -> Rgba {
        let mut parsed = self.parsed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(color) = parsed.get(hex) {
            return *color;
        }
        let color = parse_hex(hex);
        parsed.insert(hex.to_string(), color);
        color
    }

    /// `hex` when non-empty, otherwise `fallback`.
    pub fn get_or(&self, hex: &str, fallback: Rgba) -> Rgba {
        if hex.is_empty() {
            fallback
        } else {
            self.get(hex)
        }
    }

    pub fn len(&self) -> usize {
        self.parsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
