//! Glyph rasterization
//!
//! Two faces: the built-in 8x8 bitmap font (always available, scaled with
//! nearest-neighbour sampling) and an optional TrueType face loaded at startup
//! for scripts the bitmap font does not cover.

use std::fmt;
use std::path::Path;

use font8x8::{
    UnicodeFonts, BASIC_FONTS, BLOCK_FONTS, BOX_FONTS, GREEK_FONTS, HIRAGANA_FONTS, LATIN_FONTS,
    MISC_FONTS, SGA_FONTS,
};
use rusttype::{point, Font, Scale};

use super::PixelBuffer;
use crate::error::{Error, Result};

pub const GLYPH_WIDTH: u32 = 8;
pub const GLYPH_HEIGHT: u32 = 8;

/// Rasterized text never spans more than this share of the surface width
const MAX_TEXT_WIDTH: f32 = 0.9;

/// Look up a bitmap glyph; unknown characters render as '?'
pub fn get_glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| GREEK_FONTS.get(c))
        .or_else(|| HIRAGANA_FONTS.get(c))
        .or_else(|| BOX_FONTS.get(c))
        .or_else(|| BLOCK_FONTS.get(c))
        .or_else(|| MISC_FONTS.get(c))
        .or_else(|| SGA_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

#[inline]
fn glyph_bit(rows: &[u8; 8], col: u32, row: u32) -> bool {
    // Bit 0 is the leftmost pixel
    rows[row as usize] & (1 << col) != 0
}

/// Draw 1x bitmap text with its top-left corner at (x, y)
pub fn draw_text(buffer: &mut PixelBuffer, x: i32, y: i32, text: &str, r: u8, g: u8, b: u8) {
    for (i, c) in text.chars().enumerate() {
        let rows = get_glyph(c);
        let ox = x + (i as u32 * GLYPH_WIDTH) as i32;
        for row in 0..GLYPH_HEIGHT {
            for col in 0..GLYPH_WIDTH {
                if glyph_bit(&rows, col, row) {
                    buffer.set_pixel(ox + col as i32, y + row as i32, r, g, b);
                }
            }
        }
    }
}

/// Face used to rasterize sampled text
#[derive(Default)]
pub enum GlyphFont {
    /// font8x8, scaled up
    #[default]
    Bitmap,
    /// TrueType/OpenType face loaded from disk
    TrueType(Font<'static>),
}

impl fmt::Debug for GlyphFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphFont::Bitmap => f.write_str("GlyphFont::Bitmap"),
            GlyphFont::TrueType(_) => f.write_str("GlyphFont::TrueType"),
        }
    }
}

impl GlyphFont {
    /// Load a TrueType face from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Font::try_from_vec(bytes)
            .map(GlyphFont::TrueType)
            .ok_or_else(|| Error::Font(format!("{} is not a usable font", path.display())))
    }

    /// Load `path` if given, falling back to the bitmap font on failure
    pub fn load_or_bitmap(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load(path) {
                Ok(font) => {
                    log::info!("Loaded font {}", path.display());
                    font
                }
                Err(e) => {
                    log::warn!("{}; using built-in bitmap font", e);
                    GlyphFont::Bitmap
                }
            }
            None => GlyphFont::Bitmap,
        }
    }

    /// Rasterize `text` in opaque white, centered on the surface.
    ///
    /// `px` is the em height in surface pixels. Coverage goes to the alpha
    /// channel; the surface is expected to be cleared to transparent first.
    pub fn draw_centered(&self, surface: &mut PixelBuffer, text: &str, px: f32) {
        if text.is_empty() || px <= 0.0 || surface.is_empty() {
            return;
        }
        match self {
            GlyphFont::Bitmap => draw_bitmap_centered(surface, text, px),
            GlyphFont::TrueType(font) => draw_truetype_centered(surface, font, text, px),
        }
    }
}

fn draw_bitmap_centered(surface: &mut PixelBuffer, text: &str, px: f32) {
    let count = text.chars().count() as f32;
    let max_width = surface.width() as f32 * MAX_TEXT_WIDTH;
    let mut scale = px / GLYPH_HEIGHT as f32;
    if count * GLYPH_WIDTH as f32 * scale > max_width {
        scale = max_width / (count * GLYPH_WIDTH as f32);
    }
    if scale <= 0.0 {
        return;
    }

    let cell = GLYPH_WIDTH as f32 * scale;
    let total_width = cell * count;
    let left = (surface.width() as f32 - total_width) / 2.0;
    let top = (surface.height() as f32 - GLYPH_HEIGHT as f32 * scale) / 2.0;
    let cell_px = cell.ceil() as i32;
    let height_px = (GLYPH_HEIGHT as f32 * scale).ceil() as i32;

    for (i, c) in text.chars().enumerate() {
        let rows = get_glyph(c);
        let ox = left + i as f32 * cell;
        let x0 = ox.floor() as i32;
        let y0 = top.floor() as i32;
        for dy in 0..height_px {
            let row = ((dy as f32 + 0.5) / scale) as u32;
            if row >= GLYPH_HEIGHT {
                continue;
            }
            for dx in 0..cell_px {
                let col = ((dx as f32 + 0.5) / scale) as u32;
                if col < GLYPH_WIDTH && glyph_bit(&rows, col, row) {
                    surface.set_pixel_rgba(x0 + dx, y0 + dy, 255, 255, 255, 255);
                }
            }
        }
    }
}

fn draw_truetype_centered(surface: &mut PixelBuffer, font: &Font<'static>, text: &str, px: f32) {
    let measure = |size: f32| {
        let scale = Scale::uniform(size);
        let width = font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map_or(0.0, |g| g.position().x + g.unpositioned().h_metrics().advance_width);
        (scale, width)
    };

    let max_width = surface.width() as f32 * MAX_TEXT_WIDTH;
    let (mut scale, mut width) = measure(px);
    if width > max_width && width > 0.0 {
        (scale, width) = measure(px * max_width / width);
    }

    let v_metrics = font.v_metrics(scale);
    let text_height = v_metrics.ascent - v_metrics.descent;
    let start_x = (surface.width() as f32 - width) / 2.0;
    let baseline = (surface.height() as f32 - text_height) / 2.0 + v_metrics.ascent;

    for glyph in font.layout(text, scale, point(start_x, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = bb.min.x + gx as i32;
            let y = bb.min.y + gy as i32;
            let alpha = (coverage.clamp(0.0, 1.0) * 255.0) as u8;
            // Neighbouring glyph boxes may overlap; keep the stronger coverage
            let existing = surface.get_pixel_rgba(x, y).map_or(0, |(_, _, _, a)| a);
            if alpha > existing {
                surface.set_pixel_rgba(x, y, 255, 255, 255, alpha);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(surface: &PixelBuffer) -> Vec<(i32, i32)> {
        let mut lit = Vec::new();
        for y in 0..surface.height() as i32 {
            for x in 0..surface.width() as i32 {
                if let Some((_, _, _, a)) = surface.get_pixel_rgba(x, y) {
                    if a > 0 {
                        lit.push((x, y));
                    }
                }
            }
        }
        lit
    }

    #[test]
    fn test_digits_have_glyphs() {
        for c in "0123456789:".chars() {
            assert_ne!(get_glyph(c), [0; 8], "missing glyph for {c:?}");
        }
    }

    #[test]
    fn test_unknown_char_falls_back() {
        assert_eq!(get_glyph('\u{10FFFF}'), get_glyph('?'));
    }

    #[test]
    fn test_bitmap_text_is_centered() {
        let mut surface = PixelBuffer::with_size(200, 100);
        surface.clear_rgba(0, 0, 0, 0);
        GlyphFont::Bitmap.draw_centered(&mut surface, "88", 40.0);

        let lit = lit_pixels(&surface);
        assert!(!lit.is_empty());
        let min_x = lit.iter().map(|p| p.0).min().unwrap();
        let max_x = lit.iter().map(|p| p.0).max().unwrap();
        let mid = (min_x + max_x) as f32 / 2.0;
        assert!((mid - 100.0).abs() < 8.0, "text centered at {mid}");
    }

    #[test]
    fn test_bitmap_text_fits_width() {
        let mut surface = PixelBuffer::with_size(100, 100);
        surface.clear_rgba(0, 0, 0, 0);
        GlyphFont::Bitmap.draw_centered(&mut surface, "12:34", 200.0);
        let lit = lit_pixels(&surface);
        assert!(lit.iter().all(|&(x, _)| x >= 4 && x < 96));
    }

    #[test]
    fn test_empty_text_draws_nothing() {
        let mut surface = PixelBuffer::with_size(50, 50);
        surface.clear_rgba(0, 0, 0, 0);
        GlyphFont::Bitmap.draw_centered(&mut surface, "", 20.0);
        assert!(lit_pixels(&surface).is_empty());
    }

    #[test]
    fn test_missing_font_file_falls_back() {
        let font = GlyphFont::load_or_bitmap(Some(Path::new("/nonexistent/font.ttf")));
        assert!(matches!(font, GlyphFont::Bitmap));
        assert!(GlyphFont::load("/nonexistent/font.ttf").is_err());
    }

    #[test]
    fn test_draw_text_1x() {
        let mut buffer = PixelBuffer::with_size(16, 8);
        buffer.clear(0, 0, 0);
        draw_text(&mut buffer, 0, 0, "||", 255, 0, 0);
        assert!((0..16).any(|x| buffer.get_pixel(x, 3) == Some((255, 0, 0))));
    }
}
