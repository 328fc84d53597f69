mod font;
mod pixel_buffer;

pub use font::{draw_text, get_glyph, GlyphFont, GLYPH_HEIGHT, GLYPH_WIDTH};
pub use pixel_buffer::PixelBuffer;

pub const DEFAULT_WIDTH: u32 = 390;
pub const DEFAULT_HEIGHT: u32 = 844;
