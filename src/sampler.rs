//! Target sampling
//!
//! Turns what should be displayed into a set of target points:
//! - glyphs: rasterize text on an off-screen surface and keep grid points that
//!   landed on near-white opaque pixels
//! - rings: two concentric circles around the surface center

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::display::{GlyphFont, PixelBuffer};
use crate::math::Vec2;

const RING_COUNT: usize = 2;

/// Sampling constants. Lengths are logical pixels unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Grid stride for clock glyphs
    pub spacing: f32,
    /// Finer grid stride for result glyphs
    pub result_spacing: f32,
    /// Alpha must exceed this to become a target
    pub alpha_threshold: u8,
    /// Each of R, G, B must exceed this to become a target
    pub brightness_threshold: u8,
    /// Clock font size as a fraction of surface width
    pub clock_font_scale: f32,
    /// Result font size as a fraction of surface width
    pub result_font_scale: f32,
    /// Arc length between ring points
    pub ring_spacing: f32,
    /// Lower bound of points per ring
    pub ring_min_points: usize,
    /// Inner ring radius as a fraction of the smaller surface dimension
    pub ring_base_radius: f32,
    /// Distance between rings as a fraction of the smaller surface dimension
    pub ring_gap: f32,
    /// Extra angular speed per ring index while thinking
    pub ring_outer_speedup: f32,
    /// Thinking ring rotation per tick (radians)
    pub ring_rotation_step: f32,
    /// Optional TrueType font for glyphs outside the built-in bitmap font
    pub font_path: Option<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            spacing: 4.0,
            result_spacing: 3.0,
            alpha_threshold: 128,
            brightness_threshold: 200,
            clock_font_scale: 0.25,
            result_font_scale: 0.4,
            ring_spacing: 7.0,
            ring_min_points: 36,
            ring_base_radius: 0.12,
            ring_gap: 0.022,
            ring_outer_speedup: 0.15,
            ring_rotation_step: 0.08,
            font_path: None,
        }
    }
}

/// Owns the off-screen surface glyphs are rasterized onto
#[derive(Debug)]
pub struct TargetSampler {
    config: SamplingConfig,
    font: GlyphFont,
    surface: PixelBuffer,
    width: f32,
    height: f32,
    pixel_ratio: f32,
}

impl TargetSampler {
    /// Sampler for a `width` x `height` logical surface at `pixel_ratio`
    /// physical pixels per logical pixel
    pub fn new(
        width: f32,
        height: f32,
        pixel_ratio: f32,
        font: GlyphFont,
        config: SamplingConfig,
    ) -> Self {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let width = width.max(0.0);
        let height = height.max(0.0);
        let surface = PixelBuffer::with_size(
            (width * pixel_ratio).round() as u32,
            (height * pixel_ratio).round() as u32,
        );
        Self {
            config,
            font,
            surface,
            width,
            height,
            pixel_ratio,
        }
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    /// Rasterize `text` centered on the surface and sample it.
    ///
    /// `dense` uses the finer result stride and the larger result font. An
    /// empty surface or empty text yields no targets.
    pub fn sample_glyphs(&mut self, text: &str, dense: bool) -> Vec<Vec2> {
        if self.surface.is_empty() {
            return Vec::new();
        }

        let (spacing, font_scale) = if dense {
            (self.config.result_spacing, self.config.result_font_scale)
        } else {
            (self.config.spacing, self.config.clock_font_scale)
        };

        self.surface.clear_rgba(0, 0, 0, 0);
        let font_px = (self.surface.width() as f32 * font_scale).floor();
        self.font.draw_centered(&mut self.surface, text, font_px);

        let stride = (spacing * self.pixel_ratio).round().max(1.0) as usize;
        let alpha_min = self.config.alpha_threshold;
        let bright_min = self.config.brightness_threshold;
        let mut targets = Vec::new();

        for y in (0..self.surface.height() as i32).step_by(stride) {
            for x in (0..self.surface.width() as i32).step_by(stride) {
                let Some((r, g, b, a)) = self.surface.get_pixel_rgba(x, y) else {
                    continue;
                };
                if a > alpha_min && r > bright_min && g > bright_min && b > bright_min {
                    targets.push(Vec2::new(
                        x as f32 / self.pixel_ratio,
                        y as f32 / self.pixel_ratio,
                    ));
                }
            }
        }
        targets
    }

    /// Points on two concentric rings; `rotation` offsets every angle, and
    /// outer rings turn faster
    pub fn ring_targets(&self, rotation: f32) -> Vec<Vec2> {
        ring_points(self.width, self.height, rotation, &self.config)
    }
}

/// Number of points on a ring of `radius`
pub fn ring_point_count(radius: f32, config: &SamplingConfig) -> usize {
    let by_arc = if config.ring_spacing > 0.0 {
        (TAU * radius / config.ring_spacing).floor().max(0.0) as usize
    } else {
        0
    };
    by_arc.max(config.ring_min_points)
}

/// Double ring centered on a `width` x `height` surface
pub fn ring_points(width: f32, height: f32, rotation: f32, config: &SamplingConfig) -> Vec<Vec2> {
    let center = Vec2::new(width / 2.0, height / 2.0);
    let min_dim = width.min(height).max(0.0);
    let base_radius = min_dim * config.ring_base_radius;
    let gap = min_dim * config.ring_gap;

    let mut targets = Vec::new();
    for ring in 0..RING_COUNT {
        let radius = base_radius + ring as f32 * gap;
        let count = ring_point_count(radius, config);
        let offset = rotation * (1.0 + ring as f32 * config.ring_outer_speedup);
        targets.extend((0..count).map(|i| {
            let theta = i as f32 / count as f32 * TAU + offset;
            center + Vec2::new(theta.cos(), theta.sin()) * radius
        }));
    }
    targets
}
