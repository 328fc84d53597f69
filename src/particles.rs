//! Particle pool
//!
//! Particles are interchangeable: the pool grows or shrinks to match the
//! current target set and hands out targets by index.

use crate::display::PixelBuffer;
use crate::math::Vec2;
use crate::state::DisplayState;
use crate::util::Rng;

const IDLE_SIZE: f32 = 1.6;

/// A single particle
#[derive(Debug, Clone)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub target: Vec2,
    pub color: (u8, u8, u8),
    pub size: f32,
}

impl Particle {
    /// Spawn at rest, with its target on the spawn point
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::zero(),
            target: pos,
            color: DisplayState::Idle.particle_style().0,
            size: IDLE_SIZE,
        }
    }
}

impl DisplayState {
    /// Particle color and radius for this state; active states draw larger and brighter
    pub fn particle_style(self) -> ((u8, u8, u8), f32) {
        match self {
            DisplayState::Idle => ((230, 230, 230), IDLE_SIZE),
            DisplayState::Listening => ((255, 255, 255), 1.8),
            DisplayState::Thinking => ((255, 255, 255), 1.8),
            DisplayState::ShowingResult => ((255, 255, 255), 2.0),
        }
    }
}

/// The live particle collection
#[derive(Debug, Default)]
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    pub fn new() -> Self {
        Self {
            particles: Vec::with_capacity(1000),
        }
    }

    /// Match the pool to `targets` and restyle every particle for `state`.
    ///
    /// New particles spawn uniformly inside `width` x `height`; surplus ones
    /// are truncated from the end.
    pub fn reconcile(
        &mut self,
        targets: &[Vec2],
        state: DisplayState,
        width: f32,
        height: f32,
        rng: &mut Rng,
    ) {
        let wanted = targets.len();
        if self.particles.len() < wanted {
            let missing = wanted - self.particles.len();
            self.particles.extend((0..missing).map(|_| {
                let x = rng.range_f32(0.0, width);
                let y = rng.range_f32(0.0, height);
                Particle::new(Vec2::new(x, y))
            }));
        } else {
            self.particles.truncate(wanted);
        }

        let (color, size) = state.particle_style();
        for (p, &target) in self.particles.iter_mut().zip(targets) {
            p.target = target;
            p.color = color;
            p.size = size;
        }
    }

    /// Teleport every particle onto its target and stop it
    pub fn snap_to_targets(&mut self) {
        for p in &mut self.particles {
            p.pos = p.target;
            p.vel = Vec2::zero();
        }
    }

    /// Draw every particle as an additive disc.
    ///
    /// `scale` maps logical coordinates to buffer pixels; `alpha` (0..1)
    /// scales the contribution of each disc.
    pub fn render_additive(&self, buffer: &mut PixelBuffer, scale: f32, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        for p in &self.particles {
            let (r, g, b) = p.color;
            buffer.fill_disc_additive(
                p.pos.x * scale,
                p.pos.y * scale,
                p.size * scale,
                (r as f32 * alpha) as u8,
                (g as f32 * alpha) as u8,
                (b as f32 * alpha) as u8,
            );
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    /// Get particle count
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Clear all particles
    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
