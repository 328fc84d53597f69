//! Particle physics integrator
//!
//! One step per frame, in a fixed order:
//! gravity -> shake impulse -> ambient jitter -> spring -> wall collision -> friction -> move.
//!
//! The wall-suppression and low-speed absorption rules keep particles that
//! rest against an edge perfectly still. Changing the order or the thresholds
//! brings visible jitter back.

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::particles::Particle;
use crate::util::Rng;

/// Integrator constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Velocity multiplier applied every step
    pub friction: f32,
    /// Spring constant at full restore strength
    pub max_ease: f32,
    /// Gravity to velocity multiplier
    pub gravity_factor: f32,
    /// Shake impulse to velocity multiplier
    pub explosion_factor: f32,
    /// Ambient noise amplitude at full gravity weight
    pub jitter: f32,
    /// Wall hits faster than this bounce, slower ones are absorbed
    pub bounce_threshold: f32,
    /// Velocity kept (and reversed) on a bounce
    pub restitution: f32,
    /// Extra distance beyond the particle size where wall suppression kicks in
    pub wall_margin: f32,
    /// Shake impulse multiplier applied once per tick
    pub shake_decay: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            friction: 0.96,
            max_ease: 0.005,
            gravity_factor: 3.0,
            explosion_factor: 5.0,
            jitter: 0.2,
            bounce_threshold: 5.0,
            restitution: 0.6,
            wall_margin: 2.0,
            shake_decay: 0.9,
        }
    }
}

/// Forcing inputs read once at tick start and shared by every particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forcing {
    pub gravity: Vec2,
    /// 0 = fully fluid, 1 = fully converged
    pub restore: f32,
    pub shake: f32,
}

impl Default for Forcing {
    fn default() -> Self {
        Self {
            gravity: Vec2::zero(),
            restore: 1.0,
            shake: 0.0,
        }
    }
}

impl Forcing {
    /// Gravity contribution fades out as restore strength rises, gone at r >= 2/3
    #[inline]
    pub fn gravity_weight(&self) -> f32 {
        (1.0 - self.restore * 1.5).max(0.0)
    }
}

/// Clamp one axis against `[lo, hi]`.
///
/// Only velocity heading further out is touched: fast hits reflect with
/// restitution, slow contact is absorbed to zero.
#[inline]
pub fn resolve_wall(pos: f32, vel: f32, lo: f32, hi: f32, config: &PhysicsConfig) -> (f32, f32) {
    let absorb = |v: f32| {
        if v.abs() > config.bounce_threshold {
            v * -config.restitution
        } else {
            0.0
        }
    };

    if pos < lo {
        (lo, if vel < 0.0 { absorb(vel) } else { vel })
    } else if pos > hi {
        (hi, if vel > 0.0 { absorb(vel) } else { vel })
    } else {
        (pos, vel)
    }
}

impl Particle {
    /// Advance this particle by one frame inside a `width` x `height` frame
    pub fn step(
        &mut self,
        forcing: &Forcing,
        width: f32,
        height: f32,
        config: &PhysicsConfig,
        rng: &mut Rng,
    ) {
        let gravity_weight = forcing.gravity_weight();
        let size = self.size;

        // Resting against a wall that gravity pushes into: no push, no noise
        let stable = size + config.wall_margin;
        let mut gravity = forcing.gravity;
        let mut quiet_x = false;
        let mut quiet_y = false;

        if (self.pos.x <= stable && gravity.x < 0.0)
            || (self.pos.x >= width - stable && gravity.x > 0.0)
        {
            gravity.x = 0.0;
            quiet_x = true;
        }
        if (self.pos.y <= stable && gravity.y < 0.0)
            || (self.pos.y >= height - stable && gravity.y > 0.0)
        {
            gravity.y = 0.0;
            quiet_y = true;
        }

        self.vel += gravity * (config.gravity_factor * gravity_weight);

        if forcing.shake > 0.1 {
            let kick = forcing.shake * config.explosion_factor;
            self.vel.x += rng.centered() * kick;
            self.vel.y += rng.centered() * kick;
        }

        if !quiet_x {
            self.vel.x += rng.centered() * config.jitter * gravity_weight;
        }
        if !quiet_y {
            self.vel.y += rng.centered() * config.jitter * gravity_weight;
        }

        if forcing.restore > 0.01 {
            let ease = config.max_ease * forcing.restore;
            self.vel += (self.target - self.pos) * ease;
        }

        // Walls only hold while fluid; converging particles may cross them
        if forcing.restore < 0.5 {
            let (x, vx) = resolve_wall(self.pos.x, self.vel.x, size, width - size, config);
            let (y, vy) = resolve_wall(self.pos.y, self.vel.y, size, height - size, config);
            self.pos = Vec2::new(x, y);
            self.vel = Vec2::new(vx, vy);
        }

        self.vel *= config.friction;
        self.pos += self.vel;
    }
}
