//! Simulation context and frame loop
//!
//! `Simulation` owns everything a frame needs: the particle pool, the target
//! sampler, the display state machine and a handle to the shared forcing
//! record. The host calls `init` once the surface size is known, `tick` once
//! per display refresh, and `teardown` when the surface goes away.

use std::time::Instant;

use crate::config::Config;
use crate::display::{GlyphFont, PixelBuffer};
use crate::forcing::SharedForcing;
use crate::particles::ParticlePool;
use crate::physics::{Forcing, PhysicsConfig};
use crate::sampler::{SamplingConfig, TargetSampler};
use crate::state::{DisplayState, SamplePlan, StateController};
use crate::util::Rng;

const BACKGROUND: (u8, u8, u8) = (0, 0, 0);

/// Source of the clock text drawn while idle
pub trait ClockSource: Send {
    /// Current time of day as `HH:MM`
    fn clock_text(&self) -> String;
}

/// Local wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl ClockSource for LocalClock {
    fn clock_text(&self) -> String {
        chrono::Local::now().format("%H:%M").to_string()
    }
}

/// A clock that always reads the same text
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl ClockSource for FixedClock {
    fn clock_text(&self) -> String {
        self.0.clone()
    }
}

/// Surface the simulation runs on, in logical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl Surface {
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }
}

/// The simulation context
pub struct Simulation {
    physics: PhysicsConfig,
    sampling: SamplingConfig,
    forcing: SharedForcing,
    controller: StateController,
    pool: ParticlePool,
    sampler: Option<TargetSampler>,
    surface: Option<Surface>,
    clock: Box<dyn ClockSource>,
    rng: Rng,
}

impl Simulation {
    pub fn new(config: &Config, clock: Box<dyn ClockSource>, seed: u64) -> Self {
        Self {
            physics: config.physics,
            sampling: config.sampling.clone(),
            forcing: SharedForcing::new(),
            controller: StateController::new(config.timing),
            pool: ParticlePool::new(),
            sampler: None,
            surface: None,
            clock,
            rng: Rng::new(seed),
        }
    }

    /// Attach to a surface and generate the first target set
    pub fn init(&mut self, surface: Surface, font: GlyphFont, now: Instant) {
        log::info!(
            "Simulation init: {}x{} @{}x, font {:?}",
            surface.width,
            surface.height,
            surface.pixel_ratio,
            font
        );
        let sampler = TargetSampler::new(
            surface.width,
            surface.height,
            surface.pixel_ratio,
            font,
            self.sampling.clone(),
        );
        self.surface = Some(Surface {
            pixel_ratio: sampler.pixel_ratio(),
            ..surface
        });
        self.sampler = Some(sampler);
        self.controller.invalidate();
        self.refresh_targets(now);
    }

    /// Detach from the surface; particles are dropped, state is kept
    pub fn teardown(&mut self) {
        if self.sampler.take().is_some() {
            log::info!("Simulation teardown ({} particles dropped)", self.pool.len());
        }
        self.surface = None;
        self.pool.clear();
        self.controller.invalidate();
    }

    pub fn is_initialized(&self) -> bool {
        self.sampler.is_some()
    }

    /// Handle for sensor/control threads
    pub fn forcing(&self) -> SharedForcing {
        self.forcing.clone()
    }

    pub fn set_gravity(&self, gx: f32, gy: f32) {
        self.forcing.set_gravity(gx, gy);
    }

    pub fn set_restore_strength(&self, restore: f32) {
        self.forcing.set_restore_strength(restore);
    }

    pub fn add_shake_impulse(&self, delta: f32) {
        self.forcing.add_shake_impulse(delta);
    }

    pub fn set_display_state(&mut self, state: DisplayState) {
        self.controller.set_nominal(state);
    }

    /// Show `text` as the result: restarts the hold and reveal timers and
    /// places every particle directly on the new glyphs
    pub fn show_result(&mut self, text: &str, now: Instant) {
        log::info!("Showing result {:?}", text);
        self.controller.show_result(text, now);
        if self.is_initialized() {
            self.refresh_targets(now);
            self.pool.snap_to_targets();
        }
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn controller(&self) -> &StateController {
        &self.controller
    }

    pub fn nominal_state(&self) -> DisplayState {
        self.controller.nominal()
    }

    pub fn effective_state(&self, now: Instant) -> DisplayState {
        self.controller.effective(now)
    }

    /// Regenerate targets if the effective state or its content changed.
    /// Returns true when a new target set was applied.
    pub fn refresh_targets(&mut self, now: Instant) -> bool {
        let state = self.controller.resolve(now);
        let (Some(sampler), Some(surface)) = (self.sampler.as_mut(), self.surface) else {
            return false;
        };

        let clock_text = match state {
            DisplayState::Idle => self.clock.clock_text(),
            DisplayState::Listening | DisplayState::Thinking | DisplayState::ShowingResult => {
                String::new()
            }
        };
        let plan = self.controller.plan(state, &clock_text);
        let targets = match &plan {
            SamplePlan::Keep => return false,
            SamplePlan::Glyphs { text, dense } => sampler.sample_glyphs(text, *dense),
            SamplePlan::Ring { rotation } => sampler.ring_targets(*rotation),
        };

        log::debug!("Resampled {} targets for {}", targets.len(), state);
        self.pool
            .reconcile(&targets, state, surface.width, surface.height, &mut self.rng);
        self.controller.mark_sampled(state, &plan);
        true
    }

    /// Restore strength the integrator sees: only idle follows the sensor
    fn effective_forcing(snapshot: Forcing, state: DisplayState) -> Forcing {
        match state {
            DisplayState::Idle => snapshot,
            DisplayState::Listening | DisplayState::Thinking | DisplayState::ShowingResult => {
                Forcing {
                    restore: 1.0,
                    ..snapshot
                }
            }
        }
    }

    /// Advance one frame: state, targets, physics, impulse decay
    pub fn update(&mut self, now: Instant) {
        let forcing = self.forcing.snapshot();

        if self.controller.effective(now) == DisplayState::Thinking {
            self.controller.advance_rotation(self.sampling.ring_rotation_step);
        }
        self.refresh_targets(now);

        if let Some(surface) = self.surface {
            let state = self.controller.effective(now);
            let forcing = Self::effective_forcing(forcing, state);
            for p in self.pool.iter_mut() {
                p.step(&forcing, surface.width, surface.height, &self.physics, &mut self.rng);
            }
        }

        self.forcing.decay_shake(self.physics.shake_decay);
    }

    /// Draw the current frame: opaque clear, then additive particles faded
    /// in while a result is being revealed
    pub fn render(&self, frame: &mut PixelBuffer, now: Instant) {
        let (r, g, b) = BACKGROUND;
        frame.clear(r, g, b);

        let Some(surface) = self.surface else {
            return;
        };
        let state = self.controller.effective(now);
        let alpha = self.controller.reveal_alpha(state, now);
        let scale = if surface.width > 0.0 {
            frame.width() as f32 / surface.width
        } else {
            surface.pixel_ratio
        };
        self.pool.render_additive(frame, scale, alpha);
    }

    /// One animation tick
    pub fn tick(&mut self, now: Instant, frame: &mut PixelBuffer) {
        self.update(now);
        self.render(frame, now);
    }
}
