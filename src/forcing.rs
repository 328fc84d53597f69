//! Shared forcing state
//!
//! Written from sensor/control threads, read by the frame loop as one
//! snapshot at tick start. Writes are last-writer-wins under a mutex.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::math::Vec2;
use crate::physics::Forcing;

/// Below this tilt the device counts as flat (full restore)
pub const FLAT_TILT: f32 = 0.3;
/// Above this tilt the particles are fully fluid
pub const TILTED_TILT: f32 = 0.6;

const GRAVITY_GAIN: f32 = 2.0;
const SHAKE_GAIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, Default)]
struct ForcingRecord {
    forcing: Forcing,
    /// Previous accelerometer sample; starts at rest
    last_accel: (f32, f32),
}

/// Handle to the forcing record; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct SharedForcing {
    inner: Arc<Mutex<ForcingRecord>>,
}

/// Restore strength for a tilt magnitude: 1 when flat, 0 when tilted,
/// linear in between
pub fn restore_for_tilt(tilt: f32) -> f32 {
    if tilt < FLAT_TILT {
        1.0
    } else if tilt > TILTED_TILT {
        0.0
    } else {
        (TILTED_TILT - tilt) / (TILTED_TILT - FLAT_TILT)
    }
}

impl SharedForcing {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ForcingRecord> {
        // A panicked writer leaves plain floats behind; keep using them
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_gravity(&self, gx: f32, gy: f32) {
        if gx.is_finite() && gy.is_finite() {
            self.lock().forcing.gravity = Vec2::new(gx, gy);
        }
    }

    /// Clamped to [0, 1]; NaN is ignored
    pub fn set_restore_strength(&self, restore: f32) {
        if !restore.is_nan() {
            self.lock().forcing.restore = restore.clamp(0.0, 1.0);
        }
    }

    /// Raise the shake impulse to `delta` if larger; never lowers it
    pub fn add_shake_impulse(&self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            let mut record = self.lock();
            record.forcing.shake = record.forcing.shake.max(delta);
        }
    }

    /// Feed one accelerometer sample (in g): derives gravity, restore
    /// strength and a shake impulse from the change since the last sample
    pub fn apply_accelerometer(&self, ax: f32, ay: f32) {
        if !(ax.is_finite() && ay.is_finite()) {
            return;
        }
        let mut record = self.lock();
        let (last_x, last_y) = record.last_accel;
        let impulse = ((ax - last_x).abs() + (ay - last_y).abs()) * SHAKE_GAIN;
        if impulse > record.forcing.shake {
            record.forcing.shake = impulse;
        }
        record.forcing.gravity = Vec2::new(ax * GRAVITY_GAIN, -ay * GRAVITY_GAIN);
        record.forcing.restore = restore_for_tilt(ax.abs().max(ay.abs()));
        record.last_accel = (ax, ay);
    }

    /// Copy of the current forcing values
    pub fn snapshot(&self) -> Forcing {
        self.lock().forcing
    }

    /// Multiply the shake impulse by `factor`; called once per tick
    pub fn decay_shake(&self, factor: f32) {
        self.lock().forcing.shake *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_restore_for_tilt() {
        assert_eq!(restore_for_tilt(0.0), 1.0);
        assert_eq!(restore_for_tilt(0.29), 1.0);
        assert!((restore_for_tilt(0.45) - 0.5).abs() < 1e-5);
        assert_eq!(restore_for_tilt(0.61), 0.0);
    }

    #[test]
    fn test_restore_is_clamped() {
        let f = SharedForcing::new();
        f.set_restore_strength(3.0);
        assert_eq!(f.snapshot().restore, 1.0);
        f.set_restore_strength(-1.0);
        assert_eq!(f.snapshot().restore, 0.0);
        f.set_restore_strength(f32::NAN);
        assert_eq!(f.snapshot().restore, 0.0);
    }

    #[test]
    fn test_shake_only_increases() {
        let f = SharedForcing::new();
        f.add_shake_impulse(3.0);
        f.add_shake_impulse(1.0);
        assert_eq!(f.snapshot().shake, 3.0);
        f.add_shake_impulse(-5.0);
        assert_eq!(f.snapshot().shake, 3.0);
        f.decay_shake(0.9);
        assert!((f.snapshot().shake - 2.7).abs() < 1e-6);
    }

    #[test]
    fn test_accelerometer_mapping() {
        let f = SharedForcing::new();
        f.apply_accelerometer(0.1, 0.1);
        let s = f.snapshot();
        assert!((s.shake - 0.4).abs() < 1e-6);
        assert_eq!(s.restore, 1.0);
        assert!(s.gravity.approx_eq(&Vec2::new(0.2, -0.2), 1e-6));

        f.apply_accelerometer(0.8, -0.1);
        let s = f.snapshot();
        assert!((s.shake - (0.7 + 0.2) * 2.0).abs() < 1e-5);
        assert_eq!(s.restore, 0.0);
        assert!(s.gravity.approx_eq(&Vec2::new(1.6, 0.2), 1e-6));
    }

    #[test]
    fn test_first_accelerometer_sample_is_measured_from_rest() {
        let f = SharedForcing::new();
        f.apply_accelerometer(0.8, 0.0);
        assert!((f.snapshot().shake - 1.6).abs() < 1e-6);

        // Same reading again: no new impulse, the old one only decays
        f.decay_shake(0.5);
        f.apply_accelerometer(0.8, 0.0);
        assert!((f.snapshot().shake - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_writes_from_other_threads_are_visible() {
        let f = SharedForcing::new();
        let writer = f.clone();
        thread::spawn(move || {
            writer.set_gravity(1.0, -1.0);
            writer.add_shake_impulse(2.0);
        })
        .join()
        .unwrap();
        let s = f.snapshot();
        assert_eq!(s.gravity, Vec2::new(1.0, -1.0));
        assert_eq!(s.shake, 2.0);
        assert_eq!(s.restore, Forcing::default().restore);
    }
}
