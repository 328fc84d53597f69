use std::time::{Duration, Instant};

use liquidclock::display::{GlyphFont, PixelBuffer};
use liquidclock::{Config, DisplayState, FixedClock, Simulation, Surface};

const W: f32 = 240.0;
const H: f32 = 400.0;

fn simulation_at(now: Instant) -> Simulation {
    let mut sim = Simulation::new(&Config::default(), Box::new(FixedClock("12:34".into())), 7);
    sim.init(Surface::new(W, H, 1.0), GlyphFont::Bitmap, now);
    sim
}

fn mean_x(sim: &Simulation) -> f32 {
    sim.pool().iter().map(|p| p.pos.x).sum::<f32>() / sim.pool().len() as f32
}

#[test]
fn test_clock_is_sampled_once_per_minute_text() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    let count = sim.pool().len();
    assert!(count > 0);

    for i in 1..30 {
        assert!(!sim.refresh_targets(t0 + Duration::from_millis(16 * i)));
    }
    assert_eq!(sim.pool().len(), count);
}

#[test]
fn test_consecutive_results_restart_reveal() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);

    sim.show_result("忙", t0);
    assert_eq!(sim.controller().result_seq(), 1);

    let t1 = t0 + Duration::from_millis(300);
    sim.show_result("频", t1);
    assert_eq!(sim.controller().result_seq(), 2);
    assert_eq!(sim.controller().reveal_start(), Some(t1));
    assert_eq!(sim.controller().result_text(), "频");
    assert_eq!(sim.effective_state(t1), DisplayState::ShowingResult);

    // Particles start on the new glyph, at rest
    assert!(sim
        .pool()
        .iter()
        .all(|p| p.pos == p.target && p.vel.length() == 0.0));
}

#[test]
fn test_result_overrides_nominal_until_hold_expires() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    sim.show_result("OK", t0);
    sim.set_display_state(DisplayState::Thinking);

    sim.update(t0 + Duration::from_millis(1000));
    assert_eq!(sim.effective_state(t0 + Duration::from_millis(1000)), DisplayState::ShowingResult);
    assert!(sim.pool().iter().all(|p| p.size == 2.0));

    let later = t0 + Duration::from_millis(5001);
    sim.update(later);
    assert_eq!(sim.effective_state(later), DisplayState::Thinking);
    assert!(sim.pool().iter().all(|p| p.size == 1.8));
}

#[test]
fn test_hold_expiry_resumes_clock() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    sim.show_result("OK", t0);
    assert!(sim.refresh_targets(t0 + Duration::from_millis(5000)));
    assert_eq!(sim.nominal_state(), DisplayState::Idle);
    assert!(sim.pool().iter().all(|p| p.size == 1.6));
}

#[test]
fn test_reveal_starts_transparent() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    sim.show_result("8", t0);

    let mut frame = PixelBuffer::with_size(W as u32, H as u32);
    sim.render(&mut frame, t0);
    assert!(frame.as_bytes().chunks_exact(4).all(|px| px[1..] == [0, 0, 0]));

    sim.render(&mut frame, t0 + Duration::from_millis(1500));
    assert!(frame.as_bytes().chunks_exact(4).any(|px| px[1..] != [0, 0, 0]));
}

#[test]
fn test_tilt_makes_particles_flow() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    let forcing = sim.forcing();
    let start = mean_x(&sim);

    // Strong right tilt: gravity +x, restore released
    forcing.apply_accelerometer(0.9, 0.0);
    let mut frame = PixelBuffer::with_size(W as u32, H as u32);
    for i in 0..120 {
        sim.tick(t0 + Duration::from_millis(16 * i), &mut frame);
    }
    assert!(mean_x(&sim) > start + 20.0);
}

#[test]
fn test_ring_states_ignore_tilt_restore() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    sim.set_display_state(DisplayState::Listening);
    sim.forcing().set_restore_strength(0.0);

    let mut frame = PixelBuffer::with_size(W as u32, H as u32);
    for i in 0..600 {
        sim.tick(t0 + Duration::from_millis(16 * i), &mut frame);
    }
    // Full spring pulls every particle close to its ring point
    let far = sim
        .pool()
        .iter()
        .filter(|p| (p.pos - p.target).length() > 5.0)
        .count();
    assert!(far < sim.pool().len() / 10);
}

#[test]
fn test_zero_sized_surface_drains_pool() {
    let t0 = Instant::now();
    let mut sim = Simulation::new(&Config::default(), Box::new(FixedClock("12:34".into())), 1);
    sim.init(Surface::new(0.0, 0.0, 1.0), GlyphFont::Bitmap, t0);
    assert!(sim.pool().is_empty());

    sim.show_result("忙", t0);
    assert!(sim.pool().is_empty());

    let mut frame = PixelBuffer::with_size(0, 0);
    sim.tick(t0 + Duration::from_millis(16), &mut frame);
    assert!(sim.pool().is_empty());
}

#[test]
fn test_teardown_then_init_again() {
    let t0 = Instant::now();
    let mut sim = simulation_at(t0);
    sim.set_display_state(DisplayState::Listening);
    sim.teardown();
    assert!(sim.pool().is_empty());

    sim.init(Surface::new(W, H, 2.0), GlyphFont::Bitmap, t0);
    assert_eq!(sim.nominal_state(), DisplayState::Listening);
    assert_eq!(sim.pool().len(), 72);
}
