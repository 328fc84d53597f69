//! Display state controller
//!
//! Resolves the effective state each frame (a shown result overrides the
//! nominal state until its hold expires) and decides whether the target set
//! needs to be regenerated.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::util::smoothstep;

/// Ring rotation wraps here; the outer ring (1.15x) also completes whole turns
const RING_ROTATION_PERIOD: f32 = TAU * 20.0;

/// What the particles are currently drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayState {
    /// Clock digits
    Idle,
    /// Static double ring
    Listening,
    /// Spinning double ring
    Thinking,
    /// Result glyphs
    ShowingResult,
}

impl DisplayState {
    pub const ALL: [DisplayState; 4] = [
        DisplayState::Idle,
        DisplayState::Listening,
        DisplayState::Thinking,
        DisplayState::ShowingResult,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayState::Idle => "idle",
            DisplayState::Listening => "listening",
            DisplayState::Thinking => "thinking",
            DisplayState::ShowingResult => "showing-result",
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(DisplayState::Idle),
            "listening" => Ok(DisplayState::Listening),
            "thinking" => Ok(DisplayState::Thinking),
            "showing-result" | "showing_result" | "showingresult" | "result" => {
                Ok(DisplayState::ShowingResult)
            }
            _ => Err(Error::UnknownDisplayState(s.to_string())),
        }
    }
}

/// Result hold and reveal timings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a shown result overrides the nominal state
    pub result_hold_ms: u64,
    /// Fade-in duration of a shown result
    pub reveal_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            result_hold_ms: 5000,
            reveal_ms: 1200,
        }
    }
}

/// Which target generator to run this frame
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePlan {
    /// Targets are still current
    Keep,
    /// Rasterize and sample text; `dense` selects the finer result stride
    Glyphs { text: String, dense: bool },
    /// Procedural double ring rotated by `rotation` radians
    Ring { rotation: f32 },
}

/// Display state machine
#[derive(Debug, Clone)]
pub struct StateController {
    timing: TimingConfig,
    nominal: DisplayState,
    hold_until: Option<Instant>,
    reveal_start: Option<Instant>,
    result_text: String,
    result_seq: u64,
    /// Result sequence the current targets were sampled from
    rendered_seq: Option<u64>,
    /// State the current targets were generated for
    sampled_state: Option<DisplayState>,
    sampled_clock: String,
    sampled_rotation: f32,
    ring_rotation: f32,
}

impl StateController {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            nominal: DisplayState::Idle,
            hold_until: None,
            reveal_start: None,
            result_text: String::new(),
            result_seq: 0,
            rendered_seq: None,
            sampled_state: None,
            sampled_clock: String::new(),
            sampled_rotation: 0.0,
            ring_rotation: 0.0,
        }
    }

    pub fn nominal(&self) -> DisplayState {
        self.nominal
    }

    pub fn set_nominal(&mut self, state: DisplayState) {
        if state != self.nominal {
            log::debug!("Display state {} -> {}", self.nominal, state);
        }
        self.nominal = state;
    }

    /// Show `text` as the result: bumps the sequence, restarts hold and reveal
    pub fn show_result(&mut self, text: &str, now: Instant) {
        self.result_seq += 1;
        self.result_text = text.to_string();
        self.hold_until = Some(now + Duration::from_millis(self.timing.result_hold_ms));
        self.reveal_start = Some(now);
        self.nominal = DisplayState::ShowingResult;
    }

    pub fn result_text(&self) -> &str {
        &self.result_text
    }

    pub fn result_seq(&self) -> u64 {
        self.result_seq
    }

    pub fn reveal_start(&self) -> Option<Instant> {
        self.reveal_start
    }

    pub fn ring_rotation(&self) -> f32 {
        self.ring_rotation
    }

    /// Effective state at `now`. Expires the result hold: once it has passed,
    /// a nominal showing-result reverts to idle.
    pub fn resolve(&mut self, now: Instant) -> DisplayState {
        match self.hold_until {
            Some(until) if now < until => DisplayState::ShowingResult,
            Some(_) => {
                self.hold_until = None;
                if self.nominal == DisplayState::ShowingResult {
                    self.set_nominal(DisplayState::Idle);
                }
                self.nominal
            }
            None => self.nominal,
        }
    }

    /// Effective state without expiring anything
    pub fn effective(&self, now: Instant) -> DisplayState {
        match self.hold_until {
            Some(until) if now < until => DisplayState::ShowingResult,
            Some(_) if self.nominal == DisplayState::ShowingResult => DisplayState::Idle,
            _ => self.nominal,
        }
    }

    /// Spin the thinking ring; called once per tick
    pub fn advance_rotation(&mut self, step: f32) {
        self.ring_rotation = (self.ring_rotation + step).rem_euclid(RING_ROTATION_PERIOD);
    }

    /// Decide what to sample for `state`, given the current clock text.
    ///
    /// Returns `Keep` when neither the state nor its content changed since
    /// the last sampling event.
    pub fn plan(&self, state: DisplayState, clock_text: &str) -> SamplePlan {
        let same_state = self.sampled_state == Some(state);
        match state {
            DisplayState::Idle => {
                if same_state && self.sampled_clock == clock_text {
                    SamplePlan::Keep
                } else {
                    SamplePlan::Glyphs {
                        text: clock_text.to_string(),
                        dense: false,
                    }
                }
            }
            DisplayState::ShowingResult => {
                if same_state && self.rendered_seq == Some(self.result_seq) {
                    SamplePlan::Keep
                } else {
                    SamplePlan::Glyphs {
                        text: self.result_text.clone(),
                        dense: true,
                    }
                }
            }
            DisplayState::Listening => {
                if same_state {
                    SamplePlan::Keep
                } else {
                    SamplePlan::Ring { rotation: 0.0 }
                }
            }
            DisplayState::Thinking => {
                if same_state && self.sampled_rotation == self.ring_rotation {
                    SamplePlan::Keep
                } else {
                    SamplePlan::Ring {
                        rotation: self.ring_rotation,
                    }
                }
            }
        }
    }

    /// Record that targets for `plan` were generated in `state`
    pub fn mark_sampled(&mut self, state: DisplayState, plan: &SamplePlan) {
        self.sampled_state = Some(state);
        match plan {
            SamplePlan::Keep => {}
            SamplePlan::Glyphs { text, .. } => match state {
                DisplayState::ShowingResult => self.rendered_seq = Some(self.result_seq),
                _ => self.sampled_clock.clone_from(text),
            }
            SamplePlan::Ring { rotation } => self.sampled_rotation = *rotation,
        }
    }

    /// Forget what was sampled so the next plan regenerates targets
    pub fn invalidate(&mut self) {
        self.sampled_state = None;
        self.rendered_seq = None;
        self.sampled_clock.clear();
    }

    /// Global draw opacity: smoothstep fade-in while a result is revealed
    pub fn reveal_alpha(&self, state: DisplayState, now: Instant) -> f32 {
        match state {
            DisplayState::ShowingResult => {
                let Some(start) = self.reveal_start else {
                    return 1.0;
                };
                let elapsed = now.saturating_duration_since(start).as_secs_f32() * 1000.0;
                let t = if self.timing.reveal_ms == 0 {
                    1.0
                } else {
                    elapsed / self.timing.reveal_ms as f32
                };
                smoothstep(t)
            }
            DisplayState::Idle | DisplayState::Listening | DisplayState::Thinking => 1.0,
        }
    }
}

/// Reduce a free-form reply to something short enough to draw as glyphs.
///
/// Keeps CJK ideographs and ASCII letters/digits, at most four of them. A
/// reply made only of punctuation shows its first two characters; a blank
/// reply shows "无".
pub fn clean_result_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ('\u{4e00}'..='\u{9fa5}').contains(c))
        .take(4)
        .collect();
    if !cleaned.is_empty() {
        cleaned
    } else if !raw.trim().is_empty() {
        raw.chars().take(2).collect()
    } else {
        "无".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> StateController {
        StateController::new(TimingConfig::default())
    }

    #[test]
    fn test_parse_closed_set() {
        for state in DisplayState::ALL {
            assert_eq!(state.as_str().parse::<DisplayState>().unwrap(), state);
        }
        assert_eq!(" Thinking ".parse::<DisplayState>().unwrap(), DisplayState::Thinking);
        assert!(matches!(
            "dancing".parse::<DisplayState>(),
            Err(Error::UnknownDisplayState(_))
        ));
    }

    #[test]
    fn test_serde_rejects_unknown_state() {
        let state: DisplayState = serde_json::from_str("\"showing-result\"").unwrap();
        assert_eq!(state, DisplayState::ShowingResult);
        assert!(serde_json::from_str::<DisplayState>("\"sleeping\"").is_err());
    }

    #[test]
    fn test_hold_overrides_nominal() {
        let mut c = controller();
        let t0 = Instant::now();
        c.show_result("?", t0);
        c.set_nominal(DisplayState::Listening);

        assert_eq!(c.resolve(t0 + Duration::from_millis(4999)), DisplayState::ShowingResult);
        // Hold over: the nominal state that was set meanwhile wins
        assert_eq!(c.resolve(t0 + Duration::from_millis(5000)), DisplayState::Listening);
    }

    #[test]
    fn test_hold_expiry_returns_to_idle() {
        let mut c = controller();
        let t0 = Instant::now();
        c.show_result("?", t0);
        assert_eq!(c.nominal(), DisplayState::ShowingResult);
        let later = t0 + Duration::from_millis(6000);
        assert_eq!(c.effective(later), DisplayState::Idle);
        assert_eq!(c.resolve(later), DisplayState::Idle);
        assert_eq!(c.nominal(), DisplayState::Idle);
    }

    #[test]
    fn test_idle_skips_unchanged_clock() {
        let mut c = controller();
        let plan = c.plan(DisplayState::Idle, "12:34");
        assert_eq!(
            plan,
            SamplePlan::Glyphs {
                text: "12:34".into(),
                dense: false
            }
        );
        c.mark_sampled(DisplayState::Idle, &plan);
        assert_eq!(c.plan(DisplayState::Idle, "12:34"), SamplePlan::Keep);
        assert!(matches!(c.plan(DisplayState::Idle, "12:35"), SamplePlan::Glyphs { .. }));
    }

    #[test]
    fn test_returning_to_idle_resamples_same_clock() {
        let mut c = controller();
        let plan = c.plan(DisplayState::Idle, "09:00");
        c.mark_sampled(DisplayState::Idle, &plan);

        let ring = c.plan(DisplayState::Listening, "09:00");
        assert_eq!(ring, SamplePlan::Ring { rotation: 0.0 });
        c.mark_sampled(DisplayState::Listening, &ring);
        assert_eq!(c.plan(DisplayState::Listening, "09:00"), SamplePlan::Keep);

        assert!(matches!(c.plan(DisplayState::Idle, "09:00"), SamplePlan::Glyphs { .. }));
    }

    #[test]
    fn test_new_result_defeats_skip() {
        let mut c = controller();
        let t0 = Instant::now();
        c.show_result("忙", t0);
        let plan = c.plan(DisplayState::ShowingResult, "");
        assert_eq!(
            plan,
            SamplePlan::Glyphs {
                text: "忙".into(),
                dense: true
            }
        );
        c.mark_sampled(DisplayState::ShowingResult, &plan);
        assert_eq!(c.plan(DisplayState::ShowingResult, ""), SamplePlan::Keep);

        let t1 = t0 + Duration::from_millis(300);
        c.show_result("频", t1);
        assert_eq!(c.result_seq(), 2);
        assert_eq!(c.reveal_start(), Some(t1));
        assert_eq!(
            c.plan(DisplayState::ShowingResult, ""),
            SamplePlan::Glyphs {
                text: "频".into(),
                dense: true
            }
        );
    }

    #[test]
    fn test_thinking_ring_follows_rotation() {
        let mut c = controller();
        let plan = c.plan(DisplayState::Thinking, "");
        c.mark_sampled(DisplayState::Thinking, &plan);
        assert_eq!(c.plan(DisplayState::Thinking, ""), SamplePlan::Keep);
        c.advance_rotation(0.08);
        assert_eq!(c.plan(DisplayState::Thinking, ""), SamplePlan::Ring { rotation: 0.08 });
    }

    #[test]
    fn test_ring_rotation_wraps() {
        let mut c = controller();
        c.ring_rotation = RING_ROTATION_PERIOD - 0.05;
        c.advance_rotation(0.08);
        assert!((c.ring_rotation() - 0.03).abs() < 1e-3);

        // A long thinking spell keeps turning instead of stalling
        for _ in 0..1_000_000 {
            let before = c.ring_rotation();
            c.advance_rotation(0.08);
            assert_ne!(c.ring_rotation(), before);
            assert!(c.ring_rotation() < RING_ROTATION_PERIOD);
        }
    }

    #[test]
    fn test_reveal_alpha_eases() {
        let mut c = controller();
        let t0 = Instant::now();
        c.show_result("?", t0);
        let s = DisplayState::ShowingResult;
        assert_eq!(c.reveal_alpha(s, t0), 0.0);
        assert!((c.reveal_alpha(s, t0 + Duration::from_millis(600)) - 0.5).abs() < 1e-3);
        assert_eq!(c.reveal_alpha(s, t0 + Duration::from_millis(1200)), 1.0);
        assert_eq!(c.reveal_alpha(s, t0 + Duration::from_millis(4000)), 1.0);
        assert_eq!(c.reveal_alpha(DisplayState::Idle, t0), 1.0);
    }

    #[test]
    fn test_clean_result_text() {
        assert_eq!(clean_result_text("晴天，适合出门！"), "晴天适合");
        assert_eq!(clean_result_text("Yes!"), "Yes");
        assert_eq!(clean_result_text("？！。"), "？！");
        assert_eq!(clean_result_text("   "), "无");
        assert_eq!(clean_result_text(""), "无");
    }
}
