//! # Playback Clock
//!
//! A variable-rate virtual clock that advances a frame index over wall-clock
//! time. The host calls [`PlaybackClock::tick`] once per animation frame with
//! its own timestamp; the clock never schedules anything itself, so it is
//! independent of the display refresh rate.
//!
//! Catch-up is batched: a slow frame advances the index by several samples in
//! one step instead of looping per sample.

use std::fmt;

use log::debug;

use crate::error::{ReplayError, Result};

/// Samples per second at a 1.0x multiplier.
pub const BASE_SAMPLES_PER_SECOND: f64 = 10.0;

/// Callback invoked with the new index whenever the clock advances or seeks.
pub type FrameCallback = Box<dyn FnMut(usize)>;

/// Playback state. Only the clock mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
    pub speed_multiplier: f64,
    /// Wall-clock time not yet converted into whole samples
    pub accumulated_time_ms: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_index: 0,
            is_playing: false,
            speed_multiplier: 1.0,
            accumulated_time_ms: 0.0,
        }
    }
}

pub struct PlaybackClock {
    state: PlaybackState,
    length: usize,
    base_samples_per_second: f64,
    last_tick_ms: Option<f64>,
    on_frame: Option<FrameCallback>,
}

impl fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("state", &self.state)
            .field("length", &self.length)
            .field("base_samples_per_second", &self.base_samples_per_second)
            .field("last_tick_ms", &self.last_tick_ms)
            .finish_non_exhaustive()
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    /// Create a paused clock over an empty track.
    pub fn new() -> Self {
        Self {
            state: PlaybackState::default(),
            length: 0,
            base_samples_per_second: BASE_SAMPLES_PER_SECOND,
            last_tick_ms: None,
            on_frame: None,
        }
    }

    /// Create a clock with a custom 1.0x sample rate.
    ///
    /// Non-positive or non-finite rates fall back to [`BASE_SAMPLES_PER_SECOND`].
    pub fn with_base_rate(samples_per_second: f64) -> Self {
        let base = if samples_per_second.is_finite() && samples_per_second > 0.0 {
            samples_per_second
        } else {
            BASE_SAMPLES_PER_SECOND
        };
        Self {
            base_samples_per_second: base,
            ..Self::new()
        }
    }

    /// Register the frame-update callback, replacing any previous one.
    pub fn on_frame(&mut self, callback: FrameCallback) {
        self.on_frame = Some(callback);
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.state.speed_multiplier
    }

    /// Effective sample rate for the current multiplier.
    pub fn samples_per_second(&self) -> f64 {
        self.base_samples_per_second * self.state.speed_multiplier
    }

    pub fn ms_per_sample(&self) -> f64 {
        1000.0 / self.samples_per_second()
    }

    /// Point the clock at a new track: index and accumulated time go back to zero.
    pub fn load(&mut self, length: usize) {
        self.length = length;
        self.state.current_index = 0;
        self.state.accumulated_time_ms = 0.0;
        self.last_tick_ms = None;
    }

    /// Start playing. Idempotent: a second call while playing changes nothing.
    pub fn play(&mut self) {
        if self.state.is_playing {
            return;
        }
        self.state.is_playing = true;
        self.state.accumulated_time_ms = 0.0;
        self.last_tick_ms = None;
        debug!("[PlaybackClock] play at index {}", self.state.current_index);
    }

    /// Stop playing. Idempotent.
    pub fn pause(&mut self) {
        if !self.state.is_playing {
            return;
        }
        self.state.is_playing = false;
        debug!("[PlaybackClock] pause at index {}", self.state.current_index);
    }

    /// Toggle play/pause, returns the new playing state.
    pub fn toggle(&mut self) -> bool {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
        self.state.is_playing
    }

    /// Jump to `index`, clamped to the track. No-op on an empty track.
    pub fn seek(&mut self, index: usize) -> Option<usize> {
        if self.length == 0 {
            return None;
        }
        let index = index.min(self.length - 1);
        self.state.current_index = index;
        self.emit(index);
        Some(index)
    }

    /// User scrubbing: pauses first so the seek does not fight playback.
    pub fn scrub(&mut self, index: usize) -> Option<usize> {
        self.pause();
        self.seek(index)
    }

    /// Change the rate multiplier. Accumulated time is left untouched, so the
    /// new rate applies from the next tick on.
    pub fn set_speed_multiplier(&mut self, multiplier: f64) -> Result<()> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ReplayError::InvalidSpeed { value: multiplier });
        }
        self.state.speed_multiplier = multiplier;
        Ok(())
    }

    /// Advance according to the wall-clock time `now_ms`.
    ///
    /// Returns the new index when at least one sample was consumed. The first
    /// tick after [`play`](Self::play) only records the reference time.
    pub fn tick(&mut self, now_ms: f64) -> Option<usize> {
        if !self.state.is_playing || self.length == 0 || !now_ms.is_finite() {
            return None;
        }

        let last = *self.last_tick_ms.get_or_insert(now_ms);
        let delta = (now_ms - last).max(0.0);
        self.last_tick_ms = Some(now_ms);

        let ms_per_sample = self.ms_per_sample();
        self.state.accumulated_time_ms += delta;
        if self.state.accumulated_time_ms < ms_per_sample {
            return None;
        }

        let frames = (self.state.accumulated_time_ms / ms_per_sample).floor();
        self.state.accumulated_time_ms -= frames * ms_per_sample;

        // Loop playback: wrap past the last sample.
        let frames = frames as usize % self.length;
        let index = (self.state.current_index + frames) % self.length;
        self.state.current_index = index;
        self.emit(index);
        Some(index)
    }

    fn emit(&mut self, index: usize) {
        if let Some(callback) = self.on_frame.as_mut() {
            callback(index);
        }
    }
}

/// Multiplier as shown next to the speed slider, e.g. `1.5x`.
pub fn speed_label(multiplier: f64) -> String {
    format!("{:.1}x", multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn playing_clock(length: usize) -> PlaybackClock {
        let mut clock = PlaybackClock::new();
        clock.load(length);
        clock.play();
        clock.tick(0.0);
        clock
    }

    #[test]
    fn test_first_tick_sets_reference() {
        let mut clock = PlaybackClock::new();
        clock.load(100);
        clock.play();
        assert_eq!(clock.tick(5_000.0), None);
        assert_eq!(clock.current_index(), 0);
        assert_eq!(clock.tick(5_100.0), Some(1));
    }

    #[test]
    fn test_batched_catch_up() {
        let mut clock = playing_clock(100);
        // 1.0x = 10 samples/s = 100ms per sample
        assert_eq!(clock.tick(50.0), None);
        assert_eq!(clock.tick(730.0), Some(7));
        assert!((clock.state().accumulated_time_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_threshold_advances() {
        let mut clock = playing_clock(100);
        assert_eq!(clock.tick(100.0), Some(1));
        assert_eq!(clock.state().accumulated_time_ms, 0.0);
    }

    #[test]
    fn test_wrap_is_modular() {
        for (start, elapsed, expected) in [(8, 350.0, 1), (9, 100.0, 0), (0, 2_500.0, 5)] {
            let mut clock = PlaybackClock::new();
            clock.load(10);
            clock.seek(start);
            clock.play();
            clock.tick(0.0);
            assert_eq!(clock.tick(elapsed), Some(expected), "start {}", start);
            assert!(clock.current_index() < 10);
        }
    }

    #[test]
    fn test_play_pause_idempotent() {
        let mut clock = playing_clock(100);
        clock.tick(50.0);
        let before = clock.state().clone();
        clock.play();
        assert_eq!(clock.state(), &before);

        clock.pause();
        let paused = clock.state().clone();
        clock.pause();
        assert_eq!(clock.state(), &paused);
        assert!(!clock.is_playing());
        assert_eq!(clock.tick(10_000.0), None);
    }

    #[test]
    fn test_resume_restarts_reference() {
        let mut clock = playing_clock(100);
        clock.tick(150.0);
        clock.pause();
        clock.play();
        // Time spent paused is not played back
        assert_eq!(clock.tick(60_000.0), None);
        assert_eq!(clock.current_index(), 1);
        assert_eq!(clock.tick(60_100.0), Some(2));
    }

    #[test]
    fn test_speed_change_applies_next_tick() {
        let mut clock = playing_clock(100);
        assert_eq!(clock.samples_per_second(), 10.0);
        clock.tick(50.0);

        clock.set_speed_multiplier(2.0).unwrap();
        assert_eq!(clock.samples_per_second(), 20.0);
        assert_eq!(clock.state().accumulated_time_ms, 50.0);

        // 50ms already accumulated now covers one full sample at 2.0x
        assert_eq!(clock.tick(50.0), Some(1));
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let mut clock = PlaybackClock::new();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                clock.set_speed_multiplier(bad),
                Err(ReplayError::InvalidSpeed { .. })
            ));
        }
        assert_eq!(clock.speed_multiplier(), 1.0);
    }

    #[test]
    fn test_empty_track_is_noop() {
        let mut clock = PlaybackClock::new();
        clock.play();
        assert_eq!(clock.tick(0.0), None);
        assert_eq!(clock.tick(1_000.0), None);
        assert_eq!(clock.seek(3), None);
        assert_eq!(clock.current_index(), 0);
    }

    #[test]
    fn test_scrub_pauses_and_clamps() {
        let mut clock = playing_clock(20);
        assert_eq!(clock.scrub(50), Some(19));
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_frame_callback() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut clock = PlaybackClock::new();
        clock.on_frame(Box::new(move |i| sink.borrow_mut().push(i)));
        clock.load(10);
        clock.play();
        clock.tick(0.0);
        clock.tick(100.0);
        clock.tick(120.0);
        clock.tick(300.0);
        clock.seek(7);

        assert_eq!(*seen.borrow(), vec![1, 3, 7]);
    }

    #[test]
    fn test_custom_base_rate() {
        let clock = PlaybackClock::with_base_rate(25.0);
        assert_eq!(clock.ms_per_sample(), 40.0);
        let clock = PlaybackClock::with_base_rate(-3.0);
        assert_eq!(clock.samples_per_second(), BASE_SAMPLES_PER_SECOND);
    }

    #[test]
    fn test_speed_label() {
        assert_eq!(speed_label(1.0), "1.0x");
        assert_eq!(speed_label(2.26), "2.3x");
        assert_eq!(speed_label(0.5), "0.5x");
    }
}
