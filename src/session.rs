//! # Replay Session
//!
//! Stateful replay context that owns the track store, the playback clock and
//! the path planners, and pushes updates into a [`TrailRenderer`].
//!
//! ## Architecture
//!
//! The session is a plain value owned by the host; there is no global state.
//! The host forwards UI events to it and calls [`ReplaySession::tick`] once per
//! animation frame:
//!
//! - list click → [`select_track`](ReplaySession::select_track), then
//!   [`complete_load`](ReplaySession::complete_load) when the fetch finishes
//! - play/pause button → [`toggle_play`](ReplaySession::toggle_play)
//! - speed slider → [`set_speed`](ReplaySession::set_speed)
//! - scrub slider → [`scrub`](ReplaySession::scrub)
//! - full-path checkbox → [`set_full_path`](ReplaySession::set_full_path)
//! - compare toggle → [`toggle_compare`](ReplaySession::toggle_compare)
//! - swap → [`swap`](ReplaySession::swap) (3D only)
//!
//! 2D and 3D views share this single implementation; [`ReplayConfig`] selects
//! the distance metric and the heading correction.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clock::{speed_label, PlaybackClock, BASE_SAMPLES_PER_SECOND};
use crate::compare::{compare, Comparison};
use crate::error::{OptionExt, ReplayError, Result};
use crate::hud::{PrimaryReadout, SecondaryReadout};
use crate::store::{LoadOutcome, LoadTicket, Slot, SlotState, TrackStore};
use crate::timestamp::{parse_timestamp, within};
use crate::trail::{AssetOrientation, PathMode, PathPlanner, TrailRenderer, TRAIL_LENGTH};
use crate::{RenderMode, Sample, TrackId};

// ============================================================================
// Configuration
// ============================================================================

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayConfig {
    pub render_mode: RenderMode,
    /// Samples per second at 1.0x
    pub base_samples_per_second: f64,
    /// Samples behind the current one in a trailing path
    pub trail_length: usize,
    /// Marker asset on the 2D map
    pub icon: AssetOrientation,
    /// Marker asset on the 3D globe
    pub model: AssetOrientation,
    pub initial_speed: f64,
    /// Show the whole primary path instead of a trail
    pub full_path: bool,
    pub secondary_path_visible: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Map2d,
            base_samples_per_second: BASE_SAMPLES_PER_SECOND,
            trail_length: TRAIL_LENGTH,
            icon: AssetOrientation::ICON_2D,
            model: AssetOrientation::MODEL_3D,
            initial_speed: 1.0,
            full_path: false,
            secondary_path_visible: true,
        }
    }
}

impl ReplayConfig {
    /// Defaults for a 3D globe view.
    pub fn globe() -> Self {
        Self {
            render_mode: RenderMode::Globe3d,
            ..Self::default()
        }
    }

    /// Load from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Heading correction of the asset used in the configured mode.
    pub fn orientation(&self) -> AssetOrientation {
        match self.render_mode {
            RenderMode::Map2d => self.icon,
            RenderMode::Globe3d => self.model,
        }
    }
}

// ============================================================================
// Frame Output
// ============================================================================

/// Everything the HUD needs after a frame was rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameUpdate {
    pub index: usize,
    pub total: usize,
    pub primary: PrimaryReadout,
    /// Raw comparison, `None` without an exact timestamp match
    pub comparison: Option<Comparison>,
    /// Present in compare mode once a secondary track is loaded
    pub secondary: Option<SecondaryReadout>,
}

// ============================================================================
// Replay Session
// ============================================================================

pub struct ReplaySession<R: TrailRenderer> {
    config: ReplayConfig,
    store: TrackStore,
    clock: PlaybackClock,
    primary_path: PathPlanner,
    secondary_path: PathPlanner,
    secondary_path_visible: bool,
    renderer: R,
}

impl<R: TrailRenderer> ReplaySession<R> {
    /// Create a session with default (2D) configuration.
    pub fn new(renderer: R) -> Self {
        Self::with_config(renderer, ReplayConfig::default())
    }

    /// Create a session with custom configuration.
    pub fn with_config(renderer: R, config: ReplayConfig) -> Self {
        let mut clock = PlaybackClock::with_base_rate(config.base_samples_per_second);
        if clock.set_speed_multiplier(config.initial_speed).is_err() {
            debug!(
                "[ReplaySession] ignoring invalid initial speed {}",
                config.initial_speed
            );
        }
        let primary_mode = if config.full_path {
            PathMode::FullPath
        } else {
            PathMode::Trailing
        };

        Self {
            store: TrackStore::new(),
            clock,
            primary_path: PathPlanner::new(primary_mode, config.trail_length),
            secondary_path: PathPlanner::new(PathMode::Trailing, config.trail_length),
            secondary_path_visible: config.secondary_path_visible,
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    // ========================================================================
    // Track Selection
    // ========================================================================

    /// Select `id` from the track list.
    ///
    /// Goes to the secondary slot in compare mode, otherwise to the primary
    /// (which pauses playback). Returns `None` when the id is already
    /// selected; otherwise the host fetches the samples and passes them to
    /// [`complete_load`](Self::complete_load).
    pub fn select_track(&mut self, id: TrackId) -> Option<LoadTicket> {
        let slot = self.store.target_slot();
        if slot == Slot::Primary && self.store.selected_id(Slot::Primary) != Some(&id) {
            self.clock.pause();
        }
        self.store.begin_load(slot, id)
    }

    /// Install the result of a fetch started by [`select_track`](Self::select_track).
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Sample>>,
    ) -> LoadOutcome {
        let slot = ticket.slot();
        let outcome = self.store.complete_load(ticket, result);
        if !matches!(outcome, LoadOutcome::Applied { .. }) {
            return outcome;
        }

        match slot {
            Slot::Primary => {
                let len = self.store.primary().map(|t| t.len()).unwrap_or(0);
                self.clock.load(len);
                self.primary_path.invalidate();
                if len == 0 {
                    self.renderer.clear(Slot::Primary);
                }
            }
            Slot::Secondary => {
                self.secondary_path.invalidate();
                self.renderer.clear(Slot::Secondary);
                self.place_secondary_at_start();
            }
        }
        self.refresh();
        outcome
    }

    fn place_secondary_at_start(&mut self) {
        let orientation = self.config.orientation();
        if let Some(first) = self.store.secondary().and_then(|t| t.get(0)) {
            self.renderer.set_marker(
                Slot::Secondary,
                first.position(),
                orientation.rotation(first.heading),
            );
        }
    }

    pub fn slot_state(&self, slot: Slot) -> SlotState {
        self.store.state(slot)
    }

    // ========================================================================
    // Compare Mode
    // ========================================================================

    pub fn compare_mode(&self) -> bool {
        self.store.compare_mode()
    }

    /// Enter or leave compare mode. Leaving removes the secondary track.
    pub fn set_compare_mode(&mut self, enabled: bool) {
        if self.store.compare_mode() == enabled {
            return;
        }
        self.store.set_compare_mode(enabled);
        if !enabled {
            self.renderer.clear(Slot::Secondary);
            self.secondary_path.invalidate();
        }
    }

    /// Flip compare mode, returns the new state.
    pub fn toggle_compare(&mut self) -> bool {
        let enabled = !self.store.compare_mode();
        self.set_compare_mode(enabled);
        enabled
    }

    /// Exchange primary and secondary (3D view only).
    ///
    /// The playback time is kept when it falls inside the new primary's time
    /// range; otherwise playback restarts at the new primary's first sample.
    pub fn swap(&mut self) -> Result<Option<FrameUpdate>> {
        if self.config.render_mode != RenderMode::Globe3d {
            return Err(ReplayError::UnsupportedInMode {
                operation: "swap".to_string(),
            });
        }

        let preserved = self
            .store
            .primary()
            .and_then(|t| t.get(self.clock.current_index()))
            .and_then(|s| parse_timestamp(&s.timestamp).ok());

        self.store.swap()?;

        let track = self.store.primary().ok_or_internal("primary missing after swap")?;
        let target = match (preserved, track.time_range()) {
            (Some(time), Ok((start, stop))) if within(time, start, stop) => {
                track.index_at_or_after(time).unwrap_or(0)
            }
            _ => 0,
        };
        let len = track.len();

        info!("[ReplaySession] swap, resuming at index {}", target);
        self.clock.load(len);
        self.clock.seek(target);
        self.primary_path.invalidate();
        self.secondary_path.invalidate();
        self.renderer.clear(Slot::Secondary);
        self.place_secondary_at_start();
        Ok(self.refresh())
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub fn play(&mut self) {
        self.clock.play();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    /// Returns the new playing state.
    pub fn toggle_play(&mut self) -> bool {
        self.clock.toggle()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<()> {
        self.clock.set_speed_multiplier(multiplier)
    }

    /// Speed slider label, e.g. `2.0x`.
    pub fn speed_label(&self) -> String {
        speed_label(self.clock.speed_multiplier())
    }

    /// Upper bound of the scrub slider, `None` without samples.
    pub fn timeline_max(&self) -> Option<usize> {
        self.store
            .primary()
            .and_then(|t| t.len().checked_sub(1))
    }

    pub fn current_index(&self) -> usize {
        self.clock.current_index()
    }

    /// Drive playback from the host's frame callback.
    ///
    /// Renders and returns the frame when the clock advanced.
    pub fn tick(&mut self, now_ms: f64) -> Option<FrameUpdate> {
        let index = self.clock.tick(now_ms)?;
        self.render_frame(index)
    }

    /// Scrub slider input: pauses, then jumps.
    pub fn scrub(&mut self, index: usize) -> Option<FrameUpdate> {
        let index = self.clock.scrub(index).unwrap_or(self.clock.current_index());
        self.render_frame(index)
    }

    /// Jump without touching the play state.
    pub fn seek(&mut self, index: usize) -> Option<FrameUpdate> {
        let index = self.clock.seek(index).unwrap_or(self.clock.current_index());
        self.render_frame(index)
    }

    // ========================================================================
    // Path Display
    // ========================================================================

    pub fn set_full_path(&mut self, enabled: bool) {
        let mode = if enabled {
            PathMode::FullPath
        } else {
            PathMode::Trailing
        };
        self.primary_path.set_mode(mode);
        self.refresh();
    }

    pub fn set_secondary_path_visible(&mut self, visible: bool) {
        if self.secondary_path_visible == visible {
            return;
        }
        self.secondary_path_visible = visible;
        if visible {
            self.secondary_path.invalidate();
            self.refresh();
        } else {
            self.renderer.set_path(Slot::Secondary, &[]);
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Re-render the current frame.
    ///
    /// `None` until a primary track is loaded. A loaded but empty primary
    /// yields a frame of placeholders.
    pub fn refresh(&mut self) -> Option<FrameUpdate> {
        self.render_frame(self.clock.current_index())
    }

    fn render_frame(&mut self, index: usize) -> Option<FrameUpdate> {
        let mode = self.config.render_mode;
        let orientation = self.config.orientation();

        let primary = self.store.track(Slot::Primary)?;
        let revision = self.store.revision(Slot::Primary)?;
        let Some(sample) = primary.get(index) else {
            return Some(self.placeholder_frame());
        };

        self.renderer
            .set_marker(Slot::Primary, sample.position(), orientation.rotation(sample.heading));
        if let Some(path) = self.primary_path.plan(primary, revision, index) {
            self.renderer.set_path(Slot::Primary, &path);
        }

        let mut comparison = None;
        let mut secondary = None;
        if self.store.compare_mode() {
            if let (Some(track), Some(lookup), Some(sec_revision)) = (
                self.store.track(Slot::Secondary),
                self.store.timestamp_index(Slot::Secondary),
                self.store.revision(Slot::Secondary),
            ) {
                comparison = compare(sample, &track.samples, lookup, mode);
                if let Some(c) = &comparison {
                    let matched = &track.samples[c.secondary_index];
                    self.renderer.set_marker(
                        Slot::Secondary,
                        matched.position(),
                        orientation.rotation(matched.heading),
                    );
                    if self.secondary_path_visible {
                        if let Some(path) =
                            self.secondary_path.plan(track, sec_revision, c.secondary_index)
                        {
                            self.renderer.set_path(Slot::Secondary, &path);
                        }
                    }
                }
                secondary = Some(SecondaryReadout::from_comparison(comparison.as_ref()));
            }
        }

        Some(FrameUpdate {
            index,
            total: primary.len(),
            primary: PrimaryReadout::from_sample(sample, index),
            comparison,
            secondary,
        })
    }

    fn placeholder_frame(&self) -> FrameUpdate {
        let secondary = (self.store.compare_mode() && self.store.secondary().is_some())
            .then(SecondaryReadout::empty);
        FrameUpdate {
            index: 0,
            total: 0,
            primary: PrimaryReadout::empty(),
            comparison: None,
            secondary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trail::NullRenderer;

    fn samples(n: usize, offset_s: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let t = i + offset_s;
                let mut s = Sample::new(
                    format!("2024-09-14 12:{:02}:{:02}", t / 60, t % 60),
                    40.2 + i as f64 * 1e-4,
                    25.88,
                );
                s.alt = Some(100.0);
                s.heading = Some(90.0);
                s
            })
            .collect()
    }

    fn loaded(config: ReplayConfig, n: usize) -> ReplaySession<NullRenderer> {
        let mut session = ReplaySession::with_config(NullRenderer, config);
        let ticket = session.select_track(TrackId::Number(1)).unwrap();
        session.complete_load(ticket, Ok(samples(n, 0)));
        session
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config =
            ReplayConfig::from_json(r#"{"renderMode":"globe3d","trailLength":20}"#).unwrap();
        assert_eq!(config.render_mode, RenderMode::Globe3d);
        assert_eq!(config.trail_length, 20);
        assert_eq!(config.base_samples_per_second, 10.0);
        assert_eq!(config.orientation(), AssetOrientation::MODEL_3D);
        assert_eq!(ReplayConfig::default().orientation(), AssetOrientation::ICON_2D);
    }

    #[test]
    fn test_initial_speed() {
        let config = ReplayConfig {
            initial_speed: 2.0,
            ..ReplayConfig::default()
        };
        let session = ReplaySession::with_config(NullRenderer, config);
        assert_eq!(session.speed_label(), "2.0x");
    }

    #[test]
    fn test_timeline_and_refresh() {
        let mut session = loaded(ReplayConfig::default(), 30);
        assert_eq!(session.timeline_max(), Some(29));
        let frame = session.refresh().unwrap();
        assert_eq!(frame.index, 0);
        assert_eq!(frame.total, 30);
        assert_eq!(frame.primary.time, "12:00:00");
        assert!(frame.secondary.is_none());
    }

    #[test]
    fn test_selecting_primary_pauses() {
        let mut session = loaded(ReplayConfig::default(), 30);
        session.play();
        assert!(session.select_track(TrackId::Number(2)).is_some());
        assert!(!session.is_playing());
    }

    #[test]
    fn test_swap_only_in_globe_mode() {
        let mut session = loaded(ReplayConfig::default(), 30);
        assert!(matches!(
            session.swap(),
            Err(ReplayError::UnsupportedInMode { .. })
        ));
    }

    #[test]
    fn test_empty_primary_is_noop() {
        let mut session = ReplaySession::new(NullRenderer);
        let ticket = session.select_track(TrackId::Number(9)).unwrap();
        session.complete_load(ticket, Ok(Vec::new()));
        session.play();
        assert!(session.tick(0.0).is_none());
        assert!(session.tick(10_000.0).is_none());
        assert_eq!(session.timeline_max(), None);
        assert_eq!(session.slot_state(Slot::Primary), SlotState::Loaded);
    }

    #[test]
    fn test_empty_primary_shows_placeholders() {
        let mut session = ReplaySession::new(NullRenderer);
        assert!(session.refresh().is_none());

        let ticket = session.select_track(TrackId::Number(9)).unwrap();
        session.complete_load(ticket, Ok(Vec::new()));

        let frame = session.refresh().unwrap();
        assert_eq!(frame.total, 0);
        assert_eq!(frame.primary, PrimaryReadout::empty());
        assert!(frame.secondary.is_none());

        let frame = session.scrub(4).unwrap();
        assert_eq!(frame.primary.alt, "--");
        assert!(!session.is_playing());
        assert_eq!(session.seek(2).map(|f| f.total), Some(0));

        session.toggle_compare();
        let ticket = session.select_track(TrackId::Number(3)).unwrap();
        session.complete_load(ticket, Ok(samples(5, 0)));
        let frame = session.refresh().unwrap();
        assert_eq!(frame.secondary, Some(SecondaryReadout::empty()));
        assert!(frame.comparison.is_none());
    }
}
