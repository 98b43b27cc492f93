//! # Trail Rendering
//!
//! The renderer itself lives outside this crate (a 2D map layer or a 3D
//! globe). This module defines the sink it implements and decides which
//! path geometry to push each frame:
//!
//! - **Full path**: the whole track, pushed once and then cached until the
//!   mode or the track changes
//! - **Trailing**: the last [`TRAIL_LENGTH`] samples up to the current one,
//!   recomputed every frame

use serde::{Deserialize, Serialize};

use crate::store::Slot;
use crate::{GeoPosition, Track};

/// Samples behind the current one kept in a trailing path.
pub const TRAIL_LENGTH: usize = 50;

/// Path display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathMode {
    FullPath,
    #[default]
    Trailing,
}

/// Heading correction of a marker asset.
///
/// Icons and models are drawn pointing in some arbitrary direction, so the
/// displayed rotation is `heading + heading_offset_deg`. Swapping the asset
/// means swapping the offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetOrientation {
    pub heading_offset_deg: f64,
}

impl AssetOrientation {
    /// Tilted airplane glyph used on the 2D map.
    pub const ICON_2D: Self = Self {
        heading_offset_deg: -45.0,
    };

    /// Airplane model used on the 3D globe.
    pub const MODEL_3D: Self = Self {
        heading_offset_deg: -90.0,
    };

    pub fn new(heading_offset_deg: f64) -> Self {
        Self { heading_offset_deg }
    }

    /// Display rotation in degrees. A missing heading renders as north.
    pub fn rotation(&self, heading: Option<f64>) -> f64 {
        heading.unwrap_or(0.0) + self.heading_offset_deg
    }
}

/// Sink for marker and path updates, implemented by the map layer.
pub trait TrailRenderer {
    /// Move the slot's marker and rotate it.
    fn set_marker(&mut self, slot: Slot, position: GeoPosition, rotation_deg: f64);

    /// Replace the slot's displayed path.
    fn set_path(&mut self, slot: Slot, path: &[GeoPosition]);

    /// Remove the slot's marker and path.
    fn clear(&mut self, slot: Slot);
}

impl<R: TrailRenderer + ?Sized> TrailRenderer for &mut R {
    fn set_marker(&mut self, slot: Slot, position: GeoPosition, rotation_deg: f64) {
        (**self).set_marker(slot, position, rotation_deg);
    }

    fn set_path(&mut self, slot: Slot, path: &[GeoPosition]) {
        (**self).set_path(slot, path);
    }

    fn clear(&mut self, slot: Slot) {
        (**self).clear(slot);
    }
}

/// Renderer that draws nothing, for headless playback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl TrailRenderer for NullRenderer {
    fn set_marker(&mut self, _slot: Slot, _position: GeoPosition, _rotation_deg: f64) {}

    fn set_path(&mut self, _slot: Slot, _path: &[GeoPosition]) {}

    fn clear(&mut self, _slot: Slot) {}
}

/// Inclusive sample range of a trailing path ending at `index`.
pub fn trailing_window(index: usize, trail_length: usize) -> (usize, usize) {
    (index.saturating_sub(trail_length), index)
}

/// Decides what path to push for one slot, caching the full path.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    mode: PathMode,
    trail_length: usize,
    /// Track revision whose full path the renderer currently shows
    full_path_revision: Option<u64>,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::new(PathMode::default(), TRAIL_LENGTH)
    }
}

impl PathPlanner {
    pub fn new(mode: PathMode, trail_length: usize) -> Self {
        Self {
            mode,
            trail_length,
            full_path_revision: None,
        }
    }

    pub fn mode(&self) -> PathMode {
        self.mode
    }

    /// Switch mode. Any change drops the cached full path.
    pub fn set_mode(&mut self, mode: PathMode) {
        if self.mode != mode {
            self.mode = mode;
            self.full_path_revision = None;
        }
    }

    /// Force the next full-path plan to push geometry again.
    pub fn invalidate(&mut self) {
        self.full_path_revision = None;
    }

    /// Path to push for `index`, or `None` when the renderer is already up to
    /// date (or the track is empty).
    ///
    /// `revision` identifies the loaded track; a new revision invalidates the
    /// cached full path.
    pub fn plan(&mut self, track: &Track, revision: u64, index: usize) -> Option<Vec<GeoPosition>> {
        if track.is_empty() {
            return None;
        }

        match self.mode {
            PathMode::FullPath => {
                if self.full_path_revision == Some(revision) {
                    return None;
                }
                self.full_path_revision = Some(revision);
                Some(track.positions(0, track.len() - 1))
            }
            PathMode::Trailing => {
                self.full_path_revision = None;
                let (start, end) = trailing_window(index, self.trail_length);
                Some(track.positions(start, end))
            }
        }
    }
}
