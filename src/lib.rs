//! # Flight Replay
//!
//! Playback and synchronization engine for recorded flight track logs.
//!
//! This library provides:
//! - A variable-rate playback clock that batches catch-up frames
//! - Exact-timestamp synchronization of a secondary track to the primary
//! - Trail geometry planning (cached full path or a bounded trailing window)
//! - Comparison metrics in the 2D (great-circle) or 3D (Cartesian) metric
//! - Ingestion of raw telemetry logs into per-plane tracks
//!
//! ## Features
//!
//! - **`http`** - Enable HTTP client for the track API
//! - **`persistence`** - Enable the SQLite settings store
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use flight_replay::{NullRenderer, ReplaySession, Sample, TrackId};
//!
//! let samples: Vec<Sample> = (0..100)
//!     .map(|i| Sample::new(format!("2024-09-14 12:00:{:02}.{}", i / 10, i % 10), 40.2, 25.88))
//!     .collect();
//!
//! let mut session = ReplaySession::new(NullRenderer);
//! let ticket = session.select_track(TrackId::Number(7));
//! session.complete_load(ticket.unwrap(), Ok(samples));
//!
//! session.play();
//! session.tick(0.0);
//! let frame = session.tick(250.0); // 10 samples/s at 1.0x
//! assert_eq!(frame.map(|f| f.index), Some(2));
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, ReplayError, Result};

// Timestamp parsing
pub mod timestamp;

// Playback clock
pub mod clock;
pub use clock::{PlaybackClock, PlaybackState, BASE_SAMPLES_PER_SECOND};

// Exact-timestamp synchronization
pub mod index;
pub use index::{find_match, TimestampIndex};

// Comparison metrics (distance per render mode)
pub mod compare;
pub use compare::{compare, compute_distance, Comparison};

// Trail geometry and the renderer sink
pub mod trail;
pub use trail::{
    AssetOrientation, NullRenderer, PathMode, PathPlanner, TrailRenderer, TRAIL_LENGTH,
};

// Track slots
pub mod store;
pub use store::{LoadOutcome, LoadTicket, Slot, SlotState, TrackStore};

// HUD readouts
pub mod hud;
pub use hud::{PrimaryReadout, SecondaryReadout, PLACEHOLDER};

// Replay session (owns store, clock and planners)
pub mod session;
pub use session::{FrameUpdate, ReplayConfig, ReplaySession};

// Color/opacity settings
pub mod settings;
pub use settings::{KeyValueStore, MemoryStore, Settings, SettingsStore};

#[cfg(feature = "persistence")]
pub use settings::SqliteStore;

// Raw log ingestion
pub mod ingest;
pub use ingest::TrackCatalog;

// HTTP module for track fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::TrackClient;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of a plane track. The API returns either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackId {
    Number(i64),
    Name(String),
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Number(n) => write!(f, "{}", n),
            TrackId::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for TrackId {
    fn from(n: i64) -> Self {
        TrackId::Number(n)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        TrackId::Name(s.to_string())
    }
}

/// A single recorded telemetry sample.
///
/// Numeric fields other than the position may be missing in the log; they are
/// shown as placeholders rather than treated as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// `YYYY-MM-DD HH:MM:SS[.sss]`, ordered lexically and temporally
    pub timestamp: String,
    pub lat: f64,
    pub lon: f64,
    /// Altitude in meters
    #[serde(default)]
    pub alt: Option<f64>,
    /// Heading in degrees, [0, 360)
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
}

impl Sample {
    /// Create a position-only sample.
    pub fn new(timestamp: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            lat,
            lon,
            alt: None,
            heading: None,
            speed: None,
            battery: None,
            pitch: None,
            roll: None,
        }
    }

    /// Position for rendering. Missing altitude is ground level.
    pub fn position(&self) -> GeoPosition {
        GeoPosition {
            lat: self.lat,
            lon: self.lon,
            alt: self.alt.unwrap_or(0.0),
        }
    }
}

/// A position handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
    /// Meters above the ellipsoid
    pub alt: f64,
}

/// Which kind of view drives the session.
///
/// Selects the distance metric, the heading correction of the rendered asset
/// and whether swapping tracks is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// Flat map with a rotated icon
    #[default]
    Map2d,
    /// Globe with a 3D model
    Globe3d,
}

/// An immutable, timestamp-ordered sample sequence for one plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub samples: Vec<Sample>,
}

impl Track {
    pub fn new(id: TrackId, samples: Vec<Sample>) -> Self {
        Self { id, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// Positions of `samples[range]`, clamped to the track.
    pub fn positions(&self, start: usize, end_inclusive: usize) -> Vec<GeoPosition> {
        if self.samples.is_empty() || start >= self.samples.len() {
            return Vec::new();
        }
        let end = end_inclusive.min(self.samples.len() - 1);
        if start > end {
            return Vec::new();
        }
        self.samples[start..=end]
            .iter()
            .map(Sample::position)
            .collect()
    }

    /// Parsed first and last timestamp.
    pub fn time_range(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        let id = self.id.to_string();
        let first = self.samples.first().ok_or_empty_track(&id)?;
        let last = self.samples.last().ok_or_empty_track(&id)?;
        Ok((
            timestamp::parse_timestamp(&first.timestamp)?,
            timestamp::parse_timestamp(&last.timestamp)?,
        ))
    }

    /// Index of the first sample at or after `time`.
    ///
    /// Samples with unparseable timestamps are skipped.
    pub fn index_at_or_after(&self, time: NaiveDateTime) -> Option<usize> {
        self.samples.iter().position(|s| {
            timestamp::parse_timestamp(&s.timestamp)
                .map(|t| t >= time)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(n: usize) -> Track {
        let samples = (0..n)
            .map(|i| {
                let ts = format!("2024-09-14 12:00:{:02}", i);
                Sample::new(ts, 40.0 + i as f64 * 0.001, 25.0)
            })
            .collect();
        Track::new(TrackId::Number(1), samples)
    }

    #[test]
    fn test_track_id_json() {
        let ids: Vec<TrackId> = serde_json::from_str(r#"[3, "alpha", 12]"#).unwrap();
        assert_eq!(
            ids,
            vec![TrackId::Number(3), TrackId::from("alpha"), TrackId::Number(12)]
        );
        assert_eq!(ids[0].to_string(), "3");
        assert_eq!(ids[1].to_string(), "alpha");
    }

    #[test]
    fn test_sample_json_with_nulls() {
        let json = r#"{"timestamp":"2024-09-14 12:00:00","lat":40.2,"lon":25.88,
            "alt":null,"heading":90.0,"speed":null,"battery":87}"#;
        let s: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(s.alt, None);
        assert_eq!(s.heading, Some(90.0));
        assert_eq!(s.battery, Some(87));
        assert_eq!(s.pitch, None);
        assert_eq!(s.position().alt, 0.0);
    }

    #[test]
    fn test_positions_clamped() {
        let t = track(10);
        assert_eq!(t.positions(0, 3).len(), 4);
        assert_eq!(t.positions(8, 20).len(), 2);
        assert!(t.positions(10, 12).is_empty());
        assert!(track(0).positions(0, 0).is_empty());
    }

    #[test]
    fn test_time_range_and_lookup() {
        let t = track(10);
        let (start, stop) = t.time_range().unwrap();
        assert!(start < stop);

        let query = timestamp::parse_timestamp("2024-09-14 12:00:04.5").unwrap();
        assert_eq!(t.index_at_or_after(query), Some(5));

        assert!(matches!(
            track(0).time_range(),
            Err(ReplayError::EmptyTrack { .. })
        ));
    }
}
