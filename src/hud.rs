//! Display-ready HUD strings.
//!
//! Missing values never fail: they render as [`PLACEHOLDER`].

use serde::Serialize;

use crate::compare::Comparison;
use crate::timestamp::time_of_day;
use crate::Sample;

/// Shown for any value that is missing.
pub const PLACEHOLDER: &str = "--";

fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Readout for the primary plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryReadout {
    pub alt: String,
    pub speed: String,
    pub heading: String,
    pub battery: String,
    pub lat_lon: String,
    pub pitch_roll: String,
    pub time: String,
    pub frame: String,
}

impl PrimaryReadout {
    /// All fields as placeholders, for an empty or missing track.
    pub fn empty() -> Self {
        Self {
            alt: PLACEHOLDER.to_string(),
            speed: PLACEHOLDER.to_string(),
            heading: PLACEHOLDER.to_string(),
            battery: PLACEHOLDER.to_string(),
            lat_lon: PLACEHOLDER.to_string(),
            pitch_roll: PLACEHOLDER.to_string(),
            time: PLACEHOLDER.to_string(),
            frame: PLACEHOLDER.to_string(),
        }
    }

    pub fn from_sample(sample: &Sample, index: usize) -> Self {
        let pitch_roll = match (sample.pitch, sample.roll) {
            (Some(pitch), Some(roll)) => format!("{:.1} / {:.1}", pitch, roll),
            _ => PLACEHOLDER.to_string(),
        };
        Self {
            alt: fixed(sample.alt, 1),
            speed: fixed(sample.speed, 1),
            heading: fixed(sample.heading, 0),
            battery: sample
                .battery
                .map(|b| b.to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            lat_lon: format!("{:.5} / {:.5}", sample.lat, sample.lon),
            pitch_roll,
            time: time_of_day(&sample.timestamp).to_string(),
            frame: index.to_string(),
        }
    }
}

/// Readout for the secondary plane in compare mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryReadout {
    pub alt: String,
    pub speed: String,
    pub distance: String,
}

impl SecondaryReadout {
    /// No secondary data at this instant.
    pub fn empty() -> Self {
        Self {
            alt: PLACEHOLDER.to_string(),
            speed: PLACEHOLDER.to_string(),
            distance: PLACEHOLDER.to_string(),
        }
    }

    pub fn from_comparison(comparison: Option<&Comparison>) -> Self {
        match comparison {
            Some(c) => Self {
                alt: fixed(c.alt, 1),
                speed: fixed(c.speed, 1),
                distance: format!("{:.0} m", c.distance_m),
            },
            None => Self::empty(),
        }
    }
}
