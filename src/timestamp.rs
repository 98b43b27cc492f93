//! Sample timestamp parsing.
//!
//! Timestamps travel as strings (`YYYY-MM-DD HH:MM:SS[.sss]`) and are compared
//! as strings for synchronization. Parsing is only needed where real time
//! arithmetic happens, such as keeping the playback time across a swap.

use chrono::NaiveDateTime;

use crate::error::{ReplayError, Result};

const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a sample timestamp.
///
/// Accepts a comma as the decimal separator (`12:00:01,250`) and an ISO `T`
/// between date and time.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let clean = value.trim().replacen(',', ".", 1);
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&clean, fmt).ok())
        .ok_or_else(|| ReplayError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Time-of-day part of a timestamp, for HUD display.
///
/// Returns the input unchanged if there is no date/time separator.
pub fn time_of_day(value: &str) -> &str {
    value
        .split_once([' ', 'T'])
        .map(|(_, time)| time)
        .unwrap_or(value)
}

/// Inclusive range check.
pub fn within(time: NaiveDateTime, start: NaiveDateTime, stop: NaiveDateTime) -> bool {
    time >= start && time <= stop
}
