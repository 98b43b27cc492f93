//! Unified error handling for the flight-replay library.
//!
//! Nothing in here is fatal to a viewer: every variant is meant to be logged
//! and degraded to a placeholder display by the caller.

use thiserror::Error;

/// Unified error type for flight-replay operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    /// Fetch rejected or the server answered with a non-OK status
    #[error("{}", format_network(.message, .status_code))]
    Network {
        message: String,
        status_code: Option<u16>,
    },
    /// Track has no samples
    #[error("Track '{track_id}' has no samples")]
    EmptyTrack { track_id: String },
    /// Playback multiplier must be finite and strictly positive
    #[error("Invalid speed multiplier {value}, must be > 0")]
    InvalidSpeed { value: f64 },
    /// Operation not available in the active render mode
    #[error("'{operation}' is not available in this render mode")]
    UnsupportedInMode { operation: String },
    /// Swap needs compare mode with both slots loaded
    #[error("Swap requires both a primary and a secondary track")]
    NothingToSwap,
    /// Timestamp string does not match `YYYY-MM-DD HH:MM:SS[.sss]`
    #[error("Invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },
    /// JSON decoding failed
    #[error("Parse error: {message}")]
    Parse { message: String },
    /// Settings store failure
    #[error("Storage error: {message}")]
    Storage { message: String },
    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_network(message: &str, status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!("HTTP error ({}): {}", code, message),
        None => format!("HTTP error: {}", message),
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(e: serde_json::Error) -> Self {
        ReplayError::Parse {
            message: e.to_string(),
        }
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for ReplayError {
    fn from(e: rusqlite::Error) -> Self {
        ReplayError::Storage {
            message: e.to_string(),
        }
    }
}

/// Result type alias for flight-replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Extension trait for converting Option to ReplayError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an empty track error.
    fn ok_or_empty_track(self, track_id: &str) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_empty_track(self, track_id: &str) -> Result<T> {
        self.ok_or_else(|| ReplayError::EmptyTrack {
            track_id: track_id.to_string(),
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| ReplayError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReplayError::Network {
            message: "connection refused".to_string(),
            status_code: Some(404),
        };
        assert_eq!(err.to_string(), "HTTP error (404): connection refused");

        let err = ReplayError::Network {
            message: "timeout".to_string(),
            status_code: None,
        };
        assert_eq!(err.to_string(), "HTTP error: timeout");

        let err = ReplayError::EmptyTrack {
            track_id: "7".to_string(),
        };
        assert!(err.to_string().contains("'7'"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_empty_track("12");
        assert!(matches!(result, Err(ReplayError::EmptyTrack { .. })));

        let some = Some(3).ok_or_internal("unreachable");
        assert_eq!(some, Ok(3));
    }

    #[test]
    fn test_json_error_converts_to_parse() {
        let err: ReplayError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, ReplayError::Parse { .. }));
    }
}
