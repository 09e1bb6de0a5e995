//! Session start detection on LoadingScreen.log.

use chrono::NaiveDateTime;
use tracing::debug;

/// Raises a session start whenever a line contains the configured marker.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    marker: String,
}

impl SessionTracker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Returns the session start time if `line` carries the marker.
    pub fn feed(&self, timestamp: NaiveDateTime, line: &str) -> Option<NaiveDateTime> {
        if !line.contains(&self.marker) {
            return None;
        }
        debug!(%timestamp, "Session start marker");
        Some(timestamp)
    }
}
