//! Session summary returned by `stop()`.

use std::fmt;

use observability::TrackingSummary;

/// Outcome of one tracking session
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// Frames processed
    pub frames: u64,
    /// Frames whose geometry came from a fresh landmark packet
    pub landmark_frames: u64,
    /// `landmark_frames / frames` in percent
    pub detection_rate: f64,
    /// Detector drained and every sink closed without error
    pub clean_shutdown: bool,
    pub tracking: TrackingSummary,
}

impl SessionSummary {
    pub(crate) fn from_tracking(tracking: TrackingSummary, clean_shutdown: bool) -> Self {
        Self {
            frames: tracking.total_frames,
            landmark_frames: tracking.landmark_frames,
            detection_rate: tracking.detection_rate,
            clean_shutdown,
            tracking,
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tracking)?;
        writeln!(
            f,
            "Clean shutdown: {}",
            if self.clean_shutdown { "yes" } else { "no" }
        )
    }
}
