//! Pupil measurements and aligned output records.

use serde::{Deserialize, Serialize};

use crate::Eye;

/// Sentinel written for any absent value
pub const MISSING_VALUE: f32 = -1.0;

/// Raw result of the pupil detector collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PupilObservation {
    /// Pupil diameter in crop pixels
    pub diameter: f32,
    /// Detector confidence (0..1)
    pub confidence: f32,
    /// Detector-internal counter value
    pub timestamp: u64,
}

/// One eye's measurement for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PupilMeasurement {
    pub frame_index: u64,
    pub diameter: f32,
    pub confidence: f32,
    /// `diameter / iris diameter`
    pub diameter_relative: f32,
}

impl PupilMeasurement {
    /// Measurement with every value set to the sentinel
    pub fn missing(frame_index: u64) -> Self {
        Self {
            frame_index,
            diameter: MISSING_VALUE,
            confidence: MISSING_VALUE,
            diameter_relative: MISSING_VALUE,
        }
    }

    /// Build from a detector observation and the iris diameter of the same eye
    ///
    /// The relative diameter is the sentinel when the iris diameter is not
    /// positive or the pupil was not found.
    pub fn from_observation(
        frame_index: u64,
        observation: &PupilObservation,
        iris_diameter: f32,
    ) -> Self {
        let diameter_relative = if iris_diameter > 0.0 && observation.diameter >= 0.0 {
            observation.diameter / iris_diameter
        } else {
            MISSING_VALUE
        };
        Self {
            frame_index,
            diameter: observation.diameter,
            confidence: observation.confidence,
            diameter_relative,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.diameter == MISSING_VALUE && self.confidence == MISSING_VALUE
    }
}

/// Paired measurements for one frame, produced by the online tracker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingFrame {
    pub frame_index: u64,
    pub left: PupilMeasurement,
    pub right: PupilMeasurement,
}

impl TrackingFrame {
    pub fn get(&self, eye: Eye) -> &PupilMeasurement {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }
}

/// One synchronized output row keyed by frame index
///
/// An absent side holds [`PupilMeasurement::missing`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub frame_index: u64,
    pub left: PupilMeasurement,
    pub right: PupilMeasurement,
}

impl OutputRecord {
    pub fn new(
        frame_index: u64,
        left: Option<PupilMeasurement>,
        right: Option<PupilMeasurement>,
    ) -> Self {
        Self {
            frame_index,
            left: left.unwrap_or_else(|| PupilMeasurement::missing(frame_index)),
            right: right.unwrap_or_else(|| PupilMeasurement::missing(frame_index)),
        }
    }
}

impl From<TrackingFrame> for OutputRecord {
    fn from(frame: TrackingFrame) -> Self {
        Self {
            frame_index: frame.frame_index,
            left: frame.left,
            right: frame.right,
        }
    }
}
