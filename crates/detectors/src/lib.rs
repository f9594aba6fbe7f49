//! # Detectors
//!
//! Collaborator implementations for the tracking pipeline.
//!
//! Responsibilities:
//! - Synthetic landmark detector with failure injection
//! - Replay of pre-recorded landmark packets
//! - Baseline threshold pupil detector
//! - Building the configured landmark source

pub mod error;
pub mod replay;
pub mod synthetic;
pub mod threshold;
mod worker;

use contracts::{LandmarkDetector, LandmarkSourceConfig, LandmarkSourceKind};

pub use contracts::{LandmarkPoller, PupilDetector};
pub use error::{DetectorError, Result};
pub use replay::ReplayLandmarkDetector;
pub use synthetic::{FaceLayout, SyntheticConfig, SyntheticLandmarkDetector, FACE_MESH_POINTS};
pub use threshold::{ThresholdConfig, ThresholdPupilDetector};
pub use worker::ChannelPoller;

/// Build the landmark detector selected by `[landmarks]`
pub fn landmark_detector_from_config(
    config: &LandmarkSourceConfig,
) -> Result<Box<dyn LandmarkDetector>> {
    match config.source {
        LandmarkSourceKind::Synthetic => Ok(Box::new(SyntheticLandmarkDetector::new(
            SyntheticConfig::from_source(config),
        ))),
        LandmarkSourceKind::Replay => {
            let path = config.replay_path.as_deref().ok_or_else(|| {
                contracts::ContractError::config_validation(
                    "landmarks.replay_path",
                    "required for replay source",
                )
            })?;
            let detector = ReplayLandmarkDetector::load(path)?
                .with_latency(std::time::Duration::from_millis(config.latency_ms));
            Ok(Box::new(detector))
        }
    }
}

/// Pupil detectors for the left and right eye
pub fn pupil_detector_pair() -> (Box<dyn PupilDetector>, Box<dyn PupilDetector>) {
    (
        Box::new(ThresholdPupilDetector::default()),
        Box::new(ThresholdPupilDetector::default()),
    )
}
