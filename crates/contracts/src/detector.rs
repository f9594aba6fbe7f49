//! Collaborator traits - external detector interfaces
//!
//! The landmark model and the pupil ellipse fit are external. The tracking
//! crates only see these traits, so real bindings, synthetic detectors and
//! replays are interchangeable.

use image::GrayImage;

use crate::{ContractError, Frame, LandmarkPacket, PupilObservation};

/// Blocking reader side of a started landmark detector
///
/// Runs on a dedicated blocking task. Not every submitted frame yields a
/// packet.
pub trait LandmarkPoller: Send {
    /// Block until the next packet is available
    ///
    /// Returns `None` once the detector has drained after `close_input`.
    fn poll_next(&mut self) -> Option<LandmarkPacket>;
}

/// Perception-pipeline collaborator
///
/// # Example
///
/// ```ignore
/// let mut poller = detector.start()?;
/// detector.submit(&frame, frame.index)?;
/// while let Some(packet) = poller.poll_next() {
///     // ...
/// }
/// detector.close_input()?;
/// detector.wait_until_done()?;
/// ```
pub trait LandmarkDetector: Send {
    /// Detector name (used for logging)
    fn name(&self) -> &str;

    /// Start the detector session and hand out its output poller
    ///
    /// # Errors
    /// `Initialization` when the session cannot be created.
    fn start(&mut self) -> Result<Box<dyn LandmarkPoller>, ContractError>;

    /// Non-blocking handoff of one frame tagged with `timestamp`
    fn submit(&mut self, frame: &Frame, timestamp: u64) -> Result<(), ContractError>;

    /// Signal end of input
    fn close_input(&mut self) -> Result<(), ContractError>;

    /// Block until every submitted frame has been processed
    fn wait_until_done(&mut self) -> Result<(), ContractError>;
}

/// Ellipse-fit collaborator
pub trait PupilDetector: Send {
    /// Detector name (used for logging)
    fn name(&self) -> &str;

    /// Measure the pupil in a grayscale eye crop
    ///
    /// `counter` is incremented by the caller once per call.
    fn detect(&mut self, image: &GrayImage, counter: u64) -> PupilObservation;
}
