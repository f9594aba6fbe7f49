//! FrameSynchronizer - drives the landmark detector and derives eye crops.

use std::time::{Duration, Instant};

use contracts::{
    ContractError, Eye, EyesGeometry, Frame, LandmarkDetector, LandmarkPacket, SynchronizerConfig,
};
use image::GrayImage;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::crop::{crop_side, extract_eye_crop, EyeCrop};
use crate::mailbox::{LandmarkMailbox, PublishOutcome};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Created, detector not started
    Idle,
    /// Detector started, poller running
    Running,
    /// `stop()` has been called
    Stopped,
}

impl SyncState {
    fn as_str(self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Running => "running",
            SyncState::Stopped => "stopped",
        }
    }
}

/// Where the geometry of a processed frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkSource {
    /// Packet for this frame (or newer) arrived within the wait budget
    Fresh,
    /// Last known good packet reused
    Stale,
    /// No packet ever arrived; deterministic default geometry
    Synthesized,
}

impl LandmarkSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LandmarkSource::Fresh => "fresh",
            LandmarkSource::Stale => "stale",
            LandmarkSource::Synthesized => "synthesized",
        }
    }
}

/// Result of one `process()` call
#[derive(Debug)]
pub struct SyncOutput {
    pub frame_index: u64,
    pub source: LandmarkSource,
    pub geometry: EyesGeometry,
    pub left: Result<EyeCrop, ContractError>,
    pub right: Result<EyeCrop, ContractError>,
    /// Time spent waiting for a fresh landmark packet
    pub waited: Duration,
}

impl SyncOutput {
    pub fn into_crops(self) -> (Result<EyeCrop, ContractError>, Result<EyeCrop, ContractError>) {
        (self.left, self.right)
    }
}

/// Frame/landmark synchronizer
///
/// One frame at a time: submit to the detector, wait a bounded time for a
/// matching landmark packet, fall back to stale or synthesized geometry,
/// then crop both eyes.
pub struct FrameSynchronizer {
    config: SynchronizerConfig,
    detector: Box<dyn LandmarkDetector>,
    mailbox: LandmarkMailbox,
    poller: Option<JoinHandle<u64>>,
    state: SyncState,
    last_good: Option<LandmarkPacket>,
}

impl FrameSynchronizer {
    pub fn new(config: SynchronizerConfig, detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            config,
            detector,
            mailbox: LandmarkMailbox::new(),
            poller: None,
            state: SyncState::Idle,
            last_good: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Start the detector session and the background poller
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `Initialization` if the detector fails to start or no runtime is
    /// available; `InvalidState` if not idle.
    #[instrument(name = "frame_sync_init", skip(self), fields(detector = %self.detector.name()))]
    pub fn init(&mut self) -> Result<(), ContractError> {
        if self.state != SyncState::Idle {
            return Err(ContractError::invalid_state(
                "frame synchronizer",
                self.state.as_str(),
                "init",
            ));
        }

        let runtime = Handle::try_current()
            .map_err(|e| ContractError::initialization("frame_sync", e.to_string()))?;
        let mut poller = self.detector.start()?;
        let mailbox = self.mailbox.clone();

        self.poller = Some(runtime.spawn_blocking(move || {
            let mut stored = 0u64;
            while let Some(packet) = poller.poll_next() {
                match mailbox.try_publish(packet) {
                    PublishOutcome::Stored | PublishOutcome::Overwrote => stored += 1,
                    PublishOutcome::Dropped | PublishOutcome::Ignored => {}
                }
            }
            stored
        }));

        self.state = SyncState::Running;
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_poll_attempts = self.config.max_poll_attempts,
            "Frame synchronizer running"
        );
        Ok(())
    }

    /// Process one frame
    ///
    /// # Errors
    /// `DetectorSubmit` if the frame could not be handed to the detector,
    /// `InvalidState` outside the running state. Per-eye crop failures are
    /// reported inside [`SyncOutput`].
    #[instrument(
        name = "frame_sync_process",
        level = "debug",
        skip(self, frame),
        fields(frame_index = frame.index)
    )]
    pub async fn process(&mut self, frame: &Frame) -> Result<SyncOutput, ContractError> {
        if self.state != SyncState::Running {
            return Err(ContractError::invalid_state(
                "frame synchronizer",
                self.state.as_str(),
                "process",
            ));
        }

        self.detector.submit(frame, frame.index)?;

        let started = Instant::now();
        let fresh = wait_for_fresh(&self.mailbox, &self.config, frame.index).await;
        let waited = started.elapsed();
        observability::record_landmark_wait_ms(waited.as_secs_f64() * 1000.0);

        let (source, geometry) = self.select_geometry(fresh, frame);
        observability::record_landmark_source(source.as_str());

        let gray = frame.pixels.to_gray();
        let left = self.crop(&gray, Eye::Left, &geometry);
        let right = self.crop(&gray, Eye::Right, &geometry);

        Ok(SyncOutput {
            frame_index: frame.index,
            source,
            geometry,
            left,
            right,
            waited,
        })
    }

    fn select_geometry(
        &mut self,
        fresh: Option<LandmarkPacket>,
        frame: &Frame,
    ) -> (LandmarkSource, EyesGeometry) {
        let (width, height) = (frame.width(), frame.height());

        if let Some(packet) = fresh {
            match packet.eyes_geometry(width, height) {
                Ok(geometry) => {
                    debug!(
                        frame_index = frame.index,
                        packet_ts = packet.timestamp,
                        "Fresh landmarks"
                    );
                    self.last_good = Some(packet);
                    return (LandmarkSource::Fresh, geometry);
                }
                Err(e) => {
                    warn!(frame_index = frame.index, error = %e, "Discarding malformed landmark packet");
                }
            }
        } else {
            warn!(
                frame_index = frame.index,
                budget_ms = self.config.wait_budget().as_millis() as u64,
                "No fresh landmarks within wait budget"
            );
        }

        if let Some(geometry) = self
            .last_good
            .as_ref()
            .and_then(|packet| packet.eyes_geometry(width, height).ok())
        {
            return (LandmarkSource::Stale, geometry);
        }

        (LandmarkSource::Synthesized, self.synthesized(width, height))
    }

    fn synthesized(&self, width: u32, height: u32) -> EyesGeometry {
        EyesGeometry::synthesized(
            width,
            height,
            self.config.min_default_diameter_px,
            self.config.default_diameter_width_fraction,
        )
    }

    fn crop(
        &self,
        gray: &GrayImage,
        eye: Eye,
        geometry: &EyesGeometry,
    ) -> Result<EyeCrop, ContractError> {
        let iris = geometry.get(eye);
        let padding = self.config.crop_padding_px;
        // online mode: canvas follows the current frame's iris
        let canvas = crop_side(iris.diameter, padding);
        extract_eye_crop(gray, eye, iris, padding, canvas).inspect_err(|e| {
            observability::record_crop_failure(eye.as_str());
            warn!(eye = %eye, error = %e, "Eye crop failed");
        })
    }

    /// Signal end of input, join the poller and wait for the detector to drain
    ///
    /// The synchronizer is stopped afterwards even when an error is returned.
    ///
    /// # Errors
    /// `DetectorShutdown` when the detector or poller did not finish cleanly.
    #[instrument(name = "frame_sync_stop", skip(self))]
    pub async fn stop(&mut self) -> Result<(), ContractError> {
        if self.state != SyncState::Running {
            self.state = SyncState::Stopped;
            return Ok(());
        }
        self.state = SyncState::Stopped;

        let mut failures = Vec::new();
        if let Err(e) = self.detector.close_input() {
            failures.push(format!("close input: {e}"));
        }

        if let Some(poller) = self.poller.take() {
            match poller.await {
                Ok(stored) => debug!(packets = stored, "Landmark poller finished"),
                Err(e) => failures.push(format!("poller task: {e}")),
            }
        }

        if let Err(e) = self.detector.wait_until_done() {
            failures.push(format!("drain: {e}"));
        }

        info!(
            contention_drops = self.mailbox.contention_drops(),
            published = self.mailbox.published(),
            "Frame synchronizer stopped"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContractError::detector_shutdown(failures.join("; ")))
        }
    }
}

impl Drop for FrameSynchronizer {
    fn drop(&mut self) {
        // unblock the poller thread if stop() was never called
        if self.state == SyncState::Running {
            let _ = self.detector.close_input();
        }
    }
}

/// Poll the mailbox until a packet with `timestamp >= frame_index` shows
/// up or the budget (`interval * attempts`) is spent
///
/// Must not borrow the synchronizer: the detector box is not `Sync`.
async fn wait_for_fresh(
    mailbox: &LandmarkMailbox,
    config: &SynchronizerConfig,
    frame_index: u64,
) -> Option<LandmarkPacket> {
    let interval = config.poll_interval();
    let attempts = config.max_poll_attempts;

    let poll = async {
        for _ in 0..attempts {
            if let Some(packet) = mailbox.take_fresh(frame_index) {
                return Some(packet);
            }
            tokio::time::sleep(interval).await;
        }
        None
    };

    tokio::time::timeout(config.wait_budget(), poll)
        .await
        .ok()
        .flatten()
}
