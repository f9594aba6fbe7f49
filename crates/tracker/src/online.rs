//! PupilTracker - online, one frame at a time.

use std::path::{Path, PathBuf};

use aligner::{RecordDispatcher, StreamAligner};
use contracts::{
    ContractError, Eye, Frame, LandmarkDetector, PupilDetector, PupilMeasurement, TrackerConfig,
    TrackingFrame, TrackingMode,
};
use enhancer::ImageEnhancer;
use frame_sync::{EyeCrop, FrameSynchronizer, SyncOutput};
use observability::TrackingStatsAggregator;
use tracing::{info, instrument, warn};

use crate::measure::EyeMeasurer;
use crate::summary::SessionSummary;

/// Base name used when the configuration leaves it empty
pub const DEFAULT_BASE_NAME: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    Created,
    Running,
    Stopped,
}

impl TrackerState {
    fn as_str(self) -> &'static str {
        match self {
            TrackerState::Created => "created",
            TrackerState::Running => "running",
            TrackerState::Stopped => "stopped",
        }
    }
}

/// Online pupil tracker
///
/// # Example
///
/// ```ignore
/// let mut tracker = PupilTracker::new(config, landmarks, left, right, 640, 480);
/// tracker.init().await?;
/// for frame in frames {
///     let tracked = tracker.process(&frame).await?;
/// }
/// let summary = tracker.stop().await;
/// ```
pub struct PupilTracker {
    config: TrackerConfig,
    width: u32,
    height: u32,
    sync: FrameSynchronizer,
    left: EyeMeasurer,
    right: EyeMeasurer,
    frames: Vec<TrackingFrame>,
    stats: TrackingStatsAggregator,
    dispatcher: Option<RecordDispatcher>,
    state: TrackerState,
    summary: Option<SessionSummary>,
}

impl PupilTracker {
    pub fn new(
        config: TrackerConfig,
        landmark_detector: Box<dyn LandmarkDetector>,
        left_pupil: Box<dyn PupilDetector>,
        right_pupil: Box<dyn PupilDetector>,
        width: u32,
        height: u32,
    ) -> Self {
        let sync = FrameSynchronizer::new(config.synchronizer.clone(), landmark_detector);
        let left = EyeMeasurer::new(Eye::Left, ImageEnhancer::new(&config.enhancer), left_pupil);
        let right = EyeMeasurer::new(
            Eye::Right,
            ImageEnhancer::new(&config.enhancer),
            right_pupil,
        );

        Self {
            config,
            width,
            height,
            sync,
            left,
            right,
            frames: Vec::new(),
            stats: TrackingStatsAggregator::new(),
            dispatcher: None,
            state: TrackerState::Created,
            summary: None,
        }
    }

    /// Override the output base name
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.config.output.base_name = base_name.into();
        self
    }

    pub fn base_name(&self) -> &str {
        if self.config.output.base_name.is_empty() {
            DEFAULT_BASE_NAME
        } else {
            &self.config.output.base_name
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output.dir
    }

    /// Paths of the files this session writes
    pub fn output_files(&self) -> Vec<PathBuf> {
        let stem = format!("{}{}", self.base_name(), aligner::OUTPUT_SUFFIX);
        let output = &self.config.output;
        let mut files = Vec::new();
        if output.csv {
            files.push(output.dir.join(format!("{stem}.csv")));
        }
        if output.stream {
            files.push(output.dir.join(format!("{stem}.stream")));
            files.push(output.dir.join(format!("{stem}.stream~")));
        }
        files
    }

    /// Frames tracked so far
    pub fn frames(&self) -> &[TrackingFrame] {
        &self.frames
    }

    /// Start the synchronizer and open the output sinks
    ///
    /// # Errors
    /// `Initialization` when the detector cannot start, `Io` or
    /// `SinkCreation` when the outputs cannot be created.
    #[instrument(
        name = "tracker_init",
        skip(self),
        fields(mode = ?self.config.mode, width = self.width, height = self.height)
    )]
    pub async fn init(&mut self) -> Result<(), ContractError> {
        if self.state != TrackerState::Created {
            return Err(ContractError::invalid_state(
                "tracker",
                self.state.as_str(),
                "init",
            ));
        }

        if self.config.mode == TrackingMode::FullFace {
            self.sync.init()?;
        }

        if self.config.output.any_enabled() {
            let dir = self.config.output.dir.clone();
            let base_name = self.base_name().to_string();
            tokio::fs::create_dir_all(&dir).await?;
            let dispatcher =
                RecordDispatcher::from_output_config(&self.config.output, &dir, &base_name)
                    .await?;
            self.dispatcher = Some(dispatcher);
        }

        self.state = TrackerState::Running;
        observability::record_session_started();
        info!(
            base_name = self.base_name(),
            outputs = self.dispatcher.is_some(),
            "Tracking session started"
        );
        Ok(())
    }

    /// Track one frame
    ///
    /// Submit and crop failures become missing measurements; the frame is
    /// still recorded.
    ///
    /// # Errors
    /// `InvalidState` outside a running session, `InvalidFrame` when the frame
    /// does not match the session dimensions.
    #[instrument(
        name = "tracker_process",
        level = "debug",
        skip(self, frame),
        fields(frame_index = frame.index)
    )]
    pub async fn process(&mut self, frame: &Frame) -> Result<TrackingFrame, ContractError> {
        if self.state != TrackerState::Running {
            return Err(ContractError::invalid_state(
                "tracker",
                self.state.as_str(),
                "process",
            ));
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(ContractError::invalid_frame(format!(
                "expected {}x{}, got {}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height()
            )));
        }

        let (tracked, source, wait_ms) = match self.config.mode {
            TrackingMode::FullFace => match self.sync.process(frame).await {
                Ok(output) => {
                    let source = output.source.as_str();
                    let wait_ms = output.waited.as_secs_f64() * 1000.0;
                    (self.measure_both(output), source, wait_ms)
                }
                Err(e @ ContractError::DetectorSubmit { .. }) => {
                    warn!(frame_index = frame.index, error = %e, "Frame not tracked");
                    (missing_frame(frame.index), "failed", 0.0)
                }
                Err(e) => return Err(e),
            },
            TrackingMode::SingleEye => (self.measure_single(frame), "direct", 0.0),
        };

        observability::record_frame_processed(frame.index);
        self.stats.update(source, &tracked, wait_ms);
        self.frames.push(tracked);
        Ok(tracked)
    }

    fn measure_both(&mut self, output: SyncOutput) -> TrackingFrame {
        let frame_index = output.frame_index;
        let (left_crop, right_crop) = output.into_crops();

        let left = measure_crop(&mut self.left, frame_index, left_crop);
        let right = measure_crop(&mut self.right, frame_index, right_crop);
        TrackingFrame {
            frame_index,
            left,
            right,
        }
    }

    /// The frame is already an eye crop; iris size unknown
    fn measure_single(&mut self, frame: &Frame) -> TrackingFrame {
        let gray = frame.pixels.to_gray();
        let measurement = self.left.measure(frame.index, &gray, 1.0);
        TrackingFrame {
            frame_index: frame.index,
            left: measurement,
            right: measurement,
        }
    }

    /// Stop the synchronizer and write every tracked frame to the sinks
    ///
    /// Outputs are written even when the detector does not shut down cleanly.
    /// Calling `stop` again returns the same summary.
    #[instrument(name = "tracker_stop", skip(self), fields(frames = self.frames.len()))]
    pub async fn stop(&mut self) -> SessionSummary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }

        let mut clean = true;
        if self.state == TrackerState::Running {
            if let Err(e) = self.sync.stop().await {
                warn!(error = %e, "Detector did not shut down cleanly");
                clean = false;
            }
        }
        self.state = TrackerState::Stopped;

        if let Some(dispatcher) = self.dispatcher.take() {
            let records = StreamAligner::from_tracking_frames(&self.frames);
            let delivered = dispatcher.write_all(&records).await;
            let report = dispatcher.shutdown().await;
            clean &= delivered && report.is_clean();
        }

        let summary = SessionSummary::from_tracking(self.stats.summary(), clean);
        info!(
            frames = summary.frames,
            landmark_frames = summary.landmark_frames,
            detection_rate = summary.detection_rate,
            clean_shutdown = summary.clean_shutdown,
            "Tracking session stopped"
        );
        self.summary = Some(summary.clone());
        summary
    }
}

fn measure_crop(
    measurer: &mut EyeMeasurer,
    frame_index: u64,
    crop: Result<EyeCrop, ContractError>,
) -> PupilMeasurement {
    match crop {
        Ok(crop) => measurer.measure(frame_index, &crop.image, crop.iris.diameter),
        Err(e) => {
            warn!(frame_index, eye = %measurer.eye(), error = %e, "Eye not measured");
            PupilMeasurement::missing(frame_index)
        }
    }
}

fn missing_frame(frame_index: u64) -> TrackingFrame {
    TrackingFrame {
        frame_index,
        left: PupilMeasurement::missing(frame_index),
        right: PupilMeasurement::missing(frame_index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutputConfig, PixelBuffer, PixelFormat, MISSING_VALUE};
    use detectors::{SyntheticConfig, SyntheticLandmarkDetector, ThresholdPupilDetector};
    use std::time::Duration;

    fn config(dir: &Path) -> TrackerConfig {
        TrackerConfig {
            output: OutputConfig {
                dir: dir.to_path_buf(),
                base_name: "unit".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn tracker(config: TrackerConfig, synthetic: SyntheticConfig) -> PupilTracker {
        PupilTracker::new(
            config,
            Box::new(SyntheticLandmarkDetector::new(synthetic)),
            Box::new(ThresholdPupilDetector::default()),
            Box::new(ThresholdPupilDetector::default()),
            320,
            240,
        )
    }

    fn frame(index: u64) -> Frame {
        Frame::new(index, PixelBuffer::zeroed(320, 240, PixelFormat::Bgr8))
    }

    #[tokio::test]
    async fn test_process_before_init_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(config(dir.path()), SyntheticConfig::default());
        let err = tracker.process(&frame(0)).await.unwrap_err();
        assert!(matches!(err, ContractError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_session_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let synthetic = SyntheticConfig {
            latency: Duration::from_millis(1),
            ..Default::default()
        };
        let mut tracker = tracker(config(dir.path()), synthetic);
        tracker.init().await.unwrap();

        for i in 0..4 {
            let tracked = tracker.process(&frame(i)).await.unwrap();
            assert_eq!(tracked.frame_index, i);
        }
        let summary = tracker.stop().await;

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.landmark_frames, 4);
        assert!(summary.clean_shutdown);
        for path in tracker.output_files() {
            assert!(path.exists(), "{} missing", path.display());
        }

        let csv = std::fs::read_to_string(dir.path().join("unit_PUPIL_DATA.csv")).unwrap();
        let records = aligner::parse_csv(&csv).unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_submit_failure_yields_missing_frame() {
        let dir = tempfile::tempdir().unwrap();
        let synthetic = SyntheticConfig {
            latency: Duration::from_millis(1),
            fail_submit: vec![1],
            ..Default::default()
        };
        let mut tracker = tracker(config(dir.path()), synthetic);
        tracker.init().await.unwrap();

        tracker.process(&frame(0)).await.unwrap();
        let failed = tracker.process(&frame(1)).await.unwrap();
        assert_eq!(failed.left.diameter, MISSING_VALUE);
        assert_eq!(failed.right.diameter, MISSING_VALUE);

        let summary = tracker.stop().await;
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.landmark_frames, 1);
    }

    #[tokio::test]
    async fn test_wrong_frame_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(config(dir.path()), SyntheticConfig::default());
        tracker.init().await.unwrap();

        let small = Frame::new(0, PixelBuffer::zeroed(10, 10, PixelFormat::Bgr8));
        let err = tracker.process(&small).await.unwrap_err();
        assert!(matches!(err, ContractError::InvalidFrame { .. }));
        tracker.stop().await;
    }

    #[tokio::test]
    async fn test_single_eye_mode_mirrors_measurement() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.mode = TrackingMode::SingleEye;
        config.output.csv = false;
        config.output.stream = false;
        let mut tracker = tracker(config, SyntheticConfig::default());
        tracker.init().await.unwrap();

        let tracked = tracker.process(&frame(0)).await.unwrap();
        assert_eq!(tracked.left, tracked.right);

        let summary = tracker.stop().await;
        assert_eq!(summary.frames, 1);
        assert!(tracker.output_files().is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(config(dir.path()), SyntheticConfig::default());
        tracker.init().await.unwrap();
        tracker.process(&frame(0)).await.unwrap();

        let first = tracker.stop().await;
        let second = tracker.stop().await;
        assert_eq!(first.frames, second.frames);
        assert!(tracker.process(&frame(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_drain_still_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let synthetic = SyntheticConfig {
            latency: Duration::from_millis(1),
            fail_drain: true,
            ..Default::default()
        };
        let mut tracker = tracker(config(dir.path()), synthetic);
        tracker.init().await.unwrap();
        for i in 0..3 {
            tracker.process(&frame(i)).await.unwrap();
        }

        let summary = tracker.stop().await;
        assert_eq!(summary.frames, 3);
        assert!(!summary.clean_shutdown);

        let csv = std::fs::read_to_string(dir.path().join("unit_PUPIL_DATA.csv")).unwrap();
        assert_eq!(aligner::parse_csv(&csv).unwrap().len(), 3);
        let data = std::fs::read(dir.path().join("unit_PUPIL_DATA.stream~")).unwrap();
        assert_eq!(data.len(), 3 * 6 * 4);
        assert!(dir.path().join("unit_PUPIL_DATA.stream").exists());
    }

    #[tokio::test]
    async fn test_detector_start_failure_aborts_init() {
        let dir = tempfile::tempdir().unwrap();
        let synthetic = SyntheticConfig {
            fail_start: true,
            ..Default::default()
        };
        let mut tracker = tracker(config(dir.path()), synthetic);

        let err = tracker.init().await.unwrap_err();
        assert!(matches!(err, ContractError::Initialization { .. }));
        let err = tracker.process(&frame(0)).await.unwrap_err();
        assert!(matches!(err, ContractError::InvalidState { .. }));
        assert!(tracker.frames().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
