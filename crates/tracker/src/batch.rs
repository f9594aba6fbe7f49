//! BatchTracker - two passes over a whole recording.
//!
//! Pass one collects landmarks for every frame. Gaps are filled by carrying
//! the last valid geometry forward, and the largest iris diameter of the
//! recording fixes the crop canvas. Pass two measures each eye on its own
//! blocking worker; the two gappy sequences are then aligned.

use std::collections::HashMap;
use std::sync::Arc;

use aligner::{RecordDispatcher, StreamAligner};
use contracts::{
    ContractError, Eye, EyesGeometry, Frame, LandmarkDetector, LandmarkPacket, OutputRecord,
    PupilDetector, PupilMeasurement, TrackerConfig, TrackingMode,
};
use enhancer::ImageEnhancer;
use frame_sync::{crop_side, extract_eye_crop};
use observability::TrackingStatsAggregator;
use tokio::task;
use tracing::{debug, info, instrument, warn};

use crate::measure::EyeMeasurer;
use crate::online::DEFAULT_BASE_NAME;
use crate::summary::SessionSummary;

/// Result of a batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: SessionSummary,
    /// Aligned records, one per frame index
    pub records: Vec<OutputRecord>,
    /// Side of every eye crop
    pub canvas_side: u32,
}

/// Offline two-pass tracker
pub struct BatchTracker {
    config: TrackerConfig,
    landmark_detector: Box<dyn LandmarkDetector>,
    left_pupil: Box<dyn PupilDetector>,
    right_pupil: Box<dyn PupilDetector>,
}

impl BatchTracker {
    pub fn new(
        config: TrackerConfig,
        landmark_detector: Box<dyn LandmarkDetector>,
        left_pupil: Box<dyn PupilDetector>,
        right_pupil: Box<dyn PupilDetector>,
    ) -> Self {
        Self {
            config,
            landmark_detector,
            left_pupil,
            right_pupil,
        }
    }

    /// Track `frames` and write the configured outputs
    ///
    /// # Errors
    /// `Initialization` when the landmark detector cannot start, `Io` or
    /// `SinkCreation` when the outputs cannot be created.
    #[instrument(name = "batch_run", skip(self, frames), fields(frames = frames.len()))]
    pub async fn run(self, frames: Vec<Frame>) -> Result<BatchOutcome, ContractError> {
        let Self {
            config,
            mut landmark_detector,
            left_pupil,
            right_pupil,
        } = self;
        observability::record_session_started();

        let frames = Arc::new(frames);
        let total = frames.len() as u64;

        let (geometry, fresh, clean_detector) = match config.mode {
            TrackingMode::FullFace => {
                let (packets, clean) = collect_landmarks(&mut landmark_detector, &frames).await?;
                let (geometry, fresh) = carry_forward(&config, &frames, &packets);
                let extracted = fresh.iter().filter(|f| **f).count();
                info!("Extracted landmarks from {extracted} out of {total} frames");
                (geometry, fresh, clean)
            }
            TrackingMode::SingleEye => (Vec::new(), Vec::new(), true),
        };
        let geometry = Arc::new(geometry);

        let max_diameter = geometry
            .iter()
            .map(EyesGeometry::max_diameter)
            .fold(0.0f32, f32::max);
        let canvas_side = crop_side(max_diameter, config.synchronizer.crop_padding_px);
        debug!(max_diameter, canvas_side, "Crop canvas fixed");

        let left = EyeMeasurer::new(Eye::Left, ImageEnhancer::new(&config.enhancer), left_pupil);
        let right = EyeMeasurer::new(Eye::Right, ImageEnhancer::new(&config.enhancer), right_pupil);
        let padding = config.synchronizer.crop_padding_px;

        let records = match config.mode {
            TrackingMode::FullFace => {
                let left_worker = spawn_eye_worker(left, &frames, &geometry, padding, canvas_side);
                let right_worker =
                    spawn_eye_worker(right, &frames, &geometry, padding, canvas_side);
                let left_seq = join_worker(left_worker).await?;
                let right_seq = join_worker(right_worker).await?;
                debug!(left = left_seq.len(), right = right_seq.len(), "Eyes measured");
                StreamAligner::merge(&left_seq, &right_seq)
            }
            TrackingMode::SingleEye => {
                let worker = spawn_single_eye_worker(left, &frames);
                let measured = join_worker(worker).await?;
                measured
                    .into_iter()
                    .map(|m| OutputRecord::new(m.frame_index, Some(m), Some(m)))
                    .collect()
            }
        };

        let stats = batch_stats(config.mode, &frames, &fresh, &records);

        let clean_outputs = write_outputs(&config, &records).await?;
        let summary =
            SessionSummary::from_tracking(stats.summary(), clean_detector && clean_outputs);
        info!(
            records = records.len(),
            canvas_side,
            clean_shutdown = summary.clean_shutdown,
            "Batch tracking finished"
        );

        Ok(BatchOutcome {
            summary,
            records,
            canvas_side,
        })
    }
}

/// Pass one: feed every frame to the detector and gather whatever comes back
async fn collect_landmarks(
    detector: &mut Box<dyn LandmarkDetector>,
    frames: &[Frame],
) -> Result<(HashMap<u64, LandmarkPacket>, bool), ContractError> {
    let mut poller = detector.start()?;
    let collector = task::spawn_blocking(move || {
        let mut packets = HashMap::new();
        while let Some(packet) = poller.poll_next() {
            if !packet.is_empty() {
                packets.insert(packet.timestamp, packet);
            }
        }
        packets
    });

    for frame in frames {
        if let Err(e) = detector.submit(frame, frame.index) {
            warn!(frame_index = frame.index, error = %e, "Frame skipped by landmark detector");
        }
    }

    let mut clean = detector.close_input().is_ok();
    let packets = collector
        .await
        .map_err(|e| ContractError::detector_shutdown(format!("landmark collector: {e}")))?;
    if let Err(e) = detector.wait_until_done() {
        warn!(error = %e, "Landmark detector did not drain cleanly");
        clean = false;
    }
    Ok((packets, clean))
}

/// Per-frame geometry with gaps filled; second vector marks fresh frames
fn carry_forward(
    config: &TrackerConfig,
    frames: &[Frame],
    packets: &HashMap<u64, LandmarkPacket>,
) -> (Vec<EyesGeometry>, Vec<bool>) {
    let sync = &config.synchronizer;
    let mut last: Option<EyesGeometry> = None;
    let mut geometry = Vec::with_capacity(frames.len());
    let mut fresh = Vec::with_capacity(frames.len());

    for frame in frames {
        let (width, height) = (frame.width(), frame.height());
        let found = packets
            .get(&frame.index)
            .and_then(|p| match p.eyes_geometry(width, height) {
                Ok(g) => Some(g),
                Err(e) => {
                    warn!(frame_index = frame.index, error = %e, "Discarding malformed landmark packet");
                    None
                }
            });

        fresh.push(found.is_some());
        if found.is_some() {
            last = found;
        }
        geometry.push(last.unwrap_or_else(|| {
            EyesGeometry::synthesized(
                width,
                height,
                sync.min_default_diameter_px,
                sync.default_diameter_width_fraction,
            )
        }));
    }
    (geometry, fresh)
}

/// Landmark source per input frame, keyed by frame index
///
/// Rows the merge padded in for indices that were never input are skipped.
fn batch_stats(
    mode: TrackingMode,
    frames: &[Frame],
    fresh: &[bool],
    records: &[OutputRecord],
) -> TrackingStatsAggregator {
    let by_index: HashMap<u64, bool> = frames
        .iter()
        .map(|frame| frame.index)
        .zip(fresh.iter().copied())
        .collect();
    let first_fresh = frames
        .iter()
        .zip(fresh)
        .find(|(_, fresh)| **fresh)
        .map(|(frame, _)| frame.index);

    let mut stats = TrackingStatsAggregator::new();
    for record in records {
        let index = record.frame_index;
        let source = match mode {
            TrackingMode::SingleEye => "direct",
            TrackingMode::FullFace => match by_index.get(&index) {
                Some(true) => "fresh",
                Some(false) if first_fresh.is_none_or(|first| index < first) => "synthesized",
                Some(false) => "stale",
                None => continue,
            },
        };
        let tracking = contracts::TrackingFrame {
            frame_index: index,
            left: record.left,
            right: record.right,
        };
        stats.update(source, &tracking, 0.0);
    }
    stats
}

type EyeWorker = task::JoinHandle<Vec<PupilMeasurement>>;

/// Pass two for one eye; crops that fail are left out
fn spawn_eye_worker(
    mut measurer: EyeMeasurer,
    frames: &Arc<Vec<Frame>>,
    geometry: &Arc<Vec<EyesGeometry>>,
    padding: u32,
    canvas_side: u32,
) -> EyeWorker {
    let frames = Arc::clone(frames);
    let geometry = Arc::clone(geometry);
    task::spawn_blocking(move || {
        let eye = measurer.eye();
        let mut measured = Vec::with_capacity(frames.len());
        for (frame, eyes) in frames.iter().zip(geometry.iter()) {
            let gray = frame.pixels.to_gray();
            match extract_eye_crop(&gray, eye, eyes.get(eye), padding, canvas_side) {
                Ok(crop) => {
                    measured.push(measurer.measure(frame.index, &crop.image, crop.iris.diameter))
                }
                Err(e) => {
                    observability::record_crop_failure(eye.as_str());
                    warn!(frame_index = frame.index, eye = %eye, error = %e, "Eye crop failed");
                }
            }
        }
        measured
    })
}

fn spawn_single_eye_worker(mut measurer: EyeMeasurer, frames: &Arc<Vec<Frame>>) -> EyeWorker {
    let frames = Arc::clone(frames);
    task::spawn_blocking(move || {
        frames
            .iter()
            .map(|frame| measurer.measure(frame.index, &frame.pixels.to_gray(), 1.0))
            .collect()
    })
}

async fn join_worker(worker: EyeWorker) -> Result<Vec<PupilMeasurement>, ContractError> {
    worker
        .await
        .map_err(|e| ContractError::Other(format!("eye worker failed: {e}")))
}

async fn write_outputs(
    config: &TrackerConfig,
    records: &[OutputRecord],
) -> Result<bool, ContractError> {
    if !config.output.any_enabled() {
        return Ok(true);
    }

    let dir = &config.output.dir;
    tokio::fs::create_dir_all(dir).await?;
    let base_name = if config.output.base_name.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        &config.output.base_name
    };

    let dispatcher = RecordDispatcher::from_output_config(&config.output, dir, base_name).await?;
    let delivered = dispatcher.write_all(records).await;
    let report = dispatcher.shutdown().await;
    Ok(delivered && report.is_clean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutputConfig, PixelBuffer, PixelFormat, MISSING_VALUE};
    use detectors::{
        FaceLayout, ReplayLandmarkDetector, SyntheticConfig, SyntheticLandmarkDetector,
        ThresholdPupilDetector,
    };
    use std::time::Duration;

    fn frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(i, PixelBuffer::zeroed(320, 240, PixelFormat::Gray8)))
            .collect()
    }

    fn config(dir: &std::path::Path) -> TrackerConfig {
        TrackerConfig {
            output: OutputConfig {
                dir: dir.to_path_buf(),
                base_name: "batch".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn tracker(config: TrackerConfig, detector: Box<dyn LandmarkDetector>) -> BatchTracker {
        BatchTracker::new(
            config,
            detector,
            Box::new(ThresholdPupilDetector::default()),
            Box::new(ThresholdPupilDetector::default()),
        )
    }

    #[tokio::test]
    async fn test_dense_records_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let synthetic = SyntheticLandmarkDetector::new(SyntheticConfig {
            latency: Duration::ZERO,
            drop_every: 2,
            ..Default::default()
        });

        let outcome = tracker(config(dir.path()), Box::new(synthetic))
            .run(frames(6))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 6);
        for (i, record) in outcome.records.iter().enumerate() {
            assert_eq!(record.frame_index, i as u64);
        }
        assert_eq!(outcome.summary.frames, 6);
        assert_eq!(outcome.summary.landmark_frames, 3);
        assert!(outcome.summary.clean_shutdown);
        assert!(dir.path().join("batch_PUPIL_DATA.csv").exists());
        assert!(dir.path().join("batch_PUPIL_DATA.stream").exists());
    }

    #[tokio::test]
    async fn test_stats_follow_frame_indices() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.output.csv = false;
        config.output.stream = false;
        let synthetic = SyntheticLandmarkDetector::new(SyntheticConfig {
            latency: Duration::ZERO,
            ..Default::default()
        });
        let frames: Vec<Frame> = (10..16)
            .map(|i| Frame::new(i, PixelBuffer::zeroed(320, 240, PixelFormat::Gray8)))
            .collect();

        let outcome = tracker(config, Box::new(synthetic)).run(frames).await.unwrap();

        // rows before the first input index are sentinel padding
        assert_eq!(outcome.records.len(), 16);
        assert_eq!(outcome.records[0].left.diameter, MISSING_VALUE);
        assert_eq!(outcome.summary.frames, 6);
        assert_eq!(outcome.summary.landmark_frames, 6);
        assert_eq!(outcome.summary.detection_rate, 100.0);
    }

    #[test]
    fn test_carry_forward_fills_gaps() {
        let config = TrackerConfig::default();
        let frames = frames(5);
        let points = |d: f32| {
            detectors::synthetic::layout_points(
                &FaceLayout {
                    iris_diameter: d,
                    ..Default::default()
                },
                320.0 / 240.0,
            )
        };
        let packets: HashMap<u64, LandmarkPacket> = [
            (1, LandmarkPacket::new(1, points(0.05))),
            (3, LandmarkPacket::new(3, points(0.1))),
        ]
        .into_iter()
        .collect();

        let (geometry, fresh) = carry_forward(&config, &frames, &packets);
        assert_eq!(fresh, vec![false, true, false, true, false]);

        let synthesized = EyesGeometry::synthesized(320, 240, 30.0, 0.01);
        assert_eq!(geometry[0], synthesized);
        assert_eq!(geometry[2], geometry[1]);
        assert_eq!(geometry[4], geometry[3]);
        assert!((geometry[3].left.diameter - 32.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_canvas_from_global_max_diameter() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.output.csv = false;
        config.output.stream = false;

        let layout = |d: f32| FaceLayout {
            iris_diameter: d,
            ..Default::default()
        };
        let packets = vec![
            LandmarkPacket::new(0, detectors::synthetic::layout_points(&layout(0.05), 4.0 / 3.0)),
            LandmarkPacket::new(1, detectors::synthetic::layout_points(&layout(0.1), 4.0 / 3.0)),
        ];
        let replay = ReplayLandmarkDetector::from_packets(packets);

        let outcome = tracker(config, Box::new(replay)).run(frames(3)).await.unwrap();
        // widest iris: 0.1 * 320 = 32px, up to float rounding
        let expected = crop_side(31.999, 40)..=crop_side(32.001, 40);
        assert!(expected.contains(&outcome.canvas_side), "{}", outcome.canvas_side);
        assert_eq!(outcome.records.len(), 3);
        assert_ne!(outcome.records[2].left.diameter, MISSING_VALUE);
    }
}
