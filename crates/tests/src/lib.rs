//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载与默认值
//! - 在线 / 批处理追踪端到端（合成关键点检测器，输出文件落盘）
//! - TCP 协议往返

use contracts::{Frame, PixelBuffer};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Background and pupil gray levels of the generated faces
const SKIN: u8 = 180;
const PUPIL: u8 = 20;

/// Gray face with one dark disk per eye at the given relative centers
pub fn face_frame(
    index: u64,
    width: u32,
    height: u32,
    centers: [(f32, f32); 2],
    pupil_radius: f32,
) -> Frame {
    let centers = centers.map(|(x, y)| (x * width as f32, y * height as f32));
    let image = GrayImage::from_fn(width, height, |x, y| {
        let inside = centers.iter().any(|(cx, cy)| {
            (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2) <= pupil_radius * pupil_radius
        });
        Luma([if inside { PUPIL } else { SKIN }])
    });
    Frame::new(index, PixelBuffer::from_gray(&image))
}

/// Same face as 3-byte pixels for the wire (gray, so BGR and RGB agree)
pub fn face_bgr(width: u32, height: u32, centers: [(f32, f32); 2], pupil_radius: f32) -> Vec<u8> {
    let gray = face_frame(0, width, height, centers, pupil_radius).pixels.to_gray();
    RgbImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
    .into_raw()
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{LandmarkSourceKind, StreamLayout, TrackingMode};

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ConfigLoader::load_from_str(
            "[output]\nstream_layout = \"compact\"\nfps = 60.0\n\n[landmarks]\ndrop_every = 4\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.mode, TrackingMode::FullFace);
        assert_eq!(config.output.stream_layout, StreamLayout::Compact);
        assert_eq!(config.output.fps, 60.0);
        assert_eq!(config.landmarks.source, LandmarkSourceKind::Synthetic);
        assert_eq!(config.landmarks.drop_every, 4);
        assert_eq!(config.synchronizer.crop_padding_px, 40);
        assert_eq!(config.server.bind, "0.0.0.0:9876");
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = ConfigLoader::load_or_default(None).unwrap();
        let text = ConfigLoader::to_toml(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.output.queue_capacity, config.output.queue_capacity);
        assert_eq!(reloaded.synchronizer.max_poll_attempts, 30);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use aligner::parse_csv;
    use contracts::{LandmarkPacket, OutputConfig, TrackerConfig, MISSING_VALUE};
    use detectors::{
        FaceLayout, ReplayLandmarkDetector, SyntheticConfig, SyntheticLandmarkDetector,
    };
    use tracker::{BatchTracker, PupilTracker};

    use super::face_frame;

    const WIDTH: u32 = 320;
    const HEIGHT: u32 = 240;
    /// 10% of the width: 32px irises
    const IRIS: f32 = 0.1;
    const PUPIL_RADIUS: f32 = 10.0;

    fn layout() -> FaceLayout {
        FaceLayout {
            iris_diameter: IRIS,
            ..Default::default()
        }
    }

    fn frames(n: u64) -> Vec<contracts::Frame> {
        let layout = layout();
        (0..n)
            .map(|i| {
                face_frame(
                    i,
                    WIDTH,
                    HEIGHT,
                    [layout.left_center, layout.right_center],
                    PUPIL_RADIUS,
                )
            })
            .collect()
    }

    fn synthetic(drop_every: u64) -> Box<SyntheticLandmarkDetector> {
        Box::new(SyntheticLandmarkDetector::new(SyntheticConfig {
            latency: Duration::from_millis(2),
            drop_every,
            layout: layout(),
            ..Default::default()
        }))
    }

    fn config(dir: &std::path::Path, base_name: &str) -> TrackerConfig {
        TrackerConfig {
            output: OutputConfig {
                dir: dir.to_path_buf(),
                base_name: base_name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// synthetic detector -> PupilTracker -> CSV + SSI stream on disk
    #[tokio::test]
    async fn test_online_session_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (left, right) = detectors::pupil_detector_pair();
        let mut tracker = PupilTracker::new(
            config(dir.path(), "online"),
            synthetic(0),
            left,
            right,
            WIDTH,
            HEIGHT,
        );
        tracker.init().await.unwrap();

        for frame in frames(10) {
            let tracked = tracker.process(&frame).await.unwrap();
            assert_eq!(tracked.frame_index, frame.index);
        }
        let summary = tracker.stop().await;
        assert_eq!(summary.frames, 10);
        assert!(summary.clean_shutdown);

        let csv = std::fs::read_to_string(dir.path().join("online_PUPIL_DATA.csv")).unwrap();
        let records = parse_csv(&csv).unwrap();
        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.frame_index, i as u64);
        }

        // frames whose landmarks arrived in time measure the generated pupils
        let fresh: Vec<_> = records
            .iter()
            .filter(|r| (r.left.diameter - 2.0 * PUPIL_RADIUS).abs() < 3.0)
            .collect();
        assert!(!fresh.is_empty());
        for record in fresh {
            assert!((record.left.diameter_relative - 2.0 * PUPIL_RADIUS / 32.0).abs() < 0.1);
            assert!((record.right.diameter - 2.0 * PUPIL_RADIUS).abs() < 3.0);
        }

        let data = std::fs::read(dir.path().join("online_PUPIL_DATA.stream~")).unwrap();
        assert_eq!(data.len(), 10 * 6 * 4);
        let header = std::fs::read_to_string(dir.path().join("online_PUPIL_DATA.stream")).unwrap();
        assert!(header.contains("num=\"10\""));
    }

    /// dropped landmark frames still yield one row each
    #[tokio::test]
    async fn test_online_dropped_landmarks_keep_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (left, right) = detectors::pupil_detector_pair();
        let mut tracker = PupilTracker::new(
            config(dir.path(), "drops"),
            synthetic(3),
            left,
            right,
            WIDTH,
            HEIGHT,
        );
        tracker.init().await.unwrap();
        for frame in frames(9) {
            tracker.process(&frame).await.unwrap();
        }
        let summary = tracker.stop().await;

        assert_eq!(summary.frames, 9);
        assert!(summary.landmark_frames <= 6);
        assert!(summary.detection_rate < 100.0);
        assert_eq!(tracker.frames().len(), 9);

        let csv = std::fs::read_to_string(dir.path().join("drops_PUPIL_DATA.csv")).unwrap();
        assert_eq!(parse_csv(&csv).unwrap().len(), 9);
    }

    /// two-pass tracking with carry-forward over dropped frames
    #[tokio::test]
    async fn test_batch_session_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (left, right) = detectors::pupil_detector_pair();
        let batch = BatchTracker::new(config(dir.path(), "batch"), synthetic(2), left, right);

        let outcome = batch.run(frames(10)).await.unwrap();

        assert_eq!(outcome.summary.frames, 10);
        assert_eq!(outcome.summary.landmark_frames, 5);
        // 2 * 32px iris + 2 * 40px padding, rounded up
        assert!((144..=145).contains(&outcome.canvas_side), "{}", outcome.canvas_side);
        assert_eq!(outcome.records.len(), 10);
        for record in &outcome.records {
            assert!(
                (record.left.diameter - 2.0 * PUPIL_RADIUS).abs() < 3.0,
                "frame {} left {}",
                record.frame_index,
                record.left.diameter
            );
            assert_ne!(record.right.confidence, MISSING_VALUE);
        }

        let csv = std::fs::read_to_string(dir.path().join("batch_PUPIL_DATA.csv")).unwrap();
        assert_eq!(parse_csv(&csv).unwrap(), outcome.records);
    }

    /// landmarks replayed from a JSON file
    #[tokio::test]
    async fn test_replayed_landmarks_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let points = detectors::synthetic::layout_points(&layout(), WIDTH as f32 / HEIGHT as f32);
        let packets: Vec<LandmarkPacket> = (0..4)
            .map(|ts| LandmarkPacket::new(ts, points.clone()))
            .collect();
        let path = dir.path().join("landmarks.json");
        std::fs::write(&path, serde_json::to_string(&packets).unwrap()).unwrap();

        let replay = ReplayLandmarkDetector::load(&path).unwrap();
        assert_eq!(replay.len(), 4);

        let mut config = config(dir.path(), "replay");
        config.output.csv = false;
        config.output.stream = false;
        let (left, right) = detectors::pupil_detector_pair();
        let outcome = BatchTracker::new(config, Box::new(replay), left, right)
            .run(frames(4))
            .await
            .unwrap();

        assert_eq!(outcome.summary.landmark_frames, 4);
        assert!((outcome.records[3].right.diameter - 2.0 * PUPIL_RADIUS).abs() < 3.0);
    }
}

#[cfg(test)]
mod protocol_tests {
    use contracts::TrackerConfig;
    use detectors::FaceLayout;
    use stream_server::{Handshake, PupilClient, PupilServer};
    use tokio::sync::oneshot;

    use super::face_bgr;

    /// TCP round trip against the default synthetic detector (5% irises)
    #[tokio::test]
    async fn test_tcp_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TrackerConfig::default();
        config.server.bind = "127.0.0.1:0".to_string();
        config.output.dir = dir.path().to_path_buf();

        let server = PupilServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server.run(async {
            let _ = stop_rx.await;
        }));

        // 640px wide: iris 32px, pupil 20px
        let layout = FaceLayout::default();
        let frame = face_bgr(640, 480, [layout.left_center, layout.right_center], 10.0);
        let handshake = Handshake::new(640, 480, 3, 30.0);
        let mut client = PupilClient::connect(addr, handshake).await.unwrap();

        let mut replies = Vec::new();
        for _ in 0..5 {
            replies.push(client.send_frame(&frame).await.unwrap());
        }
        client.finish().await.unwrap();

        assert!(replies.iter().all(|r| r.values().iter().all(|v| v.is_finite())));
        assert!(replies
            .iter()
            .any(|r| (r.left_diameter - 20.0).abs() < 3.0 && (r.right_diameter - 20.0).abs() < 3.0));

        let csv = std::fs::read_to_string(dir.path().join("session_1_PUPIL_DATA.csv")).unwrap();
        assert_eq!(aligner::parse_csv(&csv).unwrap().len(), 5);

        stop_tx.send(()).unwrap();
        let report = server.await.unwrap();
        assert_eq!(report.sessions, 1);
        assert_eq!(report.failed, 0);
    }
}
