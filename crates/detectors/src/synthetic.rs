//! Synthetic landmark detector
//!
//! Emits one packet per submitted frame after a fixed latency, using a fixed
//! face layout or the dark-region centroid of each image half. Supports
//! failure injection (late packets, dropped frames, rejected submits,
//! failed start or drain).

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use contracts::{
    ContractError, Frame, GrayImage, LandmarkDetector, LandmarkPacket, LandmarkPoller,
};
use nalgebra::Point2;
use tracing::{debug, instrument, trace};

use crate::worker::DetectorWorker;

/// Number of face-mesh points emitted before the iris block
pub const FACE_MESH_POINTS: usize = 468;

/// Normalized face geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceLayout {
    /// Left iris center (normalized x, y)
    pub left_center: (f32, f32),
    /// Right iris center (normalized x, y)
    pub right_center: (f32, f32),
    /// Iris diameter as a fraction of the frame width
    pub iris_diameter: f32,
}

impl Default for FaceLayout {
    fn default() -> Self {
        Self {
            left_center: (0.4, 0.45),
            right_center: (0.6, 0.45),
            iris_diameter: 0.05,
        }
    }
}

/// Synthetic detector configuration
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Processing latency per frame
    pub latency: Duration,
    /// Drop every n-th frame (0 = never, 1 = all)
    pub drop_every: u64,
    pub layout: FaceLayout,
    /// Follow the darkest region of each image half instead of the fixed layout
    pub track_dark_regions: bool,
    /// Timestamps whose submit fails
    pub fail_submit: Vec<u64>,
    /// Make `start` fail
    pub fail_start: bool,
    /// Make `wait_until_done` report a failed drain
    pub fail_drain: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(5),
            drop_every: 0,
            layout: FaceLayout::default(),
            track_dark_regions: false,
            fail_submit: Vec::new(),
            fail_start: false,
            fail_drain: false,
        }
    }
}

impl SyntheticConfig {
    /// Build from the `[landmarks]` table of the tracker configuration
    pub fn from_source(source: &contracts::LandmarkSourceConfig) -> Self {
        Self {
            latency: Duration::from_millis(source.latency_ms),
            drop_every: source.drop_every,
            track_dark_regions: source.track_dark_regions,
            ..Default::default()
        }
    }

    fn drops(&self, timestamp: u64) -> bool {
        self.drop_every > 0 && (timestamp + 1) % self.drop_every == 0
    }
}

/// Synthetic landmark detector
pub struct SyntheticLandmarkDetector {
    config: SyntheticConfig,
    extra_delays: HashMap<u64, Duration>,
    worker: Option<DetectorWorker>,
}

impl SyntheticLandmarkDetector {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            extra_delays: HashMap::new(),
            worker: None,
        }
    }

    /// Delay the packet for `timestamp` by an additional `delay`
    pub fn with_extra_delay(mut self, timestamp: u64, delay: Duration) -> Self {
        self.extra_delays.insert(timestamp, delay);
        self
    }

    fn produce(
        config: &SyntheticConfig,
        extra_delays: &HashMap<u64, Duration>,
        frame: &Frame,
        timestamp: u64,
    ) -> Option<LandmarkPacket> {
        let delay = config.latency + extra_delays.get(&timestamp).copied().unwrap_or_default();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if config.drops(timestamp) {
            trace!(timestamp, "Synthetic detector dropped frame");
            return None;
        }

        let layout = if config.track_dark_regions {
            dark_region_layout(&frame.pixels.to_gray(), &config.layout)
        } else {
            config.layout
        };
        let aspect = frame.width() as f32 / frame.height().max(1) as f32;
        Some(LandmarkPacket::new(timestamp, layout_points(&layout, aspect)))
    }
}

impl LandmarkDetector for SyntheticLandmarkDetector {
    fn name(&self) -> &str {
        "synthetic"
    }

    #[instrument(name = "synthetic_detector_start", skip(self))]
    fn start(&mut self) -> Result<Box<dyn LandmarkPoller>, ContractError> {
        if self.config.fail_start {
            return Err(ContractError::initialization("synthetic", "injected failure"));
        }
        if self.worker.is_some() {
            return Err(ContractError::invalid_state("synthetic detector", "started", "start"));
        }

        let config = self.config.clone();
        let extra_delays = self.extra_delays.clone();
        let (worker, poller) = DetectorWorker::spawn("synthetic", move |frame, timestamp| {
            Self::produce(&config, &extra_delays, &frame, timestamp)
        })?;
        self.worker = Some(worker);

        debug!(latency_ms = self.config.latency.as_millis() as u64, "Synthetic detector started");
        Ok(Box::new(poller))
    }

    fn submit(&mut self, frame: &Frame, timestamp: u64) -> Result<(), ContractError> {
        if self.config.fail_submit.contains(&timestamp) {
            return Err(ContractError::detector_submit(timestamp, "injected failure"));
        }
        match &self.worker {
            Some(worker) => worker.submit(frame, timestamp),
            None => Err(ContractError::invalid_state("synthetic detector", "idle", "submit")),
        }
    }

    fn close_input(&mut self) -> Result<(), ContractError> {
        if let Some(worker) = self.worker.as_mut() {
            worker.close();
        }
        Ok(())
    }

    fn wait_until_done(&mut self) -> Result<(), ContractError> {
        if let Some(worker) = self.worker.as_mut() {
            worker.join()?;
        }
        if self.config.fail_drain {
            return Err(ContractError::detector_shutdown("synthetic: injected drain failure"));
        }
        Ok(())
    }
}

/// Face-mesh placeholder points followed by the 10 iris points
///
/// Left block: center, right, top, left, bottom.
/// Right block: center, left, top, right, bottom.
pub fn layout_points(layout: &FaceLayout, aspect: f32) -> Vec<Point2<f32>> {
    let rx = layout.iris_diameter / 2.0;
    let ry = rx * aspect;
    let (lx, ly) = layout.left_center;
    let (rcx, rcy) = layout.right_center;
    let face = Point2::new((lx + rcx) / 2.0, (ly + rcy) / 2.0);

    let mut points = vec![face; FACE_MESH_POINTS];
    points.extend([
        Point2::new(lx, ly),
        Point2::new(lx + rx, ly),
        Point2::new(lx, ly - ry),
        Point2::new(lx - rx, ly),
        Point2::new(lx, ly + ry),
    ]);
    points.extend([
        Point2::new(rcx, rcy),
        Point2::new(rcx - rx, rcy),
        Point2::new(rcx, rcy - ry),
        Point2::new(rcx + rx, rcy),
        Point2::new(rcx, rcy + ry),
    ]);
    points
}

/// Centroid of the darkest pixels in each image half
///
/// A half without contrast keeps the fallback center.
fn dark_region_layout(gray: &GrayImage, fallback: &FaceLayout) -> FaceLayout {
    let (width, height) = gray.dimensions();
    if width < 2 || height == 0 {
        return *fallback;
    }
    let half = width / 2;
    let left = dark_centroid(gray, 0, half).unwrap_or(fallback.left_center);
    let right = dark_centroid(gray, half, width).unwrap_or(fallback.right_center);
    FaceLayout {
        left_center: left,
        right_center: right,
        iris_diameter: fallback.iris_diameter,
    }
}

fn dark_centroid(gray: &GrayImage, x_start: u32, x_end: u32) -> Option<(f32, f32)> {
    let (width, height) = gray.dimensions();
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for y in 0..height {
        for x in x_start..x_end {
            let v = gray.get_pixel(x, y)[0];
            min = min.min(v);
            max = max.max(v);
        }
    }
    if max.saturating_sub(min) < 16 {
        return None;
    }

    let threshold = min as u32 + (max - min) as u32 / 4;
    let (mut sx, mut sy, mut n) = (0f64, 0f64, 0u64);
    for y in 0..height {
        for x in x_start..x_end {
            if (gray.get_pixel(x, y)[0] as u32) <= threshold {
                sx += x as f64 + 0.5;
                sy += y as f64 + 0.5;
                n += 1;
            }
        }
    }
    (n > 0).then(|| {
        (
            (sx / n as f64 / width as f64) as f32,
            (sy / n as f64 / height as f64) as f32,
        )
    })
}
