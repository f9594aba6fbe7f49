//! 追踪指标收集模块
//!
//! Prometheus 指标记录函数，以及会话级的内存聚合统计。

use std::collections::HashMap;

use contracts::{Eye, TrackingFrame};
use metrics::{counter, gauge, histogram};

/// 记录一帧处理完成
pub fn record_frame_processed(frame_index: u64) {
    counter!("pupil_tracker_frames_total").increment(1);
    gauge!("pupil_tracker_last_frame_index").set(frame_index as f64);
}

/// 记录关键点来源 (fresh / stale / synthesized)
pub fn record_landmark_source(source: &'static str) {
    counter!("pupil_tracker_landmark_source_total", "source" => source).increment(1);
}

/// 记录关键点槽位争用导致的丢包
pub fn record_slot_contention_drop() {
    counter!("pupil_tracker_slot_contention_drops_total").increment(1);
}

/// 记录等待关键点的时间
pub fn record_landmark_wait_ms(wait_ms: f64) {
    histogram!("pupil_tracker_landmark_wait_ms").record(wait_ms);
}

/// 记录单眼裁剪失败
pub fn record_crop_failure(eye: &'static str) {
    counter!("pupil_tracker_crop_failures_total", "eye" => eye).increment(1);
}

/// 记录瞳孔直径 (像素)
pub fn record_pupil_diameter(eye: &'static str, diameter: f32) {
    histogram!("pupil_tracker_pupil_diameter_px", "eye" => eye).record(diameter as f64);
}

/// 记录新会话开始
pub fn record_session_started() {
    counter!("pupil_tracker_sessions_total").increment(1);
}

/// 记录输出写入
pub fn record_sink_write(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "pupil_tracker_sink_writes_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 追踪统计聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct TrackingStatsAggregator {
    /// 总帧数
    pub total_frames: u64,

    /// 按来源统计的帧数
    pub source_counts: HashMap<String, u64>,

    /// 各眼缺失测量的帧数
    pub missing_counts: HashMap<Eye, u64>,

    /// 等待关键点时间统计 (毫秒)
    pub wait_stats: RunningStats,

    /// 各眼瞳孔直径统计
    pub diameter_stats: HashMap<Eye, RunningStats>,
}

impl TrackingStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, source: &str, frame: &TrackingFrame, wait_ms: f64) {
        self.total_frames += 1;
        *self.source_counts.entry(source.to_string()).or_insert(0) += 1;
        self.wait_stats.push(wait_ms);

        for eye in Eye::BOTH {
            let measurement = frame.get(eye);
            if measurement.is_missing() {
                *self.missing_counts.entry(eye).or_insert(0) += 1;
            } else {
                self.diameter_stats
                    .entry(eye)
                    .or_default()
                    .push(measurement.diameter as f64);
            }
        }
    }

    /// 拿到新鲜关键点的帧数
    pub fn landmark_frames(&self) -> u64 {
        self.source_counts.get("fresh").copied().unwrap_or(0)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> TrackingSummary {
        let landmark_frames = self.landmark_frames();
        let stats_for = |eye: Eye| {
            self.diameter_stats
                .get(&eye)
                .map(StatsSummary::from)
                .unwrap_or_default()
        };

        TrackingSummary {
            total_frames: self.total_frames,
            landmark_frames,
            detection_rate: if self.total_frames > 0 {
                landmark_frames as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            source_counts: self.source_counts.clone(),
            left_missing: self.missing_counts.get(&Eye::Left).copied().unwrap_or(0),
            right_missing: self.missing_counts.get(&Eye::Right).copied().unwrap_or(0),
            wait_ms: StatsSummary::from(&self.wait_stats),
            left_diameter: stats_for(Eye::Left),
            right_diameter: stats_for(Eye::Right),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct TrackingSummary {
    pub total_frames: u64,
    pub landmark_frames: u64,
    /// 百分比
    pub detection_rate: f64,
    pub source_counts: HashMap<String, u64>,
    pub left_missing: u64,
    pub right_missing: u64,
    pub wait_ms: StatsSummary,
    pub left_diameter: StatsSummary,
    pub right_diameter: StatsSummary,
}

impl std::fmt::Display for TrackingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Tracking Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(
            f,
            "Frames with landmarks: {} ({:.2}%)",
            self.landmark_frames, self.detection_rate
        )?;
        writeln!(f, "Missing left/right: {}/{}", self.left_missing, self.right_missing)?;
        writeln!(f, "Landmark wait (ms): {}", self.wait_ms)?;
        writeln!(f, "Left diameter (px): {}", self.left_diameter)?;
        writeln!(f, "Right diameter (px): {}", self.right_diameter)?;

        if !self.source_counts.is_empty() {
            let mut sources: Vec<_> = self.source_counts.iter().collect();
            sources.sort();
            writeln!(f, "Landmark sources:")?;
            for (source, count) in sources {
                writeln!(f, "  {}: {}", source, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
