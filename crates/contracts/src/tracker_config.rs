//! Tracker configuration contracts shared across crates.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TrackerConfig {
    /// Input kind
    #[serde(default)]
    pub mode: TrackingMode,

    /// Frame/landmark synchronizer settings
    #[serde(default)]
    #[validate(nested)]
    pub synchronizer: SynchronizerConfig,

    /// Eye-crop enhancer settings
    #[serde(default)]
    #[validate(nested)]
    pub enhancer: EnhancerConfig,

    /// Output files
    #[serde(default)]
    #[validate(nested)]
    pub output: OutputConfig,

    /// Streaming server
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Landmark detector selection
    #[serde(default)]
    pub landmarks: LandmarkSourceConfig,
}

/// What a single input frame shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Full face; both eyes are located through iris landmarks
    #[default]
    FullFace,
    /// Frame is already a single eye crop; the measurement is reported for both eyes
    SingleEye,
}

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SynchronizerConfig {
    /// Interval between mailbox polls (ms)
    #[validate(range(min = 1, max = 1000))]
    pub poll_interval_ms: u64,

    /// Polls before falling back to stale geometry
    #[validate(range(min = 1))]
    pub max_poll_attempts: u32,

    /// Constant margin around the eye in crops (px)
    pub crop_padding_px: u32,

    /// Lower bound of the synthesized default iris diameter (px)
    #[validate(range(min = 1.0))]
    pub min_default_diameter_px: f32,

    /// Synthesized diameter as a fraction of frame width
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_diameter_width_fraction: f32,
}

impl SynchronizerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Worst-case wait for a fresh landmark inside one `process` call
    pub fn wait_budget(&self) -> Duration {
        self.poll_interval() * self.max_poll_attempts
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3,
            max_poll_attempts: 30,
            crop_padding_px: 40,
            min_default_diameter_px: 30.0,
            default_diameter_width_fraction: 0.01,
        }
    }
}

/// Enhancer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EnhancerConfig {
    /// Side of the brightness sampling squares (px)
    #[validate(range(min = 1))]
    pub sample_size: u32,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self { sample_size: 30 }
    }
}

/// Binary stream record layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamLayout {
    /// diameter, confidence per eye (4 floats)
    Compact,
    /// diameter, relative diameter, confidence per eye (6 floats)
    #[default]
    Extended,
}

impl StreamLayout {
    pub fn dimensions(self) -> usize {
        match self {
            Self::Compact => 4,
            Self::Extended => 6,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory
    pub dir: PathBuf,

    /// File base name; empty means a timestamp is chosen at run time
    pub base_name: String,

    /// Write `{base}_PUPIL_DATA.csv`
    pub csv: bool,

    /// Write `{base}_PUPIL_DATA.stream` + `.stream~`
    pub stream: bool,

    /// Trace every record at debug level
    pub log: bool,

    /// Binary stream layout
    pub stream_layout: StreamLayout,

    /// Input frame rate, used as stream sample rate
    pub fps: f64,

    /// Per-sink queue capacity
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
}

impl OutputConfig {
    pub fn any_enabled(&self) -> bool {
        self.csv || self.stream || self.log
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            base_name: String::new(),
            csv: true,
            stream: true,
            log: false,
            stream_layout: StreamLayout::default(),
            fps: 30.0,
            queue_capacity: 256,
        }
    }
}

/// Streaming server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    #[validate(length(min = 1))]
    pub bind: String,

    /// Largest accepted frame payload (bytes)
    #[validate(range(min = 1))]
    pub max_frame_bytes: usize,

    /// Write per-session output files
    pub write_outputs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9876".to_string(),
            max_frame_bytes: 64 * 1024 * 1024,
            write_outputs: true,
        }
    }
}

/// Landmark detector kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkSourceKind {
    /// In-process synthetic detector
    #[default]
    Synthetic,
    /// Replay recorded packets from `replay_path`
    Replay,
}

/// Landmark detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSourceConfig {
    pub source: LandmarkSourceKind,

    /// JSON array of landmark packets (replay only)
    pub replay_path: Option<PathBuf>,

    /// Simulated inference latency (ms)
    pub latency_ms: u64,

    /// Skip every n-th frame (0 = never)
    pub drop_every: u64,

    /// Follow the darkest region of each image half instead of a fixed face
    pub track_dark_regions: bool,
}

impl Default for LandmarkSourceConfig {
    fn default() -> Self {
        Self {
            source: LandmarkSourceKind::Synthetic,
            replay_path: None,
            latency_ms: 5,
            drop_every: 0,
            track_dark_regions: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_budget() {
        let config = SynchronizerConfig::default();
        assert_eq!(config.wait_budget(), Duration::from_millis(90));
        assert_eq!(config.crop_padding_px, 40);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = TrackerConfig::default();
        config.synchronizer.max_poll_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"output":{"fps":25.0,"stream_layout":"compact"}}"#).unwrap();
        assert_eq!(config.output.fps, 25.0);
        assert_eq!(config.output.stream_layout, StreamLayout::Compact);
        assert!(config.output.csv);
        assert_eq!(config.synchronizer.poll_interval_ms, 3);
    }
}
