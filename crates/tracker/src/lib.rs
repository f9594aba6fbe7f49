//! # Tracker
//!
//! 瞳孔追踪编排层。
//!
//! - [`PupilTracker`]：在线模式，逐帧同步关键点、裁剪、增强、检测并写出
//! - [`BatchTracker`]：离线两遍模式，先收集全部关键点再按眼并行测量
//!
//! ## 使用示例
//!
//! ```ignore
//! use tracker::PupilTracker;
//!
//! let (left, right) = detectors::pupil_detector_pair();
//! let mut tracker = PupilTracker::new(config, landmarks, left, right, 640, 480);
//! tracker.init().await?;
//! let tracked = tracker.process(&frame).await?;
//! let summary = tracker.stop().await;
//! println!("{summary}");
//! ```

mod batch;
mod measure;
mod online;
mod summary;

pub use batch::{BatchOutcome, BatchTracker};
pub use measure::EyeMeasurer;
pub use online::{PupilTracker, DEFAULT_BASE_NAME};
pub use summary::SessionSummary;
