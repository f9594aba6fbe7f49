//! # Frame Sync
//!
//! 帧与人脸关键点的同步器。
//!
//! 负责：
//! - 将帧提交给关键点检测器，并在有界时间内等待对应的关键点
//! - 关键点超时时回退到上一次有效几何或合成的默认几何
//! - 以虹膜为中心裁剪左右眼图像
//!
//! ## 使用示例
//!
//! ```ignore
//! use frame_sync::{FrameSynchronizer, LandmarkSource};
//!
//! let mut sync = FrameSynchronizer::new(config.synchronizer.clone(), detector);
//! sync.init()?;
//!
//! let out = sync.process(&frame).await?;
//! if out.source != LandmarkSource::Fresh {
//!     // geometry was reused or synthesized
//! }
//!
//! sync.stop().await?;
//! ```

mod crop;
mod mailbox;
mod synchronizer;

pub use crop::{crop_side, extract_eye_crop, CropRect, EyeCrop};
pub use mailbox::{LandmarkMailbox, PublishOutcome};
pub use synchronizer::{FrameSynchronizer, LandmarkSource, SyncOutput, SyncState};

// Re-export contracts types
pub use contracts::{EyesGeometry, IrisGeometry, SynchronizerConfig};
