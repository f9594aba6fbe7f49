//! # Contracts
//!
//! Frozen interface contracts shared by every tracking crate: the frame and
//! landmark data model, measurement records, collaborator traits and the
//! tracker configuration. Business crates depend on this crate only, never the
//! other way around.
//!
//! ## Time Model
//! - The frame index is the only clock. Landmark packets and pupil
//!   observations are stamped with the index of the frame they belong to.
//! - Output records are keyed by frame index and must be dense (`0..=last`).

mod detector;
mod error;
mod frame;
mod landmarks;
mod measurement;
mod sink;
mod tracker_config;

pub use detector::*;
pub use error::*;
pub use frame::*;
pub use landmarks::*;
pub use measurement::*;
pub use sink::*;
pub use tracker_config::*;

/// Re-exported so collaborators agree on the image type.
pub use image::GrayImage;
