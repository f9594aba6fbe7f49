//! Landmark packets and iris geometry.
//!
//! The landmark detector emits normalized (0..1) points. The last
//! [`IRIS_LANDMARK_COUNT`] entries are, in fixed order, five left-iris points
//! followed by five right-iris points. Per eye the order is
//! `center, right, top, left, bottom` for the left iris and
//! `center, left, top, right, bottom` for the right iris; in both blocks the
//! horizontal extremes sit at offsets 1 and 3.

use std::fmt;

use nalgebra::{distance, Point2};
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Number of trailing iris points in every landmark packet
pub const IRIS_LANDMARK_COUNT: usize = 10;

const POINTS_PER_IRIS: usize = 5;
const CENTER: usize = 0;
const EXTREME_A: usize = 1;
const EXTREME_B: usize = 3;

/// Slack around the normalized 0..1 range for irises at the frame border
const COORDINATE_TOLERANCE: f32 = 0.1;

/// Eye side, from the subject's point of view as labelled by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Eye::Left => "left",
            Eye::Right => "right",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One landmark detector output packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPacket {
    /// Frame index of the frame this packet was computed from
    pub timestamp: u64,

    /// Normalized points, iris block last
    pub points: Vec<Point2<f32>>,
}

impl LandmarkPacket {
    pub fn new(timestamp: u64, points: Vec<Point2<f32>>) -> Self {
        Self { timestamp, points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Five iris points of one eye
    ///
    /// # Errors
    /// Returns `LandmarkLayout` when the packet is too short to hold the
    /// iris block.
    pub fn iris_points(&self, eye: Eye) -> Result<&[Point2<f32>], ContractError> {
        let n = self.points.len();
        if n < IRIS_LANDMARK_COUNT {
            return Err(ContractError::landmark_layout(
                self.timestamp,
                format!("expected at least {IRIS_LANDMARK_COUNT} points, got {n}"),
            ));
        }
        let start = match eye {
            Eye::Left => n - IRIS_LANDMARK_COUNT,
            Eye::Right => n - POINTS_PER_IRIS,
        };
        Ok(&self.points[start..start + POINTS_PER_IRIS])
    }

    /// Derive pixel-space iris geometry for both eyes
    ///
    /// # Errors
    /// `LandmarkLayout` for short packets, coordinates that are non-finite or
    /// outside the normalized range, or an iris wider than the frame.
    pub fn eyes_geometry(&self, width: u32, height: u32) -> Result<EyesGeometry, ContractError> {
        let left = self.iris_geometry(Eye::Left, width, height)?;
        let right = self.iris_geometry(Eye::Right, width, height)?;
        Ok(EyesGeometry { left, right })
    }

    fn iris_geometry(
        &self,
        eye: Eye,
        width: u32,
        height: u32,
    ) -> Result<IrisGeometry, ContractError> {
        let block = self.iris_points(eye)?;
        if block.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(ContractError::landmark_layout(
                self.timestamp,
                format!("non-finite {eye} iris coordinate"),
            ));
        }
        let range = -COORDINATE_TOLERANCE..=1.0 + COORDINATE_TOLERANCE;
        if let Some(p) = block
            .iter()
            .find(|p| !range.contains(&p.x) || !range.contains(&p.y))
        {
            return Err(ContractError::landmark_layout(
                self.timestamp,
                format!("{eye} iris coordinate ({}, {}) outside 0..1", p.x, p.y),
            ));
        }

        let scale = |p: &Point2<f32>| Point2::new(p.x * width as f32, p.y * height as f32);
        let center = scale(&block[CENTER]);
        let diameter = distance(&scale(&block[EXTREME_A]), &scale(&block[EXTREME_B]));

        let limit = width.max(height) as f32;
        if diameter > limit {
            return Err(ContractError::landmark_layout(
                self.timestamp,
                format!("{eye} iris diameter {diameter:.1}px exceeds frame size {limit}px"),
            ));
        }

        Ok(IrisGeometry { center, diameter })
    }
}

/// Pixel-space iris position and size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrisGeometry {
    pub center: Point2<f32>,
    pub diameter: f32,
}

impl IrisGeometry {
    pub fn new(center_x: f32, center_y: f32, diameter: f32) -> Self {
        Self {
            center: Point2::new(center_x, center_y),
            diameter,
        }
    }
}

/// Iris geometry for both eyes of one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyesGeometry {
    pub left: IrisGeometry,
    pub right: IrisGeometry,
}

impl EyesGeometry {
    /// Deterministic stand-in used before any landmark has ever arrived
    ///
    /// Left iris at 40%/40% of the frame, right at 60%/60%, diameter
    /// `max(min_diameter, width_fraction * width)`.
    pub fn synthesized(width: u32, height: u32, min_diameter: f32, width_fraction: f32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let diameter = min_diameter.max(width_fraction * w);
        Self {
            left: IrisGeometry::new(0.4 * w, 0.4 * h, diameter),
            right: IrisGeometry::new(0.6 * w, 0.6 * h, diameter),
        }
    }

    pub fn get(&self, eye: Eye) -> &IrisGeometry {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    /// Largest diameter of the two eyes
    pub fn max_diameter(&self) -> f32 {
        self.left.diameter.max(self.right.diameter)
    }
}
