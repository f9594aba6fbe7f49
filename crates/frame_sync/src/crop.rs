//! Fixed-size eye crops centered on the iris.

use contracts::{ContractError, Eye, IrisGeometry};
use image::{imageops, GrayImage};

/// Clamped source rectangle in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Square eye image with the iris at its center
#[derive(Debug, Clone)]
pub struct EyeCrop {
    pub eye: Eye,
    pub image: GrayImage,
    /// Region of the frame that was copied
    pub source: CropRect,
    /// Geometry the crop was centered on
    pub iris: IrisGeometry,
}

impl EyeCrop {
    pub fn canvas_side(&self) -> u32 {
        self.image.width()
    }
}

/// Side of a crop around an iris of `diameter`: `2*diameter + 2*padding`
pub fn crop_side(diameter: f32, padding: u32) -> u32 {
    let side = 2.0 * diameter.max(0.0) + 2.0 * padding as f32;
    (side.ceil() as u32).max(1)
}

/// Cut the eye region out of `frame` and center it on a `canvas_side` canvas
///
/// The source square has side `crop_side(iris.diameter, padding)` and is
/// clamped to the frame. Canvas pixels not covered by the source stay black.
///
/// # Errors
/// - `CropOutOfFrame` when nothing of the square lies inside the frame
/// - `CropOverflow` when the clamped source cannot be placed on the canvas
///   with the iris at the canvas center
pub fn extract_eye_crop(
    frame: &GrayImage,
    eye: Eye,
    iris: &IrisGeometry,
    padding: u32,
    canvas_side: u32,
) -> Result<EyeCrop, ContractError> {
    if !iris.center.x.is_finite() || !iris.center.y.is_finite() {
        return Err(ContractError::CropOutOfFrame { eye });
    }

    let side = crop_side(iris.diameter, padding) as i64;
    let half = side / 2;
    let cx = iris.center.x.round() as i64;
    let cy = iris.center.y.round() as i64;

    let (origin_x, origin_y) = (cx - half, cy - half);
    let x0 = origin_x.max(0);
    let y0 = origin_y.max(0);
    let x1 = (origin_x + side).min(frame.width() as i64);
    let y1 = (origin_y + side).min(frame.height() as i64);

    if x1 <= x0 || y1 <= y0 {
        return Err(ContractError::CropOutOfFrame { eye });
    }

    let source = CropRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    };

    let canvas = canvas_side as i64;
    let overflow = || ContractError::CropOverflow {
        eye,
        crop_width: source.width,
        crop_height: source.height,
        canvas_side,
    };
    if source.width as i64 > canvas || source.height as i64 > canvas {
        return Err(overflow());
    }

    let target_x = canvas / 2 - (cx - x0);
    let target_y = canvas / 2 - (cy - y0);
    if target_x < 0
        || target_y < 0
        || target_x + source.width as i64 > canvas
        || target_y + source.height as i64 > canvas
    {
        return Err(overflow());
    }

    let region = imageops::crop_imm(frame, source.x, source.y, source.width, source.height);
    let mut image = GrayImage::new(canvas_side, canvas_side);
    imageops::replace(&mut image, &*region, target_x, target_y);

    Ok(EyeCrop {
        eye,
        image,
        source,
        iris: *iris,
    })
}
