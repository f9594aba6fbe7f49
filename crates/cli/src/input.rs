//! Image sequence input.

use std::path::{Path, PathBuf};

use contracts::{Frame, PixelBuffer, PixelFormat};
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// File extensions read as frames
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Frame files in `dir`, sorted by file name
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CliError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CliError::EmptyInput {
            path: dir.to_path_buf(),
        });
    }
    Ok(paths)
}

/// Decode every frame of `dir`; all frames must share the first frame's size
pub fn load_frames(dir: &Path) -> Result<Vec<Frame>> {
    let paths = list_frames(dir)?;
    let mut frames = Vec::with_capacity(paths.len());
    let mut size = None;

    for (index, path) in paths.iter().enumerate() {
        let image = image::open(path)
            .map_err(|e| CliError::image_decode(path, e.to_string()))?
            .to_rgb8();
        let dims = image.dimensions();
        match size {
            None => size = Some(dims),
            Some(expected) if expected != dims => {
                return Err(CliError::FrameSizeMismatch {
                    path: path.clone(),
                    expected,
                    actual: dims,
                })
            }
            Some(_) => {}
        }

        let (width, height) = dims;
        let pixels = PixelBuffer::new(width, height, PixelFormat::Rgb8, image.into_raw())
            .map_err(|e| CliError::image_decode(path, e.to_string()))?;
        frames.push(Frame::new(index as u64, pixels));
        debug!(path = %path.display(), index, "Frame loaded");
    }

    info!(dir = %dir.display(), frames = frames.len(), "Image sequence loaded");
    Ok(frames)
}

/// Raw BGR bytes as sent on the wire
pub fn to_bgr(frame: &Frame) -> Vec<u8> {
    let data = &frame.pixels.data;
    match frame.pixels.format {
        PixelFormat::Bgr8 => data.to_vec(),
        PixelFormat::Rgb8 => data.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0]]).collect(),
        PixelFormat::Bgra8 => data.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect(),
        PixelFormat::Gray8 => data.iter().flat_map(|&v| [v, v, v]).collect(),
    }
}

/// Generated face-like frame: two dark pupils on a bright background
///
/// The pupils sit where the synthetic landmark detector puts the irises and
/// their size oscillates with `index`.
pub fn synthetic_frame(width: u32, height: u32, index: u64) -> Frame {
    let layout = detectors::FaceLayout::default();
    let iris = layout.iris_diameter * width as f32;
    let radius = iris * (0.2 + 0.05 * ((index % 20) as f32 / 10.0 - 1.0).abs());
    let centers = [layout.left_center, layout.right_center]
        .map(|(x, y)| (x * width as f32, y * height as f32));

    let image = RgbImage::from_fn(width, height, |x, y| {
        let dark = centers.iter().any(|(cx, cy)| {
            (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2) <= radius * radius
        });
        if dark {
            Rgb([20, 20, 20])
        } else {
            Rgb([190, 180, 170])
        }
    });
    Frame::new(
        index,
        PixelBuffer {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: image.into_raw().into(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.bmp"] {
            RgbImage::new(8, 6).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignore").unwrap();

        let names: Vec<String> = list_frames(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.bmp"]);

        let frames = load_frames(dir.path()).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].index, 2);
        assert_eq!((frames[0].width(), frames[0].height()), (8, 6));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(8, 6).save(dir.path().join("0.png")).unwrap();
        RgbImage::new(4, 4).save(dir.path().join("1.png")).unwrap();
        assert!(matches!(
            load_frames(dir.path()),
            Err(CliError::FrameSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(list_frames(dir.path()), Err(CliError::EmptyInput { .. })));
    }

    #[test]
    fn test_bgr_swaps_channels() {
        let pixels = PixelBuffer::new(1, 1, PixelFormat::Rgb8, vec![1u8, 2, 3]).unwrap();
        assert_eq!(to_bgr(&Frame::new(0, pixels)), vec![3, 2, 1]);

        let frame = synthetic_frame(64, 48, 0);
        assert_eq!(to_bgr(&frame).len(), 64 * 48 * 3);
    }
}
