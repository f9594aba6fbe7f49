//! Baseline pupil detector: dark threshold plus connected component.

use std::collections::VecDeque;

use contracts::{GrayImage, PupilDetector, PupilObservation};

/// Threshold detector configuration
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfig {
    /// Fraction of pixels treated as the dark reference level
    pub dark_percentile: f32,
    /// Seed search radius as a fraction of the shorter crop side
    pub seed_radius_fraction: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            dark_percentile: 0.01,
            seed_radius_fraction: 0.25,
        }
    }
}

/// Equivalent-circle pupil detector
///
/// The threshold sits halfway between the dark percentile and the median.
/// The dark component closest to the crop center is the pupil; its diameter
/// is that of a circle of equal area and its confidence the fill ratio of
/// its bounding ellipse.
#[derive(Debug, Default)]
pub struct ThresholdPupilDetector {
    config: ThresholdConfig,
}

impl ThresholdPupilDetector {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    fn not_found(counter: u64) -> PupilObservation {
        PupilObservation {
            diameter: 0.0,
            confidence: 0.0,
            timestamp: counter,
        }
    }

    fn threshold(&self, image: &GrayImage) -> Option<u8> {
        let mut histogram = [0u64; 256];
        for pixel in image.pixels() {
            histogram[pixel[0] as usize] += 1;
        }
        let total = (image.width() as u64) * (image.height() as u64);
        if total == 0 {
            return None;
        }

        let percentile = |fraction: f32| {
            let target = ((total as f64) * fraction.clamp(0.0, 1.0) as f64).ceil().max(1.0) as u64;
            let mut cumulative = 0u64;
            for (value, count) in histogram.iter().enumerate() {
                cumulative += count;
                if cumulative >= target {
                    return value as u8;
                }
            }
            u8::MAX
        };

        let dark = percentile(self.config.dark_percentile);
        let median = percentile(0.5);
        if median <= dark {
            return None;
        }
        Some(dark + (median - dark) / 2)
    }

    fn seed(&self, image: &GrayImage, threshold: u8) -> Option<(u32, u32)> {
        let (width, height) = image.dimensions();
        let (cx, cy) = (width as i64 / 2, height as i64 / 2);
        let radius = (width.min(height) as f32 * self.config.seed_radius_fraction).ceil() as i64;

        let mut best: Option<((u32, u32), i64)> = None;
        for y in (cy - radius).max(0)..(cy + radius + 1).min(height as i64) {
            for x in (cx - radius).max(0)..(cx + radius + 1).min(width as i64) {
                if image.get_pixel(x as u32, y as u32)[0] > threshold {
                    continue;
                }
                let d = (x - cx).pow(2) + (y - cy).pow(2);
                if d <= radius * radius && best.is_none_or(|(_, b)| d < b) {
                    best = Some(((x as u32, y as u32), d));
                }
            }
        }
        best.map(|(p, _)| p)
    }
}

impl PupilDetector for ThresholdPupilDetector {
    fn name(&self) -> &str {
        "threshold"
    }

    fn detect(&mut self, image: &GrayImage, counter: u64) -> PupilObservation {
        let Some(threshold) = self.threshold(image) else {
            return Self::not_found(counter);
        };
        let Some(seed) = self.seed(image, threshold) else {
            return Self::not_found(counter);
        };

        let component = Component::grow(image, seed, threshold);
        let area = component.area as f32;
        let diameter = 2.0 * (area / std::f32::consts::PI).sqrt();

        let (bw, bh) = component.bounding_size();
        let ellipse_area = std::f32::consts::FRAC_PI_4 * bw as f32 * bh as f32;
        let confidence = if ellipse_area > 0.0 {
            (area / ellipse_area).clamp(0.0, 1.0)
        } else {
            0.0
        };

        PupilObservation {
            diameter,
            confidence,
            timestamp: counter,
        }
    }
}

/// 4-connected dark component
struct Component {
    area: u64,
    min: (u32, u32),
    max: (u32, u32),
}

impl Component {
    fn grow(image: &GrayImage, seed: (u32, u32), threshold: u8) -> Self {
        let (width, height) = image.dimensions();
        let mut visited = vec![false; (width * height) as usize];
        let mut queue = VecDeque::from([seed]);
        visited[(seed.1 * width + seed.0) as usize] = true;

        let mut component = Self {
            area: 0,
            min: seed,
            max: seed,
        };

        while let Some((x, y)) = queue.pop_front() {
            component.area += 1;
            component.min = (component.min.0.min(x), component.min.1.min(y));
            component.max = (component.max.0.max(x), component.max.1.max(y));

            let neighbours = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbours {
                if nx >= width || ny >= height {
                    continue;
                }
                let idx = (ny * width + nx) as usize;
                if !visited[idx] && image.get_pixel(nx, ny)[0] <= threshold {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
        component
    }

    fn bounding_size(&self) -> (u32, u32) {
        (self.max.0 - self.min.0 + 1, self.max.1 - self.min.1 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn disk(side: u32, cx: f32, cy: f32, radius: f32) -> GrayImage {
        GrayImage::from_fn(side, side, |x, y| {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            if d <= radius {
                Luma([25])
            } else {
                Luma([190])
            }
        })
    }

    #[test]
    fn test_centered_disk() {
        let mut detector = ThresholdPupilDetector::default();
        let obs = detector.detect(&disk(100, 50.0, 50.0, 10.0), 7);

        assert!((obs.diameter - 20.0).abs() < 1.0, "diameter {}", obs.diameter);
        assert!(obs.confidence > 0.8 && obs.confidence <= 1.0);
        assert_eq!(obs.timestamp, 7);
    }

    #[test]
    fn test_off_center_disk_within_radius() {
        let mut detector = ThresholdPupilDetector::default();
        let obs = detector.detect(&disk(100, 60.0, 45.0, 8.0), 0);
        assert!((obs.diameter - 16.0).abs() < 1.0);
    }

    #[test]
    fn test_uniform_crops_yield_zero() {
        let mut detector = ThresholdPupilDetector::default();
        for value in [0u8, 255] {
            let obs = detector.detect(&GrayImage::from_pixel(40, 40, Luma([value])), 1);
            assert_eq!(obs.diameter, 0.0);
            assert_eq!(obs.confidence, 0.0);
        }
    }

    #[test]
    fn test_empty_image_is_finite() {
        let mut detector = ThresholdPupilDetector::default();
        let obs = detector.detect(&GrayImage::new(0, 0), 3);
        assert!(obs.diameter.is_finite() && obs.confidence.is_finite());
    }
}
