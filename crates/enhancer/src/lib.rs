//! # Enhancer
//!
//! Adaptive brightness and contrast normalization of eye crops before pupil
//! measurement.
//!
//! ## Pipeline
//!
//! 1. Brightness gain from `(mean, stddev)` of the whole crop (saturating)
//! 2. Pupil / iris brightness sampled around the crop center
//! 3. Contrast step from the inner-eye contrast, with per-eye hysteresis
//! 4. Linear contrast transform
//!
//! ## Example
//!
//! ```ignore
//! use enhancer::ImageEnhancer;
//!
//! let mut left = ImageEnhancer::new(&config.enhancer);
//! let enhanced = left.enhance(&crop.image);
//! let observation = pupil_detector.detect(&enhanced.image, counter);
//! ```

mod brightness;
mod contrast;

use contracts::{EnhancerConfig, GrayImage};
use tracing::trace;

pub use brightness::{apply_gain, mean_std, select_brightness_gain};
pub use contrast::{
    apply_contrast, contrast_adjustment, contrast_coefficients, sample_brightness,
    ContrastDecision,
};

/// Result of one `enhance()` call
#[derive(Debug, Clone)]
pub struct Enhanced {
    pub image: GrayImage,
    pub gain: f32,
    /// `iris - pupil` brightness after the gain, if it could be sampled
    pub inner_contrast: Option<f32>,
    /// Contrast value applied to this frame (`None` when skipped)
    pub contrast: Option<i32>,
}

/// Per-eye image enhancer
///
/// Holds the contrast value of the previous frame; create one per eye.
#[derive(Debug, Clone)]
pub struct ImageEnhancer {
    sample_size: u32,
    previous_contrast: i32,
}

impl ImageEnhancer {
    pub fn new(config: &EnhancerConfig) -> Self {
        Self {
            sample_size: config.sample_size.max(1),
            previous_contrast: 0,
        }
    }

    pub fn previous_contrast(&self) -> i32 {
        self.previous_contrast
    }

    pub fn enhance(&mut self, image: &GrayImage) -> Enhanced {
        let mut image = image.clone();

        let (mean, std) = mean_std(&image);
        let gain = select_brightness_gain(mean, std);
        apply_gain(&mut image, gain);

        let inner_contrast = sample_brightness(&image, self.sample_size)
            .map(|(pupil, iris)| iris - pupil);

        let contrast = match inner_contrast.map(contrast_adjustment) {
            Some(ContrastDecision::Apply(value)) => Some(value),
            Some(ContrastDecision::ReusePrevious) => Some(self.previous_contrast),
            Some(ContrastDecision::Skip) | None => None,
        };

        if let Some(value) = contrast {
            apply_contrast(&mut image, value);
            self.previous_contrast = value;
        }

        trace!(mean, std, gain, ?inner_contrast, ?contrast, "Crop enhanced");

        Enhanced {
            image,
            gain,
            inner_contrast,
            contrast,
        }
    }
}

impl Default for ImageEnhancer {
    fn default() -> Self {
        Self::new(&EnhancerConfig::default())
    }
}
