//! Per-eye enhance-then-detect step.

use contracts::{Eye, GrayImage, PupilDetector, PupilMeasurement};
use enhancer::ImageEnhancer;

/// Enhancer and pupil detector of one eye
///
/// Owns the contrast hysteresis and the detector call counter of that eye.
pub struct EyeMeasurer {
    eye: Eye,
    enhancer: ImageEnhancer,
    detector: Box<dyn PupilDetector>,
    counter: u64,
}

impl EyeMeasurer {
    pub fn new(eye: Eye, enhancer: ImageEnhancer, detector: Box<dyn PupilDetector>) -> Self {
        Self {
            eye,
            enhancer,
            detector,
            counter: 0,
        }
    }

    pub fn eye(&self) -> Eye {
        self.eye
    }

    /// Enhance `crop`, run the detector and relate the result to the iris
    pub fn measure(
        &mut self,
        frame_index: u64,
        crop: &GrayImage,
        iris_diameter: f32,
    ) -> PupilMeasurement {
        let enhanced = self.enhancer.enhance(crop);
        self.counter += 1;
        let observation = self.detector.detect(&enhanced.image, self.counter);
        let measurement = PupilMeasurement::from_observation(frame_index, &observation, iris_diameter);

        if !measurement.is_missing() {
            observability::record_pupil_diameter(self.eye.as_str(), measurement.diameter);
        }
        measurement
    }
}
