//! Brightness statistics and gain selection.

use image::GrayImage;

/// Mean and population standard deviation of a grayscale image
pub fn mean_std(image: &GrayImage) -> (f32, f32) {
    let n = image.as_raw().len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let (sum, sum_sq) = image.as_raw().iter().fold((0f64, 0f64), |(s, sq), &p| {
        let v = p as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / n as f64;
    let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
    (mean as f32, variance.sqrt() as f32)
}

/// Brightness gain for a crop with the given `mean` and `std`
///
/// Dark, flat crops get the strongest boost; anything at or above a mean of
/// 110 is left alone.
pub fn select_brightness_gain(mean: f32, std: f32) -> f32 {
    const BINS: [(f32, f32); 9] = [
        (40.0, 3.5),
        (50.0, 3.2),
        (60.0, 2.9),
        (70.0, 2.6),
        (80.0, 2.3),
        (90.0, 2.1),
        (100.0, 1.9),
        (110.0, 1.5),
        (f32::INFINITY, 1.0),
    ];

    if mean + std < 30.0 {
        return 4.5;
    }
    BINS.iter()
        .find(|(upper, _)| mean < *upper)
        .map_or(1.0, |&(_, gain)| gain)
}

/// Per-pixel multiply, saturating at 255
pub fn apply_gain(image: &mut GrayImage, gain: f32) {
    if gain == 1.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[0] = (pixel[0] as f32 * gain).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_darkest_bin() {
        assert_eq!(select_brightness_gain(25.0, 0.0), 4.5);
        assert_eq!(select_brightness_gain(10.0, 19.9), 4.5);
    }

    #[test]
    fn test_mean_bins() {
        assert_eq!(select_brightness_gain(65.0, 5.0), 2.6);
        assert_eq!(select_brightness_gain(25.0, 10.0), 3.5);
        assert_eq!(select_brightness_gain(40.0, 0.0), 3.2);
        assert_eq!(select_brightness_gain(109.9, 0.0), 1.5);
        assert_eq!(select_brightness_gain(110.0, 0.0), 1.0);
        assert_eq!(select_brightness_gain(250.0, 3.0), 1.0);
    }

    #[test]
    fn test_gain_depends_only_on_inputs() {
        let first = select_brightness_gain(72.0, 8.0);
        let _ = select_brightness_gain(12.0, 1.0);
        assert_eq!(select_brightness_gain(72.0, 8.0), first);
    }

    #[test]
    fn test_mean_std() {
        let mut image = GrayImage::from_pixel(2, 1, Luma([10]));
        image.put_pixel(1, 0, Luma([30]));
        let (mean, std) = mean_std(&image);
        assert!((mean - 20.0).abs() < 1e-6);
        assert!((std - 10.0).abs() < 1e-6);
        assert_eq!(mean_std(&GrayImage::new(0, 0)), (0.0, 0.0));
    }

    #[test]
    fn test_gain_saturates() {
        let mut image = GrayImage::from_pixel(2, 2, Luma([100]));
        image.put_pixel(0, 0, Luma([20]));
        apply_gain(&mut image, 4.5);
        assert_eq!(image.get_pixel(1, 1)[0], 255);
        assert_eq!(image.get_pixel(0, 0)[0], 90);
    }
}
