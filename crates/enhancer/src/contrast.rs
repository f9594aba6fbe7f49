//! Inner-eye contrast sampling and the linear contrast transform.

use image::GrayImage;

/// Contrast step chosen from the inner-eye contrast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContrastDecision {
    /// Iris not brighter than the pupil; repeat the previous frame's value
    ReusePrevious,
    /// Apply this contrast value
    Apply(i32),
    /// Enough contrast already; leave the crop and the state untouched
    Skip,
}

/// Map `iris brightness - pupil brightness` to a contrast step
pub fn contrast_adjustment(inner_contrast: f32) -> ContrastDecision {
    const STEPS: [(f32, i32); 6] = [
        (3.0, 25),
        (6.0, 20),
        (9.0, 15),
        (12.0, 10),
        (15.0, 5),
        (18.0, 2),
    ];

    if inner_contrast <= 0.0 {
        return ContrastDecision::ReusePrevious;
    }
    STEPS
        .iter()
        .find(|(upper, _)| inner_contrast < *upper)
        .map_or(ContrastDecision::Skip, |&(_, value)| {
            ContrastDecision::Apply(value)
        })
}

/// Pixel sum and count of a square, clipped to the image
fn square_sum(image: &GrayImage, x0: i64, y0: i64, side: i64) -> (u64, u64) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let (xs, xe) = (x0.max(0), (x0 + side).min(width));
    let (ys, ye) = (y0.max(0), (y0 + side).min(height));
    if xe <= xs || ye <= ys {
        return (0, 0);
    }

    let mut sum = 0u64;
    for y in ys..ye {
        for x in xs..xe {
            sum += image.get_pixel(x as u32, y as u32)[0] as u64;
        }
    }
    (sum, ((xe - xs) * (ye - ys)) as u64)
}

/// Pupil and iris brightness around the crop center
///
/// The pupil sample is a `side` square at the center, the iris sample the
/// eight same-size squares around it. Out-of-bounds pixels are skipped.
/// Returns `None` when either sample has no pixels inside the image.
pub fn sample_brightness(image: &GrayImage, side: u32) -> Option<(f32, f32)> {
    let side = side as i64;
    let x0 = image.width() as i64 / 2 - side / 2;
    let y0 = image.height() as i64 / 2 - side / 2;

    let (pupil_sum, pupil_count) = square_sum(image, x0, y0, side);
    if pupil_count == 0 {
        return None;
    }

    let (mut iris_sum, mut iris_count) = (0u64, 0u64);
    for dy in -1..=1i64 {
        for dx in -1..=1i64 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (sum, count) = square_sum(image, x0 + dx * side, y0 + dy * side, side);
            iris_sum += sum;
            iris_count += count;
        }
    }
    if iris_count == 0 {
        return None;
    }

    Some((
        pupil_sum as f32 / pupil_count as f32,
        iris_sum as f32 / iris_count as f32,
    ))
}

/// `alpha` and `gamma` of the linear contrast transform for `contrast`
pub fn contrast_coefficients(contrast: i32) -> (f32, f32) {
    let c = contrast as f32;
    let alpha = 131.0 * (c + 127.0) / (127.0 * (131.0 - c));
    (alpha, 127.0 * (1.0 - alpha))
}

/// `alpha * pixel + gamma`, clamped to 0..=255
pub fn apply_contrast(image: &mut GrayImage, contrast: i32) {
    if contrast == 0 {
        return;
    }
    let (alpha, gamma) = contrast_coefficients(contrast);
    for pixel in image.pixels_mut() {
        pixel[0] = (alpha * pixel[0] as f32 + gamma).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_contrast_steps() {
        assert_eq!(contrast_adjustment(4.0), ContrastDecision::Apply(20));
        assert_eq!(contrast_adjustment(0.5), ContrastDecision::Apply(25));
        assert_eq!(contrast_adjustment(17.9), ContrastDecision::Apply(2));
        assert_eq!(contrast_adjustment(0.0), ContrastDecision::ReusePrevious);
        assert_eq!(contrast_adjustment(-12.0), ContrastDecision::ReusePrevious);
        assert_eq!(contrast_adjustment(18.0), ContrastDecision::Skip);
    }

    #[test]
    fn test_zero_contrast_is_identity() {
        let (alpha, gamma) = contrast_coefficients(0);
        assert!((alpha - 1.0).abs() < 1e-6);
        assert!(gamma.abs() < 1e-4);
    }

    #[test]
    fn test_contrast_stretches_around_mid_gray() {
        let mut image = GrayImage::from_fn(3, 1, |x, _| Luma([[100u8, 127, 160][x as usize]]));
        apply_contrast(&mut image, 25);
        assert!(image.get_pixel(0, 0)[0] < 100);
        assert_eq!(image.get_pixel(1, 0)[0], 127);
        assert!(image.get_pixel(2, 0)[0] > 160);
    }

    #[test]
    fn test_sampling_full_neighbourhood() {
        let mut image = GrayImage::from_pixel(90, 90, Luma([200]));
        for y in 30..60 {
            for x in 30..60 {
                image.put_pixel(x, y, Luma([50]));
            }
        }
        let (pupil, iris) = sample_brightness(&image, 30).unwrap();
        assert_eq!(pupil, 50.0);
        assert_eq!(iris, 200.0);
    }

    #[test]
    fn test_sampling_skips_out_of_bounds() {
        // 40x40 crop: neighbour squares mostly fall outside
        let mut image = GrayImage::from_pixel(40, 40, Luma([120]));
        for y in 5..35 {
            for x in 5..35 {
                image.put_pixel(x, y, Luma([20]));
            }
        }
        let (pupil, iris) = sample_brightness(&image, 30).unwrap();
        assert_eq!(pupil, 20.0);
        assert_eq!(iris, 120.0);
    }

    #[test]
    fn test_sampling_empty_image() {
        assert!(sample_brightness(&GrayImage::new(0, 0), 30).is_none());
    }
}
