use crate::codec::Image;
use crate::error::{Result, SteganographyError};
use image::GrayImage;

const HISTOGRAM_EPSILON: f64 = 1e-10;

pub(crate) fn histogram256(gray: &GrayImage) -> [f64; 256] {
    let mut counts = [0u64; 256];
    for pixel in gray.pixels() {
        counts[pixel[0] as usize] += 1;
    }
    let total = gray.width() as f64 * gray.height() as f64;
    let mut normalized = [0.0f64; 256];
    for (bin, &count) in counts.iter().enumerate() {
        normalized[bin] = count as f64 / total;
    }
    normalized
}

/// Mean squared error between two equally-sized gray planes.
pub fn mse(original: &GrayImage, other: &GrayImage) -> Result<f64> {
    require_same_shape(original, other)?;
    let n = (original.width() as f64) * (original.height() as f64);
    let sum: f64 = original
        .pixels()
        .zip(other.pixels())
        .map(|(a, b)| {
            let diff = a[0] as f64 - b[0] as f64;
            diff * diff
        })
        .sum();
    Ok(sum / n)
}

/// Peak signal-to-noise ratio in dB; `f64::INFINITY` when the images are identical.
pub fn psnr(original: &GrayImage, other: &GrayImage) -> Result<f64> {
    let error = mse(original, other)?;
    if error == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * ((255.0 * 255.0) / error).log10())
}

/// Shannon entropy, in bits, of the gray plane's intensity distribution.
pub fn entropy(gray: &GrayImage) -> f64 {
    histogram256(gray)
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.log2())
        .sum()
}

/// Chi-square distance between two images' intensity histograms.
pub fn histogram_chi_square(original: &GrayImage, other: &GrayImage) -> f64 {
    let a = histogram256(original);
    let b = histogram256(other);
    a.iter()
        .zip(b.iter())
        .map(|(&pa, &pb)| (pa - pb).powi(2) / (pa + pb + HISTOGRAM_EPSILON))
        .sum()
}

/// Embedding capacity of a payload against an image's pixel count, in bits per pixel.
pub fn capacity_bpp(payload_bits: usize, width: u32, height: u32) -> f64 {
    payload_bits as f64 / (width as f64 * height as f64)
}

fn require_same_shape(a: &GrayImage, b: &GrayImage) -> Result<()> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(SteganographyError::InvalidInput(format!(
            "images must share dimensions to compare: {}x{} vs {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    Ok(())
}

/// Bundled image-quality comparison between a cover and its stego counterpart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub mse: f64,
    pub psnr: f64,
    pub entropy_original: f64,
    pub entropy_stego: f64,
    pub entropy_difference: f64,
    pub histogram_chi_square: f64,
    pub capacity_bpp: Option<f64>,
}

/// Runs every image-quality metric between `original` and `stego`. `payload_bits`,
/// when known, is also reported as a capacity figure.
pub fn evaluate(original: &Image, stego: &Image, payload_bits: Option<usize>) -> Result<Evaluation> {
    let original_gray = original.to_gray();
    let stego_gray = stego.to_gray();
    require_same_shape(&original_gray, &stego_gray)?;

    let entropy_original = entropy(&original_gray);
    let entropy_stego = entropy(&stego_gray);

    Ok(Evaluation {
        mse: mse(&original_gray, &stego_gray)?,
        psnr: psnr(&original_gray, &stego_gray)?,
        entropy_original,
        entropy_stego,
        entropy_difference: (entropy_stego - entropy_original).abs(),
        histogram_chi_square: histogram_chi_square(&original_gray, &stego_gray),
        capacity_bpp: payload_bits
            .map(|bits| capacity_bpp(bits, original_gray.width(), original_gray.height())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn identical_images_have_zero_mse_and_infinite_psnr() {
        let gray: GrayImage = ImageBuffer::from_fn(8, 8, |x, y| image::Luma([((x + y) % 256) as u8]));
        assert_eq!(mse(&gray, &gray).unwrap(), 0.0);
        assert_eq!(psnr(&gray, &gray).unwrap(), f64::INFINITY);
    }

    #[test]
    fn uniform_image_has_zero_entropy() {
        let gray: GrayImage = ImageBuffer::from_pixel(8, 8, image::Luma([42]));
        assert_eq!(entropy(&gray), 0.0);
    }

    #[test]
    fn full_range_image_has_near_maximal_entropy() {
        let gray: GrayImage = ImageBuffer::from_fn(256, 1, |x, _y| image::Luma([x as u8]));
        assert!((entropy(&gray) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn identical_histograms_have_zero_chi_square_distance() {
        let gray: GrayImage = ImageBuffer::from_fn(16, 16, |x, y| image::Luma([((x * y) % 256) as u8]));
        assert!(histogram_chi_square(&gray, &gray) < 1e-9);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let a: GrayImage = ImageBuffer::from_pixel(8, 8, image::Luma([0]));
        let b: GrayImage = ImageBuffer::from_pixel(4, 4, image::Luma([0]));
        assert!(mse(&a, &b).is_err());
    }

    #[test]
    fn capacity_is_bits_over_pixel_count() {
        assert!((capacity_bpp(800, 10, 10) - 8.0).abs() < 1e-9);
    }
}
