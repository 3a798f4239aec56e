use crate::codec::{bt601_gray, Image};
use image::GrayImage;

/// Standard 3x3 Sobel kernel, X direction
const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
/// Standard 3x3 Sobel kernel, Y direction
const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// Pointwise gradient magnitude map, identical at encode and decode given the
/// same stego image, because it is always computed from an LSB-masked gray plane.
#[derive(Clone, Debug)]
pub struct GradientMap {
    pub width: u32,
    pub height: u32,
    values: Vec<f64>,
}

impl GradientMap {
    pub fn get(&self, row: u32, col: u32) -> f64 {
        self.values[(row * self.width + col) as usize]
    }

    /// Mean gradient magnitude over the whole map.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Mean gradient magnitude over a `size`x`size` block starting at (row, col).
    /// Pixels outside the map bounds are not counted.
    pub fn block_mean(&self, row: u32, col: u32, size: u32) -> f64 {
        let mut sum = 0.0;
        let mut count = 0u32;
        for dy in 0..size {
            let y = row + dy;
            if y >= self.height {
                break;
            }
            for dx in 0..size {
                let x = col + dx;
                if x >= self.width {
                    break;
                }
                sum += self.get(y, x);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Masks every sample's LSB to obtain the gray plane the Sobel operator is computed from.
/// This is the load-bearing invariant: without it, embedding writes would desynchronize
/// encoder and decoder gradients.
pub fn lsb_stable_gray_plane(image: &Image) -> GrayImage {
    match image {
        Image::Gray(gray) => {
            let mut masked = gray.clone();
            for pixel in masked.pixels_mut() {
                pixel[0] &= 0xFE;
            }
            masked
        }
        Image::Rgb(rgb) => {
            let mut gray = GrayImage::new(rgb.width(), rgb.height());
            for (x, y, pixel) in rgb.enumerate_pixels() {
                let r = pixel[0] & 0xFE;
                let g = pixel[1] & 0xFE;
                let b = pixel[2] & 0xFE;
                gray.put_pixel(x, y, image::Luma([bt601_gray(r, g, b)]));
            }
            gray
        }
    }
}

/// Computes the Sobel gradient magnitude map over the LSB-stable gray plane of `image`.
pub fn gradient_map(image: &Image) -> GradientMap {
    let gray = lsb_stable_gray_plane(image);
    gradient_map_from_gray(&gray)
}

/// Computes the Sobel gradient magnitude map directly from an already LSB-masked gray plane.
pub fn gradient_map_from_gray(gray: &GrayImage) -> GradientMap {
    let width = gray.width();
    let height = gray.height();
    let mut values = vec![0.0f64; (width * height) as usize];

    let sample = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            0
        } else {
            gray.get_pixel(x as u32, y as u32)[0] as i32
        }
    };

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut gx = 0i32;
            let mut gy = 0i32;
            for (ky, row) in SOBEL_X.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let sx = x + kx as i64 - 1;
                    let sy = y + ky as i64 - 1;
                    gx += weight * sample(sx, sy);
                }
            }
            for (ky, row) in SOBEL_Y.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let sx = x + kx as i64 - 1;
                    let sy = y + ky as i64 - 1;
                    gy += weight * sample(sx, sy);
                }
            }
            let magnitude = ((gx * gx + gy * gy) as f64).sqrt();
            values[(y as u32 * width + x as u32) as usize] = magnitude;
        }
    }

    GradientMap {
        width,
        height,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn gradient_is_lsb_stable() {
        let base: GrayImage = ImageBuffer::from_fn(16, 16, |x, y| Luma([((x * 4 + y) % 256) as u8]));
        let mut flipped = base.clone();
        for pixel in flipped.pixels_mut() {
            pixel[0] ^= 1;
        }

        let map_base = gradient_map(&Image::Gray(base));
        let map_flipped = gradient_map(&Image::Gray(flipped));

        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(map_base.get(y, x), map_flipped.get(y, x));
            }
        }
    }

    #[test]
    fn flat_image_has_zero_gradient() {
        let flat: GrayImage = ImageBuffer::from_pixel(8, 8, Luma([128]));
        let map = gradient_map(&Image::Gray(flat));
        assert_eq!(map.mean(), 0.0);
    }

    #[test]
    fn block_mean_matches_manual_average() {
        let image: GrayImage = ImageBuffer::from_fn(16, 16, |x, _y| Luma([(x * 16) as u8]));
        let map = gradient_map(&Image::Gray(image));
        let manual: f64 = (0..8)
            .flat_map(|row| (0..8).map(move |col| map.get(row, col)))
            .sum::<f64>()
            / 64.0;
        assert!((map.block_mean(0, 0, 8) - manual).abs() < 1e-9);
    }
}
