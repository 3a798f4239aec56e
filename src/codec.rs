use crate::error::{Result, SteganographyError};
use image::{io::Reader as ImageReader, ColorType, DynamicImage, GrayImage, RgbImage};

/// BT.601 luma coefficients: Y = 0.299 R + 0.587 G + 0.114 B
pub const BT601_RED: f64 = 0.299;
pub const BT601_GREEN: f64 = 0.587;
pub const BT601_BLUE: f64 = 0.114;

/// Converts an RGB triple to an 8-bit gray value using BT.601, rounded to nearest.
pub fn bt601_gray(r: u8, g: u8, b: u8) -> u8 {
    let luma = BT601_RED * r as f64 + BT601_GREEN * g as f64 + BT601_BLUE * b as f64;
    luma.round().clamp(0.0, 255.0) as u8
}

/// An 8-bit raster image, either single-channel or RGB.
///
/// No resizing ever happens to an `Image`; samples stay in `[0, 255]` by construction.
#[derive(Clone, Debug)]
pub enum Image {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Image {
    /// Loads a raster image. Fails with `InvalidImage` if the source isn't 8-bit per channel.
    pub fn load(path: &str) -> Result<Self> {
        let decoded = ImageReader::open(path)
            .map_err(SteganographyError::from)?
            .decode()
            .map_err(|e| SteganographyError::InvalidImage(e.to_string()))?;

        match decoded.color() {
            ColorType::L8 => Ok(Image::Gray(decoded.to_luma8())),
            ColorType::Rgb8 | ColorType::Rgba8 | ColorType::La8 => Ok(Image::Rgb(decoded.to_rgb8())),
            other => Err(SteganographyError::InvalidImage(format!(
                "unsupported sample depth/layout: {:?} (only 8-bit gray/RGB are supported)",
                other
            ))),
        }
    }

    /// Saves the image to a lossless container (PNG), preserving sample values bit-exactly.
    pub fn save(&self, path: &str) -> Result<()> {
        let dynamic: DynamicImage = match self {
            Image::Gray(g) => DynamicImage::ImageLuma8(g.clone()),
            Image::Rgb(rgb) => DynamicImage::ImageRgb8(rgb.clone()),
        };
        dynamic
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(SteganographyError::from)
    }

    pub fn width(&self) -> u32 {
        match self {
            Image::Gray(g) => g.width(),
            Image::Rgb(r) => r.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Image::Gray(g) => g.height(),
            Image::Rgb(r) => r.height(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Image::Gray(_) => 1,
            Image::Rgb(_) => 3,
        }
    }

    /// Converts to single-channel gray using BT.601, rounded to nearest integer.
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Image::Gray(g) => g.clone(),
            Image::Rgb(rgb) => {
                let mut gray = GrayImage::new(rgb.width(), rgb.height());
                for (x, y, pixel) in rgb.enumerate_pixels() {
                    let value = bt601_gray(pixel[0], pixel[1], pixel[2]);
                    gray.put_pixel(x, y, image::Luma([value]));
                }
                gray
            }
        }
    }

    /// Wraps a single-channel buffer as an `Image`, e.g. a working stego buffer.
    pub fn from_gray(gray: GrayImage) -> Self {
        Image::Gray(gray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bt601_gray_is_exact_for_pure_channels() {
        assert_eq!(bt601_gray(255, 0, 0), 76);
        assert_eq!(bt601_gray(0, 255, 0), 150);
        assert_eq!(bt601_gray(0, 0, 255), 29);
        assert_eq!(bt601_gray(0, 0, 0), 0);
        assert_eq!(bt601_gray(255, 255, 255), 255);
    }

    #[test]
    fn save_load_roundtrip_is_lossless() {
        let mut gray = GrayImage::new(16, 16);
        for (i, pixel) in gray.pixels_mut().enumerate() {
            *pixel = image::Luma([(i % 256) as u8]);
        }
        let image = Image::Gray(gray.clone());

        let path = std::env::temp_dir().join("imgstego_codec_roundtrip_test.png");
        image.save(path.to_str().unwrap()).unwrap();
        let reloaded = Image::load(path.to_str().unwrap()).unwrap();

        assert_eq!(reloaded.to_gray(), gray);
        let _ = std::fs::remove_file(path);
    }
}
