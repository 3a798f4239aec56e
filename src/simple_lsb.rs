use crate::codec::Image;
use crate::error::{Result, SteganographyError};
use crate::gradient::gradient_map;
use image::RgbImage;

const PIXELS_PER_UNIT: usize = 3;

/// Selects between the row-major baseline and the smooth-region variant. The
/// decoder must be given the same configuration used at encode time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimpleLsbConfig {
    pub edge_adaptive: bool,
}

/// Dispatches to [`encode`] or [`encode_adaptive`] depending on `config`.
pub fn encode_with_config(cover: &Image, payload: &[u8], config: SimpleLsbConfig) -> Result<Image> {
    if config.edge_adaptive {
        encode_adaptive(cover, payload)
    } else {
        encode(cover, payload)
    }
}

/// Dispatches to [`decode`] or [`decode_adaptive`] depending on `config`.
pub fn decode_with_config(stego: &Image, config: SimpleLsbConfig) -> Result<Vec<u8>> {
    if config.edge_adaptive {
        decode_adaptive(stego)
    } else {
        decode(stego)
    }
}

/// Lays a byte across the low bit of 8 consecutive channel values, MSB first,
/// and a continuation flag into the low bit of the 9th.
fn write_unit(channels: &mut [u8], byte: u8, has_more: bool) {
    for (bit_index, slot) in channels[..8].iter_mut().enumerate() {
        let bit = (byte >> (7 - bit_index)) & 1;
        *slot = (*slot & 0xFE) | bit;
    }
    channels[8] = (channels[8] & 0xFE) | (has_more as u8);
}

fn read_unit(channels: &[u8]) -> (u8, bool) {
    let mut byte = 0u8;
    for &slot in &channels[..8] {
        byte = (byte << 1) | (slot & 1);
    }
    (byte, (channels[8] & 1) == 1)
}

/// Flattens the 3 pixels making up one encoding unit into their 9 channel values.
fn unit_channels(rgb: &RgbImage, coords: [(u32, u32); 3]) -> [u8; 9] {
    let mut values = [0u8; 9];
    for (slot, &(x, y)) in coords.iter().enumerate() {
        let pixel = rgb.get_pixel(x, y);
        values[slot * 3] = pixel[0];
        values[slot * 3 + 1] = pixel[1];
        values[slot * 3 + 2] = pixel[2];
    }
    values
}

fn put_unit_channels(rgb: &mut RgbImage, coords: [(u32, u32); 3], values: &[u8; 9]) {
    for (slot, &(x, y)) in coords.iter().enumerate() {
        rgb.put_pixel(
            x,
            y,
            image::Rgb([values[slot * 3], values[slot * 3 + 1], values[slot * 3 + 2]]),
        );
    }
}

fn coords_for(index: usize, width: u32) -> (u32, u32) {
    let width = width as usize;
    ((index % width) as u32, (index / width) as u32)
}

/// Hides `payload` across the whole image in row-major pixel order, 3 pixels per
/// byte, with a continuation flag after every byte. No header: the decoder relies
/// entirely on the flag to know when to stop.
pub fn encode(cover: &Image, payload: &[u8]) -> Result<Image> {
    if payload.is_empty() {
        return Err(SteganographyError::InvalidInput(
            "payload must not be empty".to_string(),
        ));
    }

    let mut rgb = match cover {
        Image::Rgb(rgb) => rgb.clone(),
        Image::Gray(gray) => {
            let mut converted = RgbImage::new(gray.width(), gray.height());
            for (x, y, pixel) in gray.enumerate_pixels() {
                converted.put_pixel(x, y, image::Rgb([pixel[0], pixel[0], pixel[0]]));
            }
            converted
        }
    };

    let width = rgb.width();
    let height = rgb.height();
    let total_pixels = (width as usize) * (height as usize);
    let required_pixels = payload.len() * PIXELS_PER_UNIT;
    if required_pixels > total_pixels {
        return Err(SteganographyError::CapacityExceeded {
            required: required_pixels,
            available: total_pixels,
        });
    }

    let mut idx = 0usize;
    for (i, &byte) in payload.iter().enumerate() {
        let coords = [
            coords_for(idx, width),
            coords_for(idx + 1, width),
            coords_for(idx + 2, width),
        ];
        idx += 3;

        let mut channels = unit_channels(&rgb, coords);
        write_unit(&mut channels, byte, i + 1 < payload.len());
        put_unit_channels(&mut rgb, coords, &channels);
    }

    Ok(Image::Rgb(rgb))
}

/// Recovers a payload hidden by `encode`, stopping at the first unset continuation flag.
pub fn decode(stego: &Image) -> Result<Vec<u8>> {
    let rgb = match stego {
        Image::Rgb(rgb) => rgb.clone(),
        Image::Gray(_) => {
            return Err(SteganographyError::InvalidImage(
                "simple LSB decode requires an RGB image".to_string(),
            ))
        }
    };

    let width = rgb.width();
    let height = rgb.height();
    let total_pixels = (width as usize) * (height as usize);

    let mut bytes = Vec::new();
    let mut idx = 0usize;
    while idx + PIXELS_PER_UNIT <= total_pixels {
        let coords = [
            coords_for(idx, width),
            coords_for(idx + 1, width),
            coords_for(idx + 2, width),
        ];
        idx += 3;

        let channels = unit_channels(&rgb, coords);
        let (byte, has_more) = read_unit(&channels);
        bytes.push(byte);
        if !has_more {
            return Ok(bytes);
        }
    }

    Err(SteganographyError::HeaderCorrupt(
        "continuation flag never cleared before the image ran out of pixels".to_string(),
    ))
}

/// Row-major pixel indices, in encounter order, whose gradient magnitude is at or
/// below the image mean -- the smooth regions the edge-adaptive variant restricts to.
fn smooth_pixel_order(image: &Image) -> Vec<(u32, u32)> {
    let gradient = gradient_map(image);
    let mean = gradient.mean();
    let mut coords = Vec::new();
    for y in 0..gradient.height {
        for x in 0..gradient.width {
            if gradient.get(y, x) <= mean {
                coords.push((x, y));
            }
        }
    }
    coords
}

/// Edge-adaptive variant of [`encode`]: restricts embedding to pixels whose gradient
/// magnitude is at or below the image mean, the inverse policy of the main adaptive
/// embedder (which favors high-edge regions).
pub fn encode_adaptive(cover: &Image, payload: &[u8]) -> Result<Image> {
    if payload.is_empty() {
        return Err(SteganographyError::InvalidInput(
            "payload must not be empty".to_string(),
        ));
    }

    let mut rgb = match cover {
        Image::Rgb(rgb) => rgb.clone(),
        Image::Gray(gray) => {
            let mut converted = RgbImage::new(gray.width(), gray.height());
            for (x, y, pixel) in gray.enumerate_pixels() {
                converted.put_pixel(x, y, image::Rgb([pixel[0], pixel[0], pixel[0]]));
            }
            converted
        }
    };

    let order = smooth_pixel_order(cover);
    let required_pixels = payload.len() * PIXELS_PER_UNIT;
    if required_pixels > order.len() {
        return Err(SteganographyError::CapacityExceeded {
            required: required_pixels,
            available: order.len(),
        });
    }

    let mut idx = 0usize;
    for (i, &byte) in payload.iter().enumerate() {
        let coords = [order[idx], order[idx + 1], order[idx + 2]];
        idx += 3;

        let mut channels = unit_channels(&rgb, coords);
        write_unit(&mut channels, byte, i + 1 < payload.len());
        put_unit_channels(&mut rgb, coords, &channels);
    }

    Ok(Image::Rgb(rgb))
}

/// Edge-adaptive counterpart to [`decode`]. Requires the same cover image (or at
/// least its gradient map) used at encode time, since the smooth-region order is
/// recomputed from the stego image itself -- which is safe because the gradient is
/// computed over LSB-masked samples and embedding never touches the MSBs.
pub fn decode_adaptive(stego: &Image) -> Result<Vec<u8>> {
    let rgb = match stego {
        Image::Rgb(rgb) => rgb.clone(),
        Image::Gray(_) => {
            return Err(SteganographyError::InvalidImage(
                "simple LSB decode requires an RGB image".to_string(),
            ))
        }
    };

    let order = smooth_pixel_order(stego);
    let mut bytes = Vec::new();
    let mut idx = 0usize;
    while idx + PIXELS_PER_UNIT <= order.len() {
        let coords = [order[idx], order[idx + 1], order[idx + 2]];
        idx += 3;

        let channels = unit_channels(&rgb, coords);
        let (byte, has_more) = read_unit(&channels);
        bytes.push(byte);
        if !has_more {
            return Ok(bytes);
        }
    }

    Err(SteganographyError::HeaderCorrupt(
        "continuation flag never cleared before the smooth region ran out of pixels".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn textured_rgb(width: u32, height: u32) -> Image {
        Image::Rgb(ImageBuffer::from_fn(width, height, |x, y| {
            let v = ((x * 53) ^ (y * 29)) % 256;
            image::Rgb([v as u8, ((v + 80) % 256) as u8, ((v + 160) % 256) as u8])
        }))
    }

    #[test]
    fn scenario_s4_hello_roundtrip() {
        let cover = textured_rgb(16, 16);
        let payload = b"HELLO".to_vec();
        let stego = encode(&cover, &payload).unwrap();
        let recovered = decode(&stego).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn gray_cover_is_converted_to_rgb() {
        let gray = Image::Gray(ImageBuffer::from_fn(16, 16, |x, y| {
            image::Luma([((x + y) % 256) as u8])
        }));
        let payload = b"hi".to_vec();
        let stego = encode(&gray, &payload).unwrap();
        let recovered = decode(&stego).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn capacity_exceeded_is_reported() {
        let cover = textured_rgb(2, 2);
        let payload = vec![0u8; 100];
        let result = encode(&cover, &payload);
        assert!(matches!(
            result,
            Err(SteganographyError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn adaptive_variant_roundtrips() {
        let cover = textured_rgb(32, 32);
        let payload = b"adaptive lsb".to_vec();
        let stego = encode_adaptive(&cover, &payload).unwrap();
        let recovered = decode_adaptive(&stego).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn config_dispatch_matches_direct_calls() {
        let cover = textured_rgb(32, 32);
        let payload = b"dispatch check".to_vec();

        let baseline = SimpleLsbConfig::default();
        let stego = encode_with_config(&cover, &payload, baseline).unwrap();
        assert_eq!(decode_with_config(&stego, baseline).unwrap(), payload);

        let adaptive_config = SimpleLsbConfig { edge_adaptive: true };
        let stego = encode_with_config(&cover, &payload, adaptive_config).unwrap();
        assert_eq!(decode_with_config(&stego, adaptive_config).unwrap(), payload);
    }
}
