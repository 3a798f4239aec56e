use crate::bitpacker::{self, bits_to_bytes, bytes_to_bits, Header};
use crate::codec::Image;
use crate::error::{Result, SteganographyError};
use crate::gradient::gradient_map;
use crate::selector::{select_blocks, Block};
use image::{GrayImage, Luma};

/// Per-case bit budget, indexed by case (0..=3), fixed by the source algorithm.
pub const CASE_BIT_BUDGETS: [usize; 4] = [2, 3, 3, 4];

/// Validated parameters shared by the adaptive encoder and decoder. Both sides of a
/// round-trip MUST use the same configuration; any divergence produces garbage.
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveConfig {
    pub block_size: u32,
    pub edge_threshold: f64,
}

impl AdaptiveConfig {
    pub fn new(block_size: u32, edge_threshold: f64) -> Result<Self> {
        if block_size < 2 || block_size % 2 != 0 {
            return Err(SteganographyError::InvalidInput(format!(
                "block_size must be an even integer >= 2, got {}",
                block_size
            )));
        }
        if edge_threshold < 0.0 {
            return Err(SteganographyError::InvalidInput(format!(
                "edge_threshold must be nonnegative, got {}",
                edge_threshold
            )));
        }
        Ok(Self {
            block_size,
            edge_threshold,
        })
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            block_size: 8,
            edge_threshold: 30.0,
        }
    }
}

/// Everything the caller learns about a completed encode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metadata {
    pub ub: u8,
    pub lb: u8,
    pub payload_bits: usize,
    pub embedded_bits: usize,
    pub blocks_used: usize,
    pub capacity_bpp: f64,
    pub height: u32,
    pub width: u32,
}

/// Determines a pixel pair's case from its MSBs: (0,0)->0, (1,0)->1, (0,1)->2, (1,1)->3.
fn pair_case(p1: u8, p2: u8) -> u8 {
    let msb1 = (p1 >> 7) & 1;
    let msb2 = (p2 >> 7) & 1;
    match (msb1, msb2) {
        (0, 0) => 0,
        (1, 0) => 1,
        (0, 1) => 2,
        (1, 1) => 3,
        _ => unreachable!(),
    }
}

fn column_median(values: &[u8]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Me: mean over columns of the per-column median of the block's current samples.
fn mean_of_column_medians(buffer: &GrayImage, row: u32, col: u32, block_size: u32) -> f64 {
    let mut column_medians = Vec::with_capacity(block_size as usize);
    for j in 0..block_size {
        let mut column = Vec::with_capacity(block_size as usize);
        for i in 0..block_size {
            column.push(buffer.get_pixel(col + j, row + i)[0]);
        }
        column_medians.push(column_median(&column));
    }
    column_medians.iter().sum::<f64>() / column_medians.len() as f64
}

/// Writes up to `bits.len()` (<= the case's budget) payload bits into the pair,
/// leaving any target bit with no assigned payload bit unchanged.
fn embed_pair_bits(p1: &mut u8, p2: &mut u8, case: u8, bits: &[u8]) {
    let set = |byte: &mut u8, bit_position: u8, value: u8| {
        let mask = 1u8 << bit_position;
        *byte = (*byte & !mask) | (value << bit_position);
    };
    match case {
        0 => {
            if let Some(&b) = bits.first() {
                set(p1, 1, b);
            }
            if let Some(&b) = bits.get(1) {
                set(p2, 1, b);
            }
        }
        1 => {
            if let Some(&b) = bits.first() {
                set(p1, 2, b);
            }
            if let Some(&b) = bits.get(1) {
                set(p1, 3, b);
            }
            if let Some(&b) = bits.get(2) {
                set(p2, 1, b);
            }
        }
        2 => {
            if let Some(&b) = bits.first() {
                set(p1, 1, b);
            }
            if let Some(&b) = bits.get(1) {
                set(p2, 2, b);
            }
            if let Some(&b) = bits.get(2) {
                set(p2, 3, b);
            }
        }
        3 => {
            if let Some(&b) = bits.first() {
                set(p1, 2, b);
            }
            if let Some(&b) = bits.get(1) {
                set(p1, 3, b);
            }
            if let Some(&b) = bits.get(2) {
                set(p2, 2, b);
            }
            if let Some(&b) = bits.get(3) {
                set(p2, 3, b);
            }
        }
        _ => unreachable!(),
    }
}

fn extract_pair_bits(p1: u8, p2: u8, case: u8, take: usize) -> Vec<u8> {
    let all: Vec<u8> = match case {
        0 => vec![(p1 >> 1) & 1, (p2 >> 1) & 1],
        1 => vec![(p1 >> 2) & 1, (p1 >> 3) & 1, (p2 >> 1) & 1],
        2 => vec![(p1 >> 1) & 1, (p2 >> 2) & 1, (p2 >> 3) & 1],
        3 => vec![(p1 >> 2) & 1, (p1 >> 3) & 1, (p2 >> 2) & 1, (p2 >> 3) & 1],
        _ => unreachable!(),
    };
    all.into_iter().take(take).collect()
}

/// Sums the case-bit budget over every active pair (Di <= Me) in every eligible
/// block, without consuming any payload. Used for the up-front capacity check.
fn reachable_bit_budget(buffer: &GrayImage, blocks: &[Block], config: &AdaptiveConfig) -> usize {
    let mut total = 0usize;
    for block in blocks {
        if !block.is_eligible(config.edge_threshold) {
            continue;
        }
        let me = mean_of_column_medians(buffer, block.row, block.col, config.block_size);
        for i in (0..config.block_size - 1).step_by(2) {
            for j in 0..config.block_size {
                let (x, y1, y2) = (block.col + j, block.row + i, block.row + i + 1);
                let p1 = buffer.get_pixel(x, y1)[0];
                let p2 = buffer.get_pixel(x, y2)[0];
                let di = (p1 as i32 - p2 as i32).unsigned_abs() as f64;
                if di <= me {
                    let case = pair_case(p1, p2);
                    total += CASE_BIT_BUDGETS[case as usize];
                }
            }
        }
    }
    total
}

/// Embeds `payload` into `cover` using the edge/region-adaptive MSB-case rule.
/// Fails with `CapacityExceeded` rather than producing a truncated stego image.
pub fn encode(cover: &Image, payload: &[u8], config: &AdaptiveConfig) -> Result<(Image, Metadata)> {
    let width = cover.width();
    let height = cover.height();
    if width < bitpacker::HEADER_WIDTH {
        return Err(SteganographyError::InvalidImage(format!(
            "image width {} is below the required header width {}",
            width,
            bitpacker::HEADER_WIDTH
        )));
    }
    if payload.len() > (u32::MAX as usize) / 8 {
        return Err(SteganographyError::InvalidInput(
            "payload length exceeds 2^32/8 bytes".to_string(),
        ));
    }

    let mut buffer = cover.to_gray();
    let ub = buffer.pixels().map(|p| p[0]).max().unwrap_or(0);
    let lb = buffer.pixels().map(|p| p[0]).min().unwrap_or(0);

    let bits = bytes_to_bits(payload);
    Header {
        ub,
        lb,
        payload_bits: bits.len() as u32,
    }
    .write_to(&mut buffer);

    let gradient = gradient_map(&Image::from_gray(buffer.clone()));
    let blocks = select_blocks(&gradient, config.block_size);

    let capacity = reachable_bit_budget(&buffer, &blocks, config);
    if bits.len() > capacity {
        return Err(SteganographyError::CapacityExceeded {
            required: bits.len(),
            available: capacity,
        });
    }

    let mut bit_idx = 0usize;
    let mut embedded_bits = 0usize;
    let mut blocks_used = 0usize;

    'walk: for block in &blocks {
        if bit_idx >= bits.len() {
            break 'walk;
        }
        if !block.is_eligible(config.edge_threshold) {
            continue;
        }
        let me = mean_of_column_medians(&buffer, block.row, block.col, config.block_size);
        'pairs: for i in (0..config.block_size - 1).step_by(2) {
            for j in 0..config.block_size {
                if bit_idx >= bits.len() {
                    break 'pairs;
                }
                let (x, y1, y2) = (block.col + j, block.row + i, block.row + i + 1);
                let mut p1 = buffer.get_pixel(x, y1)[0];
                let mut p2 = buffer.get_pixel(x, y2)[0];
                let di = (p1 as i32 - p2 as i32).unsigned_abs() as f64;
                if di <= me {
                    let case = pair_case(p1, p2);
                    let budget = CASE_BIT_BUDGETS[case as usize];
                    let take = budget.min(bits.len() - bit_idx);
                    embed_pair_bits(&mut p1, &mut p2, case, &bits[bit_idx..bit_idx + take]);
                    buffer.put_pixel(x, y1, Luma([p1]));
                    buffer.put_pixel(x, y2, Luma([p2]));
                    bit_idx += take;
                    embedded_bits += take;
                }
            }
        }
        blocks_used += 1;
    }

    let capacity_bpp = embedded_bits as f64 / (width as f64 * height as f64);
    let metadata = Metadata {
        ub,
        lb,
        payload_bits: bits.len(),
        embedded_bits,
        blocks_used,
        capacity_bpp,
        height,
        width,
    };

    Ok((Image::from_gray(buffer), metadata))
}

/// Recovers the payload from a stego image produced by `encode` with the same config.
pub fn decode(stego: &Image, config: &AdaptiveConfig) -> Result<Vec<u8>> {
    let width = stego.width();
    if width < bitpacker::HEADER_WIDTH {
        return Err(SteganographyError::InvalidImage(format!(
            "image width {} is below the required header width {}",
            width,
            bitpacker::HEADER_WIDTH
        )));
    }

    let gray = stego.to_gray();
    let header = Header::read_from(&gray);
    let target_bits = header.payload_bits as usize;

    let gradient = gradient_map(&Image::from_gray(gray.clone()));
    let blocks = select_blocks(&gradient, config.block_size);

    let mut extracted = Vec::with_capacity(target_bits);
    'walk: for block in &blocks {
        if extracted.len() >= target_bits {
            break 'walk;
        }
        if !block.is_eligible(config.edge_threshold) {
            continue;
        }
        let me = mean_of_column_medians(&gray, block.row, block.col, config.block_size);
        'pairs: for i in (0..config.block_size - 1).step_by(2) {
            for j in 0..config.block_size {
                if extracted.len() >= target_bits {
                    break 'pairs;
                }
                let (x, y1, y2) = (block.col + j, block.row + i, block.row + i + 1);
                let p1 = gray.get_pixel(x, y1)[0];
                let p2 = gray.get_pixel(x, y2)[0];
                let di = (p1 as i32 - p2 as i32).unsigned_abs() as f64;
                if di <= me {
                    let case = pair_case(p1, p2);
                    let budget = CASE_BIT_BUDGETS[case as usize];
                    let take = budget.min(target_bits - extracted.len());
                    extracted.extend(extract_pair_bits(p1, p2, case, take));
                }
            }
        }
    }

    if extracted.len() < target_bits {
        return Err(SteganographyError::HeaderCorrupt(format!(
            "header declares {} bits but only {} were reachable with this configuration",
            target_bits,
            extracted.len()
        )));
    }

    Ok(bits_to_bytes(&extracted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn gray_ramp(width: u32, height: u32) -> Image {
        Image::Gray(ImageBuffer::from_fn(width, height, |x, _y| {
            Luma([((x * 4) % 256) as u8])
        }))
    }

    fn textured_image(width: u32, height: u32) -> Image {
        Image::Gray(ImageBuffer::from_fn(width, height, |x, y| {
            Luma([(((x * 37) ^ (y * 19)) % 256) as u8])
        }))
    }

    #[test]
    fn scenario_s1_gray_ramp_roundtrip() {
        let cover = gray_ramp(64, 64);
        let config = AdaptiveConfig::new(8, 0.0).unwrap();
        let payload = vec![0x5Au8; 16];

        let (stego, metadata) = encode(&cover, &payload, &config).unwrap();
        assert_eq!(metadata.payload_bits, 128);
        assert_eq!(metadata.ub, 252);
        assert_eq!(metadata.lb, 0);

        let recovered = decode(&stego, &config).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn roundtrip_on_textured_image() {
        let cover = textured_image(64, 64);
        let config = AdaptiveConfig::default();
        let payload = b"the quick brown fox jumps".to_vec();

        let (stego, metadata) = encode(&cover, &payload, &config).unwrap();
        assert_eq!(metadata.embedded_bits, metadata.payload_bits);

        let recovered = decode(&stego, &config).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn no_msb_mutation_and_case_preserved() {
        let cover = textured_image(64, 64);
        let config = AdaptiveConfig::default();
        let payload = vec![0xFFu8; 50];

        let cover_gray = cover.to_gray();
        let (stego, _) = encode(&cover, &payload, &config).unwrap();
        let stego_gray = stego.to_gray();

        for (cover_px, stego_px) in cover_gray.pixels().zip(stego_gray.pixels()) {
            assert_eq!((cover_px[0] ^ stego_px[0]) & 0x80, 0);
        }
    }

    #[test]
    fn prohibitive_threshold_exceeds_capacity() {
        let cover = textured_image(64, 64);
        let config = AdaptiveConfig::new(8, 1_000_000.0).unwrap();
        let payload = vec![0u8; 4];

        let result = encode(&cover, &payload, &config);
        assert!(matches!(
            result,
            Err(SteganographyError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn capacity_monotonic_in_threshold() {
        let cover = textured_image(64, 64);
        let payload = vec![0xAAu8; 8];

        let loose = AdaptiveConfig::new(8, 0.0).unwrap();
        let strict = AdaptiveConfig::new(8, 30.0).unwrap();

        let (_, metadata_loose) = encode(&cover, &payload, &loose).unwrap();
        let (_, metadata_strict) = encode(&cover, &payload, &strict).unwrap();

        assert!(metadata_loose.embedded_bits >= metadata_strict.embedded_bits);
    }

    #[test]
    fn header_width_precondition_is_enforced() {
        let cover = Image::Gray(ImageBuffer::from_pixel(32, 32, Luma([0])));
        let config = AdaptiveConfig::default();
        let result = encode(&cover, b"x", &config);
        assert!(matches!(result, Err(SteganographyError::InvalidImage(_))));
    }
}
