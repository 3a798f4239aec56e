use image::{GrayImage, Luma};

/// Row-0 column where UB starts, and the width of each header field in columns.
pub const HEADER_UB_COL: u32 = 0;
pub const HEADER_LB_COL: u32 = 8;
pub const HEADER_LEN_COL: u32 = 16;
pub const HEADER_WIDTH: u32 = 48;

/// Converts a byte payload into a bit stream, bit 7 of byte 0 first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    bits
}

/// Packs a bit stream back into bytes, bit 7 of byte 0 first. Any trailing partial
/// byte (fewer than 8 bits) is dropped, mirroring a stream that was always produced
/// in whole bytes.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .filter(|chunk| chunk.len() == 8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit))
        .collect()
}

/// The fixed 56-bit (UB 8 + LB 8 + PayloadLength 32, with 8 bits to spare) prefix
/// written into row 0 of the working buffer. UB/LB are recorded for parity with the
/// source algorithm but are never consulted on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub ub: u8,
    pub lb: u8,
    pub payload_bits: u32,
}

impl Header {
    /// Writes the header into row 0 of `gray`: clears each column's LSB then ORs
    /// in the corresponding header bit, MSB-first within each field.
    pub fn write_to(&self, gray: &mut GrayImage) {
        write_bit_field(gray, HEADER_UB_COL, self.ub as u32, 8);
        write_bit_field(gray, HEADER_LB_COL, self.lb as u32, 8);
        write_bit_field(gray, HEADER_LEN_COL, self.payload_bits, 32);
    }

    /// Reads the header back from row 0 of `gray`.
    pub fn read_from(gray: &GrayImage) -> Self {
        Header {
            ub: read_bit_field(gray, HEADER_UB_COL, 8) as u8,
            lb: read_bit_field(gray, HEADER_LB_COL, 8) as u8,
            payload_bits: read_bit_field(gray, HEADER_LEN_COL, 32),
        }
    }
}

fn write_bit_field(gray: &mut GrayImage, col_start: u32, value: u32, n_bits: u32) {
    for i in 0..n_bits {
        let bit = ((value >> (n_bits - 1 - i)) & 1) as u8;
        let col = col_start + i;
        let sample = gray.get_pixel(col, 0)[0];
        gray.put_pixel(col, 0, Luma([(sample & 0xFE) | bit]));
    }
}

fn read_bit_field(gray: &GrayImage, col_start: u32, n_bits: u32) -> u32 {
    let mut value = 0u32;
    for i in 0..n_bits {
        let col = col_start + i;
        let bit = (gray.get_pixel(col, 0)[0] & 1) as u32;
        value = (value << 1) | bit;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn byte_bit_roundtrip() {
        let data = b"Hello, World!";
        let bits = bytes_to_bits(data);
        let recovered = bits_to_bytes(&bits);
        assert_eq!(data.to_vec(), recovered);
    }

    #[test]
    fn first_bit_is_msb_of_first_byte() {
        let bits = bytes_to_bits(&[0b1000_0000]);
        assert_eq!(bits[0], 1);
        assert_eq!(&bits[1..], &[0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn header_roundtrip_through_image() {
        let mut gray: GrayImage = ImageBuffer::from_pixel(64, 4, Luma([123]));
        let header = Header {
            ub: 252,
            lb: 0,
            payload_bits: 128,
        };
        header.write_to(&mut gray);
        let recovered = Header::read_from(&gray);
        assert_eq!(header, recovered);
    }

    #[test]
    fn header_survives_subsequent_lsb_flips_outside_its_columns() {
        let mut gray: GrayImage = ImageBuffer::from_pixel(64, 16, Luma([10]));
        let header = Header {
            ub: 200,
            lb: 5,
            payload_bits: 1000,
        };
        header.write_to(&mut gray);
        // Flip LSBs of row 8, far from row 0's header columns.
        for x in 0..64 {
            let p = gray.get_pixel(x, 8)[0];
            gray.put_pixel(x, 8, Luma([p ^ 1]));
        }
        assert_eq!(Header::read_from(&gray), header);
    }
}
