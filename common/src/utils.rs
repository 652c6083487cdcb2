//! Common Utilities
//!
//! Bit handling and CRC helpers shared across the uplink implementation.
//! Bit vectors hold one bit per byte (0 or 1), MSB of each packed byte first.

use bytes::{Bytes, BytesMut, BufMut};
use tracing::trace;

/// CRC-24A generator polynomial (36.212 5.1.1), including the x^24 term
pub const CRC24A_POLY: u32 = 0x1864CFB;

/// Number of parity bits appended by CRC-24A
pub const CRC24_LEN: usize = 24;

/// Convert a byte slice to hex string for debugging
pub fn bytes_to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Calculate CRC-24A over an unpacked bit sequence
pub fn crc24a_bits(bits: &[u8]) -> u32 {
    let highbit = 1u32 << CRC24_LEN;
    let mut remainder = 0u32;

    for &bit in bits.iter().chain(std::iter::repeat(&0u8).take(CRC24_LEN)) {
        remainder = (remainder << 1) | (bit & 1) as u32;
        if remainder & highbit != 0 {
            remainder ^= CRC24A_POLY;
        }
    }

    remainder & (highbit - 1)
}

/// Write the 24 parity bits of `crc` MSB first into `out`
pub fn crc24_to_bits(crc: u32, out: &mut [u8]) {
    for (i, bit) in out.iter_mut().take(CRC24_LEN).enumerate() {
        *bit = ((crc >> (CRC24_LEN - 1 - i)) & 1) as u8;
    }
}

/// Pack bits into bytes (MSB first)
pub fn pack_bits(bits: &[u8]) -> Bytes {
    let mut bytes = BytesMut::with_capacity((bits.len() + 7) / 8);

    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= (bit & 1) << (7 - i);
        }
        bytes.put_u8(byte);
    }

    trace!("Packed {} bits into {} bytes", bits.len(), bytes.len());
    bytes.freeze()
}

/// Unpack bytes into bits (MSB first)
pub fn unpack_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);

    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte >> (7 - i)) & 1);
        }
    }

    bits
}

/// Count positions where two bit sequences differ
pub fn bit_errors(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| (*x & 1) != (*y & 1)).count()
        + a.len().abs_diff(b.len())
}
