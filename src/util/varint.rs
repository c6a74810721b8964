//! LEB128 variable-length integers.
//!
//! Seven payload bits per byte, least significant group first, with the high
//! bit marking that another byte follows. Posting deltas, frequencies and
//! stored-field lengths are small, so most of them fit in a single byte.

use crate::error::{QuiverError, Result};

/// Longest encoding of a `u64`.
pub const MAX_LEN: usize = 10;

/// Append the encoding of `value` to `buf`.
pub fn write_u64(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Encode `value` into a fresh buffer.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    write_u64(&mut buf, value);
    buf
}

/// Number of bytes `value` encodes to.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Decode a value from the front of `bytes`, returning it with the number
/// of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().take(MAX_LEN).enumerate() {
        let payload = (byte & 0x7F) as u64;
        if i == MAX_LEN - 1 && payload > 1 {
            return Err(QuiverError::corruption("varint overflows u64"));
        }
        value |= payload << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if bytes.len() >= MAX_LEN {
        Err(QuiverError::corruption("varint longer than 10 bytes"))
    } else {
        Err(QuiverError::corruption("truncated varint"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let encoded = encode_u64(value);
            assert_eq!(encoded.len(), encoded_len(value));
            assert_eq!(decode_u64(&encoded).unwrap(), (value, encoded.len()));
        }
        assert_eq!(encode_u64(300), vec![0xAC, 0x02]);
        assert_eq!(encoded_len(u64::MAX), MAX_LEN);
    }

    #[test]
    fn test_decode_stops_at_first_value() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 300);
        write_u64(&mut buf, 7);
        let (first, used) = decode_u64(&buf).unwrap();
        assert_eq!(first, 300);
        assert_eq!(decode_u64(&buf[used..]).unwrap(), (7, 1));
    }

    #[test]
    fn test_malformed_input() {
        assert!(decode_u64(&[]).is_err());
        assert!(decode_u64(&[0x80]).is_err());
        assert!(decode_u64(&[0xFF; 11]).is_err());
        // Eleventh group would shift past 64 bits.
        let mut overflow = vec![0xFF; 9];
        overflow.push(0x02);
        assert!(decode_u64(&overflow).is_err());
    }
}
