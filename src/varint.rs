//! Variable-length 7-bit unsigned integer encoding.
//!
//! Each octet has a continuation bit (MSB) and 7 data bits. The least
//! significant group is written first. The last octet has continuation = 0.
//! Record sizes and string lengths use this encoding and never exceed `u32`.

use std::io::Read;

use crate::{Error, Result};

/// Maximale Anzahl Bytes fuer einen u32 (5 x 7 Bits).
pub const MAX_LEN: usize = 5;

/// Appends `value` as a variable-length integer.
#[inline]
pub fn encode(out: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        out.push(value as u8);
        return;
    }
    let mut v = value;
    loop {
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(low7);
            break;
        }
        out.push(0x80 | low7);
    }
}

/// Number of bytes `encode` writes for `value`.
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..0x80 => 1,
        0x80..0x4000 => 2,
        0x4000..0x20_0000 => 3,
        0x20_0000..0x1000_0000 => 4,
        _ => 5,
    }
}

/// Reads a variable-length integer.
///
/// Returns `Ok(None)` when the reader is exhausted before the first byte, so that
/// callers can distinguish a clean end of input from a truncated integer.
pub fn decode_opt<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u32>> {
    let Some(first) = read_byte(reader)? else {
        return Ok(None);
    };
    if first & 0x80 == 0 {
        return Ok(Some(u32::from(first)));
    }
    let mut result = u32::from(first & 0x7F);
    let mut shift: u32 = 7;
    loop {
        let byte = read_byte(reader)?.ok_or(Error::PrematureEndOfStream)?;
        let data = u32::from(byte & 0x7F);
        // 5. Byte: nur 4 Datenbits gueltig, keine Fortsetzung erlaubt
        if shift == 28 && (data > 0x0F || byte & 0x80 != 0) {
            return Err(Error::VarintOverflow);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(Some(result));
        }
        shift += 7;
    }
}

/// Reads a variable-length integer; end of input is an error.
#[inline]
pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    decode_opt(reader)?.ok_or(Error::PrematureEndOfStream)
}

fn read_byte<R: Read + ?Sized>(reader: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: u32) -> u32 {
        let mut out = Vec::new();
        encode(&mut out, value);
        assert_eq!(out.len(), encoded_len(value));
        decode(&mut out.as_slice()).unwrap()
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(round_trip(0), 0);
        assert_eq!(round_trip(1), 1);
        let mut out = Vec::new();
        encode(&mut out, 127);
        assert_eq!(out, vec![0x7F]);
    }

    #[test]
    fn two_byte_boundary() {
        let mut out = Vec::new();
        encode(&mut out, 128);
        assert_eq!(out, vec![0x80, 0x01]);
        assert_eq!(round_trip(16383), 16383);
        assert_eq!(round_trip(16384), 16384);
    }

    #[test]
    fn max_value_uses_five_bytes() {
        let mut out = Vec::new();
        encode(&mut out, u32::MAX);
        assert_eq!(out.len(), MAX_LEN);
        assert_eq!(out[4], 0x0F);
        assert_eq!(round_trip(u32::MAX), u32::MAX);
    }

    #[test]
    fn overflow_in_fifth_byte() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        assert_eq!(decode(&mut &data[..]), Err(Error::VarintOverflow));
        let data = [0x80, 0x80, 0x80, 0x80, 0x81, 0x00];
        assert_eq!(decode(&mut &data[..]), Err(Error::VarintOverflow));
    }

    #[test]
    fn truncated_is_premature_end() {
        let data = [0x80, 0x80];
        assert_eq!(decode(&mut &data[..]), Err(Error::PrematureEndOfStream));
    }

    #[test]
    fn empty_input_is_none() {
        let data: [u8; 0] = [];
        assert_eq!(decode_opt(&mut &data[..]), Ok(None));
    }
}
