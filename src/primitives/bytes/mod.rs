#![forbid(unsafe_code)]
//! Varint and fixed-width little-endian helpers shared by the arena layers.

pub mod var {
    //! Unsigned varints: 7 payload bits per byte, high bit marks continuation,
    //! least significant group first.

    use crate::types::{ArenaError, Result};

    /// Longest encoding of a `u64`.
    pub const MAX_LEN: usize = 10;

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            } else {
                out.push(byte | 0x80);
            }
        }
    }

    /// Returns the number of bytes `encode_u64` emits for `v`.
    pub fn encoded_len(mut v: u64) -> usize {
        let mut len = 1;
        while v >= 0x80 {
            v >>= 7;
            len += 1;
        }
        len
    }

    /// Decodes a varint by pulling bytes from `next`, returning the value and
    /// the number of bytes consumed.
    pub fn decode_u64_with<F>(mut next: F) -> Result<(u64, usize)>
    where
        F: FnMut(usize) -> Result<u8>,
    {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..MAX_LEN {
            let byte = next(i)?;
            let payload = (byte & 0x7f) as u64;
            if i == MAX_LEN - 1 && payload > 1 {
                return Err(ArenaError::Corruption("varint overflow (more than 64 bits)"));
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok((result, i + 1));
            }
            shift += 7;
        }
        Err(ArenaError::Corruption("varint too long"))
    }

    /// Decodes a u64 varint from a slice, updating the offset.
    pub fn decode_u64(src: &[u8], off: &mut usize) -> Result<u64> {
        let start = *off;
        let (value, used) = decode_u64_with(|i| {
            src.get(start + i)
                .copied()
                .ok_or(ArenaError::Corruption("varint decode truncated"))
        })?;
        *off = start + used;
        Ok(value)
    }
}

pub mod le {
    //! Little-endian integers of 1 to 8 bytes.

    use crate::types::{ArenaError, Result};

    /// Widest supported integer field.
    pub const MAX_WIDTH: usize = 8;

    /// Rejects widths outside `1..=8`.
    pub fn check_width(width: usize) -> Result<()> {
        if width == 0 || width > MAX_WIDTH {
            return Err(ArenaError::Invalid("integer width must be 1..=8 bytes"));
        }
        Ok(())
    }

    /// Writes the low `dst.len()` bytes of `v`; higher bytes are dropped.
    pub fn put_uint(dst: &mut [u8], v: u64) {
        let bytes = v.to_le_bytes();
        let width = dst.len().min(MAX_WIDTH);
        dst[..width].copy_from_slice(&bytes[..width]);
    }

    /// Reads an unsigned integer from up to eight little-endian bytes.
    pub fn get_uint(src: &[u8]) -> u64 {
        let mut bytes = [0u8; MAX_WIDTH];
        let width = src.len().min(MAX_WIDTH);
        bytes[..width].copy_from_slice(&src[..width]);
        u64::from_le_bytes(bytes)
    }
}
